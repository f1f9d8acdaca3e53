use std::fmt;

use crate::api::Diagnostic;
use crate::parser::{ExprId, Location};
use crate::types::Type;

/// Type error attached to the node it was found on.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeError {
    pub kind: TypeErrorKind,
    pub expr_id: ExprId,
}

/// Specific kinds of type errors
#[derive(Debug, Clone, PartialEq)]
pub enum TypeErrorKind {
    /// Identifier, function or type name that is not declared
    UndeclaredReference { name: String },
    /// No overload of a function accepts the argument types
    NoMatchingOverload { function: String, signature: String },
    /// `.field` on a type without fields
    FieldSelection { ty: Type },
    /// Comprehension over something that is not a list or map
    InvalidRange { ty: Type },
    /// Map literal with a key type that cannot be a map key
    UnsupportedMapKey { ty: Type },
    /// `?elem` or `?key: value` whose value is not optional
    ExpectedOptional { ty: Type },
}

impl TypeError {
    pub fn new(kind: TypeErrorKind, expr_id: ExprId) -> Self {
        Self { kind, expr_id }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            TypeErrorKind::UndeclaredReference { name } => {
                format!("undeclared reference to '{}' (in container '')", name)
            }
            TypeErrorKind::NoMatchingOverload {
                function,
                signature,
            } => format!(
                "found no matching overload for '{}' applied to '{}'",
                function, signature
            ),
            TypeErrorKind::FieldSelection { ty } => {
                format!("type '{}' does not support field selection", ty)
            }
            TypeErrorKind::InvalidRange { ty } => format!(
                "expression of type '{}' cannot be the range of a comprehension (must be list, map, or dynamic)",
                ty
            ),
            TypeErrorKind::UnsupportedMapKey { ty } => {
                format!("unsupported map key type: {}", ty)
            }
            TypeErrorKind::ExpectedOptional { ty } => {
                format!("expected type 'optional_type' but found '{}'", ty)
            }
        }
    }

    pub fn to_diagnostic(&self, location: Option<Location>) -> Diagnostic {
        Diagnostic::error(self.message())
            .at(location)
            .on_expr(self.expr_id)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Render argument types the way overload errors show them: `(int, string)`
/// for global calls and `string.(int)` for member calls.
pub fn format_signature(target: Option<&Type>, args: &[Type]) -> String {
    let args: Vec<String> = args.iter().map(|t| t.to_string()).collect();
    match target {
        Some(target) => format!("{}.({})", target, args.join(", ")),
        None => format!("({})", args.join(", ")),
    }
}
