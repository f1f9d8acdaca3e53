use hashbrown::HashMap;

use crate::parser::{Expr, ExprId, Location, ParsedExpr, Source};
use crate::types::Type;

/// What an identifier, select chain or call was resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reference {
    /// A declared variable, possibly with a dotted name such as `a.b.c`.
    Variable(String),
    /// A built-in function, by fully qualified name.
    Function(String),
    /// Declared overloads that may apply, in declaration order.
    Overloads(Vec<String>),
    /// A built-in type name used as a value, as in `type(x) == int`.
    Type(Type),
}

/// A parsed expression annotated with a type for every node it visited.
#[derive(Debug, Clone)]
pub struct CheckedExpr {
    pub parsed: ParsedExpr,
    types: HashMap<ExprId, Type>,
    references: HashMap<ExprId, Reference>,
}

impl CheckedExpr {
    pub(crate) fn new(
        parsed: ParsedExpr,
        types: HashMap<ExprId, Type>,
        references: HashMap<ExprId, Reference>,
    ) -> Self {
        Self {
            parsed,
            types,
            references,
        }
    }

    pub fn expr(&self) -> &Expr {
        &self.parsed.expr
    }

    pub fn source(&self) -> &Source {
        &self.parsed.source
    }

    /// Type of the whole expression.
    pub fn output_type(&self) -> &Type {
        self.types.get(&self.parsed.expr.id).unwrap_or(&Type::Dyn)
    }

    pub fn type_of(&self, id: ExprId) -> Option<&Type> {
        self.types.get(&id)
    }

    pub fn reference(&self, id: ExprId) -> Option<&Reference> {
        self.references.get(&id)
    }

    pub fn references(&self) -> impl Iterator<Item = (&ExprId, &Reference)> {
        self.references.iter()
    }

    pub fn location_of(&self, id: ExprId) -> Option<Location> {
        self.parsed.location_of(id)
    }
}
