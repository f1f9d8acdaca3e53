//! Expression tree produced by the parser.
//!
//! Operators are represented as calls to functions with the conventional CEL
//! operator names (`_+_`, `_[_]`, `!_`, ...) so that the checker and the
//! interpreter only need to understand a single call shape.

use std::sync::Arc;
use std::fmt;

use ecow::EcoString;
use hashbrown::HashMap;

use super::syntax::{Location, Source};
use crate::syntax::{escape_bytes, escape_string};

/// Identifier of a node, unique within one parsed expression.
pub type ExprId = i64;

/// Name of the hidden accumulator variable introduced by comprehension macros.
pub const ACCUMULATOR_VAR: &str = "@result";

/// Operator function names.
pub mod operators {
    pub const ADD: &str = "_+_";
    pub const SUBTRACT: &str = "_-_";
    pub const MULTIPLY: &str = "_*_";
    pub const DIVIDE: &str = "_/_";
    pub const MODULO: &str = "_%_";
    pub const NEGATE: &str = "-_";
    pub const LOGICAL_NOT: &str = "!_";
    pub const LOGICAL_AND: &str = "_&&_";
    pub const LOGICAL_OR: &str = "_||_";
    pub const CONDITIONAL: &str = "_?_:_";
    pub const EQUALS: &str = "_==_";
    pub const NOT_EQUALS: &str = "_!=_";
    pub const LESS: &str = "_<_";
    pub const LESS_EQUALS: &str = "_<=_";
    pub const GREATER: &str = "_>_";
    pub const GREATER_EQUALS: &str = "_>=_";
    pub const IN: &str = "@in";
    pub const INDEX: &str = "_[_]";
    pub const OPT_INDEX: &str = "_[?_]";
    pub const OPT_SELECT: &str = "_?._";
    pub const NOT_STRICTLY_FALSE: &str = "@not_strictly_false";
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Uint(u64),
    Double(f64),
    String(EcoString),
    Bytes(Arc<[u8]>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Null => write!(f, "null"),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Uint(u) => write!(f, "{}u", u),
            Literal::Double(d) => write!(f, "{:?}", d),
            Literal::String(s) => escape_string(f, s),
            Literal::Bytes(b) => escape_bytes(f, b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: ExprId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal(Literal),
    Ident(String),
    Select(SelectExpr),
    Call(CallExpr),
    List(ListExpr),
    Map(MapExpr),
    Struct(StructExpr),
    Comprehension(Box<ComprehensionExpr>),
}

/// Field selection `operand.field`, or a presence test `has(operand.field)`.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectExpr {
    pub operand: Box<Expr>,
    pub field: String,
    pub test_only: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub target: Option<Box<Expr>>,
    pub function: String,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListExpr {
    pub elements: Vec<Expr>,
    /// Positions in `elements` written as `?expr`.
    pub optional_indices: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapExpr {
    pub entries: Vec<MapEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub id: ExprId,
    pub key: Expr,
    pub value: Expr,
    pub optional: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructExpr {
    pub type_name: String,
    pub fields: Vec<StructField>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StructField {
    pub id: ExprId,
    pub name: String,
    pub value: Expr,
    pub optional: bool,
}

/// Fold over a list or map. Produced by the `all`, `exists`, `exists_one`,
/// `map` and `filter` macros.
#[derive(Debug, Clone, PartialEq)]
pub struct ComprehensionExpr {
    pub iter_var: String,
    pub iter_range: Expr,
    pub accu_var: String,
    pub accu_init: Expr,
    pub loop_condition: Expr,
    pub loop_step: Expr,
    pub result: Expr,
}

impl Expr {
    pub fn new(id: ExprId, kind: ExprKind) -> Self {
        Self { id, kind }
    }

    /// Short name of the node kind, as reported to AST validators.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Literal(_) => "literal",
            ExprKind::Ident(_) => "ident",
            ExprKind::Select(_) => "select",
            ExprKind::Call(_) => "call",
            ExprKind::List(_) => "list",
            ExprKind::Map(_) => "map",
            ExprKind::Struct(_) => "struct",
            ExprKind::Comprehension(_) => "comprehension",
        }
    }

    pub fn as_ident(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name),
            _ => None,
        }
    }

    /// Dotted name for chains such as `a.b.c`, if this node is one.
    pub fn qualified_name(&self) -> Option<String> {
        match &self.kind {
            ExprKind::Ident(name) => Some(name.clone()),
            ExprKind::Select(select) if !select.test_only => {
                let mut prefix = select.operand.qualified_name()?;
                prefix.push('.');
                prefix.push_str(&select.field);
                Some(prefix)
            }
            _ => None,
        }
    }

    /// Structural equality that ignores node ids.
    pub fn same_shape(&self, other: &Expr) -> bool {
        fn all(a: &[Expr], b: &[Expr]) -> bool {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.same_shape(y))
        }
        match (&self.kind, &other.kind) {
            (ExprKind::Literal(a), ExprKind::Literal(b)) => a == b,
            (ExprKind::Ident(a), ExprKind::Ident(b)) => a == b,
            (ExprKind::Select(a), ExprKind::Select(b)) => {
                a.field == b.field && a.test_only == b.test_only && a.operand.same_shape(&b.operand)
            }
            (ExprKind::Call(a), ExprKind::Call(b)) => {
                a.function == b.function
                    && match (&a.target, &b.target) {
                        (Some(x), Some(y)) => x.same_shape(y),
                        (None, None) => true,
                        _ => false,
                    }
                    && all(&a.args, &b.args)
            }
            (ExprKind::List(a), ExprKind::List(b)) => {
                a.optional_indices == b.optional_indices && all(&a.elements, &b.elements)
            }
            (ExprKind::Map(a), ExprKind::Map(b)) => {
                a.entries.len() == b.entries.len()
                    && a.entries.iter().zip(&b.entries).all(|(x, y)| {
                        x.optional == y.optional
                            && x.key.same_shape(&y.key)
                            && x.value.same_shape(&y.value)
                    })
            }
            (ExprKind::Struct(a), ExprKind::Struct(b)) => {
                a.type_name == b.type_name
                    && a.fields.len() == b.fields.len()
                    && a.fields.iter().zip(&b.fields).all(|(x, y)| {
                        x.name == y.name && x.optional == y.optional && x.value.same_shape(&y.value)
                    })
            }
            (ExprKind::Comprehension(a), ExprKind::Comprehension(b)) => {
                a.iter_var == b.iter_var
                    && a.accu_var == b.accu_var
                    && a.iter_range.same_shape(&b.iter_range)
                    && a.accu_init.same_shape(&b.accu_init)
                    && a.loop_condition.same_shape(&b.loop_condition)
                    && a.loop_step.same_shape(&b.loop_step)
                    && a.result.same_shape(&b.result)
            }
            _ => false,
        }
    }
}

/// A parsed expression together with its source and node positions.
#[derive(Debug, Clone)]
pub struct ParsedExpr {
    pub expr: Expr,
    pub source: Arc<Source>,
    positions: HashMap<ExprId, usize>,
}

impl ParsedExpr {
    pub(crate) fn new(expr: Expr, source: Arc<Source>, positions: HashMap<ExprId, usize>) -> Self {
        Self {
            expr,
            source,
            positions,
        }
    }

    /// Byte offset of a node in the source text.
    pub fn offset_of(&self, id: ExprId) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    /// 1-based line and column of a node.
    pub fn location_of(&self, id: ExprId) -> Option<Location> {
        self.offset_of(id).map(|offset| self.source.location(offset))
    }

    pub fn node_count(&self) -> usize {
        self.positions.len()
    }
}
