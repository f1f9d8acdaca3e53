mod macros;
mod parsed_expr;
#[allow(clippy::module_inception)]
pub mod parser;
mod syntax;
pub mod error;

// Re-export the parser and rule enum for external use
pub use parser::CelParser;
pub use parser::Rule;
pub use parser::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_SIZE, ParseOptions, parse, parse_with_options};

pub use error::{ParseError, ParseErrorKind};
pub use parsed_expr::{
    ACCUMULATOR_VAR, CallExpr, ComprehensionExpr, Expr, ExprId, ExprKind, ListExpr, Literal,
    MapEntry, MapExpr, ParsedExpr, SelectExpr, StructExpr, StructField, operators,
};
pub use syntax::{Location, Source, Span};
