pub mod analyzer;
pub mod declarations;
pub mod error;
pub mod typed_expr;

#[cfg(test)]
mod analyzer_test;

pub use analyzer::analyze;
pub use declarations::{Declarations, Features, FunctionDecl, OverloadDecl};
pub use error::{TypeError, TypeErrorKind};
pub use typed_expr::{CheckedExpr, Reference};
