//! Literal syntax helpers shared by the parser and value formatting.

pub mod bytes_literal;
pub mod string_literal;

pub use bytes_literal::escape_bytes;
pub use string_literal::{LiteralKind, UnescapeError, escape_string, unescape};
