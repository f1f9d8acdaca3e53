pub mod function;
pub mod time;
mod value;

pub use function::{Function, FunctionImpl};
pub use value::{MapKey, Value, lookup_key};
