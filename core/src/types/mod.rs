mod types;
pub mod unification;

pub use types::Type;
pub use unification::{is_assignable, is_compatible, join_elements, most_general};
