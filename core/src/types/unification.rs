//! Assignability and joins between CEL types.
//!
//! There are no type parameters in declarations, so "unification" reduces to
//! structural comparison where `dyn` (and the error type) matches anything.

use super::Type;

/// Whether a value of type `actual` may be passed where `expected` is declared.
pub fn is_assignable(expected: &Type, actual: &Type) -> bool {
    match (expected, actual) {
        (e, a) if e.is_dyn_or_error() || a.is_dyn_or_error() => true,
        (Type::List(e), Type::List(a)) => is_assignable(e, a),
        (Type::Map(ek, ev), Type::Map(ak, av)) => is_assignable(ek, ak) && is_assignable(ev, av),
        (Type::Optional(e), Type::Optional(a)) => is_assignable(e, a),
        (Type::Type(_), Type::Type(_)) => true,
        (e, a) => e == a,
    }
}

/// Whether two types are assignable in either direction.
pub fn is_compatible(a: &Type, b: &Type) -> bool {
    is_assignable(a, b) || is_assignable(b, a)
}

/// The more general of two compatible types, or `None` if they are unrelated.
///
/// `dyn` anywhere wins, so joining `int` with `dyn` yields `dyn` and
/// `list(int)` with `list(dyn)` yields `list(dyn)`.
pub fn most_general(a: &Type, b: &Type) -> Option<Type> {
    match (a, b) {
        (Type::Error, other) | (other, Type::Error) => Some(other.clone()),
        (Type::Dyn, _) | (_, Type::Dyn) => Some(Type::Dyn),
        (Type::List(x), Type::List(y)) => Some(Type::list(most_general(x, y)?)),
        (Type::Map(xk, xv), Type::Map(yk, yv)) => {
            Some(Type::map(most_general(xk, yk)?, most_general(xv, yv)?))
        }
        (Type::Optional(x), Type::Optional(y)) => Some(Type::optional(most_general(x, y)?)),
        (Type::Type(x), Type::Type(y)) => {
            Some(Type::type_of(most_general(x, y).unwrap_or(Type::Dyn)))
        }
        (x, y) if x == y => Some(x.clone()),
        _ => None,
    }
}

/// Element type of an aggregate literal: heterogeneous elements widen to `dyn`.
pub fn join_elements<'a>(types: impl IntoIterator<Item = &'a Type>) -> Type {
    let mut joined: Option<Type> = None;
    for ty in types {
        joined = Some(match joined {
            None => ty.clone(),
            Some(prev) => most_general(&prev, ty).unwrap_or(Type::Dyn),
        });
    }
    joined.unwrap_or(Type::Dyn)
}
