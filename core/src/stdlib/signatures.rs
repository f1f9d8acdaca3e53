//! Static signatures of the built-in functions and operators.
//!
//! Monomorphic overloads live in a table. Functions whose result depends on
//! the argument types (`size`, indexing, list concatenation, equality,
//! optionals) are resolved by [`check_call`] directly.

use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::analyzer::Features;
use crate::parser::operators;
use crate::types::{Type, is_assignable, is_compatible, join_elements, most_general};

/// Outcome of resolving a call against the built-in signatures.
#[derive(Debug, Clone, PartialEq)]
pub enum CallCheck {
    Resolved(Type),
    /// The function exists but no overload accepts the arguments.
    NoMatch,
    /// No built-in function has this name.
    Unknown,
}

#[derive(Debug, Clone)]
struct Signature {
    member: bool,
    /// Receiver first for member functions.
    params: Vec<Type>,
    result: Type,
}

fn global(params: Vec<Type>, result: Type) -> Signature {
    Signature {
        member: false,
        params,
        result,
    }
}

fn member(params: Vec<Type>, result: Type) -> Signature {
    Signature {
        member: true,
        params,
        result,
    }
}

const COMPARABLE: [Type; 8] = [
    Type::Bool,
    Type::Int,
    Type::Uint,
    Type::Double,
    Type::String,
    Type::Bytes,
    Type::Timestamp,
    Type::Duration,
];

/// Member accessors on timestamps; each also takes an optional time zone.
pub const TIMESTAMP_ACCESSORS: [&str; 10] = [
    "getFullYear",
    "getMonth",
    "getDate",
    "getDayOfMonth",
    "getDayOfWeek",
    "getDayOfYear",
    "getHours",
    "getMinutes",
    "getSeconds",
    "getMilliseconds",
];

/// Accessors shared by durations.
pub const DURATION_ACCESSORS: [&str; 4] =
    ["getHours", "getMinutes", "getSeconds", "getMilliseconds"];

/// Functions that only exist when optional types are enabled.
pub const OPTIONAL_FUNCTIONS: [&str; 7] = [
    "optional.of",
    "optional.ofNonZeroValue",
    "optional.none",
    "hasValue",
    "value",
    "orValue",
    "or",
];

lazy_static! {
    static ref SIGNATURES: HashMap<&'static str, Vec<Signature>> = build_signatures();
}

fn build_signatures() -> HashMap<&'static str, Vec<Signature>> {
    use self::Type::*;

    let mut table: HashMap<&'static str, Vec<Signature>> = HashMap::new();
    let mut add = |name: &'static str, sig: Signature| table.entry(name).or_default().push(sig);

    for ty in [Int, Uint, Double, String, Bytes] {
        add(operators::ADD, global(vec![ty.clone(), ty.clone()], ty));
    }
    add(operators::ADD, global(vec![Timestamp, Duration], Timestamp));
    add(operators::ADD, global(vec![Duration, Timestamp], Timestamp));
    add(operators::ADD, global(vec![Duration, Duration], Duration));

    for ty in [Int, Uint, Double] {
        add(operators::SUBTRACT, global(vec![ty.clone(), ty.clone()], ty.clone()));
        add(operators::MULTIPLY, global(vec![ty.clone(), ty.clone()], ty.clone()));
        add(operators::DIVIDE, global(vec![ty.clone(), ty.clone()], ty));
    }
    add(operators::SUBTRACT, global(vec![Timestamp, Timestamp], Duration));
    add(operators::SUBTRACT, global(vec![Timestamp, Duration], Timestamp));
    add(operators::SUBTRACT, global(vec![Duration, Duration], Duration));
    for ty in [Int, Uint] {
        add(operators::MODULO, global(vec![ty.clone(), ty.clone()], ty));
    }
    add(operators::NEGATE, global(vec![Int], Int));
    add(operators::NEGATE, global(vec![Double], Double));
    add(operators::LOGICAL_NOT, global(vec![Bool], Bool));

    for name in [
        operators::LESS,
        operators::LESS_EQUALS,
        operators::GREATER,
        operators::GREATER_EQUALS,
    ] {
        for ty in COMPARABLE {
            add(name, global(vec![ty.clone(), ty], Bool));
        }
    }

    for name in ["contains", "startsWith", "endsWith", "matches"] {
        add(name, member(vec![String, String], Bool));
    }
    add("matches", global(vec![String, String], Bool));

    add("int", global(vec![Int], Int));
    add("int", global(vec![Uint], Int));
    add("int", global(vec![Double], Int));
    add("int", global(vec![String], Int));
    add("int", global(vec![Timestamp], Int));
    add("uint", global(vec![Uint], Uint));
    add("uint", global(vec![Int], Uint));
    add("uint", global(vec![Double], Uint));
    add("uint", global(vec![String], Uint));
    add("double", global(vec![Double], Double));
    add("double", global(vec![Int], Double));
    add("double", global(vec![Uint], Double));
    add("double", global(vec![String], Double));
    for ty in [String, Int, Uint, Double, Bool, Bytes, Timestamp, Duration] {
        add("string", global(vec![ty], String));
    }
    add("bytes", global(vec![Bytes], Bytes));
    add("bytes", global(vec![String], Bytes));
    add("bool", global(vec![Bool], Bool));
    add("bool", global(vec![String], Bool));
    add("timestamp", global(vec![Timestamp], Timestamp));
    add("timestamp", global(vec![String], Timestamp));
    add("timestamp", global(vec![Int], Timestamp));
    add("duration", global(vec![Duration], Duration));
    add("duration", global(vec![String], Duration));

    for name in TIMESTAMP_ACCESSORS {
        add(name, member(vec![Timestamp], Int));
        add(name, member(vec![Timestamp, String], Int));
    }
    for name in DURATION_ACCESSORS {
        add(name, member(vec![Duration], Int));
    }

    table
}

/// Whether `name` is a built-in function that is called with a qualified
/// name, such as `optional.of`.
pub fn is_qualified_builtin(name: &str, features: Features) -> bool {
    features.optional_types && name.starts_with("optional.") && OPTIONAL_FUNCTIONS.contains(&name)
}

/// Resolve the result type of a built-in call.
pub fn check_call(
    name: &str,
    target: Option<&Type>,
    args: &[Type],
    features: Features,
) -> CallCheck {
    if OPTIONAL_FUNCTIONS.contains(&name) {
        if !features.optional_types {
            return CallCheck::Unknown;
        }
        return check_optional(name, target, args);
    }

    match (name, target, args) {
        (operators::EQUALS | operators::NOT_EQUALS, None, [a, b]) => {
            if is_compatible(a, b) || (a.is_numeric() && b.is_numeric() && features.cross_type_numeric_comparisons) {
                CallCheck::Resolved(Type::Bool)
            } else {
                CallCheck::NoMatch
            }
        }
        (
            operators::LESS | operators::LESS_EQUALS | operators::GREATER | operators::GREATER_EQUALS,
            None,
            [a, b],
        ) if features.cross_type_numeric_comparisons
            && (a.is_numeric() || a.is_dyn_or_error())
            && (b.is_numeric() || b.is_dyn_or_error()) =>
        {
            CallCheck::Resolved(Type::Bool)
        }
        (operators::ADD, None, [a, b]) => check_add(a, b),
        (operators::INDEX, None, [container, index]) => match index_result(container, index) {
            Some(ty) => CallCheck::Resolved(ty),
            None => CallCheck::NoMatch,
        },
        (operators::OPT_INDEX | operators::OPT_SELECT, _, _) if !features.optional_types => {
            CallCheck::Unknown
        }
        (operators::OPT_INDEX, None, [container, index]) => {
            let inner = match container {
                Type::Optional(inner) => inner.as_ref(),
                other => other,
            };
            match index_result(inner, index) {
                Some(ty) => CallCheck::Resolved(Type::optional(ty)),
                None => CallCheck::NoMatch,
            }
        }
        (operators::OPT_SELECT, None, [operand, field]) => {
            let inner = match operand {
                Type::Optional(inner) => inner.as_ref(),
                other => other,
            };
            match inner {
                Type::Map(key, value) if is_assignable(key, field) => {
                    CallCheck::Resolved(Type::optional((**value).clone()))
                }
                Type::Dyn | Type::Error => CallCheck::Resolved(Type::optional(Type::Dyn)),
                _ => CallCheck::NoMatch,
            }
        }
        (operators::IN, None, [elem, container]) => {
            let ok = match container {
                Type::List(item) => {
                    is_compatible(item, elem)
                        || (features.cross_type_numeric_comparisons
                            && item.is_numeric()
                            && elem.is_numeric())
                }
                Type::Map(key, _) => {
                    is_compatible(key, elem)
                        || (features.cross_type_numeric_comparisons
                            && key.is_numeric()
                            && elem.is_numeric())
                }
                Type::Dyn | Type::Error => true,
                _ => false,
            };
            if ok {
                CallCheck::Resolved(Type::Bool)
            } else {
                CallCheck::NoMatch
            }
        }
        ("size", None, [arg]) | ("size", Some(arg), []) => match arg {
            Type::String | Type::Bytes | Type::List(_) | Type::Map(_, _) | Type::Dyn | Type::Error => {
                CallCheck::Resolved(Type::Int)
            }
            _ => CallCheck::NoMatch,
        },
        ("size", _, _) => CallCheck::NoMatch,
        ("dyn", None, [_]) => CallCheck::Resolved(Type::Dyn),
        ("type", None, [arg]) => CallCheck::Resolved(Type::type_of(arg.clone())),
        ("dyn" | "type", _, _) => CallCheck::NoMatch,
        _ => match_table(name, target, args),
    }
}

fn check_add(a: &Type, b: &Type) -> CallCheck {
    let mut results = Vec::new();
    if let CallCheck::Resolved(ty) = match_table(operators::ADD, None, &[a.clone(), b.clone()]) {
        results.push(ty);
    }
    let list_elem = |ty: &Type| match ty {
        Type::List(elem) => Some((**elem).clone()),
        Type::Dyn | Type::Error => Some(Type::Dyn),
        _ => None,
    };
    if matches!(a, Type::List(_)) || matches!(b, Type::List(_)) {
        if let (Some(x), Some(y)) = (list_elem(a), list_elem(b)) {
            results.push(Type::list(join_elements([&x, &y])));
        }
    } else if a.is_dyn_or_error() && b.is_dyn_or_error() {
        results.push(Type::Dyn);
    }
    unify_results(results)
}

fn index_result(container: &Type, index: &Type) -> Option<Type> {
    match container {
        Type::List(elem) if is_assignable(&Type::Int, index) => Some((**elem).clone()),
        Type::Map(key, value)
            if is_compatible(key, index) || (key.is_numeric() && index.is_numeric()) =>
        {
            Some((**value).clone())
        }
        Type::Dyn | Type::Error => Some(Type::Dyn),
        _ => None,
    }
}

fn check_optional(name: &str, target: Option<&Type>, args: &[Type]) -> CallCheck {
    let resolved = match (name, target, args) {
        ("optional.of" | "optional.ofNonZeroValue", None, [arg]) => {
            Some(Type::optional(arg.clone()))
        }
        ("optional.none", None, []) => Some(Type::optional(Type::Dyn)),
        ("hasValue", Some(Type::Optional(_) | Type::Dyn | Type::Error), []) => Some(Type::Bool),
        ("value", Some(Type::Optional(inner)), []) => Some((**inner).clone()),
        ("value", Some(Type::Dyn | Type::Error), []) => Some(Type::Dyn),
        ("orValue", Some(Type::Optional(inner)), [alt]) => {
            Some(most_general(inner, alt).unwrap_or(Type::Dyn))
        }
        ("orValue", Some(Type::Dyn | Type::Error), [_]) => Some(Type::Dyn),
        ("or", Some(Type::Optional(inner)), [Type::Optional(alt)]) => {
            Some(Type::optional(most_general(inner, alt).unwrap_or(Type::Dyn)))
        }
        ("or", Some(Type::Optional(_) | Type::Dyn | Type::Error), [Type::Dyn | Type::Error])
        | ("or", Some(Type::Dyn | Type::Error), [Type::Optional(_)]) => {
            Some(Type::optional(Type::Dyn))
        }
        _ => None,
    };
    match resolved {
        Some(ty) => CallCheck::Resolved(ty),
        None => CallCheck::NoMatch,
    }
}

fn match_table(name: &str, target: Option<&Type>, args: &[Type]) -> CallCheck {
    let Some(signatures) = SIGNATURES.get(name) else {
        return CallCheck::Unknown;
    };
    let is_member = target.is_some();
    let actual: Vec<&Type> = target.into_iter().chain(args).collect();
    let results = signatures
        .iter()
        .filter(|sig| sig.member == is_member && sig.params.len() == actual.len())
        .filter(|sig| {
            sig.params
                .iter()
                .zip(&actual)
                .all(|(param, arg)| is_assignable(param, arg))
        })
        .map(|sig| sig.result.clone())
        .collect();
    unify_results(results)
}

fn unify_results(results: Vec<Type>) -> CallCheck {
    let mut iter = results.into_iter();
    let Some(first) = iter.next() else {
        return CallCheck::NoMatch;
    };
    let mut joined = first;
    for ty in iter {
        joined = if joined == ty { joined } else { Type::Dyn };
    }
    CallCheck::Resolved(joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STRICT: Features = Features {
        optional_types: false,
        cross_type_numeric_comparisons: false,
    };
    const RELAXED: Features = Features {
        optional_types: true,
        cross_type_numeric_comparisons: true,
    };

    #[test]
    fn test_arithmetic() {
        assert_eq!(
            check_call(operators::ADD, None, &[Type::Int, Type::Int], STRICT),
            CallCheck::Resolved(Type::Int)
        );
        assert_eq!(
            check_call(operators::ADD, None, &[Type::Int, Type::String], STRICT),
            CallCheck::NoMatch
        );
        assert_eq!(
            check_call(operators::ADD, None, &[Type::Dyn, Type::Int], STRICT),
            CallCheck::Resolved(Type::Int)
        );
        assert_eq!(
            check_call(
                operators::SUBTRACT,
                None,
                &[Type::Timestamp, Type::Timestamp],
                STRICT
            ),
            CallCheck::Resolved(Type::Duration)
        );
    }

    #[test]
    fn test_list_concatenation() {
        assert_eq!(
            check_call(
                operators::ADD,
                None,
                &[Type::list(Type::Int), Type::list(Type::Int)],
                STRICT
            ),
            CallCheck::Resolved(Type::list(Type::Int))
        );
        assert_eq!(
            check_call(
                operators::ADD,
                None,
                &[Type::list(Type::Int), Type::list(Type::String)],
                STRICT
            ),
            CallCheck::Resolved(Type::list(Type::Dyn))
        );
    }

    #[test]
    fn test_cross_type_comparisons_need_the_feature() {
        let args = [Type::Int, Type::Double];
        assert_eq!(
            check_call(operators::LESS, None, &args, STRICT),
            CallCheck::NoMatch
        );
        assert_eq!(
            check_call(operators::LESS, None, &args, RELAXED),
            CallCheck::Resolved(Type::Bool)
        );
        assert_eq!(
            check_call(operators::EQUALS, None, &args, STRICT),
            CallCheck::NoMatch
        );
        assert_eq!(
            check_call(operators::EQUALS, None, &args, RELAXED),
            CallCheck::Resolved(Type::Bool)
        );
    }

    #[test]
    fn test_member_functions() {
        assert_eq!(
            check_call("startsWith", Some(&Type::String), &[Type::String], STRICT),
            CallCheck::Resolved(Type::Bool)
        );
        assert_eq!(
            check_call("startsWith", Some(&Type::String), &[Type::Int], STRICT),
            CallCheck::NoMatch
        );
        assert_eq!(
            check_call("size", Some(&Type::list(Type::Int)), &[], STRICT),
            CallCheck::Resolved(Type::Int)
        );
        assert_eq!(
            check_call("getMonth", Some(&Type::Timestamp), &[], STRICT),
            CallCheck::Resolved(Type::Int)
        );
        assert_eq!(check_call("nope", None, &[], STRICT), CallCheck::Unknown);
    }

    #[test]
    fn test_optional_functions() {
        assert_eq!(
            check_call("optional.of", None, &[Type::Int], STRICT),
            CallCheck::Unknown
        );
        assert_eq!(
            check_call("optional.of", None, &[Type::Int], RELAXED),
            CallCheck::Resolved(Type::optional(Type::Int))
        );
        assert_eq!(
            check_call("orValue", Some(&Type::optional(Type::Int)), &[Type::Int], RELAXED),
            CallCheck::Resolved(Type::Int)
        );
        assert_eq!(
            check_call(
                operators::OPT_SELECT,
                None,
                &[Type::map(Type::String, Type::Int), Type::String],
                RELAXED
            ),
            CallCheck::Resolved(Type::optional(Type::Int))
        );
        assert!(is_qualified_builtin("optional.none", RELAXED));
        assert!(!is_qualified_builtin("optional.none", STRICT));
    }

    #[test]
    fn test_index() {
        assert_eq!(
            check_call(
                operators::INDEX,
                None,
                &[Type::list(Type::String), Type::Int],
                STRICT
            ),
            CallCheck::Resolved(Type::String)
        );
        assert_eq!(
            check_call(
                operators::INDEX,
                None,
                &[Type::list(Type::String), Type::String],
                STRICT
            ),
            CallCheck::NoMatch
        );
        assert_eq!(
            check_call(operators::INDEX, None, &[Type::Dyn, Type::String], STRICT),
            CallCheck::Resolved(Type::Dyn)
        );
    }
}
