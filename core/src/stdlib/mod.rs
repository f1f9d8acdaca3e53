//! CEL standard library
//!
//! Runtime implementations of the built-in functions and operators, plus
//! their static signatures for the checker:
//! - Math: arithmetic and relational operators
//! - String: `size`, `contains`, `startsWith`, `endsWith`, `matches`
//! - Collections: indexing and `in`
//! - Conversions: `int`, `uint`, `double`, `string`, `bytes`, `bool`, ...
//! - Time: timestamp and duration accessors
//! - Optional: optional values, when enabled
//!
//! The logical operators, the conditional and comprehensions are not
//! functions: they are evaluated lazily by the interpreter.

pub mod collections;
pub mod conversions;
pub mod math;
pub mod optional;
pub mod signatures;
pub mod string;
pub mod time;

use crate::evaluator::EvalError;
use crate::parser::operators;
use crate::values::Value;

use math::overload;

/// Call a built-in function with evaluated arguments.
pub fn call(name: &str, target: Option<&Value>, args: &[Value]) -> Result<Value, EvalError> {
    match (name, target, args) {
        (operators::ADD, None, [a, b]) => math::add(a, b),
        (operators::SUBTRACT, None, [a, b]) => math::subtract(a, b),
        (operators::MULTIPLY, None, [a, b]) => math::multiply(a, b),
        (operators::DIVIDE, None, [a, b]) => math::divide(a, b),
        (operators::MODULO, None, [a, b]) => math::modulo(a, b),
        (operators::NEGATE, None, [a]) => math::negate(a),
        (
            operators::LESS | operators::LESS_EQUALS | operators::GREATER | operators::GREATER_EQUALS,
            None,
            [a, b],
        ) => math::compare(name, a, b),
        (operators::EQUALS, None, [a, b]) => Ok(Value::Bool(a.cel_equals(b))),
        (operators::NOT_EQUALS, None, [a, b]) => Ok(Value::Bool(!a.cel_equals(b))),
        (operators::LOGICAL_NOT, None, [Value::Bool(b)]) => Ok(Value::Bool(!b)),
        (operators::INDEX, None, [container, idx]) => collections::index(container, idx),
        (operators::OPT_INDEX, None, [container, idx]) => collections::optional_index(container, idx),
        (operators::OPT_SELECT, None, [operand, field]) => optional::select(operand, field),
        (operators::IN, None, [elem, container]) => collections::contains(elem, container),
        ("size", None, [value]) | ("size", Some(value), []) => string::size(value),
        ("contains", Some(s), [needle]) => string::contains(s, needle),
        ("startsWith", Some(s), [prefix]) => string::starts_with(s, prefix),
        ("endsWith", Some(s), [suffix]) => string::ends_with(s, suffix),
        ("matches", Some(s), [pattern]) | ("matches", None, [s, pattern]) => {
            string::matches(s, pattern)
        }
        (name, None, [value]) if conversions::is_conversion(name) => {
            conversions::convert(name, value)
        }
        (name, _, _) if signatures::OPTIONAL_FUNCTIONS.contains(&name) => {
            optional::call(name, target, args)
        }
        (name, Some(target), args)
            if signatures::TIMESTAMP_ACCESSORS.contains(&name)
                || signatures::DURATION_ACCESSORS.contains(&name) =>
        {
            time::accessor(name, target, args)
        }
        _ => {
            let mut all: Vec<&Value> = target.into_iter().collect();
            all.extend(args);
            Err(overload(name, &all))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch() {
        assert_eq!(
            call(operators::ADD, None, &[Value::Int(1), Value::Int(2)]),
            Ok(Value::Int(3))
        );
        assert_eq!(
            call("size", Some(&Value::from("abc")), &[]),
            Ok(Value::Int(3))
        );
        assert_eq!(
            call(operators::EQUALS, None, &[Value::Int(1), Value::Double(1.0)]),
            Ok(Value::Bool(true))
        );
        assert_eq!(
            call("int", None, &[Value::from("7")]),
            Ok(Value::Int(7))
        );
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            call("frobnicate", None, &[Value::Int(1)]),
            Err(EvalError::NoSuchOverload("frobnicate(int)".to_string()))
        );
    }
}
