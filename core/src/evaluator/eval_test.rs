//! Unit tests for the evaluator.

use std::sync::Arc;

use hashbrown::HashMap;
use pretty_assertions::assert_eq;

use super::*;
use crate::analyzer::{self, Declarations, FunctionDecl};
use crate::parser::{ParseOptions, Source, parse_with_options};
use crate::types::Type;
use crate::values::MapKey;

struct Runner {
    decls: Declarations,
    bindings: Bindings,
    options: ExecutionOptions,
}

impl Runner {
    fn new() -> Self {
        Self {
            decls: Declarations::default(),
            bindings: HashMap::new(),
            options: ExecutionOptions::default(),
        }
    }

    fn optional(mut self) -> Self {
        self.decls.features.optional_types = true;
        self
    }

    fn variable(mut self, name: &str, ty: Type) -> Self {
        self.decls.add_variable(name, ty).unwrap();
        self
    }

    fn function(mut self, decl: FunctionDecl, implementations: Vec<FunctionImpl>) -> Self {
        for (overload, function) in decl.overloads.iter().zip(implementations) {
            self.bindings.insert(
                overload.id.clone(),
                OverloadBinding {
                    decl: overload.clone(),
                    function,
                },
            );
        }
        self.decls.add_function(decl).unwrap();
        self
    }

    fn limits(mut self, options: ExecutionOptions) -> Self {
        self.options = options;
        self
    }

    fn run(&self, source: &str, activation: &Activation) -> Result<Value, EvalError> {
        let options = ParseOptions {
            enable_optional_syntax: self.decls.features.optional_types,
            ..ParseOptions::default()
        };
        let parsed = parse_with_options(Arc::new(Source::new(source, "<test>")), &options)
            .expect("parsing failed");
        let checked = analyzer::analyze(&self.decls, parsed).expect("type checking failed");
        eval(&checked, &self.bindings, activation, &self.options)
    }

    fn eval(&self, source: &str) -> Value {
        match self.run(source, &Activation::new()) {
            Ok(value) => value,
            Err(e) => panic!("'{}' failed: {}", source, e),
        }
    }
}

fn eval_ok(source: &str) -> Value {
    Runner::new().eval(source)
}

fn eval_err(source: &str) -> EvalError {
    match Runner::new().run(source, &Activation::new()) {
        Ok(value) => panic!("expected '{}' to fail, got {}", source, value),
        Err(e) => e,
    }
}

// ============================================================================
// Literals and arithmetic
// ============================================================================

#[test]
fn test_literals() {
    assert_eq!(eval_ok("42"), Value::Int(42));
    assert_eq!(eval_ok("42u"), Value::Uint(42));
    assert_eq!(eval_ok("2.5"), Value::Double(2.5));
    assert_eq!(eval_ok("'hi'"), Value::from("hi"));
    assert_eq!(eval_ok("b'hi'"), Value::bytes(b"hi".to_vec()));
    assert_eq!(eval_ok("null"), Value::Null);
    assert_eq!(eval_ok("true"), Value::Bool(true));
}

#[test]
fn test_arithmetic() {
    assert_eq!(eval_ok("1 + 2 * 3"), Value::Int(7));
    assert_eq!(eval_ok("(1 + 2) * 3"), Value::Int(9));
    assert_eq!(eval_ok("7 / 2"), Value::Int(3));
    assert_eq!(eval_ok("-7 % 3"), Value::Int(-1));
    assert_eq!(eval_ok("1.5 * 2.0"), Value::Double(3.0));
    assert_eq!(eval_ok("'a' + 'b'"), Value::from("ab"));
    assert_eq!(
        eval_ok("[1] + [2]"),
        Value::list(vec![Value::Int(1), Value::Int(2)])
    );
}

#[test]
fn test_arithmetic_errors() {
    assert_eq!(eval_err("1 / 0"), EvalError::DivisionByZero);
    assert_eq!(eval_err("1 % 0"), EvalError::ModulusByZero);
    assert_eq!(eval_err("9223372036854775807 + 1"), EvalError::Overflow("int"));
    assert_eq!(eval_err("0u - 1u"), EvalError::Overflow("uint"));
}

#[test]
fn test_comparisons() {
    assert_eq!(eval_ok("1 < 2"), Value::Bool(true));
    assert_eq!(eval_ok("'b' >= 'a'"), Value::Bool(true));
    assert_eq!(eval_ok("[1, 2] == [1, 2]"), Value::Bool(true));
    assert_eq!(eval_ok("{'a': 1} != {'a': 2}"), Value::Bool(true));
    assert_eq!(eval_ok("dyn(1) == 1.0"), Value::Bool(true));
}

// ============================================================================
// Logical operators
// ============================================================================

#[test]
fn test_logical_short_circuit() {
    assert_eq!(eval_ok("false && 1 / 0 == 1"), Value::Bool(false));
    assert_eq!(eval_ok("true || 1 / 0 == 1"), Value::Bool(true));
}

#[test]
fn test_logical_absorbs_errors_on_either_side() {
    assert_eq!(eval_ok("1 / 0 == 1 && false"), Value::Bool(false));
    assert_eq!(eval_ok("1 / 0 == 1 || true"), Value::Bool(true));
    assert_eq!(eval_err("1 / 0 == 1 && true"), EvalError::DivisionByZero);
}

#[test]
fn test_conditional() {
    assert_eq!(eval_ok("1 < 2 ? 'yes' : 'no'"), Value::from("yes"));
    assert_eq!(eval_ok("false ? 1 / 0 : 3"), Value::Int(3));
    assert_eq!(eval_ok("!true"), Value::Bool(false));
}

// ============================================================================
// Variables and selection
// ============================================================================

#[test]
fn test_variables() {
    let runner = Runner::new()
        .variable("x", Type::Int)
        .variable("name", Type::String);
    let activation = Activation::new().with("x", 20i64).with("name", "cel");
    assert_eq!(
        runner.run("x * 2 + size(name)", &activation),
        Ok(Value::Int(43))
    );
}

#[test]
fn test_missing_variable() {
    let runner = Runner::new().variable("x", Type::Int);
    assert_eq!(
        runner.run("x + 1", &Activation::new()),
        Err(EvalError::NoSuchAttribute("x".to_string()))
    );
}

#[test]
fn test_qualified_variable() {
    let runner = Runner::new().variable("request.user.id", Type::String);
    let activation = Activation::new().with("request.user.id", "u-1");
    assert_eq!(
        runner.run("request.user.id + '!'", &activation),
        Ok(Value::from("u-1!"))
    );
}

#[test]
fn test_map_selection() {
    let runner = Runner::new().variable("m", Type::map(Type::String, Type::Int));
    let activation = Activation::new().with(
        "m",
        Value::map([(MapKey::from("a"), Value::Int(1))]),
    );
    assert_eq!(runner.run("m.a", &activation), Ok(Value::Int(1)));
    assert_eq!(runner.run("has(m.a)", &activation), Ok(Value::Bool(true)));
    assert_eq!(runner.run("has(m.b)", &activation), Ok(Value::Bool(false)));
    assert_eq!(
        runner.run("m.b", &activation),
        Err(EvalError::NoSuchKey("b".to_string()))
    );
}

#[test]
fn test_dyn_selection_on_non_map() {
    let runner = Runner::new().variable("d", Type::Dyn);
    let activation = Activation::new().with("d", 1i64);
    assert!(matches!(
        runner.run("d.field", &activation),
        Err(EvalError::NoSuchAttribute(_))
    ));
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_index() {
    assert_eq!(eval_ok("[10, 20][1]"), Value::Int(20));
    assert_eq!(eval_ok("{'a': 1}['a']"), Value::Int(1));
    assert_eq!(
        eval_err("[1][3]"),
        EvalError::IndexOutOfRange { index: 3, len: 1 }
    );
}

#[test]
fn test_repeated_map_key() {
    assert_eq!(
        eval_err("{'a': 1, 'a': 2}"),
        EvalError::Other("Failed with repeated key: a".to_string())
    );
}

#[test]
fn test_membership() {
    assert_eq!(eval_ok("2 in [1, 2, 3]"), Value::Bool(true));
    assert_eq!(eval_ok("'z' in {'a': 1}"), Value::Bool(false));
}

// ============================================================================
// Comprehensions
// ============================================================================

#[test]
fn test_macros() {
    assert_eq!(eval_ok("[1, 2, 3].all(x, x > 0)"), Value::Bool(true));
    assert_eq!(eval_ok("[1, 2, 3].exists(x, x == 2)"), Value::Bool(true));
    assert_eq!(eval_ok("[1, 2, 3].exists_one(x, x > 1)"), Value::Bool(false));
    assert_eq!(
        eval_ok("[1, 2, 3].map(x, x * 10)"),
        Value::list(vec![Value::Int(10), Value::Int(20), Value::Int(30)])
    );
    assert_eq!(
        eval_ok("[1, 2, 3, 4].filter(x, x % 2 == 0)"),
        Value::list(vec![Value::Int(2), Value::Int(4)])
    );
    assert_eq!(eval_ok("{'a': 1, 'b': 2}.all(k, k != '')"), Value::Bool(true));
}

#[test]
fn test_all_absorbs_errors_when_false() {
    assert_eq!(eval_ok("[0, 1].all(x, 1 / x > 5)"), Value::Bool(false));
    assert_eq!(eval_ok("[0, 1].exists(x, 1 / x == 1)"), Value::Bool(true));
}

#[test]
fn test_nested_comprehension_scopes() {
    crate::test_utils::init_test_logging();
    assert_eq!(
        eval_ok("[1, 2].map(x, [10, 20].map(y, x + y))"),
        Value::list(vec![
            Value::list(vec![Value::Int(11), Value::Int(21)]),
            Value::list(vec![Value::Int(12), Value::Int(22)]),
        ])
    );
}

#[test]
fn test_scope_is_restored_after_absorbed_error() {
    let runner = Runner::new().variable("x", Type::Int);
    let activation = Activation::new().with("x", 7i64);
    assert_eq!(
        runner.run("([0].all(x, 1 / x > 0) || true) && x == 7", &activation),
        Ok(Value::Bool(true))
    );
}

// ============================================================================
// Functions
// ============================================================================

#[test]
fn test_builtins() {
    assert_eq!(eval_ok("'hello'.startsWith('he')"), Value::Bool(true));
    assert_eq!(eval_ok("'abc'.matches('^a.c$')"), Value::Bool(true));
    assert_eq!(eval_ok("int('42') + 1"), Value::Int(43));
    assert_eq!(eval_ok("string(1.5)"), Value::from("1.5"));
    assert_eq!(eval_ok("size([1, 2])"), Value::Int(2));
    assert_eq!(eval_ok("type(1) == int"), Value::Bool(true));
}

#[test]
fn test_timestamps() {
    assert_eq!(
        eval_ok("timestamp('2024-03-05T10:20:30Z').getFullYear()"),
        Value::Int(2024)
    );
    assert_eq!(
        eval_ok("duration('90s').getMinutes()"),
        Value::Int(1)
    );
    assert_eq!(
        eval_ok("timestamp('2024-01-01T00:00:00Z') + duration('1h') > timestamp('2024-01-01T00:30:00Z')"),
        Value::Bool(true)
    );
}

#[test]
fn test_custom_function_dispatch() {
    let decl = FunctionDecl::new("shout")
        .overload(OverloadDecl::new("shout_string", vec![Type::String], Type::String))
        .overload(OverloadDecl::new("shout_int", vec![Type::Int], Type::String));
    let runner = Runner::new().function(
        decl,
        vec![
            FunctionImpl::new(|args: &[Value]| match args {
                [Value::String(s)] => Ok(Value::from(format!("{}!", s.to_uppercase()))),
                _ => Err(EvalError::FunctionCall("bad args".to_string())),
            }),
            FunctionImpl::new(|args: &[Value]| match args {
                [Value::Int(i)] => Ok(Value::from(format!("{}!", i))),
                _ => Err(EvalError::FunctionCall("bad args".to_string())),
            }),
        ],
    );
    assert_eq!(runner.eval("shout('hi')"), Value::from("HI!"));
    assert_eq!(runner.eval("shout(3)"), Value::from("3!"));
}

#[test]
fn test_custom_function_error() {
    let decl = FunctionDecl::new("fail")
        .overload(OverloadDecl::new("fail_int", vec![Type::Int], Type::Int));
    let runner = Runner::new().function(
        decl,
        vec![FunctionImpl::new(|_: &[Value]| {
            Err(EvalError::FunctionCall("boom".to_string()))
        })],
    );
    assert_eq!(
        runner.run("fail(1)", &Activation::new()),
        Err(EvalError::FunctionCall("boom".to_string()))
    );
}

#[test]
fn test_unbound_overload() {
    let mut runner = Runner::new().function(
        FunctionDecl::new("ghost").overload(OverloadDecl::new("ghost_int", vec![Type::Int], Type::Int)),
        vec![],
    );
    runner.bindings.clear();
    assert!(matches!(
        runner.run("ghost(1)", &Activation::new()),
        Err(EvalError::Other(_))
    ));
}

// ============================================================================
// Optional values
// ============================================================================

#[test]
fn test_optionals() {
    let runner = Runner::new()
        .optional()
        .variable("m", Type::map(Type::String, Type::Int));
    let activation = Activation::new().with(
        "m",
        Value::map([(MapKey::from("a"), Value::Int(1))]),
    );
    assert_eq!(
        runner.run("m.?a.orValue(0)", &activation),
        Ok(Value::Int(1))
    );
    assert_eq!(
        runner.run("m.?b.orValue(0)", &activation),
        Ok(Value::Int(0))
    );
    assert_eq!(
        runner.run("optional.none().hasValue()", &activation),
        Ok(Value::Bool(false))
    );
    assert_eq!(
        runner.run("[1, ?optional.none(), ?optional.of(2)]", &activation),
        Ok(Value::list(vec![Value::Int(1), Value::Int(2)]))
    );
    assert_eq!(
        runner.run("{'a': 1, ?'b': optional.none()}", &activation),
        Ok(Value::map([(MapKey::from("a"), Value::Int(1))]))
    );
}

// ============================================================================
// Resource limits
// ============================================================================

#[test]
fn test_iteration_budget() {
    let runner = Runner::new().limits(ExecutionOptions {
        max_iterations: Some(3),
        ..ExecutionOptions::default()
    });
    assert_eq!(
        runner.run("[1, 2, 3].all(x, x > 0)", &Activation::new()),
        Ok(Value::Bool(true))
    );
    assert_eq!(
        runner.run("[1, 2, 3, 4].all(x, x > 0)", &Activation::new()),
        Err(EvalError::IterationBudgetExceeded(3))
    );
}

#[test]
fn test_depth_limit() {
    let runner = Runner::new().limits(ExecutionOptions {
        max_depth: 5,
        ..ExecutionOptions::default()
    });
    assert_eq!(
        runner.run("1 + (2 + (3 + (4 + (5 + 6))))", &Activation::new()),
        Err(EvalError::DepthExceeded { max_depth: 5 })
    );
    assert_eq!(runner.run("1 + 2", &Activation::new()), Ok(Value::Int(3)));
}
