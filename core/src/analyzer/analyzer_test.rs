use std::sync::Arc;

use pretty_assertions::assert_eq;

use super::*;
use crate::parser::{ParseOptions, Source, parse_with_options};
use crate::types::Type;

fn declarations() -> Declarations {
    let mut decls = Declarations::default();
    decls.add_variable("x", Type::Int).unwrap();
    decls.add_variable("name", Type::String).unwrap();
    decls.add_variable("tags", Type::list(Type::String)).unwrap();
    decls
        .add_variable("attrs", Type::map(Type::String, Type::Int))
        .unwrap();
    decls.add_variable("payload", Type::Dyn).unwrap();
    decls.add_variable("request.user.id", Type::String).unwrap();
    decls
}

fn analyze_with(decls: &Declarations, source: &str) -> Result<CheckedExpr, String> {
    let options = ParseOptions {
        enable_optional_syntax: decls.features.optional_types,
        ..ParseOptions::default()
    };
    let parsed = parse_with_options(Arc::new(Source::new(source, "<input>")), &options)
        .map_err(|e| format!("Parse error: {}", e))?;
    analyze(decls, parsed).map_err(|issues| {
        issues
            .errors()
            .map(|d| d.message.clone())
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn type_of(source: &str) -> Type {
    match analyze_with(&declarations(), source) {
        Ok(checked) => checked.output_type().clone(),
        Err(e) => panic!("failed to check '{}': {}", source, e),
    }
}

fn error_of(source: &str) -> String {
    match analyze_with(&declarations(), source) {
        Ok(checked) => panic!(
            "expected '{}' to fail, got {}",
            source,
            checked.output_type()
        ),
        Err(e) => e,
    }
}

// ============================================================================
// Literals and operators
// ============================================================================

#[test]
fn test_literal_types() {
    assert_eq!(type_of("1"), Type::Int);
    assert_eq!(type_of("1u"), Type::Uint);
    assert_eq!(type_of("1.5"), Type::Double);
    assert_eq!(type_of("'a'"), Type::String);
    assert_eq!(type_of("b'a'"), Type::Bytes);
    assert_eq!(type_of("null"), Type::Null);
}

#[test]
fn test_arithmetic_operators() {
    for op in ["+", "-", "*", "/", "%"] {
        assert_eq!(type_of(&format!("x {} 2", op)), Type::Int, "operator {}", op);
    }
    assert_eq!(type_of("1.0 * 2.0"), Type::Double);
    assert_eq!(type_of("name + '!'"), Type::String);
}

#[test]
fn test_mixed_arithmetic_fails() {
    assert_eq!(
        error_of("x + name"),
        "found no matching overload for '_+_' applied to '(int, string)'"
    );
}

#[test]
fn test_comparisons() {
    assert_eq!(type_of("x < 10"), Type::Bool);
    assert_eq!(type_of("name == 'bob' && x > 1"), Type::Bool);
    assert_eq!(
        error_of("x < 1.5"),
        "found no matching overload for '_<_' applied to '(int, double)'"
    );
}

#[test]
fn test_cross_type_numeric_comparisons() {
    let mut decls = declarations();
    decls.features.cross_type_numeric_comparisons = true;
    let checked = analyze_with(&decls, "x < 1.5 && 2u == x").unwrap();
    assert_eq!(checked.output_type(), &Type::Bool);
}

#[test]
fn test_logical_operands_must_be_bool() {
    assert_eq!(
        error_of("x && true"),
        "found no matching overload for '_&&_' applied to '(int, bool)'"
    );
}

#[test]
fn test_conditional() {
    assert_eq!(type_of("x > 0 ? 'pos' : 'neg'"), Type::String);
    assert_eq!(type_of("x > 0 ? payload : 1"), Type::Dyn);
    assert_eq!(
        error_of("true ? 1 : 'a'"),
        "found no matching overload for '_?_:_' applied to '(bool, int, string)'"
    );
}

// ============================================================================
// Identifiers and selection
// ============================================================================

#[test]
fn test_undeclared_reference() {
    assert_eq!(error_of("y"), "undeclared reference to 'y' (in container '')");
}

#[test]
fn test_undeclared_reference_location() {
    let source = Arc::new(Source::new("x + y", "<input>"));
    let parsed = crate::parser::parse(source).unwrap();
    let issues = analyze(&declarations(), parsed).unwrap_err();
    let diagnostic = &issues.diagnostics()[0];
    assert_eq!(
        diagnostic.location,
        Some(crate::parser::Location::new(1, 5))
    );
}

#[test]
fn test_all_errors_are_reported() {
    let errors = error_of("y + z");
    assert_eq!(errors.lines().count(), 2, "{}", errors);
}

#[test]
fn test_qualified_variable() {
    let checked = analyze_with(&declarations(), "request.user.id").unwrap();
    assert_eq!(checked.output_type(), &Type::String);
    assert_eq!(
        checked.reference(checked.expr().id),
        Some(&Reference::Variable("request.user.id".to_string()))
    );
}

#[test]
fn test_map_field_selection() {
    assert_eq!(type_of("attrs.count"), Type::Int);
    assert_eq!(type_of("payload.anything.goes"), Type::Dyn);
    assert_eq!(type_of("has(attrs.count)"), Type::Bool);
    assert_eq!(
        error_of("x.field"),
        "type 'int' does not support field selection"
    );
}

#[test]
fn test_indexing() {
    assert_eq!(type_of("tags[0]"), Type::String);
    assert_eq!(type_of("attrs['a']"), Type::Int);
    assert_eq!(type_of("payload[0]"), Type::Dyn);
    assert_eq!(
        error_of("tags['a']"),
        "found no matching overload for '_[_]' applied to '(list(string), string)'"
    );
}

// ============================================================================
// Aggregates
// ============================================================================

#[test]
fn test_list_and_map_literals() {
    assert_eq!(type_of("[1, 2]"), Type::list(Type::Int));
    assert_eq!(type_of("[1, 'a']"), Type::list(Type::Dyn));
    assert_eq!(type_of("[]"), Type::list(Type::Dyn));
    assert_eq!(
        type_of("{'a': 1}"),
        Type::map(Type::String, Type::Int)
    );
    assert_eq!(
        error_of("{1.5: 1}"),
        "unsupported map key type: double"
    );
}

#[test]
fn test_struct_literals_are_undeclared() {
    assert_eq!(
        error_of("Msg{field: 1}"),
        "undeclared reference to 'Msg' (in container '')"
    );
}

// ============================================================================
// Functions and macros
// ============================================================================

#[test]
fn test_builtin_functions() {
    assert_eq!(type_of("size(tags)"), Type::Int);
    assert_eq!(type_of("tags.size()"), Type::Int);
    assert_eq!(type_of("name.startsWith('a')"), Type::Bool);
    assert_eq!(type_of("int('1') + x"), Type::Int);
    assert_eq!(type_of("type(x)"), Type::type_of(Type::Int));
    assert_eq!(type_of("type(x) == int"), Type::Bool);
    assert_eq!(type_of("'a' in tags"), Type::Bool);
    assert_eq!(
        error_of("name.startsWith(1)"),
        "found no matching overload for 'startsWith' applied to 'string.(int)'"
    );
}

#[test]
fn test_unknown_function() {
    assert_eq!(
        error_of("frobnicate(1)"),
        "undeclared reference to 'frobnicate' (in container '')"
    );
}

#[test]
fn test_comprehensions() {
    assert_eq!(type_of("tags.all(t, t.startsWith('a'))"), Type::Bool);
    assert_eq!(type_of("tags.exists_one(t, t == 'a')"), Type::Bool);
    assert_eq!(type_of("tags.map(t, size(t))"), Type::list(Type::Int));
    assert_eq!(type_of("tags.filter(t, t != '')"), Type::list(Type::String));
    assert_eq!(type_of("attrs.map(k, attrs[k] * 2)"), Type::list(Type::Int));
    assert_eq!(
        error_of("x.all(i, true)"),
        "expression of type 'int' cannot be the range of a comprehension (must be list, map, or dynamic)"
    );
}

#[test]
fn test_comprehension_variable_shadows_global() {
    assert_eq!(type_of("tags.map(x, x + '!')"), Type::list(Type::String));
}

#[test]
fn test_custom_functions() {
    let mut decls = declarations();
    decls
        .add_function(
            FunctionDecl::new("greet")
                .overload(OverloadDecl::new("greet_string", vec![Type::String], Type::String)),
        )
        .unwrap();
    let checked = analyze_with(&decls, "greet(name)").unwrap();
    assert_eq!(checked.output_type(), &Type::String);
    assert_eq!(
        checked.reference(checked.expr().id),
        Some(&Reference::Overloads(vec!["greet_string".to_string()]))
    );

    let err = analyze_with(&decls, "greet(1)").unwrap_err();
    assert_eq!(
        err,
        "found no matching overload for 'greet' applied to '(int)'"
    );
}

#[test]
fn test_namespaced_custom_function() {
    let mut decls = declarations();
    decls
        .add_function(FunctionDecl::new("math.twice").overload(OverloadDecl::new(
            "math_twice_int",
            vec![Type::Int],
            Type::Int,
        )))
        .unwrap();
    let checked = analyze_with(&decls, "math.twice(x)").unwrap();
    assert_eq!(checked.output_type(), &Type::Int);
}

// ============================================================================
// Optional types
// ============================================================================

#[test]
fn test_optional_functions_require_feature() {
    assert_eq!(
        error_of("optional.of(1)"),
        "undeclared reference to 'optional' (in container '')"
    );
}

#[test]
fn test_optional_types() {
    let mut decls = declarations();
    decls.features.optional_types = true;
    let check = |source: &str| analyze_with(&decls, source).map(|c| c.output_type().clone());

    assert_eq!(check("optional.of(1)"), Ok(Type::optional(Type::Int)));
    assert_eq!(check("optional.none().orValue(1)"), Ok(Type::Dyn));
    assert_eq!(check("attrs.?count"), Ok(Type::optional(Type::Int)));
    assert_eq!(check("attrs.?count.orValue(0)"), Ok(Type::Int));
    assert_eq!(check("tags[?0].hasValue()"), Ok(Type::Bool));
    assert_eq!(check("[?optional.of(1), 2]"), Ok(Type::list(Type::Int)));
    assert_eq!(
        check("[?1]"),
        Err("expected type 'optional_type' but found 'int'".to_string())
    );
}
