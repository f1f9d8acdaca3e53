use std::sync::{Arc, Mutex};
use std::thread;

use celrt::render::render_issues_to_string;
use celrt::{Error, Issue, OptionConfig, Runtime, Severity, VariableDecl};
use pretty_assertions::assert_eq;
use serde_json::{Value as Json, json};

/// Warns about every reference to a variable named `legacy`.
fn legacy_lint(args: &[Json]) -> Result<Json, String> {
    if args[0] == "ident" && args[1]["name"] == "legacy" {
        return Ok(json!({"issues": [{
            "severity": "warning",
            "message": "'legacy' is deprecated",
            "location": args[1]["location"],
        }]}));
    }
    Ok(json!({"issues": []}))
}

fn validators(params: Json) -> OptionConfig {
    OptionConfig::new("ASTValidators").with_params(params)
}

fn env_with(runtime: &Runtime, params: Json) -> celrt::EnvId {
    runtime
        .create_env(
            &[VariableDecl::new("legacy", "int"), VariableDecl::new("fresh", "int")],
            &[],
            &[validators(params)],
        )
        .unwrap()
}

#[test]
fn test_warnings_are_reported_without_failing() {
    let runtime = Runtime::new();
    runtime.bridge().register_fn("lint", legacy_lint);
    let env = env_with(
        &runtime,
        json!({"validatorFunctionIds": ["lint"], "failOnWarning": false}),
    );

    let outcome = runtime.compile_detailed(env, "fresh + legacy");
    assert!(outcome.success(), "{:?}", outcome.error);
    assert!(outcome.program_id.is_some());
    assert_eq!(
        outcome.issues,
        vec![Issue::new(Severity::Warning, "'legacy' is deprecated").at(1, 9)]
    );

    let clean = runtime.compile_detailed(env, "fresh + 1");
    assert!(clean.success());
    assert_eq!(clean.issues, vec![]);
}

#[test]
fn test_fail_on_warning_escalates_and_keeps_the_warning() {
    let runtime = Runtime::new();
    runtime.bridge().register_fn("lint", legacy_lint);
    let env = env_with(&runtime, json!({"validatorFunctionIds": ["lint"]}));

    let outcome = runtime.compile_detailed(env, "legacy");
    assert!(!outcome.success());
    assert_eq!(outcome.program_id, None);
    assert_eq!(
        outcome.issues,
        vec![
            Issue::new(Severity::Error, "'legacy' is deprecated (line 1, col 1)").at(1, 1),
            Issue::new(Severity::Warning, "'legacy' is deprecated").at(1, 1),
        ]
    );
    assert!(matches!(outcome.error, Some(Error::Compilation { .. })));
    assert_eq!(runtime.program_count(), 0);
}

#[test]
fn test_excluded_warnings_are_dropped() {
    let runtime = Runtime::new();
    runtime.bridge().register_fn("lint", legacy_lint);
    let env = env_with(
        &runtime,
        json!({"validatorFunctionIds": ["lint"], "includeWarnings": false}),
    );

    let outcome = runtime.compile_detailed(env, "legacy * 2");
    assert!(outcome.success(), "{:?}", outcome.error);
    assert_eq!(outcome.issues, vec![]);
}

#[test]
fn test_validator_errors_fail_plain_compile() {
    let runtime = Runtime::new();
    runtime.bridge().register_fn("no_division", |args| {
        if args[0] == "call" && args[1]["function"] == "_/_" {
            return Ok(json!({"issues": [{"severity": "error", "message": "division is not allowed"}]}));
        }
        Ok(json!({}))
    });
    let env = env_with(&runtime, json!({"validatorFunctionIds": ["no_division"]}));

    let error = runtime.compile(env, "fresh / 2").unwrap_err();
    let messages: Vec<_> = error.issues().iter().map(|issue| issue.message.as_str()).collect();
    assert_eq!(messages, vec!["division is not allowed"]);
    assert!(runtime.compile(env, "fresh * 2").is_ok());
}

#[test]
fn test_failing_validator_is_a_compile_error() {
    let runtime = Runtime::new();
    runtime
        .bridge()
        .register_fn("broken", |_| Err("out of coffee".to_string()));
    let env = env_with(&runtime, json!({"validatorFunctionIds": ["broken"]}));

    let outcome = runtime.compile_detailed(env, "1");
    assert!(!outcome.success());
    assert_eq!(
        outcome.issues[0].message,
        "Validator function broken failed: out of coffee"
    );
}

#[test]
fn test_validators_see_every_node_with_context() {
    let runtime = Arc::new(Runtime::new());
    let seen = Arc::new(Mutex::new(Vec::new()));
    let weak = Arc::downgrade(&runtime);
    let record = Arc::clone(&seen);
    runtime.bridge().register_fn("spy", move |args| {
        let compilation_id = args[2]["compilationId"].as_str().unwrap_or_default().to_string();
        let live = weak
            .upgrade()
            .and_then(|runtime| runtime.compilation_issues(&compilation_id))
            .is_some();
        assert_eq!(args[2]["source"], "fresh > 1");
        record.lock().unwrap().push((args[0].clone(), compilation_id, live));
        Ok(json!({"issues": []}))
    });
    let env = env_with(&runtime, json!({"validatorFunctionIds": ["spy"]}));

    let outcome = runtime.compile_detailed(env, "fresh > 1");
    assert!(outcome.success());

    let seen = seen.lock().unwrap().clone();
    let kinds: Vec<_> = seen.iter().map(|(kind, _, _)| kind.clone()).collect();
    assert_eq!(kinds, vec![json!("call"), json!("ident"), json!("literal")]);
    assert!(seen.iter().all(|(_, id, live)| id.starts_with("comp_") && *live));
    assert_eq!(runtime.active_compilations(), 0);
    assert_eq!(runtime.compilation_issues(&seen[0].1), None);
}

#[test]
fn test_contexts_never_leak() {
    let runtime = Runtime::new();
    runtime.bridge().register_fn("lint", legacy_lint);
    let env = env_with(&runtime, json!({"validatorFunctionIds": ["lint"]}));

    runtime.compile_detailed(env, "legacy");
    runtime.compile_detailed(env, "fresh +");
    runtime.compile_detailed(env, "fresh");
    runtime.destroy_env(env).unwrap();
    let outcome = runtime.compile_detailed(env, "fresh");
    assert!(matches!(outcome.error, Some(Error::AlreadyDestroyed { .. })));
    assert_eq!(runtime.active_compilations(), 0);
}

#[test]
fn test_validator_ids_are_owned_by_the_environment() {
    let runtime = Runtime::new();
    runtime.bridge().register_fn("lint", legacy_lint);
    let env = env_with(&runtime, json!({"validatorFunctionIds": ["lint"]}));
    assert_eq!(runtime.ref_count(env, "lint"), Some(0));
    runtime.destroy_env(env).unwrap();
    assert!(!runtime.bridge().is_registered("lint"));
}

#[test]
fn test_rendered_issues_point_at_the_source() {
    let runtime = Runtime::new();
    let env = runtime.create_env(&[], &[], &[]).unwrap();
    let outcome = runtime.compile_detailed(env, "1 + missing");
    assert!(!outcome.success());
    let rendered = render_issues_to_string("1 + missing", &outcome.issues);
    assert!(rendered.contains("1 + missing"), "{}", rendered);
    assert!(rendered.contains("missing"), "{}", rendered);
}

#[test]
fn test_concurrent_compiles_collect_their_own_issues() {
    let runtime = Arc::new(Runtime::new());
    runtime.bridge().register_fn("lint", legacy_lint);
    let env = env_with(
        &runtime,
        json!({"validatorFunctionIds": ["lint"], "failOnWarning": false}),
    );

    let handles: Vec<_> = (0..16)
        .map(|i| {
            let runtime = Arc::clone(&runtime);
            thread::spawn(move || {
                let (text, expected) = if i % 2 == 0 {
                    // `legacy` starts right after `fresh + `, whatever the padding.
                    let padding = " ".repeat(i);
                    let column = (padding.len() + 9) as u32;
                    let warning = Issue::new(Severity::Warning, "'legacy' is deprecated").at(1, column);
                    (format!("{}fresh + legacy", padding), vec![warning])
                } else {
                    (format!("fresh + {}", i), vec![])
                };
                for _ in 0..20 {
                    let outcome = runtime.compile_detailed(env, &text);
                    assert!(outcome.success(), "{}: {:?}", text, outcome.error);
                    assert_eq!(outcome.issues, expected, "{}", text);
                    if let Some(program) = outcome.program_id {
                        runtime.destroy_program(program).unwrap();
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(runtime.active_compilations(), 0);
    let outcome = runtime.compile_detailed(env, "legacy");
    assert_eq!(
        outcome.issues,
        vec![Issue::new(Severity::Warning, "'legacy' is deprecated").at(1, 1)]
    );
}
