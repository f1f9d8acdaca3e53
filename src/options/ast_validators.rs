//! AST validation through host callbacks.
//!
//! Every node of a checked expression is shown to each configured callback as
//! `(nodeType, nodeData, context)`. Callbacks answer with
//! `{"issues": [{"severity", "message", "location"?}]}`.

use std::sync::Arc;

use celrt_core::analyzer::CheckedExpr;
use celrt_core::api::{AstValidator, Diagnostic, Severity, ValidationContext};
use celrt_core::parser::{Expr, ExprId, ExprKind, Location};
use celrt_core::values::Value;
use celrt_core::visitor::walk;
use celrt_core::EnvOption;
use serde::Deserialize;
use serde_json::{Map, Value as Json, json};

use super::{OptionBuilder, SetupContext, parse_params};
use crate::callbacks::CallbackBridge;
use crate::compilation::IssueLocation;
use crate::values::to_json;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AstValidatorsParams {
    pub validator_function_ids: Vec<String>,
    /// Escalate retained warnings and infos to compilation errors.
    #[serde(default = "default_true")]
    pub fail_on_warning: bool,
    /// When false, warnings are dropped entirely.
    #[serde(default = "default_true")]
    pub include_warnings: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Default)]
pub struct AstValidatorsBuilder {
    params: Option<AstValidatorsParams>,
    bridge: Option<Arc<CallbackBridge>>,
}

impl OptionBuilder for AstValidatorsBuilder {
    fn name(&self) -> &'static str {
        "ASTValidators"
    }

    fn description(&self) -> &'static str {
        "Validate every expression node with host callbacks"
    }

    fn configure(&mut self, params: &Json) -> Result<(), String> {
        self.params = Some(parse_params(params)?);
        Ok(())
    }

    fn setup(&mut self, context: &mut SetupContext<'_>) -> Result<(), String> {
        let params = self.params.as_ref().ok_or("not configured")?;
        for id in &params.validator_function_ids {
            context.claim(id.as_str());
        }
        self.bridge = Some(Arc::clone(context.bridge()));
        Ok(())
    }

    fn build(&self) -> Result<Vec<EnvOption>, String> {
        let params = self.params.clone().ok_or("not configured")?;
        let bridge = self.bridge.clone().ok_or("setup has not run")?;
        Ok(vec![EnvOption::Validator(Arc::new(HostValidator {
            params,
            bridge,
        }))])
    }
}

struct HostValidator {
    params: AstValidatorsParams,
    bridge: Arc<CallbackBridge>,
}

/// Issue as returned by a validator callback.
#[derive(Debug, Default, Deserialize)]
struct ReportedIssue {
    #[serde(default)]
    severity: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    location: Option<IssueLocation>,
}

#[derive(Debug, Default, Deserialize)]
struct CallbackResult {
    #[serde(default)]
    issues: Vec<ReportedIssue>,
}

impl HostValidator {
    fn visit(&self, expr: &Expr, checked: &CheckedExpr, context: &Json, found: &mut Vec<(ExprId, ReportedIssue)>) {
        let node_type = Json::from(expr.kind_name());
        let node_data = node_data(expr, checked);
        let args = [node_type, node_data, context.clone()];
        for id in &self.params.validator_function_ids {
            match self.bridge.call(id, &args) {
                Ok(result) => match serde_json::from_value::<CallbackResult>(result) {
                    Ok(result) => found.extend(result.issues.into_iter().map(|issue| (expr.id, issue))),
                    Err(e) => tracing::warn!(validator = %id, error = %e, "ignoring malformed validator result"),
                },
                Err(e) => {
                    let message = match e {
                        crate::callbacks::CallbackError::Failed { message, .. } => message,
                        other => other.to_string(),
                    };
                    found.push((
                        expr.id,
                        ReportedIssue {
                            severity: "error".to_string(),
                            message: format!("Validator function {} failed: {}", id, message),
                            location: None,
                        },
                    ));
                }
            }
        }
    }
}

impl AstValidator for HostValidator {
    fn name(&self) -> &str {
        "host_ast_validator"
    }

    fn validate(&self, checked: &CheckedExpr, context: &mut ValidationContext<'_>) {
        if self.params.validator_function_ids.is_empty() {
            return;
        }
        let host_context = json!({
            "source": context.source().text(),
            "compilationId": context.compilation_id(),
            "contextData": {},
        });

        let mut found = Vec::new();
        walk(checked.expr(), &mut |expr: &Expr| {
            self.visit(expr, checked, &host_context, &mut found)
        });
        tracing::debug!(
            compilation_id = ?context.compilation_id(),
            issues = found.len(),
            "host validators finished"
        );

        for (expr_id, issue) in found {
            let severity = severity_of(&issue.severity);
            if severity == Severity::Warning && !self.params.include_warnings {
                continue;
            }
            if severity != Severity::Error {
                let location = issue.location.map(|l| Location::new(l.line, l.column));
                context.report(
                    Diagnostic::error(issue.message.clone())
                        .with_severity(severity)
                        .at(location)
                        .on_expr(expr_id),
                );
            }
            if severity == Severity::Error || self.params.fail_on_warning {
                let message = match issue.location {
                    Some(l) => format!("{} (line {}, col {})", issue.message, l.line, l.column),
                    None => issue.message,
                };
                context.error(expr_id, message);
            }
        }
    }
}

/// Unrecognized severities count as informational.
fn severity_of(name: &str) -> Severity {
    match name.to_ascii_lowercase().as_str() {
        "error" => Severity::Error,
        "warning" => Severity::Warning,
        _ => Severity::Info,
    }
}

fn node_data(expr: &Expr, checked: &CheckedExpr) -> Json {
    let mut data = Map::new();
    data.insert("id".into(), json!(expr.id));
    if let Some(location) = checked.location_of(expr.id) {
        data.insert(
            "location".into(),
            json!({"line": location.line, "column": location.column}),
        );
    }
    match &expr.kind {
        ExprKind::Call(call) => {
            data.insert("function".into(), json!(call.function));
            data.insert("argCount".into(), json!(call.args.len()));
            if call.target.is_some() {
                data.insert("hasTarget".into(), json!(true));
            }
        }
        ExprKind::Select(select) => {
            data.insert("field".into(), json!(select.field));
            data.insert("testOnly".into(), json!(select.test_only));
        }
        ExprKind::Ident(name) => {
            data.insert("name".into(), json!(name));
        }
        ExprKind::Literal(literal) => {
            let value = Value::from(literal);
            data.insert("type".into(), json!(value.type_of().to_string()));
            data.insert("value".into(), to_json(&value));
        }
        ExprKind::List(list) => {
            data.insert("elementCount".into(), json!(list.elements.len()));
        }
        ExprKind::Map(map) => {
            data.insert("entryCount".into(), json!(map.entries.len()));
        }
        ExprKind::Struct(s) => {
            data.insert("typeName".into(), json!(s.type_name));
            data.insert("fieldCount".into(), json!(s.fields.len()));
        }
        ExprKind::Comprehension(comp) => {
            data.insert("iterVar".into(), json!(comp.iter_var));
            data.insert("accuVar".into(), json!(comp.accu_var));
        }
    }
    Json::Object(data)
}
