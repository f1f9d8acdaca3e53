//! Host declarations of variables and functions.

use std::sync::Arc;

use celrt_core::EnvOption;
use celrt_core::analyzer::{FunctionDecl, OverloadDecl};
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::callbacks::{CallbackBridge, forwarding_impl};
use crate::error::Result;
use crate::types::resolve;

/// A typed variable, e.g. `{"name": "x", "type": "int"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariableDecl {
    pub name: String,
    /// Type descriptor; absent means `dyn`.
    #[serde(rename = "type", default)]
    pub ty: Json,
}

impl VariableDecl {
    pub fn new(name: impl Into<String>, ty: impl Into<Json>) -> Self {
        Self {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDef {
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type", default)]
    pub ty: Json,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub optional: bool,
}

/// A custom function implemented by a host callback.
///
/// The overload is registered as `{name}_{implID}`, so two environments can
/// declare the same function name with different implementations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionDef {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDef>,
    #[serde(default)]
    pub return_type: Json,
    #[serde(rename = "implID")]
    pub impl_id: String,
}

impl FunctionDef {
    pub fn new(name: impl Into<String>, impl_id: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
            return_type: Json::Null,
            impl_id: impl_id.into(),
        }
    }

    pub fn param(mut self, name: impl Into<String>, ty: impl Into<Json>) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            ty: ty.into(),
            optional: false,
        });
        self
    }

    pub fn optional_param(mut self, name: impl Into<String>, ty: impl Into<Json>) -> Self {
        self.params.push(ParamDef {
            name: name.into(),
            ty: ty.into(),
            optional: true,
        });
        self
    }

    pub fn returns(mut self, ty: impl Into<Json>) -> Self {
        self.return_type = ty.into();
        self
    }

    pub fn overload_id(&self) -> String {
        format!("{}_{}", self.name, self.impl_id)
    }

    /// Declaration and binding for this function. Parameters after the first
    /// optional one may be omitted by callers.
    fn to_options(&self, bridge: &Arc<CallbackBridge>) -> Result<[EnvOption; 2]> {
        let params = self
            .params
            .iter()
            .map(|param| resolve(&param.ty))
            .collect::<Result<Vec<_>>>()?;
        let result = resolve(&self.return_type)?;
        let required = self
            .params
            .iter()
            .position(|param| param.optional)
            .unwrap_or(params.len());

        let overload_id = self.overload_id();
        let overload = OverloadDecl::new(overload_id.clone(), params, result.clone()).with_required(required);
        let binding = forwarding_impl(Arc::clone(bridge), self.impl_id.clone(), result);
        Ok([
            EnvOption::Function(FunctionDecl::new(self.name.clone()).overload(overload)),
            EnvOption::binding(overload_id, binding),
        ])
    }
}

/// Engine options for a set of declarations, and the implementation ids the
/// functions need.
pub(crate) fn to_env_options(
    variables: &[VariableDecl],
    functions: &[FunctionDef],
    bridge: &Arc<CallbackBridge>,
) -> Result<(Vec<EnvOption>, Vec<String>)> {
    let mut options = Vec::with_capacity(variables.len() + 2 * functions.len());
    for variable in variables {
        options.push(EnvOption::variable(variable.name.clone(), resolve(&variable.ty)?));
    }
    let mut impl_ids = Vec::new();
    for function in functions {
        options.extend(function.to_options(bridge)?);
        if !impl_ids.contains(&function.impl_id) {
            impl_ids.push(function.impl_id.clone());
        }
    }
    Ok((options, impl_ids))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_function_def_json() {
        let def: FunctionDef = serde_json::from_value(json!({
            "name": "greet",
            "params": [{"name": "who", "type": "string"}, {"name": "loud", "type": "bool", "optional": true}],
            "returnType": "string",
            "implID": "greet_v1",
        }))
        .unwrap();
        assert_eq!(
            def,
            FunctionDef::new("greet", "greet_v1")
                .param("who", "string")
                .optional_param("loud", "bool")
                .returns("string")
        );
        assert_eq!(def.overload_id(), "greet_greet_v1");
    }

    #[test]
    fn test_variable_without_type_is_dyn() {
        let decl: VariableDecl = serde_json::from_value(json!({"name": "anything"})).unwrap();
        let bridge = Arc::new(CallbackBridge::new());
        let (options, _) = to_env_options(&[decl], &[], &bridge).unwrap();
        assert!(matches!(
            options.as_slice(),
            [EnvOption::Variable { ty: celrt_core::Type::Dyn, .. }]
        ));
    }

    #[test]
    fn test_optional_params_lower_required_count() {
        let bridge = Arc::new(CallbackBridge::new());
        let def = FunctionDef::new("f", "impl")
            .param("a", "int")
            .optional_param("b", "int")
            .returns("int");
        let (options, impl_ids) = to_env_options(&[], &[def.clone(), def], &bridge).unwrap();
        assert_eq!(impl_ids, vec!["impl".to_string()]);
        match &options[0] {
            EnvOption::Function(decl) => {
                assert_eq!(decl.overloads[0].id, "f_impl");
                assert_eq!(decl.overloads[0].required, 1);
            }
            other => panic!("unexpected option {:?}", other),
        }
    }
}
