//! Core evaluation logic.

use indexmap::IndexMap;
use smallvec::SmallVec;
use tracing::trace;

use super::operators::{logical_and, logical_or, not_strictly_false};
use super::{Activation, Bindings, EvalError};
use crate::analyzer::{CheckedExpr, Reference};
use crate::api::ExecutionOptions;
use crate::parser::{
    CallExpr, ComprehensionExpr, Expr, ExprId, ExprKind, ListExpr, MapExpr, SelectExpr, operators,
};
use crate::stdlib::{self, math::overload};
use crate::values::{MapKey, Value, lookup_key};

type Args = SmallVec<[Value; 4]>;

/// Evaluator for checked expressions.
pub struct Evaluator<'a> {
    checked: &'a CheckedExpr,
    bindings: &'a Bindings,
    activation: &'a Activation,
    options: &'a ExecutionOptions,
    /// Comprehension variables, innermost last. The accumulator may hold an
    /// error that a later step absorbs.
    locals: Vec<(&'a str, Result<Value, EvalError>)>,
    depth: usize,
    iterations: usize,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        checked: &'a CheckedExpr,
        bindings: &'a Bindings,
        activation: &'a Activation,
        options: &'a ExecutionOptions,
    ) -> Self {
        Self {
            checked,
            bindings,
            activation,
            options,
            locals: Vec::new(),
            depth: 0,
            iterations: 0,
        }
    }

    pub fn run(mut self) -> Result<Value, EvalError> {
        let checked = self.checked;
        let result = self.eval(checked.expr());
        trace!(iterations = self.iterations, ok = result.is_ok(), "evaluated expression");
        result
    }

    fn eval(&mut self, expr: &'a Expr) -> Result<Value, EvalError> {
        if self.depth >= self.options.max_depth {
            return Err(EvalError::DepthExceeded {
                max_depth: self.options.max_depth,
            });
        }

        self.depth += 1;
        let result = self.eval_inner(expr);
        self.depth -= 1;

        result
    }

    fn eval_inner(&mut self, expr: &'a Expr) -> Result<Value, EvalError> {
        match &expr.kind {
            ExprKind::Literal(lit) => Ok(Value::from(lit)),
            ExprKind::Ident(name) => self.resolve(expr.id, name),
            ExprKind::Select(select) => self.eval_select(expr.id, select),
            ExprKind::Call(call) => self.eval_call(expr.id, call),
            ExprKind::List(list) => self.eval_list(list),
            ExprKind::Map(map) => self.eval_map(map),
            ExprKind::Struct(st) => Err(EvalError::Other(format!(
                "unknown type '{}'",
                st.type_name
            ))),
            ExprKind::Comprehension(comp) => self.eval_comprehension(comp),
        }
    }

    fn resolve(&self, id: ExprId, name: &str) -> Result<Value, EvalError> {
        if let Some((_, value)) = self.locals.iter().rev().find(|(local, _)| *local == name) {
            return value.clone();
        }
        let name = match self.checked.reference(id) {
            Some(Reference::Variable(qualified)) => qualified.as_str(),
            Some(Reference::Type(ty)) => return Ok(Value::Type(ty.clone())),
            _ => name,
        };
        self.activation
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::NoSuchAttribute(name.to_string()))
    }

    fn eval_select(&mut self, id: ExprId, select: &'a SelectExpr) -> Result<Value, EvalError> {
        let checked = self.checked;
        if let Some(Reference::Variable(name)) = checked.reference(id) {
            return self.resolve(id, name);
        }

        let operand = self.eval(&select.operand)?;
        let Value::Map(entries) = &operand else {
            return Err(EvalError::NoSuchAttribute(format!(
                "{} on {}",
                select.field,
                operand.type_name()
            )));
        };
        let key = MapKey::String(select.field.as_str().into());
        if select.test_only {
            return Ok(Value::Bool(lookup_key(entries, &key).is_some()));
        }
        lookup_key(entries, &key)
            .cloned()
            .ok_or_else(|| EvalError::NoSuchKey(select.field.clone()))
    }

    fn eval_call(&mut self, id: ExprId, call: &'a CallExpr) -> Result<Value, EvalError> {
        let args = &call.args;
        match (call.function.as_str(), args.as_slice()) {
            (operators::LOGICAL_AND, [lhs, rhs]) => {
                let left = self.eval(lhs);
                return logical_and(left, || self.eval(rhs));
            }
            (operators::LOGICAL_OR, [lhs, rhs]) => {
                let left = self.eval(lhs);
                return logical_or(left, || self.eval(rhs));
            }
            (operators::CONDITIONAL, [cond, then, otherwise]) => {
                return match self.eval(cond)? {
                    Value::Bool(true) => self.eval(then),
                    Value::Bool(false) => self.eval(otherwise),
                    other => Err(overload(operators::CONDITIONAL, &[&other])),
                };
            }
            (operators::NOT_STRICTLY_FALSE, [arg]) => {
                let value = self.eval(arg);
                return Ok(Value::Bool(not_strictly_false(value)));
            }
            _ => {}
        }

        let checked = self.checked;
        match checked.reference(id) {
            Some(Reference::Overloads(ids)) => {
                let values = self.eval_args(args)?;
                self.dispatch(&call.function, ids, &values)
            }
            // Qualified built-ins such as `optional.none()` have a namespace
            // in place of a receiver.
            Some(Reference::Function(name)) if *name != call.function => {
                let values = self.eval_args(args)?;
                stdlib::call(name, None, &values)
            }
            _ => {
                let target = match &call.target {
                    Some(target) => Some(self.eval(target)?),
                    None => None,
                };
                let values = self.eval_args(args)?;
                stdlib::call(&call.function, target.as_ref(), &values)
            }
        }
    }

    fn eval_args(&mut self, args: &'a [Expr]) -> Result<Args, EvalError> {
        args.iter().map(|arg| self.eval(arg)).collect()
    }

    /// Call the first overload whose parameter types accept the runtime
    /// argument values.
    fn dispatch(&self, function: &str, ids: &[String], args: &[Value]) -> Result<Value, EvalError> {
        for id in ids {
            let binding = self.bindings.get(id).ok_or_else(|| {
                EvalError::Other(format!("no implementation bound for overload '{}'", id))
            })?;
            let decl = &binding.decl;
            let accepts = decl.accepts_arity(args.len())
                && decl
                    .params
                    .iter()
                    .zip(args)
                    .all(|(ty, value)| value.matches_type(ty));
            if accepts {
                trace!(overload = %id, "dispatching custom function");
                return binding.function.call(args);
            }
        }
        let names: Vec<&str> = args.iter().map(Value::type_name).collect();
        Err(EvalError::no_such_overload(function, &names))
    }

    fn eval_list(&mut self, list: &'a ListExpr) -> Result<Value, EvalError> {
        let mut items = Vec::with_capacity(list.elements.len());
        for (i, element) in list.elements.iter().enumerate() {
            let value = self.eval(element)?;
            if !list.optional_indices.contains(&i) {
                items.push(value);
                continue;
            }
            match value {
                Value::Optional(Some(inner)) => items.push(*inner),
                Value::Optional(None) => {}
                other => return Err(overload("optional list element", &[&other])),
            }
        }
        Ok(Value::list(items))
    }

    fn eval_map(&mut self, map: &'a MapExpr) -> Result<Value, EvalError> {
        let mut entries = IndexMap::with_capacity(map.entries.len());
        for entry in &map.entries {
            let key_value = self.eval(&entry.key)?;
            let key = MapKey::from_value(&key_value).ok_or_else(|| {
                EvalError::Other(format!("unsupported key type: {}", key_value.type_name()))
            })?;
            let value = self.eval(&entry.value)?;
            let value = if entry.optional {
                match value {
                    Value::Optional(Some(inner)) => *inner,
                    Value::Optional(None) => continue,
                    other => return Err(overload("optional map entry", &[&other])),
                }
            } else {
                value
            };
            if lookup_key(&entries, &key).is_some() {
                return Err(EvalError::Other(format!("Failed with repeated key: {}", key)));
            }
            entries.insert(key, value);
        }
        Ok(Value::Map(entries.into()))
    }

    fn eval_comprehension(&mut self, comp: &'a ComprehensionExpr) -> Result<Value, EvalError> {
        let range = self.eval(&comp.iter_range)?;
        let items: Vec<Value> = match &range {
            Value::List(items) => items.iter().cloned().collect(),
            Value::Map(entries) => entries.keys().map(MapKey::to_value).collect(),
            other => return Err(overload("comprehension", &[other])),
        };
        let init = self.eval(&comp.accu_init)?;

        let scope = self.locals.len();
        self.locals.push((comp.accu_var.as_str(), Ok(init)));
        let result = self.fold(comp, items, scope);
        // Errors may be absorbed by an enclosing `&&` or `||`, so the scope is
        // unwound on every path.
        self.locals.truncate(scope);
        result
    }

    fn fold(
        &mut self,
        comp: &'a ComprehensionExpr,
        items: Vec<Value>,
        accu: usize,
    ) -> Result<Value, EvalError> {
        for item in items {
            self.tick()?;
            self.locals.push((comp.iter_var.as_str(), Ok(item)));
            match self.eval(&comp.loop_condition)? {
                Value::Bool(false) => {
                    self.locals.pop();
                    break;
                }
                Value::Bool(true) => {}
                other => return Err(overload("loop condition", &[&other])),
            }
            let next = self.eval(&comp.loop_step);
            self.locals.pop();
            self.locals[accu].1 = next;
        }
        self.eval(&comp.result)
    }

    fn tick(&mut self) -> Result<(), EvalError> {
        self.iterations += 1;
        match self.options.max_iterations {
            Some(max) if self.iterations > max => Err(EvalError::IterationBudgetExceeded(max)),
            _ => Ok(()),
        }
    }
}
