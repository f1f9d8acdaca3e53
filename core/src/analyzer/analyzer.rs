use hashbrown::HashMap;
use tracing::debug;

use super::declarations::Declarations;
use super::error::{TypeError, TypeErrorKind, format_signature};
use super::typed_expr::{CheckedExpr, Reference};
use crate::api::Issues;
use crate::parser::{
    CallExpr, ComprehensionExpr, Expr, ExprId, ExprKind, ListExpr, Literal, MapExpr, ParsedExpr,
    SelectExpr, StructExpr, operators,
};
use crate::stdlib::signatures::{self, CallCheck};
use crate::types::{Type, is_assignable, join_elements, most_general};

/// Type-check a parsed expression against the declarations.
///
/// Every node is visited even after an error so that all problems are
/// reported at once; the expression only checks if no error was found.
#[tracing::instrument(skip_all, fields(nodes = parsed.node_count()))]
pub fn analyze(decls: &Declarations, parsed: ParsedExpr) -> Result<CheckedExpr, Issues> {
    let mut analyzer = Analyzer {
        decls,
        scopes: Vec::new(),
        types: HashMap::new(),
        references: HashMap::new(),
        errors: Vec::new(),
    };
    let output = analyzer.analyze(&parsed.expr);
    debug!(output_type = %output, errors = analyzer.errors.len(), "checked expression");

    if analyzer.errors.is_empty() {
        return Ok(CheckedExpr::new(
            parsed,
            analyzer.types,
            analyzer.references,
        ));
    }

    let mut issues = Issues::new(parsed.source.clone());
    for error in &analyzer.errors {
        issues.push(error.to_diagnostic(parsed.location_of(error.expr_id)));
    }
    Err(issues)
}

struct Analyzer<'d> {
    decls: &'d Declarations,
    /// Comprehension variables, innermost last.
    scopes: Vec<(String, Type)>,
    types: HashMap<ExprId, Type>,
    references: HashMap<ExprId, Reference>,
    errors: Vec<TypeError>,
}

impl Analyzer<'_> {
    fn analyze(&mut self, expr: &Expr) -> Type {
        let ty = match &expr.kind {
            ExprKind::Literal(lit) => literal_type(lit),
            ExprKind::Ident(name) => self.analyze_ident(expr.id, name),
            ExprKind::Select(select) => self.analyze_select(expr, select),
            ExprKind::Call(call) => self.analyze_call(expr.id, call),
            ExprKind::List(list) => self.analyze_list(list),
            ExprKind::Map(map) => self.analyze_map(map),
            ExprKind::Struct(st) => self.analyze_struct(expr.id, st),
            ExprKind::Comprehension(comp) => self.analyze_comprehension(comp),
        };
        self.types.insert(expr.id, ty.clone());
        ty
    }

    fn error(&mut self, id: ExprId, kind: TypeErrorKind) -> Type {
        self.errors.push(TypeError::new(kind, id));
        Type::Error
    }

    fn lookup_local(&self, name: &str) -> Option<&Type> {
        self.scopes
            .iter()
            .rev()
            .find(|(local, _)| local == name)
            .map(|(_, ty)| ty)
    }

    /// Dotted name of a select chain whose root is not a local variable.
    fn global_name(&self, expr: &Expr) -> Option<String> {
        let name = expr.qualified_name()?;
        let root = name.split('.').next().unwrap_or(&name);
        if self.lookup_local(root).is_some() {
            return None;
        }
        Some(name)
    }

    fn analyze_ident(&mut self, id: ExprId, name: &str) -> Type {
        if let Some(ty) = self.lookup_local(name) {
            return ty.clone();
        }
        match self.decls.variable(name) {
            Some(ty) => {
                let ty = ty.clone();
                self.references
                    .insert(id, Reference::Variable(name.to_string()));
                ty
            }
            None => match Type::from_name(name) {
                Some(ty) => {
                    self.references.insert(id, Reference::Type(ty.clone()));
                    Type::type_of(ty)
                }
                None => self.error(
                    id,
                    TypeErrorKind::UndeclaredReference {
                        name: name.to_string(),
                    },
                ),
            },
        }
    }

    fn analyze_select(&mut self, expr: &Expr, select: &SelectExpr) -> Type {
        // `a.b.c` may name a declared variable rather than field accesses.
        if !select.test_only {
            if let Some(name) = self.global_name(expr) {
                if let Some(ty) = self.decls.variable(&name) {
                    let ty = ty.clone();
                    self.references.insert(expr.id, Reference::Variable(name));
                    return ty;
                }
            }
        }

        let operand = self.analyze(&select.operand);
        let field_type = match &operand {
            Type::Map(_, value) => (**value).clone(),
            Type::Dyn => Type::Dyn,
            Type::Error => Type::Error,
            other => {
                let ty = other.clone();
                return self.error(expr.id, TypeErrorKind::FieldSelection { ty });
            }
        };
        if select.test_only {
            Type::Bool
        } else {
            field_type
        }
    }

    fn analyze_call(&mut self, id: ExprId, call: &CallExpr) -> Type {
        let name = call.function.as_str();
        match name {
            operators::LOGICAL_AND | operators::LOGICAL_OR => {
                return self.analyze_logical(id, name, &call.args);
            }
            operators::CONDITIONAL => return self.analyze_conditional(id, &call.args),
            operators::NOT_STRICTLY_FALSE => {
                for arg in &call.args {
                    self.analyze(arg);
                }
                return Type::Bool;
            }
            _ => {}
        }

        // `ns.fn(x)` is a global call when `ns.fn` names a function.
        if let Some(target) = &call.target {
            if let Some(namespace) = self.global_name(target) {
                let qualified = format!("{}.{}", namespace, name);
                let features = self.decls.features;
                if self.decls.function(&qualified).is_some()
                    || signatures::is_qualified_builtin(&qualified, features)
                {
                    return self.analyze_global_call(id, &qualified, &call.args);
                }
            }
        }

        match &call.target {
            Some(target) => {
                let target_ty = self.analyze(target);
                let args: Vec<Type> = call.args.iter().map(|a| self.analyze(a)).collect();
                self.resolve_builtin(id, name, Some(&target_ty), &args)
            }
            None => self.analyze_global_call(id, name, &call.args),
        }
    }

    fn analyze_global_call(&mut self, id: ExprId, name: &str, args: &[Expr]) -> Type {
        let args: Vec<Type> = args.iter().map(|a| self.analyze(a)).collect();

        let decls = self.decls;
        if let Some(decl) = decls.function(name) {
            let matching: Vec<_> = decl
                .overloads
                .iter()
                .filter(|o| o.accepts_arity(args.len()))
                .filter(|o| o.params.iter().zip(&args).all(|(p, a)| is_assignable(p, a)))
                .collect();
            if !matching.is_empty() {
                let result = matching
                    .iter()
                    .skip(1)
                    .fold(matching[0].result.clone(), |acc, o| {
                        most_general(&acc, &o.result).unwrap_or(Type::Dyn)
                    });
                let ids = matching.iter().map(|o| o.id.clone()).collect();
                self.references.insert(id, Reference::Overloads(ids));
                return result;
            }
            if matches!(
                signatures::check_call(name, None, &args, decls.features),
                CallCheck::Unknown
            ) {
                return self.no_matching_overload(id, name, None, &args);
            }
        }

        self.resolve_builtin(id, name, None, &args)
    }

    fn resolve_builtin(
        &mut self,
        id: ExprId,
        name: &str,
        target: Option<&Type>,
        args: &[Type],
    ) -> Type {
        match signatures::check_call(name, target, args, self.decls.features) {
            CallCheck::Resolved(ty) => {
                self.references
                    .insert(id, Reference::Function(name.to_string()));
                ty
            }
            CallCheck::NoMatch => self.no_matching_overload(id, name, target, args),
            CallCheck::Unknown if target == Some(&Type::Error) => Type::Error,
            CallCheck::Unknown => self.error(
                id,
                TypeErrorKind::UndeclaredReference {
                    name: name.to_string(),
                },
            ),
        }
    }

    fn no_matching_overload(
        &mut self,
        id: ExprId,
        name: &str,
        target: Option<&Type>,
        args: &[Type],
    ) -> Type {
        // Errors in the operands were already reported.
        if target.is_some_and(|t| *t == Type::Error) || args.contains(&Type::Error) {
            return Type::Error;
        }
        self.error(
            id,
            TypeErrorKind::NoMatchingOverload {
                function: name.to_string(),
                signature: format_signature(target, args),
            },
        )
    }

    fn analyze_logical(&mut self, id: ExprId, name: &str, args: &[Expr]) -> Type {
        let types: Vec<Type> = args.iter().map(|a| self.analyze(a)).collect();
        if types.iter().all(|t| is_assignable(&Type::Bool, t)) {
            Type::Bool
        } else {
            self.no_matching_overload(id, name, None, &types)
        }
    }

    fn analyze_conditional(&mut self, id: ExprId, args: &[Expr]) -> Type {
        let types: Vec<Type> = args.iter().map(|a| self.analyze(a)).collect();
        if let [cond, then, otherwise] = types.as_slice() {
            if is_assignable(&Type::Bool, cond) {
                if let Some(joined) = most_general(then, otherwise) {
                    return joined;
                }
            }
        }
        self.no_matching_overload(id, operators::CONDITIONAL, None, &types)
    }

    fn analyze_list(&mut self, list: &ListExpr) -> Type {
        let mut elements = Vec::with_capacity(list.elements.len());
        for (i, element) in list.elements.iter().enumerate() {
            let ty = self.analyze(element);
            let ty = if list.optional_indices.contains(&i) {
                self.unwrap_optional(element.id, ty)
            } else {
                ty
            };
            elements.push(ty);
        }
        Type::list(join_elements(&elements))
    }

    fn analyze_map(&mut self, map: &MapExpr) -> Type {
        let mut keys = Vec::with_capacity(map.entries.len());
        let mut values = Vec::with_capacity(map.entries.len());
        for entry in &map.entries {
            let key = self.analyze(&entry.key);
            if !key.is_valid_map_key() {
                self.error(entry.key.id, TypeErrorKind::UnsupportedMapKey { ty: key.clone() });
            }
            let value = self.analyze(&entry.value);
            let value = if entry.optional {
                self.unwrap_optional(entry.value.id, value)
            } else {
                value
            };
            keys.push(key);
            values.push(value);
        }
        Type::map(join_elements(&keys), join_elements(&values))
    }

    fn unwrap_optional(&mut self, id: ExprId, ty: Type) -> Type {
        match ty {
            Type::Optional(inner) => *inner,
            Type::Dyn | Type::Error => ty,
            other => self.error(id, TypeErrorKind::ExpectedOptional { ty: other }),
        }
    }

    fn analyze_struct(&mut self, id: ExprId, st: &StructExpr) -> Type {
        for field in &st.fields {
            self.analyze(&field.value);
        }
        self.error(
            id,
            TypeErrorKind::UndeclaredReference {
                name: st.type_name.clone(),
            },
        )
    }

    fn analyze_comprehension(&mut self, comp: &ComprehensionExpr) -> Type {
        let range = self.analyze(&comp.iter_range);
        let iter_type = match &range {
            Type::List(elem) => (**elem).clone(),
            Type::Map(key, _) => (**key).clone(),
            Type::Dyn => Type::Dyn,
            Type::Error => Type::Error,
            other => {
                let ty = other.clone();
                self.error(comp.iter_range.id, TypeErrorKind::InvalidRange { ty })
            }
        };

        let init = self.analyze(&comp.accu_init);
        self.scopes.push((comp.accu_var.clone(), init.clone()));
        self.scopes.push((comp.iter_var.clone(), iter_type));
        self.analyze(&comp.loop_condition);
        self.analyze(&comp.loop_step);
        self.scopes.pop();

        // `map` and `filter` start from `[]`; the element type comes from
        // the singleton list appended in the step.
        let accu_type = if is_empty_list(&comp.accu_init) {
            self.appended_list_type(&comp.loop_step, &comp.accu_var)
                .unwrap_or(init)
        } else {
            init
        };
        if let Some(scope) = self.scopes.last_mut() {
            scope.1 = accu_type;
        }
        let result = self.analyze(&comp.result);
        self.scopes.pop();
        result
    }

    fn appended_list_type(&self, step: &Expr, accu_var: &str) -> Option<Type> {
        let ExprKind::Call(call) = &step.kind else {
            return None;
        };
        if call.function == operators::ADD {
            if let [lhs, rhs] = call.args.as_slice() {
                if lhs.as_ident() == Some(accu_var) && matches!(rhs.kind, ExprKind::List(_)) {
                    return self.types.get(&rhs.id).cloned();
                }
            }
        }
        call.args
            .iter()
            .find_map(|arg| self.appended_list_type(arg, accu_var))
    }
}

fn is_empty_list(expr: &Expr) -> bool {
    matches!(&expr.kind, ExprKind::List(list) if list.elements.is_empty())
}

fn literal_type(lit: &Literal) -> Type {
    match lit {
        Literal::Null => Type::Null,
        Literal::Bool(_) => Type::Bool,
        Literal::Int(_) => Type::Int,
        Literal::Uint(_) => Type::Uint,
        Literal::Double(_) => Type::Double,
        Literal::String(_) => Type::String,
        Literal::Bytes(_) => Type::Bytes,
    }
}
