//! Pre-order traversal over parsed expression trees.
//!
//! Children are visited in source order: call target before arguments,
//! select operand, list elements, map keys before values, struct field values
//! and, for comprehensions, range, accumulator init, loop condition, loop step
//! and result.

use crate::parser::{Expr, ExprKind};

/// Visitor invoked once per node.
pub trait Visitor {
    fn visit(&mut self, expr: &Expr);
}

impl<F: FnMut(&Expr)> Visitor for F {
    fn visit(&mut self, expr: &Expr) {
        self(expr)
    }
}

/// Visit `expr` and all of its descendants, parents first.
pub fn walk<V: Visitor + ?Sized>(expr: &Expr, visitor: &mut V) {
    visitor.visit(expr);
    for child in children(expr) {
        walk(child, visitor);
    }
}

/// Direct children of a node, in traversal order.
pub fn children(expr: &Expr) -> Vec<&Expr> {
    match &expr.kind {
        ExprKind::Literal(_) | ExprKind::Ident(_) => Vec::new(),
        ExprKind::Select(select) => vec![&*select.operand],
        ExprKind::Call(call) => call.target.as_deref().into_iter().chain(&call.args).collect(),
        ExprKind::List(list) => list.elements.iter().collect(),
        ExprKind::Map(map) => map
            .entries
            .iter()
            .flat_map(|entry| [&entry.key, &entry.value])
            .collect(),
        ExprKind::Struct(s) => s.fields.iter().map(|field| &field.value).collect(),
        ExprKind::Comprehension(comp) => vec![
            &comp.iter_range,
            &comp.accu_init,
            &comp.loop_condition,
            &comp.loop_step,
            &comp.result,
        ],
    }
}
