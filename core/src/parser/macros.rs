//! Macro expansion performed while building the tree.
//!
//! `has(a.b)` becomes a presence-test select; `all`, `exists`, `exists_one`,
//! `map` and `filter` become comprehensions over a hidden accumulator.

use super::error::{ParseError, ParseErrorKind};
use super::parsed_expr::{
    ACCUMULATOR_VAR, ComprehensionExpr, Expr, ExprKind, ListExpr, Literal, SelectExpr, operators,
};
use super::parser::AstBuilder;
use super::syntax::Span;

impl AstBuilder<'_> {
    pub(super) fn build_global_call(
        &self,
        offset: usize,
        name: String,
        mut args: Vec<Expr>,
    ) -> Result<Expr, ParseError> {
        if name == "has" && args.len() == 1 {
            let arg = args.remove(0);
            return match arg.kind {
                ExprKind::Select(select) if !select.test_only => Ok(self.new_expr(
                    offset,
                    ExprKind::Select(SelectExpr {
                        test_only: true,
                        ..select
                    }),
                )),
                _ => Err(invalid_macro("invalid argument to has() macro", offset)),
            };
        }
        Ok(self.new_call(offset, &name, None, args))
    }

    pub(super) fn build_member_call(
        &self,
        offset: usize,
        target: Expr,
        name: String,
        args: Vec<Expr>,
    ) -> Result<Expr, ParseError> {
        let kind = match (name.as_str(), args.len()) {
            ("all", 2) => MacroKind::All,
            ("exists", 2) => MacroKind::Exists,
            ("exists_one", 2) => MacroKind::ExistsOne,
            ("map", 2) => MacroKind::Map,
            ("map", 3) => MacroKind::MapFilter,
            ("filter", 2) => MacroKind::Filter,
            _ => return Ok(self.new_call(offset, &name, Some(target), args)),
        };
        self.expand_comprehension(offset, kind, target, args)
    }

    fn expand_comprehension(
        &self,
        offset: usize,
        kind: MacroKind,
        range: Expr,
        args: Vec<Expr>,
    ) -> Result<Expr, ParseError> {
        let mut args = args.into_iter();
        let iter_var = match args.next().map(|arg| arg.kind) {
            Some(ExprKind::Ident(name)) => name,
            _ => return Err(invalid_macro("argument must be a simple name", offset)),
        };
        if iter_var == ACCUMULATOR_VAR {
            return Err(invalid_macro(
                "iteration variable overwrites accumulator variable",
                offset,
            ));
        }
        let first = args
            .next()
            .ok_or_else(|| invalid_macro("missing macro argument", offset))?;
        let second = args.next();

        let accu = || self.new_expr(offset, ExprKind::Ident(ACCUMULATOR_VAR.to_string()));
        let literal = |lit: Literal| self.new_expr(offset, ExprKind::Literal(lit));
        let call = |function: &str, args: Vec<Expr>| self.new_call(offset, function, None, args);
        let singleton = |elem: Expr| {
            self.new_expr(
                offset,
                ExprKind::List(ListExpr {
                    elements: vec![elem],
                    optional_indices: Vec::new(),
                }),
            )
        };
        let empty_list = || {
            self.new_expr(
                offset,
                ExprKind::List(ListExpr {
                    elements: Vec::new(),
                    optional_indices: Vec::new(),
                }),
            )
        };

        let (accu_init, loop_condition, loop_step, result) = match kind {
            MacroKind::All => (
                literal(Literal::Bool(true)),
                call(operators::NOT_STRICTLY_FALSE, vec![accu()]),
                call(operators::LOGICAL_AND, vec![accu(), first]),
                accu(),
            ),
            MacroKind::Exists => (
                literal(Literal::Bool(false)),
                call(
                    operators::NOT_STRICTLY_FALSE,
                    vec![call(operators::LOGICAL_NOT, vec![accu()])],
                ),
                call(operators::LOGICAL_OR, vec![accu(), first]),
                accu(),
            ),
            MacroKind::ExistsOne => (
                literal(Literal::Int(0)),
                literal(Literal::Bool(true)),
                call(
                    operators::CONDITIONAL,
                    vec![
                        first,
                        call(operators::ADD, vec![accu(), literal(Literal::Int(1))]),
                        accu(),
                    ],
                ),
                call(operators::EQUALS, vec![accu(), literal(Literal::Int(1))]),
            ),
            MacroKind::Map => (
                empty_list(),
                literal(Literal::Bool(true)),
                call(operators::ADD, vec![accu(), singleton(first)]),
                accu(),
            ),
            MacroKind::MapFilter => {
                let transform =
                    second.ok_or_else(|| invalid_macro("missing macro argument", offset))?;
                (
                    empty_list(),
                    literal(Literal::Bool(true)),
                    call(
                        operators::CONDITIONAL,
                        vec![
                            first,
                            call(operators::ADD, vec![accu(), singleton(transform)]),
                            accu(),
                        ],
                    ),
                    accu(),
                )
            }
            MacroKind::Filter => {
                let element = self.new_expr(offset, ExprKind::Ident(iter_var.clone()));
                (
                    empty_list(),
                    literal(Literal::Bool(true)),
                    call(
                        operators::CONDITIONAL,
                        vec![
                            first,
                            call(operators::ADD, vec![accu(), singleton(element)]),
                            accu(),
                        ],
                    ),
                    accu(),
                )
            }
        };

        Ok(self.new_expr(
            offset,
            ExprKind::Comprehension(Box::new(ComprehensionExpr {
                iter_var,
                iter_range: range,
                accu_var: ACCUMULATOR_VAR.to_string(),
                accu_init,
                loop_condition,
                loop_step,
                result,
            })),
        ))
    }
}

#[derive(Debug, Clone, Copy)]
enum MacroKind {
    All,
    Exists,
    ExistsOne,
    Map,
    MapFilter,
    Filter,
}

fn invalid_macro(message: &str, offset: usize) -> ParseError {
    ParseError::new(
        ParseErrorKind::InvalidMacro {
            message: message.to_string(),
        },
        Span::new(offset, offset),
    )
}
