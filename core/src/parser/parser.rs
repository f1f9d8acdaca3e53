use std::cell::{Cell, RefCell};
use std::sync::Arc;

use ecow::EcoString;
use hashbrown::HashMap;
use lazy_static::lazy_static;
use pest::Parser;
use pest::iterators::Pair;
use pest::pratt_parser::{Assoc, Op, PrattParser};
use pest_derive::Parser;

use super::error::{ParseError, ParseErrorKind, convert_pest_error};
use super::parsed_expr::{
    CallExpr, Expr, ExprId, ExprKind, ListExpr, Literal, MapEntry, MapExpr, ParsedExpr,
    SelectExpr, StructExpr, StructField, operators,
};
use super::syntax::{Source, Span};
use crate::api::Issues;
use crate::syntax::{LiteralKind, unescape};

/// Default maximum nesting depth
pub const DEFAULT_MAX_DEPTH: usize = 250;

/// Default maximum expression size in code points
pub const DEFAULT_MAX_SIZE: usize = 100_000;

#[derive(Parser)]
#[grammar = "parser/cel.pest"]
pub struct CelParser;

lazy_static! {
    static ref PRATT_PARSER: PrattParser<Rule> = PrattParser::new()
        .op(Op::infix(Rule::ternary_op, Assoc::Right))
        .op(Op::infix(Rule::or_op, Assoc::Left))
        .op(Op::infix(Rule::and_op, Assoc::Left))
        .op(Op::infix(Rule::eq_op, Assoc::Left)
            | Op::infix(Rule::ne_op, Assoc::Left)
            | Op::infix(Rule::lt_op, Assoc::Left)
            | Op::infix(Rule::le_op, Assoc::Left)
            | Op::infix(Rule::gt_op, Assoc::Left)
            | Op::infix(Rule::ge_op, Assoc::Left)
            | Op::infix(Rule::in_op, Assoc::Left))
        .op(Op::infix(Rule::add_op, Assoc::Left) | Op::infix(Rule::sub_op, Assoc::Left))
        .op(Op::infix(Rule::mul_op, Assoc::Left)
            | Op::infix(Rule::div_op, Assoc::Left)
            | Op::infix(Rule::rem_op, Assoc::Left))
        .op(Op::prefix(Rule::not_op) | Op::prefix(Rule::neg_op))
        .op(Op::postfix(Rule::member_op)
            | Op::postfix(Rule::opt_select_op)
            | Op::postfix(Rule::index_op)
            | Op::postfix(Rule::opt_index_op));
}

/// Parser settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseOptions {
    pub max_depth: usize,
    pub max_size: usize,
    /// Accept `.?field`, `[?index]`, `[?elem]` and `{?key: value}`.
    pub enable_optional_syntax: bool,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_size: DEFAULT_MAX_SIZE,
            enable_optional_syntax: false,
        }
    }
}

/// Parse an expression with default options.
pub fn parse(source: Arc<Source>) -> Result<ParsedExpr, Issues> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parse an expression, expanding macros.
#[tracing::instrument(level = "debug", skip_all, fields(len = source.text().len()))]
pub fn parse_with_options(
    source: Arc<Source>,
    options: &ParseOptions,
) -> Result<ParsedExpr, Issues> {
    let fail = |err: ParseError| {
        let mut issues = Issues::new(source.clone());
        issues.push(err.to_diagnostic(&source));
        issues
    };

    let size = source.char_len();
    if size > options.max_size {
        return Err(fail(ParseError::new(
            ParseErrorKind::ExpressionTooLarge {
                size,
                max_size: options.max_size,
            },
            Span::new(0, 0),
        )));
    }
    check_nesting(source.text(), options.max_depth).map_err(fail)?;

    let mut pairs = CelParser::parse(Rule::main, source.text())
        .map_err(|e| fail(convert_pest_error(e)))?;
    let main = pairs
        .next()
        .and_then(|main| main.into_inner().next())
        .ok_or_else(|| {
            fail(ParseError::new(
                ParseErrorKind::Other {
                    message: "empty expression".to_string(),
                },
                Span::new(0, 0),
            ))
        })?;

    let builder = AstBuilder::new(options);
    let expr = builder.build(main).map_err(fail)?;
    tracing::debug!(nodes = builder.positions.borrow().len(), "Parsed expression");
    Ok(ParsedExpr::new(expr, source, builder.positions.into_inner()))
}

/// Reject inputs whose bracket or unary-operator nesting would exceed `max_depth`
/// before handing them to the recursive-descent parser.
fn check_nesting(text: &str, max_depth: usize) -> Result<(), ParseError> {
    let mut depth: usize = 0;
    let mut unary_run: usize = 0;
    let mut conditionals: usize = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((pos, ch)) = chars.next() {
        match ch {
            '"' | '\'' => {
                // Skip the literal, honoring escapes and triple quotes.
                let triple = text[pos..].starts_with(&format!("{0}{0}{0}", ch));
                if triple {
                    chars.next();
                    chars.next();
                }
                let mut quotes = 0;
                while let Some((_, c)) = chars.next() {
                    if c == '\\' {
                        chars.next();
                        quotes = 0;
                    } else if c == ch {
                        quotes += 1;
                        if !triple || quotes == 3 {
                            break;
                        }
                    } else {
                        quotes = 0;
                    }
                }
                unary_run = 0;
                continue;
            }
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            '!' | '-' => {
                if chars.peek().map(|(_, c)| *c) != Some('=') {
                    unary_run += 1;
                }
            }
            '?' => conditionals += 1,
            c if c.is_whitespace() => continue,
            _ => {}
        }
        if !matches!(ch, '!' | '-') {
            unary_run = 0;
        }

        let effective = depth + unary_run + conditionals;
        if effective > max_depth {
            return Err(ParseError::new(
                ParseErrorKind::MaxDepthExceeded {
                    depth: effective,
                    max_depth,
                },
                Span::new(pos, pos + ch.len_utf8()),
            ));
        }
    }
    Ok(())
}

/// Builds [`Expr`] trees from pest pairs, assigning ids and recording positions.
///
/// State lives in cells so the Pratt parser closures can share `&self`.
pub(super) struct AstBuilder<'o> {
    pub(super) options: &'o ParseOptions,
    next_id: Cell<ExprId>,
    pub(super) positions: RefCell<HashMap<ExprId, usize>>,
}

impl<'o> AstBuilder<'o> {
    pub(super) fn new(options: &'o ParseOptions) -> Self {
        Self {
            options,
            next_id: Cell::new(1),
            positions: RefCell::new(HashMap::new()),
        }
    }

    pub(super) fn next_id(&self, offset: usize) -> ExprId {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.positions.borrow_mut().insert(id, offset);
        id
    }

    pub(super) fn new_expr(&self, offset: usize, kind: ExprKind) -> Expr {
        Expr::new(self.next_id(offset), kind)
    }

    pub(super) fn new_call(
        &self,
        offset: usize,
        function: &str,
        target: Option<Expr>,
        args: Vec<Expr>,
    ) -> Expr {
        self.new_expr(
            offset,
            ExprKind::Call(CallExpr {
                target: target.map(Box::new),
                function: function.to_string(),
                args,
            }),
        )
    }

    fn require_optional_syntax(&self, syntax: &str, pair: &Pair<Rule>) -> Result<(), ParseError> {
        if self.options.enable_optional_syntax {
            Ok(())
        } else {
            Err(ParseError::new(
                ParseErrorKind::UnsupportedSyntax {
                    syntax: syntax.to_string(),
                },
                pair.as_span().into(),
            ))
        }
    }

    pub(super) fn build(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        debug_assert_eq!(pair.as_rule(), Rule::expr);
        PRATT_PARSER
            .map_primary(|primary| self.build_primary(primary))
            .map_prefix(|op, rhs| self.build_prefix(op, rhs?))
            .map_postfix(|lhs, op| self.build_postfix(lhs?, op))
            .map_infix(|lhs, op, rhs| self.build_infix(lhs?, op, rhs?))
            .parse(pair.into_inner())
    }

    fn build_infix(&self, lhs: Expr, op: Pair<Rule>, rhs: Expr) -> Result<Expr, ParseError> {
        let offset = op.as_span().start();
        let function = match op.as_rule() {
            Rule::ternary_op => {
                let middle = op
                    .into_inner()
                    .next()
                    .ok_or_else(|| unexpected("conditional branch", offset))?;
                let middle = self.build(middle)?;
                return Ok(self.new_call(offset, operators::CONDITIONAL, None, vec![lhs, middle, rhs]));
            }
            Rule::or_op => operators::LOGICAL_OR,
            Rule::and_op => operators::LOGICAL_AND,
            Rule::eq_op => operators::EQUALS,
            Rule::ne_op => operators::NOT_EQUALS,
            Rule::lt_op => operators::LESS,
            Rule::le_op => operators::LESS_EQUALS,
            Rule::gt_op => operators::GREATER,
            Rule::ge_op => operators::GREATER_EQUALS,
            Rule::in_op => operators::IN,
            Rule::add_op => operators::ADD,
            Rule::sub_op => operators::SUBTRACT,
            Rule::mul_op => operators::MULTIPLY,
            Rule::div_op => operators::DIVIDE,
            Rule::rem_op => operators::MODULO,
            other => return Err(unexpected(&format!("{:?}", other), offset)),
        };
        Ok(self.new_call(offset, function, None, vec![lhs, rhs]))
    }

    fn build_prefix(&self, op: Pair<Rule>, rhs: Expr) -> Result<Expr, ParseError> {
        let offset = op.as_span().start();
        match op.as_rule() {
            Rule::not_op => Ok(self.new_call(offset, operators::LOGICAL_NOT, None, vec![rhs])),
            Rule::neg_op => match rhs.kind {
                // Fold negative numeric literals.
                ExprKind::Literal(Literal::Int(i)) => {
                    Ok(self.new_expr(offset, ExprKind::Literal(Literal::Int(-i))))
                }
                ExprKind::Literal(Literal::Double(d)) => {
                    Ok(self.new_expr(offset, ExprKind::Literal(Literal::Double(-d))))
                }
                _ => Ok(self.new_call(offset, operators::NEGATE, None, vec![rhs])),
            },
            other => Err(unexpected(&format!("{:?}", other), offset)),
        }
    }

    fn build_postfix(&self, lhs: Expr, op: Pair<Rule>) -> Result<Expr, ParseError> {
        let offset = op.as_span().start();
        match op.as_rule() {
            Rule::member_op => {
                let mut inner = op.into_inner();
                let field = inner
                    .next()
                    .ok_or_else(|| unexpected("field name", offset))?
                    .as_str()
                    .to_string();
                match inner.next() {
                    Some(args) => {
                        let args = self.build_args(args)?;
                        self.build_member_call(offset, lhs, field, args)
                    }
                    None => Ok(self.new_expr(
                        offset,
                        ExprKind::Select(SelectExpr {
                            operand: Box::new(lhs),
                            field,
                            test_only: false,
                        }),
                    )),
                }
            }
            Rule::opt_select_op => {
                self.require_optional_syntax(".?", &op)?;
                let field = op
                    .into_inner()
                    .next()
                    .ok_or_else(|| unexpected("field name", offset))?;
                let field_offset = field.as_span().start();
                let field = self.new_expr(
                    field_offset,
                    ExprKind::Literal(Literal::String(EcoString::from(field.as_str()))),
                );
                Ok(self.new_call(offset, operators::OPT_SELECT, None, vec![lhs, field]))
            }
            Rule::index_op | Rule::opt_index_op => {
                let optional = op.as_rule() == Rule::opt_index_op;
                if optional {
                    self.require_optional_syntax("[?", &op)?;
                }
                let index = op
                    .into_inner()
                    .next()
                    .ok_or_else(|| unexpected("index", offset))?;
                let index = self.build(index)?;
                let function = if optional {
                    operators::OPT_INDEX
                } else {
                    operators::INDEX
                };
                Ok(self.new_call(offset, function, None, vec![lhs, index]))
            }
            other => Err(unexpected(&format!("{:?}", other), offset)),
        }
    }

    fn build_args(&self, pair: Pair<Rule>) -> Result<Vec<Expr>, ParseError> {
        pair.into_inner().map(|arg| self.build(arg)).collect()
    }

    fn build_primary(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        let offset = pair.as_span().start();
        match pair.as_rule() {
            Rule::expr => self.build(pair),
            Rule::int_lit => {
                let text = pair.as_str();
                let value = match text.strip_prefix("0x") {
                    Some(hex) => i64::from_str_radix(hex, 16),
                    None => text.parse::<i64>(),
                };
                let value = value.map_err(|_| invalid_number(&pair))?;
                Ok(self.new_expr(offset, ExprKind::Literal(Literal::Int(value))))
            }
            Rule::uint_lit => {
                let text = &pair.as_str()[..pair.as_str().len() - 1];
                let value = match text.strip_prefix("0x") {
                    Some(hex) => u64::from_str_radix(hex, 16),
                    None => text.parse::<u64>(),
                };
                let value = value.map_err(|_| invalid_number(&pair))?;
                Ok(self.new_expr(offset, ExprKind::Literal(Literal::Uint(value))))
            }
            Rule::double_lit => {
                let value = pair
                    .as_str()
                    .parse::<f64>()
                    .map_err(|_| invalid_number(&pair))?;
                Ok(self.new_expr(offset, ExprKind::Literal(Literal::Double(value))))
            }
            Rule::string_lit | Rule::bytes_lit => self.build_text_literal(pair),
            Rule::bool_lit => Ok(self.new_expr(
                offset,
                ExprKind::Literal(Literal::Bool(pair.as_str() == "true")),
            )),
            Rule::null_lit => Ok(self.new_expr(offset, ExprKind::Literal(Literal::Null))),
            Rule::list_lit => self.build_list(pair),
            Rule::map_lit => self.build_map(pair),
            Rule::struct_lit => self.build_struct(pair),
            Rule::global_call => {
                let mut inner = pair.into_inner().peekable();
                if inner.peek().map(|p| p.as_rule()) == Some(Rule::leading_dot) {
                    inner.next();
                }
                let name = inner
                    .next()
                    .ok_or_else(|| unexpected("function name", offset))?
                    .as_str()
                    .to_string();
                let args = match inner.next() {
                    Some(args) => self.build_args(args)?,
                    None => Vec::new(),
                };
                self.build_global_call(offset, name, args)
            }
            Rule::ident_expr => {
                let name = pair
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::ident)
                    .ok_or_else(|| unexpected("identifier", offset))?;
                Ok(self.new_expr(offset, ExprKind::Ident(name.as_str().to_string())))
            }
            other => Err(unexpected(&format!("{:?}", other), offset)),
        }
    }

    fn build_text_literal(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        let offset = pair.as_span().start();
        let is_bytes = pair.as_rule() == Rule::bytes_lit;
        let full_text = pair.as_str().to_string();
        let mut raw = false;
        let mut body = "";
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::raw_marker => raw = true,
                Rule::quoted => {
                    let quoted = part
                        .into_inner()
                        .next()
                        .ok_or_else(|| unexpected("quoted text", offset))?;
                    let delimiter = match quoted.as_rule() {
                        Rule::triple_dq | Rule::triple_sq => 3,
                        _ => 1,
                    };
                    let text = quoted.as_str();
                    body = &text[delimiter..text.len() - delimiter];
                }
                _ => {}
            }
        }

        let kind = if is_bytes {
            LiteralKind::Bytes
        } else {
            LiteralKind::String
        };
        let bytes = if raw {
            body.as_bytes().to_vec()
        } else {
            unescape(body, kind).map_err(|e| {
                ParseError::new(
                    ParseErrorKind::InvalidLiteral {
                        text: full_text.clone(),
                        reason: e.to_string(),
                    },
                    Span::new(offset, offset + full_text.len()),
                )
            })?
        };

        let literal = if is_bytes {
            Literal::Bytes(Arc::from(bytes))
        } else {
            let text = String::from_utf8(bytes).map_err(|e| {
                ParseError::new(
                    ParseErrorKind::InvalidLiteral {
                        text: full_text.clone(),
                        reason: e.to_string(),
                    },
                    Span::new(offset, offset + full_text.len()),
                )
            })?;
            Literal::String(EcoString::from(text))
        };
        Ok(self.new_expr(offset, ExprKind::Literal(literal)))
    }

    fn build_list(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        let offset = pair.as_span().start();
        let id = self.next_id(offset);
        let mut elements = Vec::new();
        let mut optional_indices = Vec::new();
        for elem in pair.into_inner() {
            let mut inner = elem.into_inner();
            let mut value = inner.next().ok_or_else(|| unexpected("list element", offset))?;
            if value.as_rule() == Rule::opt_marker {
                self.require_optional_syntax("[?", &value)?;
                optional_indices.push(elements.len());
                value = inner.next().ok_or_else(|| unexpected("list element", offset))?;
            }
            elements.push(self.build(value)?);
        }
        Ok(Expr::new(
            id,
            ExprKind::List(ListExpr {
                elements,
                optional_indices,
            }),
        ))
    }

    fn build_map(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        let offset = pair.as_span().start();
        let id = self.next_id(offset);
        let mut entries = Vec::new();
        for entry in pair.into_inner() {
            let entry_offset = entry.as_span().start();
            let mut inner = entry.into_inner().peekable();
            let mut optional = false;
            if let Some(marker) = inner.peek().filter(|p| p.as_rule() == Rule::opt_marker) {
                self.require_optional_syntax("{?", marker)?;
                optional = true;
                inner.next();
            }
            let key = inner.next().ok_or_else(|| unexpected("map key", entry_offset))?;
            let value = inner.next().ok_or_else(|| unexpected("map value", entry_offset))?;
            let entry_id = self.next_id(entry_offset);
            entries.push(MapEntry {
                id: entry_id,
                key: self.build(key)?,
                value: self.build(value)?,
                optional,
            });
        }
        Ok(Expr::new(id, ExprKind::Map(MapExpr { entries })))
    }

    fn build_struct(&self, pair: Pair<Rule>) -> Result<Expr, ParseError> {
        let offset = pair.as_span().start();
        let id = self.next_id(offset);
        let mut type_name = String::new();
        let mut fields = Vec::new();
        for part in pair.into_inner() {
            match part.as_rule() {
                Rule::leading_dot => type_name.push('.'),
                Rule::qualified_name => type_name.push_str(part.as_str()),
                Rule::field_init => {
                    let field_offset = part.as_span().start();
                    let mut inner = part.into_inner().peekable();
                    let mut optional = false;
                    if let Some(marker) = inner.peek().filter(|p| p.as_rule() == Rule::opt_marker)
                    {
                        self.require_optional_syntax("?", marker)?;
                        optional = true;
                        inner.next();
                    }
                    let name = inner
                        .next()
                        .ok_or_else(|| unexpected("field name", field_offset))?;
                    let value = inner
                        .next()
                        .ok_or_else(|| unexpected("field value", field_offset))?;
                    let field_id = self.next_id(field_offset);
                    fields.push(StructField {
                        id: field_id,
                        name: name.as_str().to_string(),
                        value: self.build(value)?,
                        optional,
                    });
                }
                _ => {}
            }
        }
        Ok(Expr::new(id, ExprKind::Struct(StructExpr { type_name, fields })))
    }
}

fn unexpected(what: &str, offset: usize) -> ParseError {
    ParseError::new(
        ParseErrorKind::Other {
            message: format!("unexpected parser state: missing {}", what),
        },
        Span::new(offset, offset),
    )
}

fn invalid_number(pair: &Pair<Rule>) -> ParseError {
    ParseError::new(
        ParseErrorKind::InvalidNumber {
            text: pair.as_str().to_string(),
        },
        pair.as_span().into(),
    )
}
