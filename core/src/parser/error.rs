use std::fmt;

use crate::api::{Diagnostic, Severity};
use crate::parser::{Rule, Source, Span};

/// Parser error with the span it applies to.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub span: Span,
}

/// Specific kinds of parse errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParseErrorKind {
    /// Unexpected token
    UnexpectedToken { expected: String, found: String },
    /// Invalid number literal
    InvalidNumber { text: String },
    /// Invalid escape in a string or bytes literal
    InvalidLiteral { text: String, reason: String },
    /// Maximum nesting depth exceeded
    MaxDepthExceeded { depth: usize, max_depth: usize },
    /// Expression longer than the configured limit (in code points)
    ExpressionTooLarge { size: usize, max_size: usize },
    /// Syntax that is only available with an option enabled
    UnsupportedSyntax { syntax: String },
    /// Malformed macro call, e.g. `list.all(1, x)`
    InvalidMacro { message: String },
    /// Other parse errors
    Other { message: String },
}

impl ParseError {
    pub fn new(kind: ParseErrorKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn message(&self) -> String {
        match &self.kind {
            ParseErrorKind::UnexpectedToken { expected, found } => {
                format!("Syntax error: expected {}, found {}", expected, found)
            }
            ParseErrorKind::InvalidNumber { text } => {
                format!("invalid number literal '{}'", text)
            }
            ParseErrorKind::InvalidLiteral { text, reason } => {
                format!("invalid literal {}: {}", text, reason)
            }
            ParseErrorKind::MaxDepthExceeded { max_depth, .. } => {
                format!(
                    "expression recursion limit exceeded: nesting depth exceeds maximum of {}",
                    max_depth
                )
            }
            ParseErrorKind::ExpressionTooLarge { size, max_size } => format!(
                "expression size {} exceeds maximum of {} code points",
                size, max_size
            ),
            ParseErrorKind::UnsupportedSyntax { syntax } => {
                format!("unsupported syntax '{}'", syntax)
            }
            ParseErrorKind::InvalidMacro { message } => message.clone(),
            ParseErrorKind::Other { message } => message.clone(),
        }
    }

    /// Convert to a Diagnostic for API boundary
    pub fn to_diagnostic(&self, source: &Source) -> Diagnostic {
        Diagnostic {
            severity: Severity::Error,
            message: self.message(),
            location: Some(source.location(self.span.0.start)),
            expr_id: None,
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Convert Pest error to human-readable ParseError
pub fn convert_pest_error(err: pest::error::Error<Rule>) -> ParseError {
    use pest::error::ErrorVariant;

    let span = match err.location {
        pest::error::InputLocation::Pos(pos) => Span(pos..pos),
        pest::error::InputLocation::Span((start, end)) => Span(start..end),
    };

    let kind = match err.variant {
        ErrorVariant::ParsingError {
            positives,
            negatives,
        } => ParseErrorKind::UnexpectedToken {
            expected: format_expected_rules(&positives),
            found: format_found_rules(&negatives),
        },
        ErrorVariant::CustomError { message } => ParseErrorKind::Other { message },
    };

    ParseError::new(kind, span)
}

/// Format expected rules in a human-readable way
fn format_expected_rules(rules: &[Rule]) -> String {
    if rules.is_empty() {
        return "something else".to_string();
    }

    let mut concepts: Vec<&str> = Vec::new();
    for rule in rules {
        let concept = match rule {
            Rule::int_lit
            | Rule::uint_lit
            | Rule::double_lit
            | Rule::string_lit
            | Rule::bytes_lit
            | Rule::bool_lit
            | Rule::null_lit => "literal",
            Rule::ident | Rule::qualified_name => "identifier",
            Rule::EOI => "end of input",
            Rule::call_args => "'('",
            Rule::ternary_op => "'?'",
            Rule::or_op
            | Rule::and_op
            | Rule::eq_op
            | Rule::ne_op
            | Rule::le_op
            | Rule::lt_op
            | Rule::ge_op
            | Rule::gt_op
            | Rule::in_op
            | Rule::add_op
            | Rule::sub_op
            | Rule::mul_op
            | Rule::div_op
            | Rule::rem_op => "operator",
            _ => "expression",
        };
        if !concepts.contains(&concept) {
            concepts.push(concept);
        }
    }

    match concepts.split_last() {
        Some((last, [])) => last.to_string(),
        Some((last, rest)) => format!("{} or {}", rest.join(", "), last),
        None => "something else".to_string(),
    }
}

/// Format found rules in a human-readable way
fn format_found_rules(rules: &[Rule]) -> String {
    match rules.first() {
        None => "unexpected token".to_string(),
        Some(Rule::ident) => "identifier".to_string(),
        Some(Rule::EOI) => "end of input".to_string(),
        Some(rule) => format!("{:?}", rule),
    }
}
