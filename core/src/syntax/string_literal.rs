/// String and bytes literal escaping and unescaping for CEL syntax.
///
/// This module converts between:
/// - Runtime strings (e.g., "hello\n" with an actual newline character)
/// - CEL source literals (e.g., "hello\n" with a backslash-n sequence)
use std::fmt;

/// Errors that can occur when unescaping literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnescapeError {
    /// Invalid escape sequence (e.g., `\q`)
    InvalidEscape { pos: usize, seq: String },
    /// Invalid hex or octal digit in a numeric escape
    InvalidDigit { pos: usize, seq: String },
    /// Numeric escape with too few digits
    IncompleteEscape {
        pos: usize,
        expected: usize,
        got: usize,
    },
    /// Escape that does not denote a Unicode scalar value
    InvalidUnicodeScalar { pos: usize, value: u32 },
}

impl fmt::Display for UnescapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnescapeError::InvalidEscape { pos, seq } => {
                write!(f, "invalid escape sequence '{}' at position {}", seq, pos)
            }
            UnescapeError::InvalidDigit { pos, seq } => {
                write!(f, "invalid digit in '{}' at position {}", seq, pos)
            }
            UnescapeError::IncompleteEscape { pos, expected, got } => {
                write!(
                    f,
                    "incomplete escape at position {}: expected {} digits, got {}",
                    pos, expected, got
                )
            }
            UnescapeError::InvalidUnicodeScalar { pos, value } => {
                write!(
                    f,
                    "invalid Unicode scalar value U+{:X} at position {}",
                    value, pos
                )
            }
        }
    }
}

/// Target of an unescape operation.
///
/// In strings, `\xHH` and octal escapes denote code points; in bytes they
/// denote raw octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    String,
    Bytes,
}

/// Escape a runtime string as a double-quoted CEL string literal.
pub fn escape_string(f: &mut impl fmt::Write, s: &str) -> fmt::Result {
    f.write_char('"')?;
    for ch in s.chars() {
        match ch {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            c if c.is_control() => write!(f, "\\u{:04x}", c as u32)?,
            c => f.write_char(c)?,
        }
    }
    f.write_char('"')
}

/// Unescape the body of a CEL literal (without quotes or prefixes).
///
/// Supports `\a \b \f \n \r \t \v \\ \' \" \?` and the backtick, hex
/// (`\xHH`, `\XHH`), octal (`\ooo`) and Unicode (`\uHHHH`, `\UHHHHHHHH`)
/// escapes. The result is UTF-8 for [`LiteralKind::String`].
pub fn unescape(input: &str, kind: LiteralKind) -> Result<Vec<u8>, UnescapeError> {
    if !input.contains('\\') {
        return Ok(input.as_bytes().to_vec());
    }

    let mut out = Vec::with_capacity(input.len());
    let mut chars = input.char_indices().peekable();
    let mut buf = [0u8; 4];

    while let Some((pos, ch)) = chars.next() {
        if ch != '\\' {
            out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
            continue;
        }

        let Some((_, esc)) = chars.next() else {
            return Err(UnescapeError::InvalidEscape {
                pos,
                seq: "\\".to_string(),
            });
        };

        let simple = match esc {
            'a' => Some(b'\x07'),
            'b' => Some(b'\x08'),
            'f' => Some(b'\x0c'),
            'n' => Some(b'\n'),
            'r' => Some(b'\r'),
            't' => Some(b'\t'),
            'v' => Some(b'\x0b'),
            '\\' => Some(b'\\'),
            '\'' => Some(b'\''),
            '"' => Some(b'"'),
            '`' => Some(b'`'),
            '?' => Some(b'?'),
            _ => None,
        };
        if let Some(byte) = simple {
            out.push(byte);
            continue;
        }

        match esc {
            'x' | 'X' => {
                let value = take_digits(&mut chars, pos, esc, 2, 16)?;
                push_code(&mut out, value, kind, pos)?;
            }
            'u' if kind == LiteralKind::String => {
                let value = take_digits(&mut chars, pos, esc, 4, 16)?;
                push_scalar(&mut out, value, pos)?;
            }
            'U' if kind == LiteralKind::String => {
                let value = take_digits(&mut chars, pos, esc, 8, 16)?;
                push_scalar(&mut out, value, pos)?;
            }
            '0'..='3' => {
                let rest = take_digits(&mut chars, pos, esc, 2, 8)?;
                let value = (esc as u32 - '0' as u32) * 64 + rest;
                push_code(&mut out, value, kind, pos)?;
            }
            other => {
                return Err(UnescapeError::InvalidEscape {
                    pos,
                    seq: format!("\\{}", other),
                });
            }
        }
    }

    Ok(out)
}

fn take_digits(
    chars: &mut std::iter::Peekable<std::str::CharIndices<'_>>,
    pos: usize,
    esc: char,
    count: usize,
    radix: u32,
) -> Result<u32, UnescapeError> {
    let mut seq = format!("\\{}", esc);
    let mut value: u32 = 0;
    for got in 0..count {
        let Some((_, c)) = chars.next() else {
            return Err(UnescapeError::IncompleteEscape {
                pos,
                expected: count,
                got,
            });
        };
        seq.push(c);
        let Some(digit) = c.to_digit(radix) else {
            return Err(UnescapeError::InvalidDigit { pos, seq });
        };
        value = value * radix + digit;
    }
    Ok(value)
}

fn push_code(
    out: &mut Vec<u8>,
    value: u32,
    kind: LiteralKind,
    pos: usize,
) -> Result<(), UnescapeError> {
    match kind {
        LiteralKind::Bytes => {
            out.push(value as u8);
            Ok(())
        }
        LiteralKind::String => push_scalar(out, value, pos),
    }
}

fn push_scalar(out: &mut Vec<u8>, value: u32, pos: usize) -> Result<(), UnescapeError> {
    let ch = char::from_u32(value).ok_or(UnescapeError::InvalidUnicodeScalar { pos, value })?;
    let mut buf = [0u8; 4];
    out.extend_from_slice(ch.encode_utf8(&mut buf).as_bytes());
    Ok(())
}
