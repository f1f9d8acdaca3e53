/// Bytes literal escaping for CEL syntax.
///
/// Converts runtime bytes (e.g., `[104, 105]`) to their source form (`b"hi"`).
/// Unescaping lives in [`super::string_literal::unescape`] with
/// [`super::string_literal::LiteralKind::Bytes`].
use std::fmt;

/// Escape bytes for a CEL bytes literal, including the `b"..."` delimiters.
///
/// Printable ASCII is shown directly, common control characters use
/// backslash notation and everything else uses `\xNN`.
pub fn escape_bytes(f: &mut impl fmt::Write, bytes: &[u8]) -> fmt::Result {
    f.write_str("b\"")?;
    for &byte in bytes {
        match byte {
            b'"' => write!(f, "\\\"")?,
            b'\\' => write!(f, "\\\\")?,
            b'\n' => write!(f, "\\n")?,
            b'\r' => write!(f, "\\r")?,
            b'\t' => write!(f, "\\t")?,
            0x20..=0x7E => write!(f, "{}", byte as char)?,
            _ => write!(f, "\\x{:02x}", byte)?,
        }
    }
    f.write_str("\"")
}
