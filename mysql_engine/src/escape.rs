//! Client-side string escaping for SQL literals.
//!
//! [`escape`] ignores the connection character set; use
//! `Connection::real_escape` when the active charset may contain
//! multi-byte sequences whose trailing bytes look like `\` or `'`.

use crate::error::{MysqlError, Result};

/// Escapes `input` for embedding between quotes in a statement.
///
/// NUL, `\n`, `\r`, `\`, `'`, `"` and Ctrl-Z are backslash-escaped; every
/// other byte is copied unchanged.
pub fn escape(input: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(input.len() + input.len() / 8 + 1);
    for &byte in input {
        let replacement = match byte {
            0 => Some(b'0'),
            b'\n' => Some(b'n'),
            b'\r' => Some(b'r'),
            b'\\' => Some(b'\\'),
            b'\'' => Some(b'\''),
            b'"' => Some(b'"'),
            0x1a => Some(b'Z'),
            _ => None,
        };
        match replacement {
            Some(escaped) => out.extend_from_slice(&[b'\\', escaped]),
            None => out.push(byte),
        }
    }
    out
}

/// [`escape`] for text; only ASCII is inserted so the result stays valid UTF-8.
pub fn escape_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\u{1a}' => out.push_str("\\Z"),
            other => out.push(other),
        }
    }
    out
}

/// Inverse of [`escape`], following the server's literal parsing rules.
pub fn unescape(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut bytes = input.iter().copied();
    while let Some(byte) = bytes.next() {
        if byte != b'\\' {
            out.push(byte);
            continue;
        }
        let escaped = bytes.next().ok_or_else(|| {
            MysqlError::InvalidArgument("unescape: dangling backslash".to_string())
        })?;
        out.push(match escaped {
            b'0' => 0,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'b' => 0x08,
            b'Z' => 0x1a,
            other => other,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_specials() {
        assert_eq!(escape(b"it's"), b"it\\'s".to_vec());
        assert_eq!(escape(b"a\"b"), b"a\\\"b".to_vec());
        assert_eq!(escape(b"back\\slash"), b"back\\\\slash".to_vec());
        assert_eq!(escape(b"nul\0byte"), b"nul\\0byte".to_vec());
        assert_eq!(escape(b"line\nbreak\r"), b"line\\nbreak\\r".to_vec());
        assert_eq!(escape(&[0x1a]), b"\\Z".to_vec());
    }

    #[test]
    fn test_escape_plain_text_unchanged() {
        assert_eq!(escape(b"plain text 123"), b"plain text 123".to_vec());
        assert!(escape(b"").is_empty());
    }

    #[test]
    fn test_escape_str_matches_bytes() {
        let input = "O'Brien \"quoted\" \\ ü\n";
        assert_eq!(escape_str(input).into_bytes(), escape(input.as_bytes()));
    }

    #[test]
    fn test_unescape_reverses_escape() {
        let inputs: [&[u8]; 5] = [
            b"it's a \"test\"",
            b"\\\\already\\\\",
            b"\0\0\x1a\r\n",
            "multi-byte: 日本語 ü é".as_bytes(),
            &[0xff, b'\'', 0xfe, b'\\', 0x00],
        ];
        for input in inputs {
            assert_eq!(unescape(&escape(input)).unwrap(), input);
        }
    }

    #[test]
    fn test_unescape_rejects_dangling_backslash() {
        assert!(unescape(b"abc\\").is_err());
    }
}
