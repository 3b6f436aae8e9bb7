/// Client-side escaping: unescaping the output must give back the input.
use mysql_engine::{escape, escape_str, unescape, MysqlError};

fn samples() -> Vec<Vec<u8>> {
    vec![
        Vec::new(),
        b"plain".to_vec(),
        b"O'Reilly".to_vec(),
        b"say \"hi\"".to_vec(),
        b"C:\\temp\\".to_vec(),
        b"nul\0inside".to_vec(),
        b"line\nbreak\r\n".to_vec(),
        b"ctrl-z \x1a end".to_vec(),
        b"\\'\\\"".to_vec(),
        "caf\u{e9} \u{65e5}\u{672c} \u{1f600}".as_bytes().to_vec(),
        vec![0xbf, 0x5c, 0x27],
        (0u8..=255).collect(),
    ]
}

#[test]
fn test_unescape_reverses_escape() {
    for input in samples() {
        let escaped = escape(&input);
        assert_eq!(unescape(&escaped).unwrap(), input, "input {input:?}");
    }
}

#[test]
fn test_escaped_output_has_no_bare_quotes() {
    for input in samples() {
        let escaped = escape(&input);
        let mut bytes = escaped.iter();
        while let Some(&b) = bytes.next() {
            match b {
                b'\\' => {
                    assert!(bytes.next().is_some(), "dangling backslash in {escaped:?}");
                }
                b'\'' | b'"' | 0 | b'\n' | b'\r' | 0x1a => {
                    panic!("unescaped {b:#04x} in {escaped:?}")
                }
                _ => {}
            }
        }
    }
}

#[test]
fn test_escape_str_agrees_with_bytes() {
    for text in ["", "it's", "a\\b", "tab\there", "\u{1a}\0", "na\u{ef}ve \"q\""] {
        assert_eq!(escape_str(text).as_bytes(), escape(text.as_bytes()).as_slice());
    }
}

#[test]
fn test_escape_known_values() {
    assert_eq!(escape(b"O'Reilly"), b"O\\'Reilly".to_vec());
    assert_eq!(escape(b"\0\n\r\x1a"), b"\\0\\n\\r\\Z".to_vec());
    assert_eq!(escape_str("tab\t"), "tab\t");
}

#[test]
fn test_unescape_rejects_dangling_backslash() {
    assert!(matches!(
        unescape(b"abc\\"),
        Err(MysqlError::InvalidArgument(_))
    ));
}
