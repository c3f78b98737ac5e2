//! Single-quoted string codec.
//!
//! Decoding operates on raw bytes and never validates text encodings; the
//! parser converts to `String` (lossily) only at its own boundary. Encoding
//! is the inverse direction used for display and for round-trip tests:
//! every byte sequence without NUL survives `decode(encode(b)) == b`.

/// Decode the raw text of a quoted-string token (surrounding quotes
/// included) into its logical bytes.
///
/// Escapes: `\b \f \n \r \t`, octal `\o` / `\oo` / `\ooo` (value truncated
/// to one byte), `''` collapses to `'`, and `\x` for any other `x` yields
/// `x` literally.
#[must_use]
pub fn decode_quoted(raw: &[u8]) -> Vec<u8> {
    debug_assert!(raw.len() >= 2 && raw[0] == b'\'' && raw[raw.len() - 1] == b'\'');
    let body = &raw[1..raw.len() - 1];
    let mut out = Vec::with_capacity(body.len());
    let mut i = 0;
    while i < body.len() {
        let b = body[i];
        if b == b'\\' && i + 1 < body.len() {
            i += 1;
            match body[i] {
                b'b' => out.push(b'\x08'),
                b'f' => out.push(b'\x0C'),
                b'n' => out.push(b'\n'),
                b'r' => out.push(b'\r'),
                b't' => out.push(b'\t'),
                b'0'..=b'7' => {
                    let mut value: u32 = 0;
                    let mut digits = 0;
                    while digits < 3 && i < body.len() && (b'0'..=b'7').contains(&body[i]) {
                        value = (value << 3) + u32::from(body[i] - b'0');
                        digits += 1;
                        i += 1;
                    }
                    out.push((value & 0xFF) as u8);
                    continue;
                }
                other => out.push(other),
            }
            i += 1;
        } else if b == b'\'' && body.get(i + 1) == Some(&b'\'') {
            out.push(b'\'');
            i += 2;
        } else {
            out.push(b);
            i += 1;
        }
    }
    out
}

/// Encode logical bytes as a single-quoted literal: backslash, quote, and
/// newline are escaped, everything else passes through.
#[must_use]
pub fn encode_quoted(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(bytes.len() + 2);
    out.push(b'\'');
    for &b in bytes {
        match b {
            b'\\' => out.extend_from_slice(b"\\\\"),
            b'\'' => out.extend_from_slice(b"\\'"),
            b'\n' => out.extend_from_slice(b"\\n"),
            _ => out.push(b),
        }
    }
    out.push(b'\'');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(raw: &str) -> Vec<u8> {
        decode_quoted(raw.as_bytes())
    }

    #[test]
    fn plain_body_passes_through() {
        assert_eq!(decode("'64MB'"), b"64MB");
        assert_eq!(decode("''"), b"");
    }

    #[test]
    fn named_escapes_map_to_control_bytes() {
        assert_eq!(decode(r"'\b\f\n\r\t'"), b"\x08\x0C\n\r\t");
    }

    #[test]
    fn doubled_quote_collapses() {
        assert_eq!(decode("'it''s'"), b"it's");
    }

    #[test]
    fn backslash_before_other_bytes_is_literal() {
        assert_eq!(decode(r"'\q\''"), b"q'");
        assert_eq!(decode(r"'\\'"), b"\\");
    }

    #[test]
    fn octal_escapes_take_up_to_three_digits() {
        assert_eq!(decode(r"'\101'"), b"A");
        assert_eq!(decode(r"'\7'"), b"\x07");
        assert_eq!(decode(r"'\1018'"), b"A8");
        // Four digits: three consumed, the fourth is literal.
        assert_eq!(decode(r"'\1011'"), b"A1");
    }

    #[test]
    fn octal_value_truncates_to_one_byte() {
        // 777 octal = 511; low byte is 0xFF.
        assert_eq!(decode(r"'\777'"), b"\xFF");
    }

    #[test]
    fn mixed_escapes_decode_in_one_pass() {
        // a TAB b ' c A
        assert_eq!(decode(r"'a\tb''c\101'"), b"a\tb'cA");
    }

    #[test]
    fn encode_escapes_quote_backslash_newline() {
        assert_eq!(encode_quoted(b"a'b"), b"'a\\'b'".to_vec());
        assert_eq!(encode_quoted(b"a\\b"), b"'a\\\\b'".to_vec());
        assert_eq!(encode_quoted(b"a\nb"), b"'a\\nb'".to_vec());
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let samples: &[&[u8]] = &[
            b"plain",
            b"it's got 'quotes'",
            b"back\\slash",
            b"line\nbreak",
            b"tab\tand\rcr",
            &[0x01, 0x7F, 0x80, 0xFE, 0xFF],
            b"",
        ];
        for sample in samples {
            let encoded = encode_quoted(sample);
            assert_eq!(&decode_quoted(&encoded), sample, "{sample:?}");
        }
    }
}
