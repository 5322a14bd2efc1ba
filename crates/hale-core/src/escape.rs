//! HL7 escape sequence resolution and encoding
//!
//! HL7 reserves the delimiter characters, so message content carries them
//! as escape sequences:
//! - `\F\` field separator
//! - `\S\` component separator
//! - `\R\` repetition separator
//! - `\E\` escape character
//! - `\T\` subcomponent separator
//! - `\.br\` line break
//! - `\Xhh..\` hex-encoded bytes
//!
//! Resolution is total: a sequence that is not recognized passes through
//! unchanged, so message content can never make resolution fail.

use crate::encoding::EncodingSet;

/// Resolve escape sequences in a raw value
pub fn resolve(input: &str, encoding: &EncodingSet) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(ch) = chars.next() {
        if ch != encoding.escape {
            result.push(ch);
            continue;
        }

        let mut seq = String::new();
        let mut terminated = false;
        for next in chars.by_ref() {
            if next == encoding.escape {
                terminated = true;
                break;
            }
            seq.push(next);
        }

        if !terminated {
            // Unterminated escape at end of input, keep it verbatim
            result.push(encoding.escape);
            result.push_str(&seq);
            continue;
        }

        match seq.as_str() {
            "F" => result.push(encoding.field),
            "S" => result.push(encoding.component),
            "R" => result.push(encoding.repetition),
            "E" => result.push(encoding.escape),
            "T" => result.push(encoding.subcomponent),
            ".br" => result.push('\n'),
            s if s.starts_with('X') => match decode_hex_pairs(&s[1..]) {
                Some(decoded) => result.push_str(&decoded),
                None => push_sequence(&mut result, &seq, encoding),
            },
            _ => push_sequence(&mut result, &seq, encoding),
        }
    }

    result
}

/// Encode reserved characters in a value as escape sequences
pub fn encode(input: &str, encoding: &EncodingSet) -> String {
    let mut result = String::with_capacity(input.len());

    for ch in input.chars() {
        if ch == encoding.escape {
            push_sequence(&mut result, "E", encoding);
        } else if ch == encoding.field {
            push_sequence(&mut result, "F", encoding);
        } else if ch == encoding.component {
            push_sequence(&mut result, "S", encoding);
        } else if ch == encoding.repetition {
            push_sequence(&mut result, "R", encoding);
        } else if ch == encoding.subcomponent {
            push_sequence(&mut result, "T", encoding);
        } else if ch == '\n' {
            push_sequence(&mut result, ".br", encoding);
        } else if ch == '\r' {
            push_sequence(&mut result, "X0D", encoding);
        } else {
            result.push(ch);
        }
    }

    result
}

fn push_sequence(out: &mut String, seq: &str, encoding: &EncodingSet) {
    out.push(encoding.escape);
    out.push_str(seq);
    out.push(encoding.escape);
}

/// Decode an even-length run of hex digits into the bytes they spell.
///
/// Returns None on odd length, a non-hex digit, or bytes that are not
/// valid UTF-8; the caller then preserves the sequence verbatim.
fn decode_hex_pairs(hex: &str) -> Option<String> {
    if hex.is_empty() || hex.len() % 2 != 0 {
        return None;
    }

    let mut bytes = Vec::with_capacity(hex.len() / 2);
    let digits: Vec<char> = hex.chars().collect();
    for pair in digits.chunks(2) {
        let hi = pair[0].to_digit(16)?;
        let lo = pair[1].to_digit(16)?;
        bytes.push((hi * 16 + lo) as u8);
    }

    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_resolve_delimiters() {
        let enc = EncodingSet::default();
        assert_eq!(resolve("\\F\\", &enc), "|");
        assert_eq!(resolve("\\S\\", &enc), "^");
        assert_eq!(resolve("\\R\\", &enc), "~");
        assert_eq!(resolve("\\E\\", &enc), "\\");
        assert_eq!(resolve("\\T\\", &enc), "&");
    }

    #[test]
    fn test_resolve_mixed() {
        let enc = EncodingSet::default();
        assert_eq!(
            resolve("SMITH \\T\\ JONES\\F\\LLP", &enc),
            "SMITH & JONES|LLP"
        );
    }

    #[test]
    fn test_resolve_line_break() {
        let enc = EncodingSet::default();
        assert_eq!(resolve("line1\\.br\\line2", &enc), "line1\nline2");
    }

    #[test]
    fn test_resolve_hex() {
        let enc = EncodingSet::default();
        assert_eq!(resolve("\\X0D\\", &enc), "\r");
        assert_eq!(resolve("\\X0A\\", &enc), "\n");
        assert_eq!(resolve("\\X414243\\", &enc), "ABC");
    }

    #[test]
    fn test_unknown_sequence_passes_through() {
        let enc = EncodingSet::default();
        assert_eq!(resolve("\\Z1234\\", &enc), "\\Z1234\\");
        assert_eq!(resolve("\\H\\bold\\N\\", &enc), "\\H\\bold\\N\\");
    }

    #[test]
    fn test_bad_hex_passes_through() {
        let enc = EncodingSet::default();
        assert_eq!(resolve("\\XZZ\\", &enc), "\\XZZ\\");
        assert_eq!(resolve("\\X0\\", &enc), "\\X0\\");
    }

    #[test]
    fn test_unterminated_escape_preserved() {
        let enc = EncodingSet::default();
        assert_eq!(resolve("value\\Ftrailing", &enc), "value\\Ftrailing");
    }

    #[test]
    fn test_encode_reserved() {
        let enc = EncodingSet::default();
        assert_eq!(encode("A|B^C&D~E\\F", &enc), "A\\F\\B\\S\\C\\T\\D\\R\\E\\E\\F");
    }

    #[test]
    fn test_encode_newlines() {
        let enc = EncodingSet::default();
        assert_eq!(encode("a\nb\rc", &enc), "a\\.br\\b\\X0D\\c");
    }

    proptest! {
        #[test]
        fn roundtrip_encode_resolve(value in "[ -~\n]{0,64}") {
            let enc = EncodingSet::default();
            prop_assert_eq!(resolve(&encode(&value, &enc), &enc), value);
        }
    }
}
