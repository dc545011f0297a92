//! Best-effort text normalization for a panel that mixes encodings.

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use tracing::trace;

/// Resolves a charset label, falling back to UTF-8 for unknown labels.
pub(crate) fn encoding_for(label: &str) -> &'static Encoding {
    Encoding::for_label(label.as_bytes()).unwrap_or(UTF_8)
}

/// Decodes a page body in the given charset, replacing invalid sequences.
pub(crate) fn decode(bytes: &[u8], encoding: &'static Encoding) -> String {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        trace!(encoding = encoding.name(), "body decoded with replacement characters");
    }
    text.into_owned()
}

/// True ISO-8859-1: every byte is the code point of the same value.
fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Decodes a body whose charset is unknown: strict UTF-8, then the declared
/// charset, then latin-1. Latin-1 maps every byte, so nothing is dropped or
/// replaced.
pub(crate) fn decode_with_fallback(bytes: &[u8], declared: Option<&'static Encoding>) -> String {
    if let Ok(text) = std::str::from_utf8(bytes) {
        return text.to_string();
    }
    if let Some(encoding) = declared
        && let Some(text) = encoding.decode_without_bom_handling_and_without_replacement(bytes)
    {
        trace!(encoding = encoding.name(), "decoded with declared charset");
        return text.into_owned();
    }
    decode_latin1(bytes)
}

fn is_printable(c: char) -> bool {
    c.is_ascii_graphic() || matches!(c, ' ' | '\t' | '\n' | '\r' | '\x0b' | '\x0c')
}

/// Keeps printable ASCII only and lower-cases it. "GSM connecté au réseau"
/// becomes "gsm connect au rseau".
pub fn filter_ascii(value: &str) -> String {
    value
        .chars()
        .filter(|c| is_printable(*c))
        .collect::<String>()
        .to_ascii_lowercase()
}

/// Repairs UTF-8 text that was decoded as latin-1 ("TÃ©lÃ©" -> "Télé").
/// Text that doesn't round-trip is returned unchanged.
pub fn fix_mojibake(text: &str) -> Cow<'_, str> {
    if text.is_ascii() {
        return Cow::Borrowed(text);
    }
    let mut bytes = Vec::with_capacity(text.len());
    for c in text.chars() {
        match u8::try_from(u32::from(c)) {
            Ok(b) => bytes.push(b),
            Err(_) => return Cow::Borrowed(text),
        }
    }
    match String::from_utf8(bytes) {
        Ok(repaired) => Cow::Owned(repaired),
        Err(_) => Cow::Borrowed(text),
    }
}

/// A login challenge is one column letter and one row digit, e.g. "C4".
pub fn is_challenge(text: &str) -> bool {
    let mut chars = text.trim().chars();
    matches!(
        (chars.next(), chars.next(), chars.next()),
        (Some('A'..='F'), Some('1'..='5'), None)
    )
}

/// Extracts the copyright year from a footer like "© 2011 Somfy SAS".
pub(crate) fn footer_year(text: &str) -> Option<&str> {
    let lowered = text.to_ascii_lowercase();
    lowered
        .match_indices(" somfy")
        .map(|(i, _)| i)
        .filter(|&i| i >= 4)
        .find(|&i| lowered.as_bytes()[i - 4..i].iter().all(u8::is_ascii_digit))
        .map(|i| &text[i - 4..i])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_ascii_drops_accents_and_folds_case() {
        assert_eq!(filter_ascii("GSM connecté au réseau"), "gsm connect au rseau");
        assert_eq!(filter_ascii("OK"), "ok");
        assert_eq!(filter_ascii("éèà"), "");
    }

    #[test]
    fn mojibake_is_repaired() {
        assert_eq!(fix_mojibake("TÃ©lÃ©"), "Télé");
    }

    #[test]
    fn clean_text_passes_through() {
        assert_eq!(fix_mojibake("Télé"), "Télé");
        assert_eq!(fix_mojibake("Porte entrée"), "Porte entrée");
        assert!(matches!(fix_mojibake("Detecteur"), Cow::Borrowed(_)));
        assert_eq!(fix_mojibake("Zone €"), "Zone €");
    }

    #[test]
    fn challenge_grammar() {
        assert!(is_challenge("A1"));
        assert!(is_challenge(" F5\n"));
        assert!(!is_challenge("G1"));
        assert!(!is_challenge("A6"));
        assert!(!is_challenge("a1"));
        assert!(!is_challenge("A12"));
        assert!(!is_challenge(""));
    }

    #[test]
    fn fallback_prefers_utf8() {
        assert_eq!(decode_with_fallback("Télé".as_bytes(), None), "Télé");
    }

    #[test]
    fn fallback_uses_declared_charset() {
        let bytes = b"T\xe9l\xe9 \x80";
        let text = decode_with_fallback(bytes, Some(encoding_for("windows-1252")));
        assert_eq!(text, "Télé €");
    }

    #[test]
    fn fallback_to_latin1() {
        let bytes = b"T\xe9l\xe9";
        assert_eq!(decode_with_fallback(bytes, Some(UTF_8)), "Télé");
    }

    #[test]
    fn fallback_keeps_one_char_per_undecodable_byte() {
        let bytes = b"a\xff\xfe\x80b";
        let text = decode_with_fallback(bytes, None);
        assert_eq!(text.chars().count(), bytes.len());
        assert!(!text.contains('\u{fffd}'));
        assert_eq!(decode_with_fallback(b"", Some(UTF_8)), "");
    }

    #[test]
    fn footer_year_extraction() {
        assert_eq!(footer_year("Copyright © 2011 Somfy SAS"), Some("2011"));
        assert_eq!(footer_year("2016 SOMFY"), Some("2016"));
        assert_eq!(footer_year("Somfy"), None);
        assert_eq!(footer_year("v12 somfy"), None);
    }

    #[test]
    fn unknown_label_is_utf8() {
        assert_eq!(encoding_for("klingon"), UTF_8);
        assert_eq!(encoding_for("iso-8859-15").name(), "ISO-8859-15");
    }
}
