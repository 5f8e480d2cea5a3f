//! Turning uploaded bytes into text.

use std::borrow::Cow;

use crate::error::CoreError;

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// Decode an import file.
///
/// UTF-8 (with or without BOM) is tried first; anything else is read as
/// ISO-8859-1, which maps every byte to a character. Files containing NUL
/// bytes are binary and rejected.
pub fn decode_source(bytes: &[u8]) -> Result<Cow<'_, str>, CoreError> {
    if bytes.contains(&0) {
        return Err(CoreError::Validation(
            "Import file is not a text file".to_string(),
        ));
    }
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => Ok(Cow::Borrowed(text)),
        Err(_) => Ok(Cow::Owned(bytes.iter().map(|&b| char::from(b)).collect())),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn utf8_is_borrowed() {
        let text = decode_source("account; René".as_bytes()).unwrap();
        assert_matches!(text, Cow::Borrowed("account; René"));
    }

    #[test]
    fn bom_is_stripped() {
        let mut bytes = UTF8_BOM.to_vec();
        bytes.extend_from_slice(b"domain; a.com; 10; true");
        assert_eq!(decode_source(&bytes).unwrap(), "domain; a.com; 10; true");
    }

    #[test]
    fn latin1_falls_back() {
        // "René" encoded as ISO-8859-1.
        let bytes = [b'R', b'e', b'n', 0xE9];
        assert_eq!(decode_source(&bytes).unwrap(), "René");
    }

    #[test]
    fn binary_input_is_rejected() {
        assert_matches!(
            decode_source(b"domain\0; a.com"),
            Err(CoreError::Validation(_))
        );
    }

    #[test]
    fn empty_input_is_empty_text() {
        assert_eq!(decode_source(b"").unwrap(), "");
    }
}
