//! Release note and author validation.
//!
//! Both values end up as fields of a `;`-separated tracking line, so neither
//! may contain a semicolon.

use crate::error::{Error, Result};

const FIELD_SEPARATOR: char = ';';

/// Accepts any non-blank note without a semicolon and returns it unchanged.
pub fn validate_note(input: &str) -> Result<String> {
    validate_field("note", input)
}

/// Same rule as notes; the author shares the tracking line.
pub fn validate_author(input: &str) -> Result<String> {
    validate_field("author", input)
}

fn validate_field(field: &str, input: &str) -> Result<String> {
    if input.trim().is_empty() {
        return Err(Error::validation_invalid_argument(
            field,
            format!("The {} cannot be empty", field),
            None,
            None,
        ));
    }

    if input.contains(FIELD_SEPARATOR) {
        return Err(Error::validation_invalid_argument(
            field,
            format!("The {} cannot contain a semicolon", field),
            Some(input.to_string()),
            None,
        ));
    }

    Ok(input.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn empty_note_is_rejected() {
        let err = validate_note("").unwrap_err();
        assert_eq!(err.code, ErrorCode::ValidationInvalidArgument);
    }

    #[test]
    fn whitespace_note_is_rejected() {
        assert!(validate_note("   ").unwrap_err().code.is_validation());
        assert!(validate_note("\t\n").unwrap_err().code.is_validation());
    }

    #[test]
    fn semicolon_note_is_rejected() {
        let err = validate_note("a;b").unwrap_err();
        assert_eq!(err.details["field"], "note");
    }

    #[test]
    fn valid_note_is_returned_unchanged() {
        assert_eq!(validate_note("fixed a bug").unwrap(), "fixed a bug");
        assert_eq!(validate_note("  padded  ").unwrap(), "  padded  ");
    }

    #[test]
    fn author_follows_the_same_rule() {
        assert!(validate_author("").is_err());
        assert!(validate_author("ana;bob").is_err());
        assert_eq!(validate_author("ana").unwrap(), "ana");
    }
}
