//! Validation failures for PLY payloads.

use splat_core::ErrorKind;

/// Result type alias for PLY operations.
pub type Result<T, E = FormatError> = std::result::Result<T, E>;

/// Reason a payload was rejected by the validator.
///
/// Every malformed or truncated input maps onto one of these variants; the
/// parser never panics on untrusted bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The payload has no bytes at all.
    #[error("payload is empty")]
    Empty,

    /// The payload does not start with the `ply` magic line.
    #[error("payload does not start with the 'ply' magic token")]
    MissingMagic,

    /// No `end_header` line was found within the header window.
    #[error("header is not terminated by 'end_header' within the first {limit} bytes")]
    UnterminatedHeader { limit: usize },

    /// A header line could not be parsed.
    #[error("invalid header at line {line}: {reason}")]
    InvalidHeader { line: usize, reason: String },

    /// The header declares no `format` line.
    #[error("header does not declare a format")]
    MissingFormat,

    /// The declared encoding is not the supported binary encoding.
    #[error("unsupported encoding '{found}', expected 'binary_little_endian'")]
    UnsupportedEncoding { found: String },

    /// A required element group is not declared.
    #[error("header does not declare a '{name}' element")]
    MissingElement { name: String },

    /// Required point properties are missing from the header.
    #[error("missing required vertex properties: {}", fields.join(", "))]
    MissingFields { fields: Vec<String> },

    /// The point element declares zero points.
    #[error("'{name}' element declares no points")]
    EmptyElement { name: String },

    /// The binary body is shorter than the header promises.
    #[error("payload body is truncated: expected at least {expected} bytes, found {actual}")]
    TruncatedBody { expected: u64, actual: u64 },
}

impl FormatError {
    /// Creates an invalid header error for a 1-based line number.
    pub fn invalid_header(line: usize, reason: impl Into<String>) -> Self {
        Self::InvalidHeader {
            line,
            reason: reason.into(),
        }
    }

    /// Returns the human-readable rejection reason.
    pub fn reason(&self) -> String {
        self.to_string()
    }

    /// Returns the required fields that were missing, if that is why the
    /// payload was rejected.
    pub fn missing_fields(&self) -> &[String] {
        match self {
            Self::MissingFields { fields } => fields,
            _ => &[],
        }
    }

    /// Validation failures always map onto [`ErrorKind::Validation`].
    pub const fn kind(&self) -> ErrorKind {
        ErrorKind::Validation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_display_and_accessor() {
        let error = FormatError::MissingFields {
            fields: vec!["opacity".to_owned(), "rot_3".to_owned()],
        };

        assert_eq!(error.missing_fields(), ["opacity", "rot_3"]);
        assert!(error.reason().contains("opacity, rot_3"));
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_other_variants_report_no_missing_fields() {
        assert!(FormatError::MissingMagic.missing_fields().is_empty());
        assert!(
            FormatError::invalid_header(3, "bad")
                .to_string()
                .contains("line 3")
        );
    }
}
