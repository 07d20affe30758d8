//! Error taxonomy shared by every write path.
//!
//! Read operations return `Option` and never fail on a missing language, object or
//! group. Write operations return [`LangResult`] so that a mutation which cannot
//! proceed is rejected before anything is persisted.

use thiserror::Error;

/// Stable, machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    UnsupportedOperation,
    Storage,
}

impl ErrorKind {
    /// Code exposed to upstream callers (admin UI, HTTP responses).
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::UnsupportedOperation => "unsupported_operation",
            ErrorKind::Storage => "storage",
        }
    }
}

#[derive(Debug, Error)]
pub enum LangError {
    #[error("Language not found: {0}")]
    LanguageNotFound(String),

    #[error("Object {object_type} #{object_id} has no language")]
    ObjectWithoutLanguage { object_type: String, object_id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Object type '{0}' is not translatable")]
    UntranslatableType(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LangError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::LanguageNotFound(_) | Self::ObjectWithoutLanguage { .. } => ErrorKind::NotFound,
            Self::InvalidInput(_) | Self::InvalidUrl(_) => ErrorKind::InvalidInput,
            Self::UntranslatableType(_) => ErrorKind::UnsupportedOperation,
            Self::Storage(_) | Self::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for `self.kind().code()`.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether the error was caused by the caller (log at `warn`) rather than by a
    /// broken store (log at `error`).
    pub fn is_expected(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Storage)
    }
}

pub type LangResult<T> = std::result::Result<T, LangError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_distinct_per_kind() {
        let codes = [
            ErrorKind::NotFound.code(),
            ErrorKind::InvalidInput.code(),
            ErrorKind::UnsupportedOperation.code(),
            ErrorKind::Storage.code(),
        ];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_language_not_found_kind() {
        let err = LangError::LanguageNotFound("xx".to_string());
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.code(), "not_found");
        assert!(err.is_expected());
        assert!(err.to_string().contains("xx"));
    }

    #[test]
    fn test_every_variant_maps_to_a_kind() {
        let cases = [
            (LangError::LanguageNotFound("xx".to_string()), ErrorKind::NotFound),
            (
                LangError::ObjectWithoutLanguage {
                    object_type: "post".to_string(),
                    object_id: 7,
                },
                ErrorKind::NotFound,
            ),
            (LangError::InvalidInput("slug".to_string()), ErrorKind::InvalidInput),
            (LangError::InvalidUrl("http://[".to_string()), ErrorKind::InvalidInput),
            (
                LangError::UntranslatableType("attachment".to_string()),
                ErrorKind::UnsupportedOperation,
            ),
            (LangError::from(rusqlite::Error::InvalidQuery), ErrorKind::Storage),
        ];
        for (err, kind) in cases {
            assert_eq!(err.kind(), kind, "{}", err);
        }
    }

    #[test]
    fn test_untranslatable_type_is_unsupported() {
        let err = LangError::UntranslatableType("attachment".to_string());
        assert_eq!(err.code(), "unsupported_operation");
    }

    #[test]
    fn test_storage_error_is_unexpected() {
        let err = LangError::from(rusqlite::Error::InvalidQuery);
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(!err.is_expected());
    }
}
