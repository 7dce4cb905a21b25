use thiserror::Error;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("VALIDATION: {0}")]
    Validation(String),
    #[error("PERSISTENCE: {0}")]
    Persistence(String),
    #[error("IO_FAILURE: {0}")]
    Io(String),
    #[error("CONFIG_INVALID: {0}")]
    Config(String),
    #[error("INTERNAL: {0}")]
    Internal(String),
}

impl JournalError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "ValidationError",
            Self::Persistence(_) => "PersistenceError",
            Self::Io(_) => "IoError",
            Self::Config(_) => "ConfigError",
            Self::Internal(_) => "InternalError",
        }
    }

    /// Raw message without the code prefix.
    pub fn raw(&self) -> &str {
        match self {
            Self::Validation(raw)
            | Self::Persistence(raw)
            | Self::Io(raw)
            | Self::Config(raw)
            | Self::Internal(raw) => raw,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

impl From<std::io::Error> for JournalError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value.to_string())
    }
}

impl From<rusqlite::Error> for JournalError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Persistence(value.to_string())
    }
}

impl From<serde_json::Error> for JournalError {
    fn from(value: serde_json::Error) -> Self {
        Self::Config(value.to_string())
    }
}

impl From<tokio::task::JoinError> for JournalError {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Internal(value.to_string())
    }
}

pub type JournalResult<T> = Result<T, JournalError>;

/// A failure prepared for display: a dismissible summary plus the raw
/// diagnostic text the user can copy out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorReport {
    pub summary: String,
    pub details: String,
}

impl ErrorReport {
    pub fn new(context: &str, error: &JournalError) -> Self {
        Self {
            summary: format!("{}: {}", context, error.raw()),
            details: format!("{}: {}", error.kind(), error.raw()),
        }
    }

    pub fn copy_to(&self, clipboard: &mut impl crate::surface::Clipboard) {
        clipboard.set_text("Error Details", &self.details);
    }
}

impl std::fmt::Display for ErrorReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary)
    }
}

#[cfg(test)]
mod tests {
    use super::{ErrorReport, JournalError};

    #[test]
    fn sqlite_errors_map_to_persistence() {
        let error: JournalError = rusqlite::Error::InvalidQuery.into();
        assert_eq!(error.kind(), "PersistenceError");
        assert!(error.to_string().starts_with("PERSISTENCE: "));
    }

    #[test]
    fn report_keeps_raw_text_for_copying() {
        let error = JournalError::Persistence("disk I/O error".to_string());
        let report = ErrorReport::new("Error loading notes", &error);
        assert_eq!(report.summary, "Error loading notes: disk I/O error");
        assert_eq!(report.details, "PersistenceError: disk I/O error");
    }
}
