use serde::Serialize;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SentinelError>;

/// Failure taxonomy for a pipeline run.
///
/// Each stage returns one of these instead of logging and swallowing, so the
/// pipeline can decide skip-vs-abort in a single place.
#[derive(Debug, Error)]
pub enum SentinelError {
    #[error("Network failure for {url}: {reason}")]
    Network { url: String, reason: String },

    #[error("Archive failure for {archive}: {reason}")]
    Archive { archive: String, reason: String },

    #[error("Extraction failure for {document}: {reason}")]
    Extraction { document: String, reason: String },

    #[error("Notification failure via {channel}: {reason}")]
    Notification { channel: String, reason: String },

    #[error("Network capabilities capped: domain not in allowlist for URL {0}")]
    Blocked(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse classification recorded with each error in a run summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Network,
    Archive,
    Extraction,
    Notification,
    Blocked,
    Config,
    Io,
    Other,
}

impl SentinelError {
    pub fn network(url: impl Into<String>, reason: impl ToString) -> Self {
        SentinelError::Network { url: url.into(), reason: reason.to_string() }
    }

    pub fn archive(archive: impl Into<String>, reason: impl ToString) -> Self {
        SentinelError::Archive { archive: archive.into(), reason: reason.to_string() }
    }

    pub fn extraction(document: impl Into<String>, reason: impl ToString) -> Self {
        SentinelError::Extraction { document: document.into(), reason: reason.to_string() }
    }

    pub fn notification(channel: impl Into<String>, reason: impl ToString) -> Self {
        SentinelError::Notification { channel: channel.into(), reason: reason.to_string() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SentinelError::Network { .. }      => ErrorKind::Network,
            SentinelError::Archive { .. }      => ErrorKind::Archive,
            SentinelError::Extraction { .. }   => ErrorKind::Extraction,
            SentinelError::Notification { .. } => ErrorKind::Notification,
            SentinelError::Blocked(_)          => ErrorKind::Blocked,
            SentinelError::Config(_)           => ErrorKind::Config,
            SentinelError::Io(_)               => ErrorKind::Io,
            SentinelError::Other(_)            => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_error_messages_carry_context() {
        let err = SentinelError::network("https://example.house.gov/a.pdf", "HTTP 404");
        assert_eq!(err.kind(), ErrorKind::Network);
        assert!(err.to_string().contains("https://example.house.gov/a.pdf"));
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[test]
    fn test_io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: SentinelError = io.into();
        assert_eq!(err.kind(), ErrorKind::Io);
    }
}
