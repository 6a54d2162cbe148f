//! Error taxonomy shared by every retrieval path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MailError {
    /// The server rejected the credentials.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Network, TLS or protocol-level failure on the session.
    #[error("connection error: {0}")]
    Connection(String),

    #[error("timed out: {0}")]
    Timeout(String),

    /// Malformed or rejected search criteria.
    #[error("search failed: {0}")]
    Search(String),

    /// The search-and-fetch sequence did not complete.
    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("could not parse message {uid}: {reason}")]
    Parse { uid: u32, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange {
        start: chrono::NaiveDate,
        end: chrono::NaiveDate,
    },
}

pub type Result<T> = std::result::Result<T, MailError>;

impl MailError {
    /// Status code the HTTP layer answers with for this error.
    pub fn http_status(&self) -> u16 {
        match self {
            MailError::NotFound(_) => 404,
            MailError::InvalidRange { .. } => 400,
            _ => 500,
        }
    }

    /// Classify a transport-level failure. Timeouts surface as `Timeout`,
    /// everything else as `Connection`.
    pub(crate) fn from_transport(err: imap::error::Error) -> Self {
        match err {
            imap::error::Error::Io(ref io)
                if matches!(
                    io.kind(),
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock
                ) =>
            {
                MailError::Timeout(err.to_string())
            }
            other => MailError::Connection(other.to_string()),
        }
    }

    /// Classify a failed LOGIN. A tagged NO/BAD answer means the server
    /// refused the credentials.
    pub(crate) fn from_login(err: imap::error::Error) -> Self {
        match err {
            imap::error::Error::No(msg) | imap::error::Error::Bad(msg) => {
                MailError::Authentication(msg)
            }
            other => MailError::from_transport(other),
        }
    }
}

impl From<std::io::Error> for MailError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                MailError::Timeout(err.to_string())
            }
            _ => MailError::Connection(err.to_string()),
        }
    }
}
