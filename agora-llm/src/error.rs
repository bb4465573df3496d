//! Decision request errors.

use thiserror::Error;

/// Why a decision request produced no usable answer.
///
/// Every variant is recoverable: callers substitute a conservative default
/// for the one entity whose request failed.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The backend answered with an error or the transport broke.
    #[error("decision request failed: {0}")]
    RequestFailed(String),

    /// No JSON payload could be read from the answer.
    #[error("unreadable decision payload: {0}")]
    ParseError(String),

    /// No answer within the budget, in milliseconds (0 when the transport
    /// reported the timeout itself).
    #[error("decision request timed out after {0}ms")]
    Timeout(u64),

    /// Nothing to ask: no backend configured, unreachable, or unscripted.
    #[error("decision service unavailable: {0}")]
    Unavailable(String),

    /// Every retry failed.
    #[error("gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        /// Attempts made, including the first.
        attempts: u32,
        /// Error of the final attempt.
        last_error: String,
    },

    /// Blank after trimming.
    #[error("empty decision response")]
    EmptyResponse,
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(0)
        } else if err.is_connect() {
            Self::Unavailable(err.to_string())
        } else {
            Self::RequestFailed(err.to_string())
        }
    }
}
