//! Feed error types with user-facing message mapping.
//!
//! [`FeedError`] is the central error type for the pipeline. Every fetch-time
//! failure is caught at the fetcher boundary and turned into a page-local
//! message through [`FeedError::user_message`]; nothing propagates as a panic.

use serde::Deserialize;

/// Structured JSON error body returned by the marketplace backend.
///
/// The primary shape is:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "Invalid sort field: owner",
///     "details": null
///   }
/// }
/// ```
/// Flat `{ "message": "..." }` and `{ "error": "..." }` bodies are also
/// accepted, see [`extract_error_message`].
#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Deserialize)]
pub struct ErrorBody {
    /// Numeric error code assigned by the backend.
    #[serde(default)]
    pub code: Option<u32>,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(default)]
    pub details: Option<String>,
}

/// Coarse error taxonomy used to decide what the user sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network or transport failure, including timeouts.
    Transport,
    /// Non-2xx HTTP response with a (possibly structured) error body.
    Http,
    /// Malformed or unexpected response shape.
    Malformed,
    /// Known upstream configuration problem (missing or invalid API key).
    UpstreamConfig,
    /// Local failure: invalid query, storage, persistence or configuration.
    Local,
}

/// Pipeline error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          |
/// |-----------|-------------------|
/// | 1000–1999 | Transport         |
/// | 2000–2999 | Upstream response |
/// | 3000–3999 | Local             |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedError {
    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The request could not be sent or the connection failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success status.
    #[error("upstream returned {status}: {message}")]
    Http {
        /// HTTP status code.
        status: u16,
        /// Message extracted from the error body.
        message: String,
    },

    /// The response body did not match the expected schema.
    #[error("malformed response: {0}")]
    Decode(String),

    /// The query cannot be expressed against the chosen source.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// Persisted client state could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),

    /// Database access failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Configuration value is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Known error signatures and the remediation text shown for them.
///
/// A signature matches when the lowercased error text contains every needle.
const KNOWN_SIGNATURES: &[(&[&str], &str)] = &[
    (
        &["invalid", "api key"],
        "The market data provider rejected the configured API key. Check that the key is valid and has not expired.",
    ),
    (
        &["invalid", "api_key"],
        "The market data provider rejected the configured API key. Check that the key is valid and has not expired.",
    ),
    (
        &["api key", "missing"],
        "The market data provider API key is not configured. Add it to the server environment and restart the server.",
    ),
    (
        &["api key", "not set"],
        "The market data provider API key is not configured. Add it to the server environment and restart the server.",
    ),
    (
        &["api_key"],
        "The market data provider API key is not configured. Add it to the server environment and restart the server.",
    ),
    (
        &["rate limit"],
        "The market data provider is rate limiting requests. Wait a moment and try again.",
    ),
];

const GENERIC_MESSAGE: &str = "Something went wrong while loading results. Please try again.";

impl FeedError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Timeout => 1001,
            Self::Transport(_) => 1002,
            Self::Http { .. } => 2001,
            Self::Decode(_) => 2002,
            Self::InvalidQuery(_) => 3001,
            Self::Storage(_) => 3002,
            Self::Persistence(_) => 3003,
            Self::Config(_) => 3004,
        }
    }

    /// Classifies the error into the coarse taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        if self.remediation().is_some() {
            return ErrorKind::UpstreamConfig;
        }
        match self {
            Self::Timeout | Self::Transport(_) => ErrorKind::Transport,
            Self::Http { .. } => ErrorKind::Http,
            Self::Decode(_) => ErrorKind::Malformed,
            Self::InvalidQuery(_) | Self::Storage(_) | Self::Persistence(_) | Self::Config(_) => {
                ErrorKind::Local
            }
        }
    }

    /// Returns remediation text when the error text matches a known
    /// upstream configuration signature.
    #[must_use]
    pub fn remediation(&self) -> Option<&'static str> {
        let text = match self {
            Self::Http { message, .. } => message.to_lowercase(),
            Self::Persistence(message) => message.to_lowercase(),
            _ => return None,
        };
        KNOWN_SIGNATURES
            .iter()
            .find(|(needles, _)| needles.iter().all(|needle| text.contains(needle)))
            .map(|(_, remediation)| *remediation)
    }

    /// Converts the error into text suitable for an inline error panel.
    #[must_use]
    pub fn user_message(&self) -> String {
        if let Some(remediation) = self.remediation() {
            return remediation.to_string();
        }
        match self {
            Self::Timeout => "The request timed out. Check your connection and try again.".to_string(),
            Self::Transport(_) => {
                "Could not reach the marketplace server. Check your connection and try again."
                    .to_string()
            }
            Self::Http { status: 404, .. } => "The requested results could not be found.".to_string(),
            Self::Http { status: 429, .. } => {
                "Too many requests. Wait a moment and try again.".to_string()
            }
            _ => GENERIC_MESSAGE.to_string(),
        }
    }
}

impl From<sqlx::Error> for FeedError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => Self::Timeout,
            sqlx::Error::Io(e) => Self::Transport(e.to_string()),
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                Self::Decode(err.to_string())
            }
            other => Self::Persistence(other.to_string()),
        }
    }
}

/// Extracts the most specific message from an error response body.
///
/// Falls back to the raw (trimmed) body text, or to `fallback` when the
/// body is empty.
#[must_use]
pub fn extract_error_message(body: &str, fallback: &str) -> String {
    if let Ok(structured) = serde_json::from_str::<ErrorResponse>(body) {
        return match structured.error.details {
            Some(details) if !details.is_empty() => {
                format!("{}: {details}", structured.error.message)
            }
            _ => structured.error.message,
        };
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        let flat = value
            .get("message")
            .or_else(|| value.get("error"))
            .and_then(|v| v.as_str());
        if let Some(message) = flat {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
