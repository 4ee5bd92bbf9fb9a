// ── Core error types ──
//
// User-facing errors from ecolearn-core. These are NOT HTTP-specific;
// the `From<ecolearn_api::Error>` impl translates transport failures into
// domain variants. `CoreError` is `Clone` because one failed fetch is
// handed to every caller that joined it.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach asset API at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to asset API timed out")]
    Timeout,

    // ── Remote errors ────────────────────────────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    #[error("Unexpected payload: {message}")]
    InvalidPayload { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Item not found: {id}")]
    ItemNotFound { id: String },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Controller is not initialized")]
    NotReady,

    #[error("Controller has been disposed")]
    Disposed,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures a retry may resolve.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout => true,
            Self::Api {
                status: Some(status),
                ..
            } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<ecolearn_api::Error> for CoreError {
    fn from(err: ecolearn_api::Error) -> Self {
        match err {
            ecolearn_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    Self::Timeout
                } else if e.is_connect() || e.is_request() {
                    Self::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    Self::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            ecolearn_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            ecolearn_api::Error::Tls(msg) => Self::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            ecolearn_api::Error::Http { status, url, .. } => Self::Api {
                message: format!("HTTP {status} from {url}"),
                status: Some(status),
            },
            ecolearn_api::Error::Api { message } => Self::Api {
                message,
                status: None,
            },
            ecolearn_api::Error::Deserialization { message, body: _ } => {
                Self::InvalidPayload { message }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_status_maps_to_api_error() {
        let err = CoreError::from(ecolearn_api::Error::Http {
            status: 503,
            url: "http://localhost/admin/asset-repository".into(),
            body: String::new(),
        });
        assert_eq!(
            err,
            CoreError::Api {
                message: "HTTP 503 from http://localhost/admin/asset-repository".into(),
                status: Some(503),
            }
        );
        assert!(err.is_transient());
    }

    #[test]
    fn envelope_error_is_permanent() {
        let err = CoreError::from(ecolearn_api::Error::Api {
            message: "Invalid image".into(),
        });
        assert!(!err.is_transient());
    }

    #[test]
    fn decode_failure_is_invalid_payload() {
        let err = CoreError::from(ecolearn_api::Error::Deserialization {
            message: "expected value".into(),
            body: "<html>".into(),
        });
        assert!(matches!(err, CoreError::InvalidPayload { .. }));
    }
}
