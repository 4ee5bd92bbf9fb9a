use thiserror::Error;

/// Top-level error type for the `ecolearn-api` crate.
///
/// Covers every failure mode of the admin endpoints: transport, HTTP
/// status, the `{status: "error", message}` envelope, and body decoding.
/// `ecolearn-core` maps these into clonable, user-facing variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS or client construction error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Server ──────────────────────────────────────────────────────
    /// Non-2xx response from the backend.
    #[error("HTTP {status} from {url}")]
    Http {
        status: u16,
        url: String,
        body: String,
    },

    /// The backend answered with `{"status": "error", "message": ...}`.
    #[error("API error: {message}")]
    Api { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the backend reported the resource as missing.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Http { status: 404, .. } => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Http {
            status: 503,
            url: "http://localhost/admin/asset-counts".into(),
            body: String::new(),
        };
        assert!(err.is_transient());
    }

    #[test]
    fn api_envelope_errors_are_not_transient() {
        let err = Error::Api {
            message: "Card not found".into(),
        };
        assert!(!err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_status() {
        let err = Error::Http {
            status: 404,
            url: "http://localhost/admin/cards-minimal".into(),
            body: "missing".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }
}
