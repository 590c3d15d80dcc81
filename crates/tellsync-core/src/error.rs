// ── Core error types ──
//
// Domain-facing errors from tellsync-core. Consumers never see HTTP
// status codes or JSON parse failures directly; the
// `From<tellsync_api::Error>` impl sorts transport-layer errors into
// transient connection failures, remote errors, and configuration
// problems.

use thiserror::Error;

use crate::registry::RegistryError;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Configuration ────────────────────────────────────────────────
    /// Invalid configuration; surfaces at construction only.
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Remote interaction ───────────────────────────────────────────
    /// Connection-level failure, no HTTP status received. Transient.
    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    /// The remote service answered, but with an error status or an
    /// undecodable body.
    #[error("Remote API error: {message}")]
    Remote {
        message: String,
        status: Option<u16>,
    },

    /// Successful response whose payload matched no known schema.
    #[error("Unexpected response shape: {context}")]
    UnexpectedResponse { context: String },

    // ── Local collaborators ──────────────────────────────────────────
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Connection-level failures are retried once immediately before the
    /// normal reschedule; everything else is log-only.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<tellsync_api::Error> for CoreError {
    fn from(err: tellsync_api::Error) -> Self {
        match err {
            tellsync_api::Error::Transport(ref e) if e.is_timeout() || e.is_connect() => {
                CoreError::Connection {
                    reason: e.to_string(),
                }
            }
            tellsync_api::Error::Transport(e) => CoreError::Remote {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            },
            tellsync_api::Error::Api { status, body } => CoreError::Remote {
                message: body,
                status: Some(status),
            },
            // Malformed JSON from the remote is a remote error, not ours.
            tellsync_api::Error::Deserialization { message, body: _ } => CoreError::Remote {
                message,
                status: None,
            },
            tellsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("invalid URL: {e}"),
            },
            tellsync_api::Error::Tls(msg) => CoreError::Config {
                message: format!("TLS setup failed: {msg}"),
            },
            tellsync_api::Error::Signing(msg) => CoreError::Config {
                message: format!("request signing failed: {msg}"),
            },
        }
    }
}
