use thiserror::Error;

/// Top-level error type for the `tellsync-api` crate.
///
/// Covers every failure mode across both API surfaces: the Telldus Live
/// JSON API and the EmonCMS input sink. `tellsync-core` maps these into
/// domain-appropriate variants.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Remote API ──────────────────────────────────────────────────
    /// Non-success HTTP status from the remote service.
    #[error("Remote API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Signing ─────────────────────────────────────────────────────
    /// OAuth signature or header construction failed.
    #[error("Request signing failed: {0}")]
    Signing(String),
}

impl Error {
    /// Returns `true` for connection-level failures worth an immediate
    /// retry (no HTTP status was ever received).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}
