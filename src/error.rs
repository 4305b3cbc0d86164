use thiserror::Error;

use crate::gate::kdf::KdfError;

// ─── Gate errors ─────────────────────────────────────────────────────────────

/// Error taxonomy for the auth gate.
///
/// Handlers map these onto HTTP classes: `Validation` → 400,
/// `Authentication` → 401, `RateLimited` → 429, everything else → 500.
/// Authentication failures carry no detail on purpose — callers must not be
/// able to tell *which* check failed.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("invalid password")]
    Authentication,

    #[error("too many attempts")]
    RateLimited,

    #[error("kdf: {0}")]
    Kdf(#[from] KdfError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

// ─── Config errors ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load config: {0}")]
    Load(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
