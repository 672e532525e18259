use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Result alias for errors emitted by ctxflow internals.
pub type CtxflowResult<T> = Result<T, CtxflowError>;

/// Structured error type for ctxflow subsystems.
///
/// Analysis itself never fails on unresolvable code; these errors come from
/// configuration that is rejected before any walk starts.
#[derive(Debug, Error)]
pub enum CtxflowError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid derivation requirement `{text}`: {reason}")]
    Derivation { text: String, reason: String },

    #[error("invalid spawner spec `{spec}`: {reason}")]
    Spawner { spec: String, reason: String },
}

impl CtxflowError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn derivation(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Derivation {
            text: text.into(),
            reason: reason.into(),
        }
    }

    pub fn spawner(spec: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Spawner {
            spec: spec.into(),
            reason: reason.into(),
        }
    }

    /// Convert to anyhow::Error for interop with anyhow-based code.
    pub fn into_anyhow(self) -> AnyhowError {
        AnyhowError::new(self)
    }
}
