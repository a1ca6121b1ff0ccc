use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, LemmaError>;

/// Errors raised by the annotation storage engine.
///
/// All variants are unrecoverable at the point they are raised: the engine
/// performs no internal retry and never substitutes a default beyond the
/// documented no-entry semantics.
#[derive(Debug, Error)]
pub enum LemmaError {
    /// A single-key storage received a key other than its configured key.
    #[error("invalid annotation key: {0}")]
    InvalidKey(String),
    /// A typed accessor not implemented by the concrete storage was invoked.
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    /// A value of one kind was applied to a slot holding an incompatible kind.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),
    /// Lifecycle misuse: double bind, unmatched unbind, unbound access.
    #[error("illegal state: {0}")]
    IllegalState(&'static str),
    /// A layer manifest failed to parse or validate.
    #[error("manifest error: {0}")]
    Manifest(String),
}

pub(crate) fn unsupported_get(kind: &str, key: &str) -> LemmaError {
    LemmaError::Unsupported(format!("no {kind} values stored for key `{key}`"))
}

pub(crate) fn unsupported_set(kind: &str, key: &str) -> LemmaError {
    LemmaError::Unsupported(format!("cannot store {kind} values for key `{key}`"))
}
