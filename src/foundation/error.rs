/// Convenience result type used across embedframe.
pub type EmbedResult<T> = Result<T, EmbedError>;

/// Error taxonomy for the frame pipeline.
///
/// `ContractViolation` marks caller misuse and is never recovered from. `ResourceUnavailable`
/// marks a recoverable condition: the current frame is dropped and the next vsync proceeds.
#[derive(thiserror::Error, Debug)]
pub enum EmbedError {
    /// A caller or collaborator broke the call protocol (double preroll, await while awaiting...).
    #[error("contract violation: {0}")]
    ContractViolation(String),

    /// A delegate, allocation or present was not available for this frame.
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// Invalid configuration or argument values.
    #[error("validation error: {0}")]
    Validation(String),

    /// Options or fixtures that failed to (de)serialize.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Opaque collaborator failure.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl EmbedError {
    /// Build a [`EmbedError::ContractViolation`].
    pub fn contract(msg: impl Into<String>) -> Self {
        Self::ContractViolation(msg.into())
    }

    /// Build a [`EmbedError::ResourceUnavailable`].
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::ResourceUnavailable(msg.into())
    }

    /// Build a [`EmbedError::Validation`].
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Build a [`EmbedError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }

    /// `true` when the frame can be dropped and the pipeline can continue with the next tick.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ResourceUnavailable(_))
    }

    /// `true` for caller misuse.
    pub fn is_contract_violation(&self) -> bool {
        matches!(self, Self::ContractViolation(_))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/error.rs"]
mod tests;
