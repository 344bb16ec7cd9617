use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// A business rule rejected the request before anything was mutated.
    /// The message is end-user presentable; retrying with corrected input is safe.
    #[error("{0}")]
    Veto(String),
    /// A history lookup named a record that does not exist for the entity.
    #[error("history record not found")]
    RecordNotFound,
    /// A stored text delta no longer applies to the current value. Signals
    /// history corruption and must be surfaced, never skipped.
    #[error("corrupt delta: {0}")]
    CorruptDelta(String),
    /// The caller passed internally inconsistent arguments. Programmer error,
    /// not user-recoverable.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
    /// An ordering operation was attempted on a container without an explicit
    /// child order.
    #[error("this container does not support ordering")]
    UnorderedContainer,
    /// The document cannot be represented by the flattener.
    #[error("invalid document: {0}")]
    InvalidDocument(String),
    #[error("storage error: {0}")]
    Storage(String),
}
