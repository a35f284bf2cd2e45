use thiserror::Error;

/// Errors surfaced by the platform transport.
///
/// `Pending` is the transient case: a remote precondition is not yet met and
/// is expected to resolve with bounded waiting. Everything else is fatal for
/// the operation that produced it.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not yet available: {0}")]
    Pending(String),

    #[error("platform rejected operation: {0}")]
    Rejected(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed platform response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Terminal strategy failures, reported up to the owning command.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StrategyError {
    /// The remote platform rejected a phase's operation. Not retried.
    #[error("remote operation `{operation}` failed: {reason}")]
    Remote { operation: String, reason: String },

    /// A waiting phase exceeded its configured wait budget.
    #[error("phase `{phase}` still pending after {attempts} attempts")]
    PolicyExhausted { phase: String, attempts: u32 },
}
