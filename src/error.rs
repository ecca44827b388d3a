use thiserror::Error;

/// Errors surfaced by the exchange.
///
/// Full and empty buffers are not errors, and neither is a sell order that
/// would drive a stock below zero. Only startup problems and worker
/// failures reach the caller.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ExchangeError {
    /// A configuration value is out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// An order could not be constructed
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The operating system refused to start a worker thread
    #[error("Failed to spawn {role} {id}: {source}")]
    Spawn {
        role: &'static str,
        id: usize,
        #[source]
        source: std::io::Error,
    },

    /// No trader could be started, so no order would ever complete
    #[error("No trader thread could be started ({failed} spawn failures)")]
    NoTraders { failed: usize },

    /// A worker thread panicked before finishing its work
    #[error("{role} {id} panicked")]
    WorkerPanicked { role: &'static str, id: usize },
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ExchangeError>;
