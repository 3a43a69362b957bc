use thiserror::Error;

/// Errors surfaced by model construction and simulation.
#[derive(Debug, Error)]
pub enum SimError {
    /// The network definition is inconsistent (unknown species, duplicate
    /// names, negative rate constants, ...).
    #[error("model error: {0}")]
    Model(String),

    /// A simulation option or algorithm parameter failed validation before
    /// any trial ran.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A leaping variant exhausted its contraction budget while trying to
    /// avoid a negative population. `time` is the last valid simulation time
    /// of the aborted trial.
    #[error("leap contraction budget exhausted at t = {time}")]
    RetryExhausted { time: f64 },

    #[error("thread pool error: {0}")]
    ThreadPool(String),
}
