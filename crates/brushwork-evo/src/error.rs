use brushwork_engine::device::RenderError;
use thiserror::Error;

pub type Result<T, E = EvoError> = std::result::Result<T, E>;

/// Failures raised by the genetic layer and the fitness evaluator.
#[derive(Debug, Error)]
pub enum EvoError {
    /// An index was outside its container.
    #[error("{what} index {index} out of range (len {len})")]
    Bounds {
        what: &'static str,
        index: usize,
        len: usize,
    },

    /// An operation was called on state it does not accept.
    #[error("precondition violated: {0}")]
    PreconditionViolation(String),

    /// Two images or genomes that must agree in shape do not.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// A metric produced NaN or an infinity.
    #[error("metric returned non-finite fitness {0}")]
    NonFiniteFitness(f64),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Render(#[from] RenderError),
}

impl EvoError {
    pub(crate) fn bounds(what: &'static str, index: usize, len: usize) -> Self {
        Self::Bounds { what, index, len }
    }
}
