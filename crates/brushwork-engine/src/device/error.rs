use thiserror::Error;

/// Failures raised by render backends and the slot pool.
///
/// None of these are retried inside the engine. `ResourceCreation` and
/// `Submission` are fatal for the current generation; callers restart or exit.
#[derive(Debug, Error)]
pub enum RenderError {
    /// A backend object (texture, buffer, pipeline, target) could not be created.
    #[error("failed to create {what}: {reason}")]
    ResourceCreation { what: &'static str, reason: String },

    /// Command submission or device polling failed.
    #[error("submission failed: {0}")]
    Submission(String),

    /// A bounded fence wait expired.
    #[error("fence wait timed out after {0:?}")]
    FenceTimeout(std::time::Duration),

    /// Mapping the readback memory failed.
    #[error("readback failed: {0}")]
    Readback(String),

    /// A slot operation was attempted in the wrong lifecycle state.
    #[error("slot {slot} is {actual}, expected {expected}")]
    SlotState {
        slot: usize,
        expected: &'static str,
        actual: &'static str,
    },

    /// A stroke or lookup named a brush texture that does not exist.
    #[error("brush index {index} out of range (have {count})")]
    BrushOutOfRange { index: u32, count: usize },
}

impl RenderError {
    pub(crate) fn resource(what: &'static str, reason: impl std::fmt::Display) -> Self {
        Self::ResourceCreation { what, reason: reason.to_string() }
    }
}
