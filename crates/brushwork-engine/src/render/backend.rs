use std::time::Duration;

use image::RgbaImage;

use crate::coords::Canvas;
use crate::device::RenderError;
use crate::scene::DrawList;

/// Offscreen rendering backend driven by the slot pool.
///
/// One target per render slot. The lifecycle of a single evaluation is
/// `record_commands → submit → wait_fence → map_readback`. Dropping a target
/// releases its backend resources.
///
/// Implementations must be shareable across scoring workers: `wait_fence` and
/// `map_readback` run off the submitting thread.
pub trait OffscreenBackend: Send + Sync + 'static {
    /// Per-slot render target plus its readback memory.
    type Target: Send + Sync + 'static;

    /// Recorded, not yet submitted, work.
    type Commands: Send;

    /// Handle to submitted work; waited on by `wait_fence`.
    type Submission: Send + 'static;

    /// Number of brush textures strokes may reference.
    fn brush_count(&self) -> usize;

    fn create_offscreen_target(&self, canvas: Canvas) -> Result<Self::Target, RenderError>;

    /// Records a clear followed by every stroke of `draw_list`, back to front.
    fn record_commands(
        &self,
        target: &Self::Target,
        draw_list: &DrawList,
    ) -> Result<Self::Commands, RenderError>;

    fn submit(&self, commands: Self::Commands) -> Result<Self::Submission, RenderError>;

    /// Blocks until `submission` completes. `None` waits indefinitely.
    fn wait_fence(
        &self,
        submission: &Self::Submission,
        timeout: Option<Duration>,
    ) -> Result<(), RenderError>;

    /// Reads the target back as tightly packed RGBA8 rows.
    ///
    /// Only meaningful after the fence of the last submission into `target` completed.
    /// `timeout` bounds the wait for the mapping; `None` waits indefinitely.
    fn map_readback(
        &self,
        target: &Self::Target,
        timeout: Option<Duration>,
    ) -> Result<RgbaImage, RenderError>;
}
