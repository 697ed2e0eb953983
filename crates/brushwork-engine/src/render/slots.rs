//! Bounded pool of reusable offscreen render slots.
//!
//! A population is much larger than the slot count, so slots are cycled: genome
//! `i` renders into slot `i mod n`. Each slot carries a CPU [`Fence`] that is
//! signaled while the slot is free; recording blocks on it, so a slot is never
//! re-recorded while a previous evaluation still owns it.
//!
//! Lifecycle per slot: `Idle → Recording → Submitted → Signaled → Idle`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::RgbaImage;

use crate::coords::Canvas;
use crate::device::{Fence, RenderError};
use crate::render::OffscreenBackend;
use crate::scene::DrawList;

/// Default number of frames in flight.
pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

/// Index of a slot inside its pool.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct SlotId(pub usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Recording,
    Submitted,
    Signaled,
}

impl SlotState {
    pub fn as_str(self) -> &'static str {
        match self {
            SlotState::Idle => "idle",
            SlotState::Recording => "recording",
            SlotState::Submitted => "submitted",
            SlotState::Signaled => "signaled",
        }
    }
}

#[derive(Debug)]
struct SlotStatus {
    state: SlotState,
    owner: Option<usize>,
}

struct RenderSlot<T> {
    target: T,
    fence: Fence,
    status: Mutex<SlotStatus>,
}

impl<T> RenderSlot<T> {
    fn status(&self) -> MutexGuard<'_, SlotStatus> {
        self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Fixed set of render slots over one backend and one canvas.
///
/// Shared by reference between the recording thread and scoring workers.
pub struct SlotPool<B: OffscreenBackend> {
    backend: Arc<B>,
    canvas: Canvas,
    slots: Vec<RenderSlot<B::Target>>,
}

impl<B: OffscreenBackend> SlotPool<B> {
    /// Creates `slot_count` targets, each with a signaled fence and no owner.
    pub fn new(backend: Arc<B>, canvas: Canvas, slot_count: usize) -> Result<Self, RenderError> {
        if slot_count == 0 {
            return Err(RenderError::resource("slot pool", "slot count must be at least 1"));
        }
        let slots = (0..slot_count)
            .map(|_| {
                Ok(RenderSlot {
                    target: backend.create_offscreen_target(canvas)?,
                    fence: Fence::new(true),
                    status: Mutex::new(SlotStatus { state: SlotState::Idle, owner: None }),
                })
            })
            .collect::<Result<Vec<_>, RenderError>>()?;

        log::debug!(
            "slot pool: {slot_count} slots of {}x{}",
            canvas.extent.width,
            canvas.extent.height
        );
        Ok(Self { backend, canvas, slots })
    }

    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    #[inline]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Slot that evaluation `index` renders into.
    #[inline]
    pub fn acquire_slot(&self, index: usize) -> SlotId {
        SlotId(index % self.slots.len())
    }

    fn slot(&self, id: SlotId) -> Result<&RenderSlot<B::Target>, RenderError> {
        self.slots.get(id.0).ok_or(RenderError::SlotState {
            slot: id.0,
            expected: "a pool slot",
            actual: "out of range",
        })
    }

    fn expect_state(id: SlotId, status: &SlotStatus, expected: SlotState) -> Result<(), RenderError> {
        if status.state == expected {
            Ok(())
        } else {
            Err(RenderError::SlotState {
                slot: id.0,
                expected: expected.as_str(),
                actual: status.state.as_str(),
            })
        }
    }

    /// Waits for the slot to be released, then records `draw_list` for `owner`.
    ///
    /// Blocks while a previous evaluation owns the slot.
    pub fn record(
        &self,
        id: SlotId,
        owner: usize,
        draw_list: &DrawList,
    ) -> Result<B::Commands, RenderError> {
        let slot = self.slot(id)?;
        slot.fence.wait();
        {
            let mut status = slot.status();
            Self::expect_state(id, &status, SlotState::Idle)?;
            status.state = SlotState::Recording;
            status.owner = Some(owner);
            slot.fence.reset();
        }
        log::trace!("slot {} recording genome {owner}", id.0);

        match self.backend.record_commands(&slot.target, draw_list) {
            Ok(commands) => Ok(commands),
            Err(e) => {
                self.abandon(id);
                Err(e)
            }
        }
    }

    pub fn submit(&self, id: SlotId, commands: B::Commands) -> Result<B::Submission, RenderError> {
        let slot = self.slot(id)?;
        Self::expect_state(id, &slot.status(), SlotState::Recording)?;

        match self.backend.submit(commands) {
            Ok(submission) => {
                slot.status().state = SlotState::Submitted;
                log::trace!("slot {} submitted", id.0);
                Ok(submission)
            }
            Err(e) => {
                self.abandon(id);
                Err(e)
            }
        }
    }

    /// Blocks on the backend fence of `submission`. `None` waits indefinitely.
    pub fn wait(
        &self,
        id: SlotId,
        submission: &B::Submission,
        timeout: Option<Duration>,
    ) -> Result<(), RenderError> {
        let slot = self.slot(id)?;
        Self::expect_state(id, &slot.status(), SlotState::Submitted)?;
        self.backend.wait_fence(submission, timeout)?;
        slot.status().state = SlotState::Signaled;
        log::trace!("slot {} signaled", id.0);
        Ok(())
    }

    /// Reads the slot's target back. Only valid once its submission signaled.
    /// `None` waits indefinitely for the mapping.
    pub fn read_back(&self, id: SlotId, timeout: Option<Duration>) -> Result<RgbaImage, RenderError> {
        let slot = self.slot(id)?;
        Self::expect_state(id, &slot.status(), SlotState::Signaled)?;
        self.backend.map_readback(&slot.target, timeout)
    }

    /// Returns a signaled slot to the pool and wakes a blocked recorder.
    pub fn release(&self, id: SlotId) -> Result<(), RenderError> {
        let slot = self.slot(id)?;
        {
            let mut status = slot.status();
            Self::expect_state(id, &status, SlotState::Signaled)?;
            status.state = SlotState::Idle;
            status.owner = None;
        }
        slot.fence.signal();
        log::trace!("slot {} released", id.0);
        Ok(())
    }

    /// Forces a slot back to `Idle` from any state. Used on error paths.
    ///
    /// Work already submitted into the slot may still be running on the backend;
    /// the next `record` overwrites its output.
    pub fn abandon(&self, id: SlotId) {
        let Some(slot) = self.slots.get(id.0) else { return };
        {
            let mut status = slot.status();
            if status.state != SlotState::Idle {
                log::trace!("slot {} abandoned while {}", id.0, status.state.as_str());
            }
            status.state = SlotState::Idle;
            status.owner = None;
        }
        slot.fence.signal();
    }

    pub fn state(&self, id: SlotId) -> Option<SlotState> {
        self.slots.get(id.0).map(|s| s.status().state)
    }

    /// Owning evaluation index per slot; `None` for free slots.
    pub fn images_in_flight(&self) -> Vec<Option<usize>> {
        self.slots.iter().map(|s| s.status().owner).collect()
    }

    /// Blocks until every slot is free.
    pub fn wait_idle(&self) {
        for slot in &self.slots {
            slot.fence.wait();
        }
    }

    /// Whether every slot is free right now.
    pub fn is_idle(&self) -> bool {
        self.slots.iter().all(|s| s.fence.is_signaled())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coords::{ColorRgba, Extent, Vec2};
    use crate::render::{BrushSet, SoftwareBackend};
    use crate::scene::StrokeCmd;
    use std::thread;

    fn pool(slots: usize) -> SlotPool<SoftwareBackend> {
        let backend = Arc::new(SoftwareBackend::new(BrushSet::procedural(2, 8)));
        SlotPool::new(backend, Canvas::from_extent(Extent::new(16, 16)), slots).unwrap()
    }

    fn one_stroke() -> DrawList {
        let mut list = DrawList::new();
        list.push(StrokeCmd {
            center: Vec2::new(8.0, 8.0),
            scale: 1.0,
            rotation: 0.0,
            color: ColorRgba::black(),
            brush: 0,
        });
        list
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn zero_slots_is_rejected() {
        let backend = Arc::new(SoftwareBackend::new(BrushSet::procedural(1, 8)));
        let canvas = Canvas::from_extent(Extent::new(4, 4));
        assert!(SlotPool::new(backend, canvas, 0).is_err());
    }

    #[test]
    fn new_pool_is_idle_with_no_owners() {
        let pool = pool(MAX_FRAMES_IN_FLIGHT);
        assert!(pool.is_idle());
        assert_eq!(pool.images_in_flight(), vec![None; 3]);
    }

    #[test]
    fn acquire_cycles_modulo_slot_count() {
        let pool = pool(3);
        let ids: Vec<_> = (0..7).map(|i| pool.acquire_slot(i).0).collect();
        assert_eq!(ids, [0, 1, 2, 0, 1, 2, 0]);
    }

    // ── lifecycle ─────────────────────────────────────────────────────────

    #[test]
    fn full_lifecycle_returns_slot_to_idle() {
        let pool = pool(3);
        let id = pool.acquire_slot(4);
        let cmds = pool.record(id, 4, &DrawList::new()).unwrap();
        assert_eq!(pool.state(id), Some(SlotState::Recording));
        assert_eq!(pool.images_in_flight()[1], Some(4));

        let sub = pool.submit(id, cmds).unwrap();
        assert_eq!(pool.state(id), Some(SlotState::Submitted));
        pool.wait(id, &sub, None).unwrap();
        assert_eq!(pool.state(id), Some(SlotState::Signaled));

        let img = pool.read_back(id, None).unwrap();
        assert_eq!(img.dimensions(), (16, 16));
        pool.release(id).unwrap();
        assert_eq!(pool.state(id), Some(SlotState::Idle));
        assert!(pool.is_idle());
    }

    #[test]
    fn read_back_before_signal_is_rejected() {
        let pool = pool(1);
        let id = pool.acquire_slot(0);
        let cmds = pool.record(id, 0, &DrawList::new()).unwrap();
        let _sub = pool.submit(id, cmds).unwrap();
        assert!(matches!(
            pool.read_back(id, None),
            Err(RenderError::SlotState { expected: "signaled", actual: "submitted", .. })
        ));
    }

    #[test]
    fn record_error_abandons_slot() {
        let pool = pool(1);
        let id = pool.acquire_slot(0);
        let mut bad = one_stroke();
        bad.push(StrokeCmd { brush: 9, ..bad.strokes()[0] });
        assert!(pool.record(id, 0, &bad).is_err());
        assert_eq!(pool.state(id), Some(SlotState::Idle));
        assert!(pool.is_idle());
    }

    #[test]
    fn readback_contains_recorded_strokes() {
        let pool = pool(1);
        let id = pool.acquire_slot(0);
        let cmds = pool.record(id, 0, &one_stroke()).unwrap();
        let sub = pool.submit(id, cmds).unwrap();
        pool.wait(id, &sub, None).unwrap();
        let img = pool.read_back(id, None).unwrap();
        assert_eq!(img.get_pixel(8, 8).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [255, 255, 255, 255]);
    }

    // ── fences ────────────────────────────────────────────────────────────

    #[test]
    fn record_blocks_until_previous_owner_releases() {
        let pool = Arc::new(pool(1));
        let id = pool.acquire_slot(0);
        let cmds = pool.record(id, 0, &DrawList::new()).unwrap();
        let sub = pool.submit(id, cmds).unwrap();

        let releaser = {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(30));
                pool.wait(id, &sub, None).unwrap();
                pool.release(id).unwrap();
            })
        };

        // Same slot for genome 1; must not proceed until genome 0 released it.
        let cmds = pool.record(pool.acquire_slot(1), 1, &DrawList::new()).unwrap();
        assert_eq!(pool.images_in_flight(), vec![Some(1)]);
        drop(cmds);
        releaser.join().unwrap();
        pool.abandon(id);
    }

    #[test]
    fn abandon_unblocks_waiters() {
        let pool = pool(2);
        let id = pool.acquire_slot(1);
        let _cmds = pool.record(id, 1, &DrawList::new()).unwrap();
        assert!(!pool.is_idle());
        pool.abandon(id);
        pool.wait_idle();
        assert_eq!(pool.images_in_flight(), vec![None, None]);
    }
}
