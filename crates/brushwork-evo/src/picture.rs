//! Fitness evaluator: renders every genome through the slot pool and scores it.
//!
//! One `run` pass walks the population in index order. Genome `i` renders into
//! slot `i mod slot_count`; recording blocks until the slot's previous owner has
//! been scored and released, so at most `slot_count` frames are in flight. Scoring
//! (fence wait, readback, metric) runs on the worker pool. `wait_thread` is the
//! join barrier that writes every fitness back by index.

use std::sync::Arc;
use std::time::Duration;

use brushwork_engine::coords::Canvas;
use brushwork_engine::render::{OffscreenBackend, SlotId, SlotPool};
use brushwork_engine::scene::DrawList;
use image::RgbaImage;

use crate::config::EvaluatorConfig;
use crate::error::{EvoError, Result};
use crate::genome::Genome;
use crate::population::Population;
use crate::scoring::FitnessMetric;
use crate::worker::WorkerPool;

/// Result of scoring one frame.
#[derive(Debug)]
pub struct FrameScore {
    pub fitness: f64,
    /// The readback, kept only for the top genome's frame.
    pub image: Option<RgbaImage>,
}

/// Outcome of one `run` + `wait_thread` pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PassSummary {
    pub evaluated: usize,
    pub best_fitness: Option<f64>,
}

/// Everything a worker needs to score one submitted frame.
struct FrameJob<B: OffscreenBackend> {
    pool: Arc<SlotPool<B>>,
    slot: SlotId,
    submission: B::Submission,
    target: Arc<RgbaImage>,
    previous_best: Option<Arc<RgbaImage>>,
    metric: Arc<dyn FitnessMetric>,
    is_top: bool,
    fence_timeout: Option<Duration>,
}

pub struct Picture<B: OffscreenBackend> {
    pool: Arc<SlotPool<B>>,
    workers: WorkerPool<FrameScore>,
    metric: Arc<dyn FitnessMetric>,
    fence_timeout: Option<Duration>,
    draw_list: DrawList,
    best_image: Option<Arc<RgbaImage>>,
}

impl<B: OffscreenBackend> Picture<B> {
    /// Creates the slot pool (fences and in-flight table) and the scoring workers.
    pub fn new(backend: Arc<B>, canvas: Canvas, config: &EvaluatorConfig) -> Result<Self> {
        config.validate()?;
        let pool = SlotPool::new(backend, canvas, config.slot_count)?;
        let workers = WorkerPool::new(config.effective_threads())?;
        log::info!(
            "evaluator: {} slots, {} scoring threads, {:?}",
            pool.slot_count(),
            workers.thread_count(),
            config.metric
        );
        Ok(Self {
            pool: Arc::new(pool),
            workers,
            metric: Arc::from(config.metric.metric()),
            fence_timeout: config.fence_timeout(),
            draw_list: DrawList::new(),
            best_image: None,
        })
    }

    /// Replaces the scoring metric.
    pub fn with_metric(mut self, metric: Arc<dyn FitnessMetric>) -> Self {
        self.metric = metric;
        self
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        self.pool.canvas()
    }

    #[inline]
    pub fn slot_pool(&self) -> &SlotPool<B> {
        &self.pool
    }

    /// Champion render from the last pass's top frame.
    pub fn best_image(&self) -> Option<&RgbaImage> {
        self.best_image.as_deref()
    }

    /// Rebuilds the slot pool for a new canvas. Rejected while a pass is in flight.
    pub fn resize(&mut self, canvas: Canvas) -> Result<()> {
        if self.workers.outstanding() > 0 {
            return Err(EvoError::PreconditionViolation(
                "cannot resize while frames are in flight".into(),
            ));
        }
        let backend = Arc::clone(self.pool.backend());
        let slot_count = self.pool.slot_count();
        self.pool = Arc::new(SlotPool::new(backend, canvas, slot_count)?);
        self.best_image = None;
        log::debug!("evaluator resized to {}x{}", canvas.extent.width, canvas.extent.height);
        Ok(())
    }

    // ── render ────────────────────────────────────────────────────────────

    /// Renders and dispatches scoring for every genome. Genome 0 is the top frame.
    ///
    /// Fitness is only valid after [`wait_thread`](Self::wait_thread).
    pub fn run(&mut self, population: &Population, target: &Arc<RgbaImage>) -> Result<()> {
        let extent = self.pool.canvas().extent;
        if target.dimensions() != (extent.width, extent.height) {
            return Err(EvoError::DimensionMismatch(format!(
                "target is {}x{}, canvas is {}x{}",
                target.width(),
                target.height(),
                extent.width,
                extent.height
            )));
        }

        for (i, genome) in population.iter().enumerate() {
            if let Err(e) = self.draw_frame(i, genome, target, i == 0) {
                // Drain what is already running so no worker outlives the pass.
                self.workers.wait();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Records, submits and dispatches scoring for genome `index`.
    ///
    /// Blocks while the slot `index mod slot_count` is still owned by an earlier frame.
    pub fn draw_frame(
        &mut self,
        index: usize,
        genome: &Genome,
        target: &Arc<RgbaImage>,
        is_top: bool,
    ) -> Result<()> {
        let slot = self.pool.acquire_slot(index);
        Self::record_command_buffer(genome, &mut self.draw_list);
        let commands = self.pool.record(slot, index, &self.draw_list)?;
        let submission = self.pool.submit(slot, commands)?;

        let job = FrameJob {
            pool: Arc::clone(&self.pool),
            slot,
            submission,
            target: Arc::clone(target),
            previous_best: self.best_image.clone(),
            metric: Arc::clone(&self.metric),
            is_top,
            fence_timeout: self.fence_timeout,
        };
        self.workers.dispatch(index, move || Self::calculate_fitness(job));
        Ok(())
    }

    /// Worker side of a frame: fence wait, readback, score, release.
    ///
    /// Any failure abandons the slot so the recording thread cannot block on it.
    fn calculate_fitness(job: FrameJob<B>) -> Result<FrameScore> {
        let FrameJob {
            pool,
            slot,
            submission,
            target,
            previous_best,
            metric,
            is_top,
            fence_timeout,
        } = job;

        let scored = (|| -> Result<FrameScore> {
            pool.wait(slot, &submission, fence_timeout)?;
            let image = pool.read_back(slot, fence_timeout)?;
            let fitness = metric.score_against(&image, &target, previous_best.as_deref())?;
            if !fitness.is_finite() {
                return Err(EvoError::NonFiniteFitness(fitness));
            }
            pool.release(slot)?;
            Ok(FrameScore { fitness, image: is_top.then_some(image) })
        })();

        if scored.is_err() {
            pool.abandon(slot);
        }
        scored
    }

    /// Renders one genome synchronously through slot 0 and returns the readback.
    ///
    /// Only valid between passes.
    pub fn render(&mut self, genome: &Genome) -> Result<RgbaImage> {
        if self.workers.outstanding() > 0 {
            return Err(EvoError::PreconditionViolation(
                "cannot render while frames are in flight".into(),
            ));
        }
        let slot = self.pool.acquire_slot(0);
        Self::record_command_buffer(genome, &mut self.draw_list);
        let commands = self.pool.record(slot, 0, &self.draw_list)?;
        let rendered = self
            .pool
            .submit(slot, commands)
            .and_then(|submission| self.pool.wait(slot, &submission, self.fence_timeout))
            .and_then(|()| self.pool.read_back(slot, self.fence_timeout));
        match rendered {
            Ok(image) => {
                self.pool.release(slot)?;
                Ok(image)
            }
            Err(e) => {
                self.pool.abandon(slot);
                Err(e.into())
            }
        }
    }

    // ── join ──────────────────────────────────────────────────────────────

    /// Join barrier. Writes each frame's fitness into its genome by index.
    ///
    /// Successful results are written even when another frame failed; the first
    /// failure is then returned. Non-finite scores count as failures and leave
    /// the genome's previous fitness in place.
    pub fn wait_thread(&mut self, population: &mut Population) -> Result<PassSummary> {
        let mut first_error = None;
        let mut evaluated = 0;
        let mut best: Option<f64> = None;

        for (index, result) in self.workers.wait() {
            match result {
                Ok(score) => {
                    population.get_mut(index)?.set_fitness(score.fitness);
                    if let Some(image) = score.image {
                        self.best_image = Some(Arc::new(image));
                    }
                    best = Some(best.map_or(score.fitness, |b| b.max(score.fitness)));
                    evaluated += 1;
                }
                Err(e) => {
                    log::warn!("genome {index} failed to score: {e}");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(PassSummary { evaluated, best_fitness: best }),
        }
    }

    // ── command recording ─────────────────────────────────────────────────

    /// One draw list per genome, in population order.
    pub fn record_command_buffers(population: &Population) -> Vec<DrawList> {
        population
            .iter()
            .map(|genome| {
                let mut list = DrawList::with_capacity(genome.len());
                Self::record_command_buffer(genome, &mut list);
                list
            })
            .collect()
    }

    /// Replaces `list` with one textured, colored quad per attribute of `genome`.
    pub fn record_command_buffer(genome: &Genome, list: &mut DrawList) {
        list.clear();
        genome.draw_into(list);
    }
}
