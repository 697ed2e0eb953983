//! Evolution configuration, loadable from RON.
//!
//! Every section has defaults, so a config file only needs the fields it changes:
//!
//! ```ron
//! (
//!     population: (min_population_size: 64, seed: Some(7)),
//!     stop: (max_generations: Some(500)),
//! )
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{EvoError, Result};
use crate::worker::MAX_THREADS;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvolutionConfig {
    pub population: PopulationConfig,
    pub evaluator: EvaluatorConfig,
    pub stop: StopConfig,
}

impl EvolutionConfig {
    /// Parses and validates a RON document.
    pub fn from_ron_str(src: &str) -> Result<Self> {
        let config: Self = ron::from_str(src).map_err(|e| EvoError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a RON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .map_err(|e| EvoError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_ron_str(&src)
    }

    pub fn to_ron_string(&self) -> Result<String> {
        ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| EvoError::Config(e.to_string()))
    }

    pub fn validate(&self) -> Result<()> {
        self.population.validate()?;
        self.evaluator.validate()?;
        self.stop.validate()
    }
}

// ── population ────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossoverKind {
    /// Each attribute is taken whole from one parent.
    Uniform,
    /// Each attribute is interpolated between both parents.
    Blend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationConfig {
    pub min_population_size: usize,
    pub attributes_size: usize,
    /// Inclusive `[min, max]` stroke scale.
    pub scale_range: [f32; 2],
    /// Per-attribute chance of re-randomizing a child attribute.
    pub mutation_probability: f64,
    pub crossover: CrossoverKind,
    /// Fixed RNG seed; `None` seeds from the thread RNG.
    pub seed: Option<u64>,
}

impl Default for PopulationConfig {
    fn default() -> Self {
        Self {
            min_population_size: 32,
            attributes_size: 48,
            scale_range: [0.25, 2.0],
            mutation_probability: 0.5,
            crossover: CrossoverKind::Uniform,
            seed: None,
        }
    }
}

impl PopulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_population_size == 0 {
            return Err(EvoError::Config("min_population_size must be at least 1".into()));
        }
        if self.attributes_size == 0 {
            return Err(EvoError::Config("attributes_size must be at least 1".into()));
        }
        let [lo, hi] = self.scale_range;
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return Err(EvoError::Config(format!(
                "scale_range must satisfy 0 < min <= max, got [{lo}, {hi}]"
            )));
        }
        if !(0.0..=1.0).contains(&self.mutation_probability) {
            return Err(EvoError::Config(format!(
                "mutation_probability must be in [0, 1], got {}",
                self.mutation_probability
            )));
        }
        Ok(())
    }
}

// ── evaluator ─────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MetricKind {
    SquaredError,
    AbsoluteError,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Render slots cycled across the population.
    pub slot_count: usize,
    /// Scoring worker threads; clamped to `[1, MAX_THREADS]`.
    pub max_threads: usize,
    pub metric: MetricKind,
    /// Bound on each backend fence wait. `None` waits indefinitely.
    pub fence_timeout_ms: Option<u64>,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            slot_count: brushwork_engine::render::MAX_FRAMES_IN_FLIGHT,
            max_threads: MAX_THREADS,
            metric: MetricKind::SquaredError,
            fence_timeout_ms: None,
        }
    }
}

impl EvaluatorConfig {
    pub fn validate(&self) -> Result<()> {
        if self.slot_count == 0 {
            return Err(EvoError::Config("slot_count must be at least 1".into()));
        }
        if self.fence_timeout_ms == Some(0) {
            return Err(EvoError::Config("fence_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    #[inline]
    pub fn effective_threads(&self) -> usize {
        self.max_threads.clamp(1, MAX_THREADS)
    }

    #[inline]
    pub fn fence_timeout(&self) -> Option<std::time::Duration> {
        self.fence_timeout_ms.map(std::time::Duration::from_millis)
    }
}

// ── stop ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopConfig {
    pub max_generations: Option<u64>,
    /// Stop once the best genome reaches this fitness, in `[0, 1]`.
    pub target_fitness: Option<f64>,
}

impl Default for StopConfig {
    fn default() -> Self {
        Self {
            max_generations: Some(1000),
            target_fitness: None,
        }
    }
}

impl StopConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_generations.is_none() && self.target_fitness.is_none() {
            return Err(EvoError::Config(
                "stop needs max_generations or target_fitness".into(),
            ));
        }
        if self.max_generations == Some(0) {
            return Err(EvoError::Config("max_generations must be at least 1".into()));
        }
        if let Some(t) = self.target_fitness {
            if !(0.0..=1.0).contains(&t) {
                return Err(EvoError::Config(format!("target_fitness must be in [0, 1], got {t}")));
            }
        }
        Ok(())
    }
}
