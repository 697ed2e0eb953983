//! Brushwork evolution crate.
//!
//! Genetic search over brush-stroke paintings. Each generation every genome is
//! rendered through a bounded pool of offscreen render slots, scored against a
//! target image on worker threads, sorted, and the lower half is replaced by
//! mutated children of the top survivors.
//!
//! Typical driver:
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use brushwork_engine::coords::{Canvas, Extent};
//! # use brushwork_engine::render::{BrushSet, OffscreenBackend, SoftwareBackend};
//! # use brushwork_evo::*;
//! # fn main() -> Result<(), EvoError> {
//! let config = EvolutionConfig::default();
//! let target = image::RgbaImage::new(64, 64);
//! let canvas = Canvas::from_extent(Extent::new(64, 64));
//! let backend = Arc::new(SoftwareBackend::new(BrushSet::procedural(6, 32)));
//! let domain = StrokeDomain::from_config(canvas, backend.brush_count(), &config.population)?;
//! let population = Population::new(&config.population, domain)?;
//! let picture = Picture::new(backend, canvas, &config.evaluator)?;
//! let mut evolution = Evolution::new(population, picture, target)?;
//! evolution.run_until(StopPolicy::from(&config.stop), |_| {})?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod evolution;
pub mod genome;
pub mod picture;
pub mod population;
pub mod scoring;
pub mod worker;

pub use config::{
    CrossoverKind, EvaluatorConfig, EvolutionConfig, MetricKind, PopulationConfig, StopConfig,
};
pub use error::{EvoError, Result};
pub use evolution::{Evolution, GenerationReport, StopPolicy};
pub use genome::{
    BlendCrossover, BrushAttribute, CrossoverPolicy, Genome, StrokeDomain, UniformCrossover,
};
pub use picture::{FrameScore, PassSummary, Picture};
pub use population::{Population, StageReport};
pub use scoring::{AbsoluteError, FitnessMetric, SquaredError};
pub use worker::{WorkerPool, MAX_THREADS};
