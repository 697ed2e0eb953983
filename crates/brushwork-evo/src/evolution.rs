//! Generation loop: render all, score all, sort, breed.

use std::sync::Arc;
use std::time::{Duration, Instant};

use brushwork_engine::render::OffscreenBackend;
use image::RgbaImage;

use crate::config::StopConfig;
use crate::error::{EvoError, Result};
use crate::picture::Picture;
use crate::population::Population;

/// When `run_until` stops. Either bound may be absent, not both.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StopPolicy {
    pub max_generations: Option<u64>,
    pub target_fitness: Option<f64>,
}

impl StopPolicy {
    pub fn generations(n: u64) -> Self {
        Self { max_generations: Some(n), target_fitness: None }
    }

    pub fn is_met(&self, report: &GenerationReport) -> bool {
        let by_count = self.max_generations.is_some_and(|n| report.generation + 1 >= n);
        let by_fitness = self.target_fitness.is_some_and(|t| report.best_fitness >= t);
        by_count || by_fitness
    }
}

impl From<&StopConfig> for StopPolicy {
    fn from(config: &StopConfig) -> Self {
        Self {
            max_generations: config.max_generations,
            target_fitness: config.target_fitness,
        }
    }
}

/// Scores of one evaluated, sorted generation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationReport {
    /// Zero-based; equals the population's stage count when evaluated.
    pub generation: u64,
    pub best_fitness: f64,
    pub mean_fitness: f64,
    pub population: usize,
    pub elapsed: Duration,
}

/// Drives a population against one target image through an evaluator.
pub struct Evolution<B: OffscreenBackend> {
    population: Population,
    picture: Picture<B>,
    target: Arc<RgbaImage>,
}

impl<B: OffscreenBackend> Evolution<B> {
    pub fn new(population: Population, picture: Picture<B>, target: RgbaImage) -> Result<Self> {
        let extent = picture.canvas().extent;
        if target.dimensions() != (extent.width, extent.height) {
            return Err(EvoError::DimensionMismatch(format!(
                "target is {}x{}, canvas is {}x{}",
                target.width(),
                target.height(),
                extent.width,
                extent.height
            )));
        }
        Ok(Self { population, picture, target: Arc::new(target) })
    }

    #[inline]
    pub fn population(&self) -> &Population {
        &self.population
    }

    #[inline]
    pub fn picture(&self) -> &Picture<B> {
        &self.picture
    }

    #[inline]
    pub fn target(&self) -> &RgbaImage {
        &self.target
    }

    /// Render of the best genome from the latest evaluation.
    pub fn best_image(&self) -> Option<&RgbaImage> {
        self.picture.best_image()
    }

    /// Renders the current best genome. Call after an evaluation, when sorted.
    pub fn render_best(&mut self) -> Result<RgbaImage> {
        let best = self
            .population
            .best()
            .ok_or_else(|| EvoError::PreconditionViolation("population is empty".into()))?;
        self.picture.render(best)
    }

    /// Renders and scores the current population, then sorts it. No breeding.
    pub fn evaluate(&mut self) -> Result<GenerationReport> {
        let started = Instant::now();
        self.picture.run(&self.population, &self.target)?;
        self.picture.wait_thread(&mut self.population)?;
        self.population.sort();

        let best_fitness = self
            .population
            .best()
            .and_then(|g| g.get_fitness())
            .ok_or_else(|| EvoError::PreconditionViolation("population is empty".into()))?;
        let report = GenerationReport {
            generation: self.population.stage_count(),
            best_fitness,
            mean_fitness: self.population.mean_fitness().unwrap_or(best_fitness),
            population: self.population.len(),
            elapsed: started.elapsed(),
        };
        log::info!(
            "generation {}: best {:.5} mean {:.5} ({} genomes, {:?})",
            report.generation,
            report.best_fitness,
            report.mean_fitness,
            report.population,
            report.elapsed
        );
        Ok(report)
    }

    /// One full generation: evaluate, then breed the next stage.
    pub fn step(&mut self) -> Result<GenerationReport> {
        let report = self.evaluate()?;
        self.population.next_stage()?;
        Ok(report)
    }

    /// Evaluates generations until `stop` is met and returns the last report.
    ///
    /// The final generation is left scored and sorted; nothing is bred after the
    /// stopping check passes.
    pub fn run_until<F>(&mut self, stop: StopPolicy, mut on_generation: F) -> Result<GenerationReport>
    where
        F: FnMut(&GenerationReport),
    {
        if stop.max_generations.is_none() && stop.target_fitness.is_none() {
            return Err(EvoError::Config("stop policy has no bound".into()));
        }
        loop {
            let report = self.evaluate()?;
            on_generation(&report);
            if stop.is_met(&report) {
                return Ok(report);
            }
            self.population.next_stage()?;
        }
    }

    pub fn into_parts(self) -> (Population, Picture<B>) {
        (self.population, self.picture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EvaluatorConfig, PopulationConfig};
    use crate::genome::StrokeDomain;
    use crate::scoring::FitnessMetric;
    use brushwork_engine::coords::{Canvas, Extent};
    use brushwork_engine::render::{BrushSet, SoftwareBackend};
    use image::Rgba;

    fn evolution(size: usize, seed: u64) -> Evolution<SoftwareBackend> {
        let canvas = Canvas::from_extent(Extent::new(24, 24));
        let backend = Arc::new(SoftwareBackend::new(BrushSet::procedural(3, 12)));
        let config = PopulationConfig {
            min_population_size: size,
            attributes_size: 8,
            seed: Some(seed),
            ..PopulationConfig::default()
        };
        let domain = StrokeDomain::from_config(canvas, backend.brush_count(), &config).unwrap();
        let population = Population::new(&config, domain).unwrap();
        let picture = Picture::new(backend, canvas, &EvaluatorConfig::default()).unwrap();
        let target = RgbaImage::from_fn(24, 24, |x, _| {
            if x < 12 { Rgba([200, 30, 30, 255]) } else { Rgba([20, 20, 120, 255]) }
        });
        Evolution::new(population, picture, target).unwrap()
    }

    // ── stop policy ───────────────────────────────────────────────────────

    fn report(generation: u64, best: f64) -> GenerationReport {
        GenerationReport {
            generation,
            best_fitness: best,
            mean_fitness: best,
            population: 4,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn generation_bound_counts_evaluations() {
        let stop = StopPolicy::generations(3);
        assert!(!stop.is_met(&report(1, 0.1)));
        assert!(stop.is_met(&report(2, 0.1)));
    }

    #[test]
    fn fitness_bound_stops_early() {
        let stop = StopPolicy { max_generations: None, target_fitness: Some(0.9) };
        assert!(!stop.is_met(&report(50, 0.89)));
        assert!(stop.is_met(&report(0, 0.9)));
    }

    // ── loop ──────────────────────────────────────────────────────────────

    #[test]
    fn step_scores_then_breeds() {
        let mut evo = evolution(6, 1);
        let report = evo.step().unwrap();
        assert_eq!(report.generation, 0);
        assert_eq!(report.population, 6);
        assert_eq!(evo.population().stage_count(), 1);
        assert_eq!(evo.population().len(), 6);
    }

    #[test]
    fn run_until_leaves_last_generation_sorted() {
        let mut evo = evolution(6, 2);
        let mut seen = Vec::new();
        let last = evo
            .run_until(StopPolicy::generations(4), |r| seen.push(r.generation))
            .unwrap();
        assert_eq!(seen, [0, 1, 2, 3]);
        assert_eq!(last.generation, 3);
        assert_eq!(evo.population().stage_count(), 3);
        assert!(evo.population().is_sorted());
        assert!(evo.population().iter().all(|g| g.get_fitness().is_some()));
        assert!(evo.best_image().is_some());
    }

    #[test]
    fn render_best_reproduces_best_fitness() {
        let mut evo = evolution(6, 6);
        let last = evo.run_until(StopPolicy::generations(2), |_| {}).unwrap();
        let image = evo.render_best().unwrap();
        let fitness = crate::scoring::SquaredError.score(&image, evo.target()).unwrap();
        assert_eq!(fitness, last.best_fitness);
    }

    #[test]
    fn best_fitness_never_regresses() {
        let mut evo = evolution(8, 3);
        let mut bests = Vec::new();
        evo.run_until(StopPolicy::generations(6), |r| bests.push(r.best_fitness)).unwrap();
        assert!(bests.windows(2).all(|w| w[1] >= w[0]));
    }

    #[test]
    fn unbounded_stop_policy_is_rejected() {
        let mut evo = evolution(4, 4);
        let stop = StopPolicy { max_generations: None, target_fitness: None };
        assert!(matches!(evo.run_until(stop, |_| {}), Err(EvoError::Config(_))));
    }

    #[test]
    fn mismatched_target_is_rejected() {
        let evo = evolution(4, 5);
        let (population, picture) = evo.into_parts();
        assert!(Evolution::new(population, picture, RgbaImage::new(8, 8)).is_err());
    }
}
