//! Population of genomes for one canvas region, with selection and breeding.

use std::cmp::Ordering;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::config::PopulationConfig;
use crate::error::{EvoError, Result};
use crate::genome::{CrossoverPolicy, Genome, StrokeDomain};

/// Parents are drawn from this many top-ranked survivors.
pub const ELITE_PARENTS: usize = 3;

/// Smallest population `next_stage` accepts.
pub const MIN_BREEDING_SIZE: usize = 3;

/// What one breeding step did.
#[derive(Debug, Clone, PartialEq)]
pub struct StageReport {
    pub stage: u64,
    pub removed: usize,
    pub survivors: usize,
    /// Parent indices of each appended child, in append order.
    pub parents: Vec<(usize, usize)>,
}

/// Ordered genomes plus the parameters and RNG that breed them.
///
/// Size stays at `min_population_size` outside of `next_stage`. Descending fitness
/// order is established by `sort` and checked, not maintained, by `next_stage`.
#[derive(Debug)]
pub struct Population {
    genomes: Vec<Genome>,
    domain: StrokeDomain,
    min_population_size: usize,
    attributes_size: usize,
    mutation_probability: f64,
    stage_count: u64,
    crossover: Box<dyn CrossoverPolicy>,
    rng: Xoshiro256PlusPlus,
}

impl Population {
    /// Seeds `min_population_size` random genomes.
    pub fn new(config: &PopulationConfig, domain: StrokeDomain) -> Result<Self> {
        config.validate()?;
        domain.validate()?;

        let rng = match config.seed {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_rng(&mut rand::rng()),
        };

        let mut population = Self {
            genomes: Vec::with_capacity(config.min_population_size),
            domain,
            min_population_size: config.min_population_size,
            attributes_size: config.attributes_size,
            mutation_probability: config.mutation_probability,
            stage_count: 0,
            crossover: config.crossover.policy(),
            rng,
        };
        population.push_back(config.min_population_size);

        log::debug!(
            "population: {} genomes x {} strokes, crossover {:?}",
            population.len(),
            population.attributes_size,
            population.crossover
        );
        Ok(population)
    }

    /// Replaces the crossover policy used by `next_stage`.
    pub fn with_crossover(mut self, crossover: Box<dyn CrossoverPolicy>) -> Self {
        self.crossover = crossover;
        self
    }

    // ── access ────────────────────────────────────────────────────────────

    #[inline]
    pub fn len(&self) -> usize {
        self.genomes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.genomes.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<&Genome> {
        let len = self.genomes.len();
        self.genomes.get(index).ok_or(EvoError::bounds("genome", index, len))
    }

    pub fn get_mut(&mut self, index: usize) -> Result<&mut Genome> {
        let len = self.genomes.len();
        self.genomes.get_mut(index).ok_or(EvoError::bounds("genome", index, len))
    }

    #[inline]
    pub fn genomes(&self) -> &[Genome] {
        &self.genomes
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Genome> {
        self.genomes.iter()
    }

    #[inline]
    pub fn domain(&self) -> &StrokeDomain {
        &self.domain
    }

    #[inline]
    pub fn min_population_size(&self) -> usize {
        self.min_population_size
    }

    #[inline]
    pub fn attributes_size(&self) -> usize {
        self.attributes_size
    }

    /// Per-attribute chance that `next_stage` re-randomizes a child stroke.
    #[inline]
    pub fn mutation_probability(&self) -> f64 {
        self.mutation_probability
    }

    #[inline]
    pub fn stage_count(&self) -> u64 {
        self.stage_count
    }

    /// First genome. The best one once the population is sorted.
    #[inline]
    pub fn best(&self) -> Option<&Genome> {
        self.genomes.first()
    }

    /// Mean over scored genomes; `None` when nothing is scored.
    pub fn mean_fitness(&self) -> Option<f64> {
        let (sum, n) = self
            .genomes
            .iter()
            .filter_map(scored)
            .fold((0.0, 0usize), |(s, n), f| (s + f, n + 1));
        (n > 0).then(|| sum / n as f64)
    }

    /// Whether the order matches what `sort` would produce.
    pub fn is_sorted(&self) -> bool {
        self.genomes
            .windows(2)
            .all(|w| rank(&w[0], &w[1]) != Ordering::Greater)
    }

    // ── ordering ──────────────────────────────────────────────────────────

    /// Stable sort, best first. Unscored and NaN-scored genomes go after every
    /// scored one.
    pub fn sort(&mut self) {
        self.genomes.sort_by(rank);
    }

    // ── growth ────────────────────────────────────────────────────────────

    /// Appends `count` fresh random genomes.
    pub fn push_back(&mut self, count: usize) {
        for _ in 0..count {
            let genome = Genome::new(self.domain, self.attributes_size, &mut self.rng);
            self.genomes.push(genome);
        }
    }

    pub fn pop_back(&mut self) -> Option<Genome> {
        self.genomes.pop()
    }

    /// Replaces the lower half with children of the top survivors.
    ///
    /// Requires at least [`MIN_BREEDING_SIZE`] genomes, every one scored and sorted.
    /// `size / 2` genomes are dropped from the back; each is replaced by a child of
    /// two parents drawn uniformly from the first `min(3, survivors)` genomes, after
    /// which every child attribute is re-randomized with the configured mutation
    /// probability. For odd sizes the extra genome survives. Size is preserved.
    pub fn next_stage(&mut self) -> Result<StageReport> {
        let size = self.genomes.len();
        if size < MIN_BREEDING_SIZE {
            return Err(EvoError::PreconditionViolation(format!(
                "next_stage needs at least {MIN_BREEDING_SIZE} genomes, have {size}"
            )));
        }
        if let Some(i) = self.genomes.iter().position(|g| scored(g).is_none()) {
            return Err(EvoError::PreconditionViolation(format!(
                "genome {i} has no fitness; score the population first"
            )));
        }
        if !self.is_sorted() {
            return Err(EvoError::PreconditionViolation(
                "population is not sorted by descending fitness".into(),
            ));
        }

        self.stage_count += 1;

        let removed = size / 2;
        for _ in 0..removed {
            self.pop_back();
        }
        let survivors = self.genomes.len();
        let elite = ELITE_PARENTS.min(survivors);
        let probability = self.mutation_probability;

        let mut parents = Vec::with_capacity(removed);
        for _ in 0..removed {
            let p1 = self.rng.random_range(0..elite);
            let p2 = self.rng.random_range(0..elite);
            let mut child =
                self.genomes[p1].cross_over(&self.genomes[p2], self.crossover.as_ref(), &mut self.rng)?;
            for i in 0..child.len() {
                if self.rng.random_bool(probability) {
                    child.mutate(i, &mut self.rng)?;
                }
            }
            self.genomes.push(child);
            parents.push((p1, p2));
        }

        log::debug!(
            "stage {}: replaced {removed} of {size}, parents from top {elite}",
            self.stage_count
        );
        Ok(StageReport { stage: self.stage_count, removed, survivors, parents })
    }
}

/// Fitness usable for ranking. NaN counts as unscored.
fn scored(genome: &Genome) -> Option<f64> {
    genome.get_fitness().filter(|f| !f.is_nan())
}

/// Descending fitness; scored before unscored.
fn rank(a: &Genome, b: &Genome) -> Ordering {
    match (scored(a), scored(b)) {
        (Some(fa), Some(fb)) => fb.total_cmp(&fa),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::genome::BlendCrossover;
    use brushwork_engine::coords::{Extent, Vec2};

    fn config(size: usize, attributes: usize, probability: f64, seed: u64) -> PopulationConfig {
        PopulationConfig {
            min_population_size: size,
            attributes_size: attributes,
            mutation_probability: probability,
            seed: Some(seed),
            ..PopulationConfig::default()
        }
    }

    fn domain() -> StrokeDomain {
        StrokeDomain {
            offset: Vec2::zero(),
            extent: Extent::new(32, 32),
            scale_range: [0.5, 1.5],
            brush_count: 3,
        }
    }

    fn population(size: usize, attributes: usize, probability: f64, seed: u64) -> Population {
        Population::new(&config(size, attributes, probability, seed), domain()).unwrap()
    }

    /// Scores genome `i` with `1 / (i + 1)` so index order is already descending.
    fn score_descending(p: &mut Population) {
        for i in 0..p.len() {
            p.get_mut(i).unwrap().set_fitness(1.0 / (i as f64 + 1.0));
        }
    }

    // ── construction ──────────────────────────────────────────────────────

    #[test]
    fn new_population_has_min_size_and_no_scores() {
        let p = population(12, 5, 0.5, 1);
        assert_eq!(p.len(), 12);
        assert!(p.iter().all(|g| g.len() == 5 && g.get_fitness().is_none()));
        assert_eq!(p.stage_count(), 0);
    }

    #[test]
    fn same_seed_same_population() {
        let a = population(4, 3, 0.5, 7);
        let b = population(4, 3, 0.5, 7);
        assert_eq!(a.genomes(), b.genomes());
    }

    #[test]
    fn out_of_range_access_is_a_bounds_error() {
        let mut p = population(4, 3, 0.5, 7);
        assert!(matches!(p.get(4), Err(EvoError::Bounds { index: 4, len: 4, .. })));
        assert!(p.get_mut(9).is_err());
    }

    // ── sort ──────────────────────────────────────────────────────────────

    #[test]
    fn sort_orders_fitness_non_increasing() {
        let mut p = population(8, 2, 0.5, 3);
        let scores = [0.2, 0.9, 0.4, 0.9, 0.1, 0.7, 0.3, 0.5];
        for (i, s) in scores.iter().enumerate() {
            p.get_mut(i).unwrap().set_fitness(*s);
        }
        p.sort();
        let sorted: Vec<f64> = p.iter().filter_map(Genome::get_fitness).collect();
        assert!(sorted.windows(2).all(|w| w[0] >= w[1]));
        assert!(p.is_sorted());
        assert_eq!(p.best().unwrap().get_fitness(), Some(0.9));
    }

    #[test]
    fn sort_is_stable_for_ties() {
        let mut p = population(4, 2, 0.5, 3);
        for i in 0..4 {
            p.get_mut(i).unwrap().set_fitness(0.5);
        }
        let before = p.genomes().to_vec();
        p.sort();
        assert_eq!(p.genomes(), &before[..]);
    }

    #[test]
    fn unscored_genomes_sort_last() {
        let mut p = population(4, 2, 0.5, 3);
        p.get_mut(2).unwrap().set_fitness(0.1);
        p.get_mut(3).unwrap().set_fitness(0.6);
        p.sort();
        let scores: Vec<_> = p.iter().map(Genome::get_fitness).collect();
        assert_eq!(scores, [Some(0.6), Some(0.1), None, None]);
    }

    #[test]
    fn nan_fitness_sorts_after_every_real_score() {
        let mut p = population(4, 2, 0.5, 3);
        p.get_mut(0).unwrap().set_fitness(f64::NAN);
        p.get_mut(1).unwrap().set_fitness(0.2);
        p.get_mut(3).unwrap().set_fitness(0.7);
        p.sort();
        assert!(p.is_sorted());
        assert_eq!(p.genomes()[0].get_fitness(), Some(0.7));
        assert_eq!(p.genomes()[1].get_fitness(), Some(0.2));
        assert!(p.genomes()[2..].iter().all(|g| g.get_fitness().map_or(true, f64::is_nan)));
    }

    #[test]
    fn nan_fitness_blocks_next_stage() {
        let mut p = population(4, 2, 0.5, 3);
        score_descending(&mut p);
        p.get_mut(3).unwrap().set_fitness(f64::NAN);
        assert!(p.is_sorted());
        assert!(matches!(p.next_stage(), Err(EvoError::PreconditionViolation(_))));
        assert_eq!(p.stage_count(), 0);
    }

    #[test]
    fn mean_fitness_ignores_unscored() {
        let mut p = population(4, 2, 0.5, 3);
        assert_eq!(p.mean_fitness(), None);
        p.get_mut(0).unwrap().set_fitness(0.2);
        p.get_mut(1).unwrap().set_fitness(0.4);
        assert!((p.mean_fitness().unwrap() - 0.3).abs() < 1e-12);
    }

    // ── next_stage ────────────────────────────────────────────────────────

    #[test]
    fn next_stage_preserves_even_size() {
        for size in [4, 6, 10, 32] {
            let mut p = population(size, 3, 0.5, size as u64);
            score_descending(&mut p);
            let report = p.next_stage().unwrap();
            assert_eq!(p.len(), size);
            assert_eq!(report.removed, size / 2);
        }
    }

    #[test]
    fn size_four_seed_42_replaces_two() {
        let mut p = population(4, 2, 0.5, 42);
        score_descending(&mut p);
        let survivors = p.genomes()[..2].to_vec();
        let report = p.next_stage().unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(report.parents.len(), 2);
        assert_eq!(p.stage_count(), 1);
        assert_eq!(p.len(), 4);
        assert_eq!(&p.genomes()[..2], &survivors[..]);
        assert!(p.genomes()[2..].iter().all(|g| g.get_fitness().is_none()));
    }

    #[test]
    fn odd_size_keeps_extra_survivor() {
        let mut p = population(7, 2, 0.5, 5);
        score_descending(&mut p);
        let report = p.next_stage().unwrap();
        assert_eq!(report.removed, 3);
        assert_eq!(report.survivors, 4);
        assert_eq!(p.len(), 7);
    }

    /// Re-runs the breeding draws of `next_stage` on cloned state.
    fn replay_stage(p: &Population) -> (Vec<Genome>, Vec<(usize, usize)>) {
        let mut rng = p.rng.clone();
        let mut genomes = p.genomes().to_vec();
        let removed = genomes.len() / 2;
        genomes.truncate(genomes.len() - removed);
        let elite = ELITE_PARENTS.min(genomes.len());
        let mut parents = Vec::new();
        for _ in 0..removed {
            let p1 = rng.random_range(0..elite);
            let p2 = rng.random_range(0..elite);
            let mut child = genomes[p1].cross_over(&genomes[p2], p.crossover.as_ref(), &mut rng).unwrap();
            for i in 0..child.len() {
                if rng.random_bool(p.mutation_probability()) {
                    child.mutate(i, &mut rng).unwrap();
                }
            }
            genomes.push(child);
            parents.push((p1, p2));
        }
        (genomes, parents)
    }

    #[test]
    fn uniform_children_take_each_stroke_from_their_own_parents() {
        let mut p = population(6, 8, 0.0, 11);
        score_descending(&mut p);
        let elite = p.genomes()[..3].to_vec();
        let (expected, expected_parents) = replay_stage(&p);

        let report = p.next_stage().unwrap();
        assert_eq!(report.parents, expected_parents);
        assert_eq!(p.genomes(), &expected[..]);
        for (child, &(a, b)) in p.genomes()[3..].iter().zip(&report.parents) {
            assert!(a < 3 && b < 3);
            for (i, attr) in child.attributes().iter().enumerate() {
                assert!(*attr == elite[a].attributes()[i] || *attr == elite[b].attributes()[i]);
            }
        }
    }

    #[test]
    fn blend_children_match_their_recorded_parents() {
        let mut p = population(8, 6, 0.0, 21).with_crossover(Box::new(BlendCrossover));
        score_descending(&mut p);
        let (expected, expected_parents) = replay_stage(&p);

        let report = p.next_stage().unwrap();
        assert_eq!(report.parents, expected_parents);
        assert_eq!(p.genomes(), &expected[..]);
    }

    #[test]
    fn mutation_probability_comes_from_config() {
        let never = population(6, 8, 0.0, 12);
        let always = population(6, 8, 1.0, 12);
        assert_eq!(never.mutation_probability(), 0.0);
        assert_eq!(always.mutation_probability(), 1.0);
        // Same seed and domain: only the configured probability differs.
        assert_eq!(never.genomes(), always.genomes());

        let run = |mut p: Population| {
            score_descending(&mut p);
            p.next_stage().unwrap();
            p.genomes()[3..].to_vec()
        };
        assert_ne!(run(never), run(always));
    }

    #[test]
    fn full_mutation_rerolls_every_child_attribute() {
        let mut p = population(6, 8, 1.0, 12);
        score_descending(&mut p);
        let elite = p.genomes()[..3].to_vec();
        p.next_stage().unwrap();
        for child in &p.genomes()[3..] {
            for (i, attr) in child.attributes().iter().enumerate() {
                assert!(elite.iter().all(|g| g.attributes()[i] != *attr));
            }
        }
    }

    #[test]
    fn next_stage_is_deterministic_for_a_seed() {
        let run = || {
            let mut p = population(6, 4, 0.5, 99);
            score_descending(&mut p);
            p.next_stage().unwrap();
            p.genomes().to_vec()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn size_two_is_a_precondition_violation() {
        let mut p = population(2, 2, 0.5, 1);
        score_descending(&mut p);
        assert!(matches!(p.next_stage(), Err(EvoError::PreconditionViolation(_))));
        assert_eq!(p.len(), 2);
        assert_eq!(p.stage_count(), 0);
    }

    #[test]
    fn unscored_population_is_rejected() {
        let mut p = population(4, 2, 0.5, 1);
        assert!(matches!(p.next_stage(), Err(EvoError::PreconditionViolation(_))));
    }

    #[test]
    fn unsorted_population_is_rejected() {
        let mut p = population(4, 2, 0.5, 1);
        for i in 0..4 {
            p.get_mut(i).unwrap().set_fitness(i as f64);
        }
        assert!(matches!(p.next_stage(), Err(EvoError::PreconditionViolation(_))));
        p.sort();
        p.next_stage().unwrap();
    }

    #[test]
    fn push_and_pop_adjust_size() {
        let mut p = population(3, 2, 0.5, 1);
        p.push_back(2);
        assert_eq!(p.len(), 5);
        assert!(p.pop_back().is_some());
        assert_eq!(p.len(), 4);
    }
}
