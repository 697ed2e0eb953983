//! Candidate paintings and their genetic operators.

use std::f32::consts::TAU;
use std::fmt::Debug;

use brushwork_engine::coords::{Canvas, ColorRgba, Extent, Vec2};
use brushwork_engine::scene::{DrawList, StrokeCmd};
use rand::{Rng, RngCore};

use crate::config::{CrossoverKind, PopulationConfig};
use crate::error::{EvoError, Result};

/// Bounds every attribute of every genome is drawn from.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct StrokeDomain {
    /// Canvas sub-region the population paints into.
    pub offset: Vec2,
    pub extent: Extent,
    /// Inclusive `[min, max]` stroke scale.
    pub scale_range: [f32; 2],
    pub brush_count: u32,
}

impl StrokeDomain {
    pub fn from_config(canvas: Canvas, brush_count: usize, config: &PopulationConfig) -> Result<Self> {
        let domain = Self {
            offset: canvas.offset,
            extent: canvas.extent,
            scale_range: config.scale_range,
            brush_count: u32::try_from(brush_count)
                .map_err(|_| EvoError::Config(format!("{brush_count} brushes is too many")))?,
        };
        domain.validate()?;
        Ok(domain)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.extent.is_valid() || !self.offset.is_finite() {
            return Err(EvoError::Config(format!(
                "canvas region {}x{} is empty",
                self.extent.width, self.extent.height
            )));
        }
        if self.brush_count == 0 {
            return Err(EvoError::Config("at least one brush is required".into()));
        }
        let [lo, hi] = self.scale_range;
        if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
            return Err(EvoError::Config(format!("bad scale range [{lo}, {hi}]")));
        }
        Ok(())
    }

    #[inline]
    pub fn canvas(&self) -> Canvas {
        Canvas::new(self.offset, self.extent)
    }

    /// Whether `attr` lies inside the domain.
    pub fn contains(&self, attr: &BrushAttribute) -> bool {
        let max = self.offset + self.extent.as_vec2();
        let t = attr.translate;
        let [lo, hi] = self.scale_range;
        t.x >= self.offset.x
            && t.y >= self.offset.y
            && t.x <= max.x
            && t.y <= max.y
            && (lo..=hi).contains(&attr.scale)
            && (0.0..TAU).contains(&attr.rotation)
            && attr.color == attr.color.clamped()
            && attr.brush < self.brush_count
    }
}

/// One brush stroke of a genome.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct BrushAttribute {
    /// Absolute canvas position of the stroke center.
    pub translate: Vec2,
    pub scale: f32,
    /// Radians in `[0, 2π)`.
    pub rotation: f32,
    /// Straight alpha.
    pub color: ColorRgba,
    pub brush: u32,
}

impl BrushAttribute {
    pub fn random(domain: &StrokeDomain, rng: &mut dyn RngCore) -> Self {
        let max = domain.offset + domain.extent.as_vec2();
        let [lo, hi] = domain.scale_range;
        Self {
            translate: Vec2::new(
                rng.random_range(domain.offset.x..=max.x),
                rng.random_range(domain.offset.y..=max.y),
            ),
            scale: rng.random_range(lo..=hi),
            rotation: rng.random_range(0.0..TAU),
            color: ColorRgba::new(rng.random(), rng.random(), rng.random(), rng.random()),
            brush: rng.random_range(0..domain.brush_count),
        }
    }

    #[inline]
    pub fn to_stroke(&self) -> StrokeCmd {
        StrokeCmd {
            center: self.translate,
            scale: self.scale,
            rotation: self.rotation,
            color: self.color,
            brush: self.brush,
        }
    }
}

// ── crossover ─────────────────────────────────────────────────────────────

/// Combines the same-index attribute of two parents into a child attribute.
pub trait CrossoverPolicy: Debug + Send + Sync {
    fn combine(
        &self,
        a: &BrushAttribute,
        b: &BrushAttribute,
        rng: &mut dyn RngCore,
    ) -> BrushAttribute;
}

/// Takes each attribute whole from one parent, with equal odds.
#[derive(Debug, Default, Copy, Clone)]
pub struct UniformCrossover;

impl CrossoverPolicy for UniformCrossover {
    fn combine(
        &self,
        a: &BrushAttribute,
        b: &BrushAttribute,
        rng: &mut dyn RngCore,
    ) -> BrushAttribute {
        if rng.random_bool(0.5) { *a } else { *b }
    }
}

/// Interpolates continuous fields at one random weight; the brush comes from the
/// nearer parent. Results stay inside any convex domain holding both parents.
#[derive(Debug, Default, Copy, Clone)]
pub struct BlendCrossover;

impl CrossoverPolicy for BlendCrossover {
    fn combine(
        &self,
        a: &BrushAttribute,
        b: &BrushAttribute,
        rng: &mut dyn RngCore,
    ) -> BrushAttribute {
        let t: f32 = rng.random();
        let lerp = |x: f32, y: f32| (x + (y - x) * t).clamp(x.min(y), x.max(y));
        BrushAttribute {
            translate: Vec2::new(lerp(a.translate.x, b.translate.x), lerp(a.translate.y, b.translate.y)),
            scale: lerp(a.scale, b.scale),
            rotation: lerp(a.rotation, b.rotation),
            color: ColorRgba::new(
                lerp(a.color.r, b.color.r),
                lerp(a.color.g, b.color.g),
                lerp(a.color.b, b.color.b),
                lerp(a.color.a, b.color.a),
            ),
            brush: if t < 0.5 { a.brush } else { b.brush },
        }
    }
}

impl CrossoverKind {
    pub fn policy(self) -> Box<dyn CrossoverPolicy> {
        match self {
            CrossoverKind::Uniform => Box::new(UniformCrossover),
            CrossoverKind::Blend => Box::new(BlendCrossover),
        }
    }
}

// ── genome ────────────────────────────────────────────────────────────────

/// One candidate painting: a fixed-length stroke list and its last score.
///
/// `fitness` is `None` until first scored. Mutation leaves a stale value in place
/// until the genome is scored again.
#[derive(Debug, Clone, PartialEq)]
pub struct Genome {
    domain: StrokeDomain,
    attributes: Vec<BrushAttribute>,
    fitness: Option<f64>,
}

impl Genome {
    pub fn new(domain: StrokeDomain, attributes_size: usize, rng: &mut dyn RngCore) -> Self {
        let attributes = (0..attributes_size)
            .map(|_| BrushAttribute::random(&domain, rng))
            .collect();
        Self { domain, attributes, fitness: None }
    }

    /// Builds a genome from explicit attributes. Each must lie inside `domain`.
    pub fn from_attributes(domain: StrokeDomain, attributes: Vec<BrushAttribute>) -> Result<Self> {
        if let Some(i) = attributes.iter().position(|a| !domain.contains(a)) {
            return Err(EvoError::PreconditionViolation(format!(
                "attribute {i} lies outside the stroke domain"
            )));
        }
        Ok(Self { domain, attributes, fitness: None })
    }

    /// Child of `self` and `other`, combined attribute by attribute. Unscored.
    pub fn cross_over(
        &self,
        other: &Genome,
        policy: &dyn CrossoverPolicy,
        rng: &mut dyn RngCore,
    ) -> Result<Genome> {
        if other.attributes.len() != self.attributes.len() {
            return Err(EvoError::bounds("crossover attribute", other.attributes.len(), self.attributes.len()));
        }
        let attributes = self
            .attributes
            .iter()
            .zip(&other.attributes)
            .map(|(a, b)| policy.combine(a, b, rng))
            .collect();
        Ok(Genome { domain: self.domain, attributes, fitness: None })
    }

    /// Re-randomizes one attribute within the domain. Fitness is left as is.
    pub fn mutate(&mut self, attribute_index: usize, rng: &mut dyn RngCore) -> Result<()> {
        let len = self.attributes.len();
        let domain = self.domain;
        let attr = self
            .attributes
            .get_mut(attribute_index)
            .ok_or(EvoError::bounds("attribute", attribute_index, len))?;
        *attr = BrushAttribute::random(&domain, rng);
        Ok(())
    }

    #[inline]
    pub fn get_fitness(&self) -> Option<f64> {
        self.fitness
    }

    #[inline]
    pub fn get_mutable_fitness(&mut self) -> &mut Option<f64> {
        &mut self.fitness
    }

    #[inline]
    pub fn set_fitness(&mut self, fitness: f64) {
        self.fitness = Some(fitness);
    }

    #[inline]
    pub fn attributes(&self) -> &[BrushAttribute] {
        &self.attributes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    #[inline]
    pub fn domain(&self) -> &StrokeDomain {
        &self.domain
    }

    /// Appends one stroke per attribute, in attribute order.
    pub fn draw_into(&self, list: &mut DrawList) {
        list.extend(self.attributes.iter().map(BrushAttribute::to_stroke));
    }
}
