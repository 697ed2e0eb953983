//! Pixel metrics that turn a rendered candidate into a fitness value.
//!
//! All shipped metrics compare RGB only, return values in `[0, 1]`, and score
//! higher for closer matches. Images must be RGBA8 of equal dimensions.

use std::fmt::Debug;

use image::RgbaImage;

use crate::config::MetricKind;
use crate::error::{EvoError, Result};

pub trait FitnessMetric: Debug + Send + Sync {
    fn score(&self, rendered: &RgbaImage, target: &RgbaImage) -> Result<f64>;

    /// Scores with access to the previous generation's champion render.
    ///
    /// Shipped metrics ignore `previous_best`; it only has to match in size.
    fn score_against(
        &self,
        rendered: &RgbaImage,
        target: &RgbaImage,
        previous_best: Option<&RgbaImage>,
    ) -> Result<f64> {
        if let Some(best) = previous_best {
            check_dimensions(rendered, best)?;
        }
        self.score(rendered, target)
    }
}

/// `1 - Σ Δ² / (n · 3 · 255²)` over RGB channels.
#[derive(Debug, Default, Copy, Clone)]
pub struct SquaredError;

impl FitnessMetric for SquaredError {
    fn score(&self, rendered: &RgbaImage, target: &RgbaImage) -> Result<f64> {
        check_dimensions(rendered, target)?;
        let sum: u64 = channel_pairs(rendered, target)
            .map(|(a, b)| {
                let d = a.abs_diff(b) as u64;
                d * d
            })
            .sum();
        Ok(1.0 - sum as f64 / (pixel_count(target) * 3.0 * 255.0 * 255.0))
    }
}

/// `1 - Σ |Δ| / (n · 3 · 255)` over RGB channels.
#[derive(Debug, Default, Copy, Clone)]
pub struct AbsoluteError;

impl FitnessMetric for AbsoluteError {
    fn score(&self, rendered: &RgbaImage, target: &RgbaImage) -> Result<f64> {
        check_dimensions(rendered, target)?;
        let sum: u64 = channel_pairs(rendered, target)
            .map(|(a, b)| a.abs_diff(b) as u64)
            .sum();
        Ok(1.0 - sum as f64 / (pixel_count(target) * 3.0 * 255.0))
    }
}

impl MetricKind {
    pub fn metric(self) -> Box<dyn FitnessMetric> {
        match self {
            MetricKind::SquaredError => Box::new(SquaredError),
            MetricKind::AbsoluteError => Box::new(AbsoluteError),
        }
    }
}

fn check_dimensions(a: &RgbaImage, b: &RgbaImage) -> Result<()> {
    if a.dimensions() != b.dimensions() {
        return Err(EvoError::DimensionMismatch(format!(
            "{}x{} vs {}x{}",
            a.width(),
            a.height(),
            b.width(),
            b.height()
        )));
    }
    if a.width() == 0 || a.height() == 0 {
        return Err(EvoError::DimensionMismatch("empty image".into()));
    }
    Ok(())
}

fn pixel_count(img: &RgbaImage) -> f64 {
    img.width() as f64 * img.height() as f64
}

/// RGB channel pairs, alpha skipped.
fn channel_pairs<'a>(a: &'a RgbaImage, b: &'a RgbaImage) -> impl Iterator<Item = (u8, u8)> + 'a {
    a.pixels()
        .zip(b.pixels())
        .flat_map(|(pa, pb)| (0..3).map(move |c| (pa.0[c], pb.0[c])))
}
