use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use brushwork_engine::coords::{Canvas, Extent, Vec2};
use brushwork_engine::device::{Gpu, GpuInit};
use brushwork_engine::logging::{init_logging, LoggingConfig};
use brushwork_engine::render::{BrushSet, OffscreenBackend, SoftwareBackend, WgpuBackend};
use brushwork_evo::{Evolution, EvolutionConfig, Picture, Population, StopPolicy, StrokeDomain};
use clap::Parser;
use image::RgbaImage;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Image to reproduce
    target: PathBuf,

    /// RON evolution config; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Where the best painting is written
    #[arg(long, default_value = "best.png")]
    output: PathBuf,

    /// Canvas region to paint, as x,y,width,height in target pixels
    #[arg(long, value_parser = parse_region)]
    region: Option<Region>,

    /// Number of procedural brushes
    #[arg(long, default_value = "6")]
    brushes: usize,

    /// Edge length of each procedural brush in pixels
    #[arg(long, default_value = "32")]
    brush_size: u32,

    /// Rasterize on the CPU instead of the GPU
    #[arg(long)]
    software: bool,

    /// Use the platform's software GPU adapter
    #[arg(long, conflicts_with = "software")]
    fallback_adapter: bool,

    /// Debug logging for the brushwork crates
    #[arg(short, long)]
    verbose: bool,

    /// Override stop.max_generations
    #[arg(long)]
    generations: Option<u64>,

    /// Override population.seed
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Region {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

fn parse_region(s: &str) -> Result<Region, String> {
    let parts: Vec<u32> = s
        .split(',')
        .map(|p| p.trim().parse::<u32>().map_err(|e| format!("{p:?}: {e}")))
        .collect::<Result<_, _>>()?;
    let [x, y, width, height] = parts[..] else {
        return Err(format!("expected x,y,width,height, got {s:?}"));
    };
    if width == 0 || height == 0 {
        return Err("region must not be empty".into());
    }
    Ok(Region { x, y, width, height })
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(if args.verbose { LoggingConfig::verbose() } else { LoggingConfig::default() });

    let mut config = match &args.config {
        Some(path) => EvolutionConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => EvolutionConfig::default(),
    };
    if let Some(n) = args.generations {
        config.stop.max_generations = Some(n);
    }
    if args.seed.is_some() {
        config.population.seed = args.seed;
    }
    config.validate()?;

    let source = image::open(&args.target)
        .with_context(|| format!("failed to open target image {}", args.target.display()))?
        .to_rgba8();
    let (target, canvas) = crop_target(&source, args.region)?;
    log::info!(
        "target {} region {}x{} at ({}, {})",
        args.target.display(),
        canvas.extent.width,
        canvas.extent.height,
        canvas.offset.x,
        canvas.offset.y
    );

    let brushes = BrushSet::procedural(args.brushes, args.brush_size);
    let best = if args.software {
        evolve(Arc::new(SoftwareBackend::new(brushes)), &config, canvas, target)?
    } else {
        let init = if args.fallback_adapter { GpuInit::fallback() } else { GpuInit::default() };
        let gpu = Gpu::new_blocking(init)?;
        evolve(Arc::new(WgpuBackend::new(gpu, brushes)), &config, canvas, target)?
    };

    best.save(&args.output)
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    log::info!("wrote {}", args.output.display());
    Ok(())
}

/// Crops `source` to `region` (whole image when `None`) and returns the canvas it maps to.
fn crop_target(source: &RgbaImage, region: Option<Region>) -> Result<(RgbaImage, Canvas)> {
    let Some(r) = region else {
        let extent = Extent::new(source.width(), source.height());
        if !extent.is_valid() {
            bail!("target image is empty");
        }
        return Ok((source.clone(), Canvas::from_extent(extent)));
    };
    let fits = r.x.checked_add(r.width).is_some_and(|x1| x1 <= source.width())
        && r.y.checked_add(r.height).is_some_and(|y1| y1 <= source.height());
    if !fits {
        bail!(
            "region {}x{} at ({}, {}) exceeds the {}x{} target",
            r.width,
            r.height,
            r.x,
            r.y,
            source.width(),
            source.height()
        );
    }
    let cropped = image::imageops::crop_imm(source, r.x, r.y, r.width, r.height).to_image();
    let canvas = Canvas::new(
        Vec2::new(r.x as f32, r.y as f32),
        Extent::new(r.width, r.height),
    );
    Ok((cropped, canvas))
}

fn evolve<B: OffscreenBackend>(
    backend: Arc<B>,
    config: &EvolutionConfig,
    canvas: Canvas,
    target: RgbaImage,
) -> Result<RgbaImage> {
    let domain = StrokeDomain::from_config(canvas, backend.brush_count(), &config.population)?;
    let population = Population::new(&config.population, domain)?;
    let picture = Picture::new(backend, canvas, &config.evaluator)?;
    let mut evolution = Evolution::new(population, picture, target)?;

    let last = evolution.run_until(StopPolicy::from(&config.stop), |_| {})?;
    log::info!(
        "finished after {} generations, best fitness {:.5}",
        last.generation + 1,
        last.best_fitness
    );
    Ok(evolution.render_best()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn region_parses_four_numbers() {
        assert_eq!(
            parse_region("4, 8,16,32"),
            Ok(Region { x: 4, y: 8, width: 16, height: 32 })
        );
    }

    #[test]
    fn region_rejects_bad_input() {
        assert!(parse_region("1,2,3").is_err());
        assert!(parse_region("1,2,0,4").is_err());
        assert!(parse_region("a,b,c,d").is_err());
    }

    #[test]
    fn crop_maps_region_to_canvas_offset() {
        let source = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8, y as u8, 0, 255]));
        let region = Region { x: 2, y: 3, width: 4, height: 5 };
        let (cropped, canvas) = crop_target(&source, Some(region)).unwrap();
        assert_eq!(cropped.dimensions(), (4, 5));
        assert_eq!(cropped.get_pixel(0, 0).0, [2, 3, 0, 255]);
        assert_eq!(canvas.offset, Vec2::new(2.0, 3.0));
        assert_eq!(canvas.extent, Extent::new(4, 5));
    }

    #[test]
    fn crop_outside_target_fails() {
        let source = RgbaImage::new(8, 8);
        let region = Region { x: 6, y: 0, width: 4, height: 4 };
        assert!(crop_target(&source, Some(region)).is_err());
    }

    #[test]
    fn software_run_writes_a_full_size_painting() {
        let target = RgbaImage::from_pixel(12, 12, Rgba([30, 90, 200, 255]));
        let canvas = Canvas::from_extent(Extent::new(12, 12));
        let mut config = EvolutionConfig::default();
        config.population.min_population_size = 4;
        config.population.attributes_size = 4;
        config.population.seed = Some(1);
        config.stop.max_generations = Some(2);
        let backend = Arc::new(SoftwareBackend::new(BrushSet::procedural(2, 8)));
        let best = evolve(backend, &config, canvas, target).unwrap();
        assert_eq!(best.dimensions(), (12, 12));
    }
}
