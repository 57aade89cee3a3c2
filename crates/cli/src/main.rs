//! RiverHSI CLI - habitat suitability rasters from hydraulic model output

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use riverhsi_algorithms::algebra::{apply, CombineMethod, Operand, RasterOp};
use riverhsi_algorithms::conversion::{
    add_area_field, polygonize_file, raster_to_line, rasterize, Burn, RasterizeParams,
    DEFAULT_BURN, DEFAULT_FIELD,
};
use riverhsi_algorithms::habitat::{composite_suitability_in, usable_area, DEFAULT_THRESHOLD};
use riverhsi_algorithms::reproject::reproject_file;
use riverhsi_algorithms::suitability::{CurveLibrary, LifeStage, Parameter};
use riverhsi_core::io::{self, read_geojson, write_geojson, ScratchStore, DEFAULT_SCRATCH_DIR};
use riverhsi_core::{CrsDescriptor, Raster, DEFAULT_NODATA};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "riverhsi")]
#[command(author, version, about = "Habitat suitability index rasters for river ecosystems", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a raster or GeoJSON file
    Info {
        /// Input file
        input: PathBuf,
    },
    /// Build per-parameter and combined habitat suitability rasters
    Hsi {
        /// Curve library (JSON) of the target species
        #[arg(short, long)]
        curves: PathBuf,
        /// Flow velocity raster
        #[arg(long)]
        velocity: Option<PathBuf>,
        /// Water depth raster
        #[arg(long)]
        depth: Option<PathBuf>,
        /// Grain size raster
        #[arg(long)]
        grain_size: Option<PathBuf>,
        /// Life stage: fry, juvenile, adult, spawning
        #[arg(short = 's', long, default_value = "juvenile", value_parser = parse_stage)]
        life_stage: LifeStage,
        /// Combination method: geometric-mean, product
        #[arg(short, long, default_value = "geometric-mean", value_parser = parse_method)]
        method: CombineMethod,
        /// Directory receiving <parameter>_hsi.tif and chsi.tif
        #[arg(short, long, default_value = "habitat")]
        output_dir: PathBuf,
        /// Scratch directory for intermediate rasters, removed afterwards
        #[arg(long, env = "RIVERHSI_CACHE_DIR", default_value = DEFAULT_SCRATCH_DIR)]
        cache_dir: PathBuf,
    },
    /// Usable habitat area of a combined suitability raster
    Area {
        /// Combined suitability raster (chsi.tif)
        input: PathBuf,
        /// Minimum suitability counted as usable, within [0, 1]
        #[arg(short, long, default_value_t = DEFAULT_THRESHOLD)]
        threshold: f64,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Reproject a raster (.tif) or GeoJSON file, writing <stem>_epsg<code>
    Reproject {
        /// Input file
        input: PathBuf,
        /// Target reference: EPSG code, "EPSG:<code>" or a WKT string
        #[arg(short, long)]
        target: String,
    },
    /// Burn GeoJSON features into a raster
    Rasterize {
        /// Input GeoJSON file
        input: PathBuf,
        /// Output raster file
        output: PathBuf,
        /// Pixel size in dataset units
        #[arg(short, long, default_value = "10")]
        pixel_size: f64,
        /// No-data fill value
        #[arg(short, long, default_value_t = DEFAULT_NODATA, allow_negative_numbers = true)]
        nodata: f64,
        /// Burn this numeric attribute instead of a constant
        #[arg(short, long)]
        field: Option<String>,
        /// Constant burn value
        #[arg(short, long, default_value_t = DEFAULT_BURN, allow_negative_numbers = true)]
        burn: f64,
        /// Output extent as min_x,min_y,max_x,max_y
        #[arg(short, long, value_parser = parse_extent, allow_hyphen_values = true)]
        extent: Option<(f64, f64, f64, f64)>,
    },
    /// Polygonize 4-connected regions of equal (truncated) value
    Polygonize {
        /// Input raster file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Attribute field receiving the pixel value
        #[arg(short, long, default_value = DEFAULT_FIELD)]
        field: String,
        /// Band to read (1-based)
        #[arg(short, long)]
        band: Option<usize>,
        /// Add an "area" field in dataset units
        #[arg(long)]
        area: bool,
    },
    /// Join neighbouring pixels of one value into line segments
    RasterToLine {
        /// Input raster file
        input: PathBuf,
        /// Output GeoJSON file
        output: PathBuf,
        /// Pixel value to trace
        #[arg(long, allow_negative_numbers = true)]
        value: f64,
    },
    /// Raster arithmetic: <a> <op> <b> where b is a raster or a number
    Math {
        /// First raster
        a: PathBuf,
        /// Operator: add, sub, mul, div, pow
        #[arg(value_parser = parse_op)]
        op: RasterOp,
        /// Second raster or scalar
        #[arg(allow_negative_numbers = true)]
        b: String,
        /// Output raster file
        output: PathBuf,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set up logging")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_raster(path: &Path) -> Result<Raster<f64>> {
    let pb = spinner("Reading raster...");
    let raster: Raster<f64> =
        io::load(path, None).with_context(|| format!("Failed to read {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} x {} ({})", raster.cols(), raster.rows(), raster.crs().identifier());
    Ok(raster)
}

fn write_result(raster: &Raster<f64>, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    let status = io::save(raster, path);
    pb.finish_and_clear();
    if !status.is_success() {
        bail!("Failed to write {}", path.display());
    }
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn is_raster(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("tif" | "tiff")
    )
}

fn parse_stage(s: &str) -> std::result::Result<LifeStage, String> {
    s.parse().map_err(|e: riverhsi_core::Error| e.to_string())
}

fn parse_method(s: &str) -> std::result::Result<CombineMethod, String> {
    s.parse().map_err(|e: riverhsi_core::Error| e.to_string())
}

fn parse_op(s: &str) -> std::result::Result<RasterOp, String> {
    s.parse().map_err(|e: riverhsi_core::Error| e.to_string())
}

fn parse_extent(s: &str) -> std::result::Result<(f64, f64, f64, f64), String> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| format!("Invalid extent '{s}': {e}"))?;
    match parts[..] {
        [min_x, min_y, max_x, max_y] => Ok((min_x, min_y, max_x, max_y)),
        _ => Err(format!("Extent needs 4 values, got {}", parts.len())),
    }
}

// ─── Commands ───────────────────────────────────────────────────────────

fn info_raster(input: &Path) -> Result<()> {
    let raster = read_raster(input)?;
    let (rows, cols) = raster.shape();
    let bounds = raster.bounds();
    let stats = raster.statistics();

    println!("File: {}", input.display());
    println!("Dimensions: {} x {} ({} cells)", cols, rows, raster.len());
    println!("Cell size: {}", raster.cell_size());
    println!(
        "Bounds: ({:.6}, {:.6}) - ({:.6}, {:.6})",
        bounds.0, bounds.1, bounds.2, bounds.3
    );
    println!("CRS: {}", raster.crs());
    if let Some(nodata) = raster.nodata().filter(|v| !v.is_nan()) {
        println!("NoData: {}", nodata);
    }
    println!("\nStatistics:");
    if let Some(min) = stats.min {
        println!("  Min: {:.4}", min);
    }
    if let Some(max) = stats.max {
        println!("  Max: {:.4}", max);
    }
    if let Some(mean) = stats.mean {
        println!("  Mean: {:.4}", mean);
    }
    println!(
        "  Valid cells: {} ({:.1}%)",
        stats.valid_count,
        100.0 * stats.valid_count as f64 / raster.len().max(1) as f64
    );
    Ok(())
}

fn info_vector(input: &Path) -> Result<()> {
    let dataset = read_geojson(input).with_context(|| format!("Failed to read {}", input.display()))?;
    println!("File: {}", input.display());
    println!("Features: {}", dataset.len());
    println!("CRS: {}", dataset.crs());
    if !dataset.fields().is_empty() {
        println!("\nFields:");
        for field in dataset.fields() {
            println!("  {}: {:?}", field.name, field.kind);
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn run_hsi(
    curves: &Path,
    velocity: Option<PathBuf>,
    depth: Option<PathBuf>,
    grain_size: Option<PathBuf>,
    stage: LifeStage,
    method: CombineMethod,
    output_dir: &Path,
    store: &mut ScratchStore,
) -> Result<()> {
    let library = CurveLibrary::from_path(curves).context("Failed to read curve library")?;

    let mut physical = Vec::new();
    for (parameter, path) in [
        (Parameter::Velocity, velocity),
        (Parameter::Depth, depth),
        (Parameter::GrainSize, grain_size),
    ] {
        if let Some(path) = path {
            physical.push((parameter, read_raster(&path)?));
        }
    }
    if physical.is_empty() {
        bail!("Give at least one of --velocity, --depth, --grain-size");
    }
    let inputs: Vec<(Parameter, &Raster<f64>)> = physical.iter().map(|(p, r)| (*p, r)).collect();

    let start = Instant::now();
    let pb = spinner("Building suitability rasters...");
    let result = composite_suitability_in(store, &inputs, &library, stage, method)
        .context("Failed to build habitat suitability");
    pb.finish_and_clear();
    let result = result?;
    let elapsed = start.elapsed();

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    for (parameter, layer) in &result.layers {
        let path = output_dir.join(format!("{parameter}_hsi.tif"));
        write_result(layer, &path)?;
        println!("{} suitability saved to: {}", parameter, path.display());
    }
    let chsi_path = output_dir.join("chsi.tif");
    write_result(&result.composite, &chsi_path)?;
    done("Combined suitability", &chsi_path, elapsed);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            if is_raster(&input) {
                info_raster(&input)?;
            } else {
                info_vector(&input)?;
            }
        }

        // ── Habitat ──────────────────────────────────────────────────
        Commands::Hsi {
            curves,
            velocity,
            depth,
            grain_size,
            life_stage,
            method,
            output_dir,
            cache_dir,
        } => {
            let mut store = ScratchStore::new(cache_dir);
            let outcome = run_hsi(
                &curves,
                velocity,
                depth,
                grain_size,
                life_stage,
                method,
                &output_dir,
                &mut store,
            );
            // scratch files go whether or not the pipeline succeeded
            store.purge().context("Failed to remove scratch directory")?;
            outcome?;
        }

        Commands::Area {
            input,
            threshold,
            json,
        } => {
            let chsi = read_raster(&input)?;
            let area = usable_area(&chsi, threshold).context("Failed to compute usable area")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&area)?);
            } else {
                println!("Usable habitat area: {}", area);
            }
        }

        // ── Reprojection ─────────────────────────────────────────────
        Commands::Reproject { input, target } => {
            let descriptor = CrsDescriptor::parse(&target);
            let start = Instant::now();
            let pb = spinner("Reprojecting...");
            let output = reproject_file(&input, &descriptor);
            pb.finish_and_clear();
            let output = output.with_context(|| format!("Failed to reproject {}", input.display()))?;
            done("Reprojected dataset", &output, start.elapsed());
        }

        // ── Conversion ───────────────────────────────────────────────
        Commands::Rasterize {
            input,
            output,
            pixel_size,
            nodata,
            field,
            burn,
            extent,
        } => {
            let dataset = read_geojson(&input)
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let params = RasterizeParams {
                pixel_size,
                nodata,
                burn: field.map_or(Burn::Constant(burn), Burn::Field),
                extent,
            };
            let start = Instant::now();
            let raster = rasterize(&dataset, &params).context("Failed to rasterize")?;
            let elapsed = start.elapsed();
            write_result(&raster, &output)?;
            done("Raster", &output, elapsed);
        }

        Commands::Polygonize {
            input,
            output,
            field,
            band,
            area,
        } => {
            let start = Instant::now();
            let (int_path, mut dataset) =
                polygonize_file(&input, band, &field).context("Failed to polygonize")?;
            info!("Integer raster: {}", int_path.display());
            if area {
                add_area_field(&mut dataset, "area");
            }
            let elapsed = start.elapsed();
            write_geojson(&dataset, &output).context("Failed to write polygons")?;
            done("Polygons", &output, elapsed);
        }

        Commands::RasterToLine {
            input,
            output,
            value,
        } => {
            let raster = read_raster(&input)?;
            let start = Instant::now();
            let dataset = raster_to_line(&raster, value).context("Failed to trace lines")?;
            let elapsed = start.elapsed();
            write_geojson(&dataset, &output).context("Failed to write lines")?;
            done("Lines", &output, elapsed);
        }

        // ── Algebra ──────────────────────────────────────────────────
        Commands::Math { a, op, b, output } => {
            let a_r = read_raster(&a)?;
            let b_path = PathBuf::from(&b);
            let b_r = if b_path.exists() {
                Some(read_raster(&b_path)?)
            } else {
                None
            };
            let operand = match &b_r {
                Some(r) => Operand::Raster(r),
                None => Operand::Scalar(
                    b.parse()
                        .with_context(|| format!("'{b}' is neither a raster file nor a number"))?,
                ),
            };
            let start = Instant::now();
            let result = apply(&a_r, operand, op).context("Failed to apply operator")?;
            let elapsed = start.elapsed();
            write_result(&result, &output)?;
            done("Result", &output, elapsed);
        }
    }

    Ok(())
}
