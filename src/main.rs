use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use log::{info, warn};

use mediaspin::config::{DEFAULT_BATCH_SIZE, DEFAULT_ENCODE_TIMEOUT_SECS, DEFAULT_INTENSITY};
use mediaspin::{
    process_images, process_videos, BatchReport, BatchRequest, EffectBounds, EffectSelection,
    FillPolicy, MediaKind, MediaspinConfig, SourceItem,
};

/// Generate randomized, perceptually distinct variants of images and videos.
#[derive(Parser)]
#[command(name = "mediaspin", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate image variants (PNG when transparent, JPEG otherwise)
    Images(BatchArgs),

    /// Generate video variants (H.264 MP4, audio passed through)
    Videos(BatchArgs),
}

#[derive(Args)]
struct BatchArgs {
    /// Source files
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Directory for the current batch
    #[arg(short, long)]
    out: PathBuf,

    /// Directory that keeps a copy of every variant
    #[arg(long)]
    history: PathBuf,

    /// Variants per source file
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: u32,

    /// Perturbation strength, 0 (none) to 100 (full range)
    #[arg(short, long, default_value_t = DEFAULT_INTENSITY, allow_negative_numbers = true)]
    intensity: i32,

    /// Randomize contrast
    #[arg(long)]
    contrast: bool,

    /// Randomize brightness
    #[arg(long)]
    brightness: bool,

    /// Randomize rotation
    #[arg(long)]
    rotate: bool,

    /// Randomize border crop
    #[arg(long)]
    crop: bool,

    /// Mirror horizontally on a coin-flip
    #[arg(long)]
    flip: bool,

    /// Enable every effect
    #[arg(long)]
    all: bool,

    /// Use the narrow bound table instead of the dramatic default
    #[arg(long)]
    subtle: bool,

    /// Leave rotated corners of opaque images transparent (forces PNG)
    #[arg(long)]
    transparent_fill: bool,

    /// Seed for reproducible batches
    #[arg(long)]
    seed: Option<u64>,

    /// Per-variant encoder timeout in seconds, 0 to wait forever
    #[arg(long, default_value_t = DEFAULT_ENCODE_TIMEOUT_SECS)]
    timeout: u64,
}

impl BatchArgs {
    fn request(&self) -> BatchRequest {
        let effects = if self.all {
            EffectSelection::all()
        } else {
            EffectSelection {
                contrast: self.contrast,
                brightness: self.brightness,
                rotation: self.rotate,
                crop: self.crop,
                flip: self.flip,
            }
        };
        BatchRequest {
            batch_size: self.batch_size,
            intensity: self.intensity,
            effects,
        }
    }

    fn config(&self) -> MediaspinConfig {
        MediaspinConfig {
            bounds: if self.subtle {
                EffectBounds::subtle()
            } else {
                EffectBounds::default()
            },
            fill: if self.transparent_fill {
                FillPolicy::Transparent
            } else {
                FillPolicy::default()
            },
            encode_timeout: (self.timeout > 0).then(|| Duration::from_secs(self.timeout)),
            seed: self.seed,
            show_progress: true,
            ..Default::default()
        }
    }
}

fn load_sources(inputs: &[PathBuf], expected: MediaKind) -> Result<Vec<SourceItem>> {
    let mut items = Vec::with_capacity(inputs.len());
    for path in inputs {
        let item = SourceItem::from_path(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        match item.kind() {
            Some(kind) if kind == expected => {}
            Some(kind) => bail!("{} looks like {:?}, expected {:?}", path.display(), kind, expected),
            None => warn!("{}: unrecognized extension, trying anyway", path.display()),
        }
        items.push(item);
    }
    Ok(items)
}

fn summarize(report: &BatchReport, out: &Path) {
    for item in &report.items {
        for v in &item.variants {
            println!(
                "{}  {}x{}  {}{}",
                v.file_name,
                v.width,
                v.height,
                &v.sha256[..12],
                if v.fell_back { "  (not distinct)" } else { "" }
            );
        }
        if item.fell_back() > 0 {
            warn!(
                "{}: {} variant(s) could not be made distinct",
                item.source,
                item.fell_back()
            );
        }
    }
    info!(
        "wrote {} variant(s) to {}",
        report.variant_count(),
        out.display()
    );
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Images(args) => {
            let items = load_sources(&args.inputs, MediaKind::Image)?;
            let report = process_images(
                &items,
                &args.request(),
                &args.out,
                &args.history,
                &args.config(),
            )
            .context("image processing failed")?;
            summarize(&report, &args.out);
        }

        Commands::Videos(args) => {
            let items = load_sources(&args.inputs, MediaKind::Video)?;
            let report = process_videos(
                &items,
                &args.request(),
                &args.out,
                &args.history,
                &args.config(),
            )
            .context("video processing failed")?;
            summarize(&report, &args.out);
        }
    }

    Ok(())
}
