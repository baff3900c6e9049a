use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use facedex::{config, BoundingBox, Detection, FaceEncodingEngine};
use log::info;

#[derive(Parser)]
#[command(name = "facedex")]
#[command(version, about = "Face signature index - register and recognize faces")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register one face from an image file
    Register {
        /// Image to read
        #[arg(short, long)]
        image: PathBuf,
        /// Person name to store with the face
        #[arg(short, long)]
        name: String,
        /// Detected face box as x,y,w,h (defaults to the whole image)
        #[arg(short, long)]
        bbox: Option<String>,
        /// Detection confidence reported by the external detector
        #[arg(short, long, default_value_t = 1.0)]
        confidence: f32,
    },
    /// Recognize faces in an image file
    Recognize {
        /// Image to read
        #[arg(short, long)]
        image: PathBuf,
        /// Detected face boxes as x,y,w,h, one per face
        /// (defaults to the whole image)
        #[arg(short, long)]
        bbox: Vec<String>,
    },
    /// Print index statistics
    Stats,
    /// Remove every stored face
    Clear,
    /// Open config file in editor
    Config,
}

fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Register {
            image,
            name,
            bbox,
            confidence,
        } => register(&cfg, &image, &name, bbox.as_deref(), confidence),
        Commands::Recognize { image, bbox } => recognize(&cfg, &image, &bbox),
        Commands::Stats => stats(&cfg),
        Commands::Clear => clear(&cfg),
        Commands::Config => open_config(),
    }
}

fn parse_bbox(raw: &str) -> Result<BoundingBox> {
    let parts: Vec<u32> = raw
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid bounding box '{raw}', expected x,y,w,h"))?;
    anyhow::ensure!(parts.len() == 4, "bounding box '{raw}' must have 4 fields");
    Ok(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
}

fn load_image(path: &PathBuf) -> Result<image::RgbImage> {
    let img = image::open(path)
        .with_context(|| format!("opening image {}", path.display()))?
        .to_rgb8();
    Ok(img)
}

fn register(
    cfg: &config::Config,
    image_path: &PathBuf,
    name: &str,
    bbox: Option<&str>,
    confidence: f32,
) -> Result<()> {
    let img = load_image(image_path)?;
    let detection = match bbox {
        Some(raw) => Detection::new(parse_bbox(raw)?, confidence),
        None => Detection::full_frame(img.width(), img.height()),
    };

    let engine = FaceEncodingEngine::open(cfg).context("opening face index")?;
    let registration = engine
        .register(&img, &[detection], name)
        .context("registering face")?;

    println!("{}", serde_json::to_string_pretty(&registration)?);
    Ok(())
}

fn recognize(cfg: &config::Config, image_path: &PathBuf, bbox: &[String]) -> Result<()> {
    let img = load_image(image_path)?;
    let detections: Vec<Detection> = if bbox.is_empty() {
        vec![Detection::full_frame(img.width(), img.height())]
    } else {
        bbox.iter()
            .map(|raw| Ok(Detection::new(parse_bbox(raw)?, 1.0)))
            .collect::<Result<_>>()?
    };

    let engine = FaceEncodingEngine::open(cfg).context("opening face index")?;
    let outcomes = engine.recognize(&img, &detections);

    println!("{}", serde_json::to_string_pretty(&outcomes)?);
    Ok(())
}

fn stats(cfg: &config::Config) -> Result<()> {
    let engine = FaceEncodingEngine::open(cfg).context("opening face index")?;
    println!("{}", serde_json::to_string_pretty(&engine.stats())?);
    Ok(())
}

fn clear(cfg: &config::Config) -> Result<()> {
    let engine = FaceEncodingEngine::open(cfg).context("opening face index")?;
    if !engine.clear() {
        anyhow::bail!("index cleared in memory but snapshot write failed");
    }
    info!("✓ All faces cleared");
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
