//! Quick recognition test binary - run either backend on an image from disk
//! Run with: cargo run --release --bin test_recognize -- <image_path> [tesseract|trocr]

use anyhow::Result;
use std::path::Path;
use tracing::info;

use handwriting_demo::{
    core::{types::RecognitionMode, Config},
    dispatch::dispatch,
    services::{TesseractService, TrocrHandle},
};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("handwriting_demo=debug")
        .with_target(false)
        .init();

    // Get image path and method from args
    let args: Vec<String> = std::env::args().collect();
    let sample_path = if args.len() > 1 {
        args[1].clone()
    } else {
        "test_sample.png".to_string()
    };
    let mode: RecognitionMode = if args.len() > 2 {
        args[2].parse().map_err(|e: String| anyhow::anyhow!(e))?
    } else {
        RecognitionMode::ClassicalOcr
    };

    if !Path::new(&sample_path).exists() {
        eprintln!("Image not found: {}", sample_path);
        std::process::exit(1);
    }

    info!("Loading image: {}", sample_path);
    let image = image::open(&sample_path)?;
    info!("Image dimensions: {}x{}", image.width(), image.height());

    let config = Config::new()?;
    let classical = TesseractService::new(&config.tesseract);
    let neural = TrocrHandle::new(config.trocr.clone());

    info!("Running {} recognition", mode.label());
    match dispatch(&image, mode, &classical, &neural) {
        Ok(text) => {
            println!("\n=== Results ({}) ===", mode.label());
            if text.is_empty() {
                println!("  (empty)");
            } else {
                for (i, line) in text.lines().enumerate() {
                    println!("  {}. {}", i + 1, line);
                }
            }
        }
        Err(e) => {
            eprintln!("{}: {}", e.banner_prefix(), e);
            std::process::exit(1);
        }
    }

    Ok(())
}
