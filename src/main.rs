mod app;
mod boxes;
mod canvas;
mod config;
mod error;
mod export;
mod interaction;
mod manifest;
mod predictions;
mod render;
mod screens;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eframe::egui;
use log::{error, info, LevelFilter};

use crate::app::AnnotatorApp;
use crate::config::Settings;
use crate::error::{AppError, AppResult};
use crate::manifest::PhotoManifest;

#[derive(Parser, Debug)]
#[command(name = "tide-annotate", version, about)]
struct Cli {
    /// Settings file (default: the user config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `photo_root` from the settings
    #[arg(long)]
    photos: Option<PathBuf>,

    /// Overrides `manifest` from the settings
    #[arg(long)]
    manifest: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scan the photo root and write the manifest
    Index {
        /// Output path (default: the configured manifest)
        #[arg(long)]
        out: Option<PathBuf>,

        /// Extra folder names to skip
        #[arg(long)]
        ignore: Vec<String>,
    },
}

fn setup_logger() {
    let mut builder = env_logger::Builder::new();
    if std::env::var("RUST_LOG").is_ok() {
        builder.parse_env("RUST_LOG");
    } else {
        builder.filter(None, LevelFilter::Warn);
        if cfg!(debug_assertions) {
            builder.filter(Some("tide_annotate"), LevelFilter::Debug);
        } else {
            builder.filter(Some("tide_annotate"), LevelFilter::Info);
        }
    }
    builder.init();
}

fn run(cli: Cli) -> AppResult<()> {
    let mut settings = Settings::load(cli.config.as_deref());
    if let Some(photos) = cli.photos {
        settings.photo_root = photos;
    }
    if let Some(manifest) = cli.manifest {
        settings.manifest = manifest;
    }

    if let Some(Command::Index { out, ignore }) = cli.command {
        let mut skip = settings.ignore_folders.clone();
        skip.extend(ignore);
        let manifest = PhotoManifest::scan(&settings.photo_root, &skip)?;
        let out = out.unwrap_or_else(|| settings.manifest.clone());
        manifest.write_json(&out)?;
        info!("Wrote manifest to {}", out.display());
        return Ok(());
    }

    let manifest = PhotoManifest::load(&settings.manifest).unwrap_or_else(|e| {
        error!("Failed to load manifest {}: {}", settings.manifest.display(), e);
        PhotoManifest::default()
    });

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(settings.window_size)
            .with_title("tide-annotate"),
        ..Default::default()
    };
    eframe::run_native(
        "tide-annotate",
        options,
        Box::new(move |cc| Ok(Box::new(AnnotatorApp::new(cc, settings, manifest)))),
    )
    .map_err(|e| AppError::Gui(e.to_string()))
}

fn main() {
    setup_logger();
    if let Err(e) = run(Cli::parse()) {
        error!("{}", e);
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
