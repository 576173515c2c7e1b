//! linker_replay - run the vehicle linker over recorded detection metadata

use anyhow::Result;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use vehicle_linker::{Delivery, FileConfig, FileSource, FrameProcessor, LinkerConfig, TieBreak};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Recorded metadata file (one buffer per line), `-` for stdin, or
    /// `stub://<name>` for a synthetic scene.
    #[arg(long)]
    input: String,
    /// Config file (.toml or .json). Without it, LINKER_CONFIG and LINKER_*
    /// environment variables are used.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
    /// Output log path (overrides config).
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    /// IoU above which a plate or brand is linked (overrides config).
    #[arg(long)]
    iou_threshold: Option<f32>,
    /// Tie-break between several qualifying candidates (last_wins|highest_iou).
    #[arg(long, value_name = "MODE")]
    tie_break: Option<TieBreak>,
    /// Buffers produced by a stub:// input.
    #[arg(long, default_value_t = 20)]
    synthetic_buffers: u64,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::new(args.ui, is_tty, !stdout_is_tty);

    let cfg = {
        let _stage = ui.stage("Load config");
        let mut cfg = match &args.config {
            Some(path) => LinkerConfig::from_path(path)?,
            None => LinkerConfig::load()?,
        };
        if let Some(path) = args.log_file.clone() {
            cfg.log_file_path = path;
        }
        if let Some(threshold) = args.iou_threshold {
            cfg.iou_threshold = threshold;
        }
        if let Some(mode) = args.tie_break {
            cfg.tie_break = mode;
        }
        cfg.validate()?;
        cfg
    };
    log::info!(
        "linking with iou_threshold={} tie_break={} vehicle_classes={:?} plate_component={} brand_component={}",
        cfg.iou_threshold,
        cfg.tie_break,
        cfg.vehicle_class_ids,
        cfg.plate_component_id,
        cfg.brand_component_id
    );

    let mut source = FileSource::new(FileConfig {
        path: args.input.clone(),
        synthetic_buffers: args.synthetic_buffers,
    })?;
    let mut processor = FrameProcessor::new(&cfg);

    {
        let stage = ui.stage("Replay buffers");
        while let Some(delivery) = source.next_delivery()? {
            match delivery {
                Delivery::Missing => {
                    processor.process_buffer(None);
                }
                Delivery::Buffer(frames) => {
                    processor.process_buffer(Some(frames.as_slice()));
                }
            }
            let stats = processor.stats();
            stage.progress(&format!(
                "{} buffers, {} frames recorded",
                stats.buffers, stats.frames_recorded
            ));
        }
    }

    let stats = processor.stats();
    let source_stats = source.stats();
    log::info!(
        "replay of {} finished: {} lines skipped",
        source_stats.path,
        source_stats.lines_skipped
    );
    println!(
        "buffers={} missing={} frames_seen={} frames_recorded={} ignored_detections={} batches_written={} batches_failed={}",
        stats.buffers,
        stats.missing_buffers,
        stats.frames_seen,
        stats.frames_recorded,
        stats.ignored_detections,
        stats.batches_written,
        stats.batches_failed
    );
    println!("results appended to {}", processor.sink().path().display());
    Ok(())
}
