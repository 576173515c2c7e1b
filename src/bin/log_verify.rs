//! log_verify - re-parse a vehicle linker log and summarize its contents

use anyhow::{anyhow, Result};
use clap::Parser;
use std::collections::BTreeMap;
use std::io::IsTerminal;
use std::path::PathBuf;

use vehicle_linker::{read_log, ResultBatch, DEFAULT_LOG_FILE_PATH};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to the result log.
    #[arg(long, default_value = DEFAULT_LOG_FILE_PATH, value_name = "PATH")]
    log_file: PathBuf,
    /// Print every linked plate as `frame object_id text confidence`.
    #[arg(long)]
    plates: bool,
    /// UI mode for stderr progress.
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

#[derive(Debug, Default)]
struct Summary {
    batches: usize,
    frames: usize,
    vehicles: usize,
    with_brand: usize,
    with_plate: usize,
    unordered_frames: usize,
    labels: BTreeMap<String, usize>,
}

impl Summary {
    fn add(&mut self, batch: &ResultBatch) {
        self.batches += 1;
        let mut last_frame: Option<u64> = None;
        for frame in batch {
            self.frames += 1;
            if last_frame.is_some_and(|last| frame.frame_number < last) {
                self.unordered_frames += 1;
            }
            last_frame = Some(frame.frame_number);
            for vehicle in &frame.objects {
                self.vehicles += 1;
                *self.labels.entry(vehicle.label.clone()).or_default() += 1;
                if vehicle.brand.is_some() {
                    self.with_brand += 1;
                }
                if vehicle.license_plate.is_some() {
                    self.with_plate += 1;
                }
            }
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::new(args.ui, is_tty, !stdout_is_tty);

    let batches = {
        let _stage = ui.stage("Read log");
        read_log(&args.log_file)?
    };

    let mut summary = Summary::default();
    {
        let stage = ui.stage("Check batches");
        for (index, batch) in batches.iter().enumerate() {
            if batch.is_empty() {
                return Err(anyhow!("batch #{} is empty", index + 1));
            }
            if let Some(frame) = batch.iter().find(|frame| frame.objects.is_empty()) {
                return Err(anyhow!(
                    "batch #{} records frame {} without vehicles",
                    index + 1,
                    frame.frame_number
                ));
            }
            summary.add(batch);
            stage.progress(&format!("{} frames", summary.frames));
        }
    }

    if summary.unordered_frames > 0 {
        log::warn!(
            "{} frame(s) appear out of order within their batch",
            summary.unordered_frames
        );
    }

    if args.plates {
        for frame in batches.iter().flatten() {
            for vehicle in &frame.objects {
                if let Some(plate) = &vehicle.license_plate {
                    println!(
                        "{} {} {} {:.2}",
                        frame.frame_number, vehicle.object_id, plate.text, plate.confidence
                    );
                }
            }
        }
    }

    println!("log: {}", args.log_file.display());
    println!(
        "batches={} frames={} vehicles={} with_brand={} with_plate={}",
        summary.batches, summary.frames, summary.vehicles, summary.with_brand, summary.with_plate
    );
    for (label, count) in &summary.labels {
        println!("  {label}: {count}");
    }
    Ok(())
}
