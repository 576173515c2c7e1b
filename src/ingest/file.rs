//! Recorded detection metadata source.
//!
//! `FileSource` replays per-buffer detection metadata captured from the
//! inference framework. Each non-empty line of the input is one buffer
//! callback: a JSON array of frames, or the literal `null` when the framework
//! delivered the callback without a buffer.
//!
//! `stub://` paths select a synthetic scene generator for tests and demos.

use std::fs::File;
use std::io::{self, BufRead, BufReader};

use anyhow::{anyhow, Context, Result};

use crate::detect::{Detection, FrameDetections};
use crate::geometry::BoundingBox;

/// Configuration for a recorded metadata source.
#[derive(Clone, Debug, Default)]
pub struct FileConfig {
    /// Local file path, `-` for stdin, or `stub://<name>` for the synthetic
    /// scene.
    pub path: String,
    /// Number of buffers the synthetic scene produces before ending.
    pub synthetic_buffers: u64,
}

/// One buffer callback as delivered by the framework.
#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    Buffer(Vec<FrameDetections>),
    /// The callback fired without a frame buffer.
    Missing,
}

/// Statistics for a file source.
#[derive(Clone, Debug, Default)]
pub struct FileStats {
    pub buffers_delivered: u64,
    pub missing_buffers: u64,
    pub lines_skipped: u64,
    pub path: String,
}

pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Recorded(RecordedSource),
    Synthetic(SyntheticSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "replay only supports local paths (no URL schemes)"
            ));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticSource::new(config)),
            })
        } else {
            Ok(Self {
                backend: FileBackend::Recorded(RecordedSource::open(config)?),
            })
        }
    }

    /// Next buffer callback, or `None` once the input is exhausted.
    pub fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        match &mut self.backend {
            FileBackend::Recorded(source) => source.next_delivery(),
            FileBackend::Synthetic(source) => Ok(source.next_delivery()),
        }
    }

    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Recorded(source) => source.stats.clone(),
            FileBackend::Synthetic(source) => source.stats.clone(),
        }
    }
}

impl Iterator for FileSource {
    type Item = Result<Delivery>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_delivery().transpose()
    }
}

/// Parses one recorded line. Blank lines yield `Ok(None)`.
pub fn parse_delivery(line: &str) -> Result<Option<Delivery>> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let frames: Option<Vec<FrameDetections>> =
        serde_json::from_str(trimmed).context("invalid buffer record")?;
    Ok(Some(match frames {
        Some(frames) => Delivery::Buffer(frames),
        None => Delivery::Missing,
    }))
}

struct RecordedSource {
    reader: Box<dyn BufRead>,
    line_number: u64,
    stats: FileStats,
}

impl RecordedSource {
    fn open(config: FileConfig) -> Result<Self> {
        let reader: Box<dyn BufRead> = if config.path == "-" {
            Box::new(BufReader::new(io::stdin()))
        } else {
            let file = File::open(&config.path)
                .with_context(|| format!("failed to open replay input {}", config.path))?;
            Box::new(BufReader::new(file))
        };
        log::info!("FileSource: replaying {}", config.path);
        Ok(Self {
            reader,
            line_number: 0,
            stats: FileStats {
                path: config.path,
                ..FileStats::default()
            },
        })
    }

    fn next_delivery(&mut self) -> Result<Option<Delivery>> {
        let mut line = String::new();
        loop {
            line.clear();
            let read = self
                .reader
                .read_line(&mut line)
                .with_context(|| format!("failed to read replay input {}", self.stats.path))?;
            if read == 0 {
                return Ok(None);
            }
            self.line_number += 1;
            match parse_delivery(&line) {
                Ok(None) => continue,
                Ok(Some(delivery)) => {
                    self.stats.buffers_delivered += 1;
                    if delivery == Delivery::Missing {
                        self.stats.missing_buffers += 1;
                    }
                    return Ok(Some(delivery));
                }
                Err(e) => {
                    self.stats.lines_skipped += 1;
                    log::warn!(
                        "{}:{}: skipping line: {:#}",
                        self.stats.path,
                        self.line_number,
                        e
                    );
                }
            }
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

/// Cycles through a small scene: a car with plate and brand, a frame with
/// only secondary detections, an empty frame and a missing buffer.
struct SyntheticSource {
    remaining: u64,
    frame_number: u64,
    stats: FileStats,
}

impl SyntheticSource {
    fn new(config: FileConfig) -> Self {
        Self {
            remaining: config.synthetic_buffers,
            frame_number: 0,
            stats: FileStats {
                path: config.path,
                ..FileStats::default()
            },
        }
    }

    fn next_delivery(&mut self) -> Option<Delivery> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.stats.buffers_delivered += 1;

        let step = self.stats.buffers_delivered % 4;
        if step == 0 {
            self.stats.missing_buffers += 1;
            return Some(Delivery::Missing);
        }

        self.frame_number += 1;
        let shift = (self.frame_number % 20) as f32 * 4.0;
        let car = BoundingBox::new(100.0 + shift, 200.0, 320.0, 180.0);
        let plate = BoundingBox::new(car.left + 130.0, car.top + 130.0, 60.0, 20.0);
        let badge = BoundingBox::new(car.left + 145.0, car.top + 90.0, 30.0, 15.0);
        let objects = match step {
            1 => vec![
                Detection::new("car", 0.92, car, 1, 2).with_object_id(self.frame_number),
                Detection::new(format!("SYN{:04}", self.frame_number), 0.81, plate, 2, 0),
                Detection::new("toyota", 0.66, badge, 3, 0),
            ],
            2 => vec![Detection::new("SYN0000", 0.4, plate, 2, 0)],
            _ => Vec::new(),
        };
        Some(Delivery::Buffer(vec![FrameDetections::new(
            self.frame_number,
            objects,
        )]))
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
