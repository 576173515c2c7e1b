//! Append-only JSON log of frame result batches.
//!
//! Every flush appends one JSON array (the whole batch) followed by a
//! newline. Arrays are pretty-printed with four-space indentation and keep
//! non-ASCII text unescaped, so a log is a stream of concatenated JSON values
//! rather than strict one-object-per-line JSONL.

use std::fs::{self, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;

use crate::frame::{FrameResult, ResultBatch};

pub const DEFAULT_LOG_FILE_PATH: &str = "detection_log.jsonl";

const INDENT: &[u8] = b"    ";

/// Appends batches to a log file.
///
/// The file is opened for each batch and closed when the write returns.
/// Writers sharing one sink are serialized so a batch is never interleaved
/// with another.
#[derive(Debug)]
pub struct ResultSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `batch` as one JSON value. Returns the number of bytes
    /// written, zero for an empty batch.
    pub fn write_batch(&self, batch: &[FrameResult]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }
        let line = encode_batch(batch)?;

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| anyhow!("result sink lock poisoned"))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create log directory {}", parent.display())
                })?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("failed to open log file {}", self.path.display()))?;
        let start = file
            .metadata()
            .with_context(|| format!("failed to stat log file {}", self.path.display()))?
            .len();
        append_whole(&mut file, start, &line)
            .with_context(|| format!("failed to append to log file {}", self.path.display()))?;
        Ok(line.len())
    }
}

trait LogFile: Write {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl LogFile for fs::File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)
    }
}

/// Writes `line` in full or cuts the file back to `start`, so a failed append
/// leaves no torn batch in front of later ones.
fn append_whole<F: LogFile>(file: &mut F, start: u64, line: &[u8]) -> io::Result<()> {
    let Err(err) = file.write_all(line).and_then(|()| file.flush()) else {
        return Ok(());
    };
    if let Err(truncate_err) = file.truncate_to(start) {
        log::error!(
            "could not remove partial batch after failed append: {}",
            truncate_err
        );
    }
    Err(err)
}

/// Serializes a batch exactly as it is written to the log, trailing newline
/// included.
pub fn encode_batch(batch: &[FrameResult]) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(INDENT);
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    batch
        .serialize(&mut ser)
        .context("failed to serialize result batch")?;
    buf.push(b'\n');
    Ok(buf)
}

/// Reads every batch from a log file, in append order.
pub fn read_log(path: &Path) -> Result<Vec<ResultBatch>> {
    let file = fs::File::open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let stream =
        serde_json::Deserializer::from_reader(BufReader::new(file)).into_iter::<ResultBatch>();
    let mut batches = Vec::new();
    for (index, batch) in stream.enumerate() {
        let batch = batch.map_err(|e| {
            anyhow!(
                "invalid batch #{} in log file {}: {}",
                index + 1,
                path.display(),
                e
            )
        })?;
        batches.push(batch);
    }
    Ok(batches)
}
