//! Vehicle linker
//!
//! This crate links secondary detections (license plates, brands) to the
//! vehicles produced by a primary detector and appends the enriched
//! per-frame records to a JSON log.
//!
//! # Processing
//!
//! Each buffer callback from the inference framework runs, per frame:
//!
//! 1. **Classify**: split detections into vehicles, plates and brands.
//! 2. **Link**: attach at most one plate and one brand to each vehicle.
//! 3. **Aggregate**: keep the frame if it contains at least one vehicle.
//!
//! and then flushes the callback's batch to the sink as one JSON value.
//!
//! No failure inside a callback escapes it: a missing buffer or a failed
//! write is logged and counted, and the next callback proceeds normally.
//!
//! # Module Structure
//!
//! - `geometry`: boxes, IoU, center containment
//! - `detect`: detection types and the classifier
//! - `link`: the spatial linker
//! - `frame`: vehicle records and the frame aggregator
//! - `sink`: the append-only result log
//! - `ingest`: recorded and synthetic metadata sources
//! - `config`: file and environment configuration

use std::sync::Arc;

pub mod config;
pub mod detect;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod link;
pub mod sink;

pub use config::LinkerConfig;
pub use detect::{
    Candidate, ClassifiedFrame, ClassifierPolicy, Detection, DetectionClassifier, DetectionKind,
    DetectionSource, FrameDetections, ObjectMeta,
};
pub use frame::{
    BrandMatch, FrameAggregator, FrameResult, PlateMatch, ResultBatch, VehicleRecord,
};
pub use geometry::{contains_center, iou, BoundingBox};
pub use ingest::{Delivery, FileConfig, FileSource};
pub use link::{SpatialLinker, TieBreak, DEFAULT_IOU_THRESHOLD};
pub use sink::{encode_batch, read_log, ResultSink, DEFAULT_LOG_FILE_PATH};

/// What happened to the batch of one buffer callback.
#[derive(Clone, Debug, PartialEq)]
pub enum FlushOutcome {
    /// The callback carried no buffer; nothing was processed.
    Skipped,
    /// No frame in the buffer contained a vehicle.
    Empty,
    Written { frames: usize, bytes: usize },
    /// The append failed and the batch was discarded.
    Failed { frames: usize, reason: String },
}

/// Summary of one buffer callback.
#[derive(Clone, Debug, PartialEq)]
pub struct ProbeReport {
    pub frames_seen: usize,
    pub frames_recorded: usize,
    pub ignored_detections: usize,
    pub flush: FlushOutcome,
}

/// Running totals across callbacks.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    pub buffers: u64,
    pub missing_buffers: u64,
    pub frames_seen: u64,
    pub frames_recorded: u64,
    pub ignored_detections: u64,
    pub batches_written: u64,
    pub batches_failed: u64,
}

/// Runs classification, linking and aggregation for each buffer callback and
/// flushes the result batch.
///
/// The sink is shared through an `Arc` so several processors (one per stream
/// or delivery thread) can append to the same log.
pub struct FrameProcessor {
    classifier: DetectionClassifier,
    linker: SpatialLinker,
    sink: Arc<ResultSink>,
    stats: ProcessorStats,
}

impl FrameProcessor {
    pub fn new(config: &LinkerConfig) -> Self {
        Self::with_sink(config.classifier(), config.linker(), Arc::new(config.sink()))
    }

    pub fn with_sink(
        classifier: DetectionClassifier,
        linker: SpatialLinker,
        sink: Arc<ResultSink>,
    ) -> Self {
        let policy = classifier.policy();
        log::debug!(
            "processor for {}: vehicle_classes={:?} plate_component={} brand_component={} iou_threshold={} tie_break={}",
            sink.path().display(),
            policy.vehicle_class_ids,
            policy.plate_component_id,
            policy.brand_component_id,
            linker.iou_threshold(),
            linker.tie_break()
        );
        Self {
            classifier,
            linker,
            sink,
            stats: ProcessorStats::default(),
        }
    }

    pub fn sink(&self) -> &Arc<ResultSink> {
        &self.sink
    }

    pub fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// Classifies and links one frame's detections without recording them.
    pub fn link_frame<M: ObjectMeta>(&self, objects: &[M]) -> Vec<VehicleRecord> {
        self.linker.link(self.classifier.classify(objects))
    }

    /// Handles one buffer callback of materialized frames. `None` means the
    /// callback fired without a buffer.
    pub fn process_buffer(&mut self, frames: Option<&[FrameDetections]>) -> ProbeReport {
        let Some(frames) = frames else {
            self.stats.buffers += 1;
            self.stats.missing_buffers += 1;
            log::warn!("buffer callback without frame buffer; frame skipped");
            return ProbeReport {
                frames_seen: 0,
                frames_recorded: 0,
                ignored_detections: 0,
                flush: FlushOutcome::Skipped,
            };
        };
        self.process_frames(
            frames
                .iter()
                .map(|frame| (frame.frame_number, frame.objects.as_slice())),
        )
    }

    /// Handles one buffer callback from an adapter that exposes the
    /// framework's own per-object metadata through `ObjectMeta`.
    pub fn process_frames<'a, M, I>(&mut self, frames: I) -> ProbeReport
    where
        M: ObjectMeta + 'a,
        I: IntoIterator<Item = (u64, &'a [M])>,
    {
        self.stats.buffers += 1;
        let mut aggregator = FrameAggregator::new();
        let mut frames_seen = 0;
        let mut ignored_detections = 0;

        for (frame_number, objects) in frames {
            frames_seen += 1;
            let classified = self.classifier.classify(objects);
            ignored_detections += classified.ignored;
            let vehicles = self.linker.link(classified);
            aggregator.record(frame_number, vehicles);
        }

        let frames_recorded = aggregator.len();
        self.stats.frames_seen += frames_seen as u64;
        self.stats.frames_recorded += frames_recorded as u64;
        self.stats.ignored_detections += ignored_detections as u64;

        let flush = self.flush(aggregator.take_batch());
        ProbeReport {
            frames_seen,
            frames_recorded,
            ignored_detections,
            flush,
        }
    }

    fn flush(&mut self, batch: ResultBatch) -> FlushOutcome {
        if batch.is_empty() {
            return FlushOutcome::Empty;
        }
        let frames = batch.len();
        match self.sink.write_batch(&batch) {
            Ok(bytes) => {
                self.stats.batches_written += 1;
                log::debug!(
                    "appended {} frame(s), {} bytes to {}",
                    frames,
                    bytes,
                    self.sink.path().display()
                );
                FlushOutcome::Written { frames, bytes }
            }
            Err(e) => {
                self.stats.batches_failed += 1;
                log::error!("error writing to log file: {:#}", e);
                FlushOutcome::Failed {
                    frames,
                    reason: format!("{:#}", e),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processor(path: &std::path::Path) -> FrameProcessor {
        FrameProcessor::with_sink(
            DetectionClassifier::default(),
            SpatialLinker::default(),
            Arc::new(ResultSink::new(path)),
        )
    }

    fn car_with_plate(frame_number: u64) -> FrameDetections {
        FrameDetections::new(
            frame_number,
            vec![
                Detection::new("car", 0.9, BoundingBox::new(0.0, 0.0, 100.0, 100.0), 1, 2)
                    .with_object_id(1),
                Detection::new("ABC123", 0.9, BoundingBox::new(10.0, 10.0, 20.0, 10.0), 2, 0),
                Detection::new("person", 0.8, BoundingBox::new(0.0, 0.0, 5.0, 5.0), 1, 0),
            ],
        )
    }

    #[test]
    fn missing_buffer_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut p = processor(&path);
        let report = p.process_buffer(None);
        assert_eq!(report.flush, FlushOutcome::Skipped);
        assert_eq!(p.stats().missing_buffers, 1);
        assert!(!path.exists());
    }

    #[test]
    fn buffer_with_vehicle_frames_is_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.jsonl");
        let mut p = processor(&path);
        let frames = vec![
            car_with_plate(5),
            FrameDetections::new(6, Vec::new()),
            car_with_plate(7),
        ];
        let report = p.process_buffer(Some(&frames[..]));
        assert_eq!(report.frames_seen, 3);
        assert_eq!(report.frames_recorded, 2);
        assert_eq!(report.ignored_detections, 2);
        assert!(matches!(report.flush, FlushOutcome::Written { frames: 2, .. }));

        let batches = read_log(&path).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0][0].frame_number, 5);
        assert_eq!(batches[0][1].frame_number, 7);
    }

    #[test]
    fn sink_failure_does_not_stop_processing() {
        let dir = tempfile::tempdir().unwrap();
        let mut p = processor(dir.path());
        let frames = vec![car_with_plate(1)];
        let first = p.process_buffer(Some(&frames[..]));
        assert!(matches!(first.flush, FlushOutcome::Failed { frames: 1, .. }));
        let second = p.process_buffer(Some(&frames[..]));
        assert!(matches!(second.flush, FlushOutcome::Failed { .. }));
        assert_eq!(p.stats().batches_failed, 2);
        assert_eq!(p.stats().frames_recorded, 2);
    }

    #[test]
    fn link_frame_accepts_any_object_meta() {
        struct Meta {
            class_id: i32,
            component: i32,
            bbox: BoundingBox,
        }
        impl ObjectMeta for Meta {
            fn label(&self) -> &str {
                "meta"
            }
            fn confidence(&self) -> f32 {
                0.5
            }
            fn bbox(&self) -> BoundingBox {
                self.bbox
            }
            fn unique_component_id(&self) -> i32 {
                self.component
            }
            fn class_id(&self) -> i32 {
                self.class_id
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let p = processor(&dir.path().join("log.jsonl"));
        let objects = [
            Meta {
                class_id: 3,
                component: 1,
                bbox: BoundingBox::new(0.0, 0.0, 50.0, 50.0),
            },
            Meta {
                class_id: 0,
                component: 3,
                bbox: BoundingBox::new(20.0, 20.0, 10.0, 10.0),
            },
        ];
        let vehicles = p.link_frame(&objects);
        assert_eq!(vehicles.len(), 1);
        assert_eq!(vehicles[0].object_id, 0);
        assert_eq!(vehicles[0].brand.as_ref().unwrap().name, "meta");
    }
}
