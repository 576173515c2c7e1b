//! Detection metadata sources.
//!
//! The live pipeline hands detection metadata to `FrameProcessor` straight
//! from its buffer callback, implementing `ObjectMeta` for the framework's
//! own metadata type. This module provides sources for offline runs:
//! - Recorded metadata files (one buffer callback per line)
//! - Stub source (testing)
//!
//! Sources materialize each buffer into owned `FrameDetections`; nothing
//! refers back to framework memory once a delivery is returned.

pub mod file;

pub use file::{parse_delivery, Delivery, FileConfig, FileSource, FileStats};
