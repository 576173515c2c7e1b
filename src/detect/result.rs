use serde::{Deserialize, Serialize};

use super::meta::ObjectMeta;
use crate::geometry::BoundingBox;

/// Which inference component produced a detection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSource {
    #[serde(default)]
    pub unique_component_id: i32,
    #[serde(default)]
    pub class_id: i32,
}

/// One raw detection for a single frame.
///
/// Missing fields deserialize to zero values so that a partially filled
/// record degrades to a zero-area box instead of failing the whole frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(default)]
    pub object_id: u64,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub confidence: f32,
    #[serde(default)]
    pub bbox: BoundingBox,
    #[serde(flatten)]
    pub source: DetectionSource,
}

impl Detection {
    pub fn new(
        label: impl Into<String>,
        confidence: f32,
        bbox: BoundingBox,
        unique_component_id: i32,
        class_id: i32,
    ) -> Self {
        Self {
            object_id: 0,
            label: label.into(),
            confidence,
            bbox,
            source: DetectionSource {
                unique_component_id,
                class_id,
            },
        }
    }

    pub fn with_object_id(mut self, object_id: u64) -> Self {
        self.object_id = object_id;
        self
    }
}

impl ObjectMeta for Detection {
    fn label(&self) -> &str {
        &self.label
    }

    fn confidence(&self) -> f32 {
        self.confidence
    }

    fn bbox(&self) -> BoundingBox {
        self.bbox
    }

    fn unique_component_id(&self) -> i32 {
        self.source.unique_component_id
    }

    fn class_id(&self) -> i32 {
        self.source.class_id
    }

    fn object_id(&self) -> u64 {
        self.object_id
    }
}

/// All detections the framework delivered for one frame.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame_number: u64,
    #[serde(default)]
    pub objects: Vec<Detection>,
}

impl FrameDetections {
    pub fn new(frame_number: u64, objects: Vec<Detection>) -> Self {
        Self {
            frame_number,
            objects,
        }
    }
}
