//! Per-frame vehicle records and the batch they accumulate into.
//!
//! A `FrameResult` only exists for frames that contained at least one
//! vehicle. Results collect in a `FrameAggregator` for the lifetime of one
//! buffer callback and are handed to the sink as a single batch.

use serde::{Deserialize, Serialize};

use crate::geometry::BoundingBox;

/// Brand attached to a vehicle by the brand classifier.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BrandMatch {
    pub name: String,
    pub confidence: f32,
}

/// License plate attached to a vehicle. `text` is the plate classifier label.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlateMatch {
    pub text: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

/// A vehicle detection enriched with its linked brand and plate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub object_id: u64,
    pub class_id: i32,
    pub label: String,
    pub bbox: BoundingBox,
    pub brand: Option<BrandMatch>,
    pub license_plate: Option<PlateMatch>,
}

impl VehicleRecord {
    /// A freshly classified vehicle with nothing linked yet.
    pub fn seed(object_id: u64, class_id: i32, label: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            object_id,
            class_id,
            label: label.into(),
            bbox,
            brand: None,
            license_plate: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame_number: u64,
    pub objects: Vec<VehicleRecord>,
}

/// Ordered frame results gathered during one buffer callback.
pub type ResultBatch = Vec<FrameResult>;

/// Collects frame results until the batch is taken for flushing.
#[derive(Debug, Default)]
pub struct FrameAggregator {
    batch: ResultBatch,
}

impl FrameAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a frame. Frames without vehicles are dropped and `false` is
    /// returned, even when plates or brands were detected in them.
    pub fn record(&mut self, frame_number: u64, vehicles: Vec<VehicleRecord>) -> bool {
        if vehicles.is_empty() {
            return false;
        }
        self.batch.push(FrameResult {
            frame_number,
            objects: vehicles,
        });
        true
    }

    pub fn len(&self) -> usize {
        self.batch.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batch.is_empty()
    }

    /// Hands over the accumulated batch and leaves the aggregator empty.
    pub fn take_batch(&mut self) -> ResultBatch {
        std::mem::take(&mut self.batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn car(object_id: u64) -> VehicleRecord {
        VehicleRecord::seed(object_id, 2, "car", BoundingBox::new(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn empty_frames_are_not_recorded() {
        let mut agg = FrameAggregator::new();
        assert!(!agg.record(3, Vec::new()));
        assert!(agg.is_empty());
        assert!(agg.take_batch().is_empty());
    }

    #[test]
    fn frames_keep_arrival_order() {
        let mut agg = FrameAggregator::new();
        assert!(agg.record(7, vec![car(1)]));
        assert!(!agg.record(8, Vec::new()));
        assert!(agg.record(9, vec![car(2), car(3)]));
        assert_eq!(agg.len(), 2);

        let batch = agg.take_batch();
        assert_eq!(
            batch.iter().map(|f| f.frame_number).collect::<Vec<_>>(),
            vec![7, 9]
        );
        assert_eq!(batch[1].objects[1].object_id, 3);
        assert!(agg.is_empty());
    }

    #[test]
    fn seeded_vehicle_has_no_links() {
        let v = car(4);
        assert!(v.brand.is_none());
        assert!(v.license_plate.is_none());
    }
}
