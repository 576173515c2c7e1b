use std::collections::BTreeSet;

use super::meta::ObjectMeta;
use crate::frame::VehicleRecord;
use crate::geometry::{finite_or_zero, BoundingBox};

pub const DEFAULT_VEHICLE_CLASS_IDS: [i32; 4] = [2, 3, 5, 7];
pub const DEFAULT_PLATE_COMPONENT_ID: i32 = 2;
pub const DEFAULT_BRAND_COMPONENT_ID: i32 = 3;

/// Bucket a detection falls into.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionKind {
    Vehicle,
    Plate,
    Brand,
    /// Matches no discriminant. Ignored, not an error.
    Unknown,
}

/// Discriminant policy deciding which bucket a detection belongs to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassifierPolicy {
    pub vehicle_class_ids: BTreeSet<i32>,
    pub plate_component_id: i32,
    pub brand_component_id: i32,
}

impl Default for ClassifierPolicy {
    fn default() -> Self {
        Self {
            vehicle_class_ids: DEFAULT_VEHICLE_CLASS_IDS.into_iter().collect(),
            plate_component_id: DEFAULT_PLATE_COMPONENT_ID,
            brand_component_id: DEFAULT_BRAND_COMPONENT_ID,
        }
    }
}

/// A brand or plate detection waiting to be linked to a vehicle. Its values
/// are always finite.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
    pub label: String,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Candidate {
    fn from_meta<M: ObjectMeta>(meta: &M, bbox: BoundingBox) -> Self {
        Self {
            label: meta.label().to_string(),
            confidence: finite_or_zero(meta.confidence()),
            bbox,
        }
    }
}

/// One frame's detections split into buckets, each in arrival order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassifiedFrame {
    pub vehicles: Vec<VehicleRecord>,
    pub brands: Vec<Candidate>,
    pub plates: Vec<Candidate>,
    /// Detections that matched no discriminant.
    pub ignored: usize,
}

#[derive(Clone, Debug, Default)]
pub struct DetectionClassifier {
    policy: ClassifierPolicy,
}

impl DetectionClassifier {
    pub fn new(policy: ClassifierPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &ClassifierPolicy {
        &self.policy
    }

    /// Vehicle class wins over component id: a vehicle-class box produced by
    /// a secondary component is still a vehicle.
    pub fn kind_of<M: ObjectMeta>(&self, meta: &M) -> DetectionKind {
        if self.policy.vehicle_class_ids.contains(&meta.class_id()) {
            DetectionKind::Vehicle
        } else if meta.unique_component_id() == self.policy.plate_component_id {
            DetectionKind::Plate
        } else if meta.unique_component_id() == self.policy.brand_component_id {
            DetectionKind::Brand
        } else {
            DetectionKind::Unknown
        }
    }

    /// NaN or infinite confidences and box coordinates are replaced with zero,
    /// so a malformed detection links by center at best and never reaches
    /// the log as JSON `null`.
    pub fn classify<M: ObjectMeta>(&self, objects: &[M]) -> ClassifiedFrame {
        let mut out = ClassifiedFrame::default();
        for meta in objects {
            let raw = meta.bbox();
            if !raw.is_finite() || !meta.confidence().is_finite() {
                log::warn!(
                    "detection {:?} has non-finite values; replaced with 0",
                    meta.label()
                );
            }
            let bbox = raw.sanitized();
            log::debug!(
                "detection label={:?} component={} class={} bbox=({}, {}, {}, {})",
                meta.label(),
                meta.unique_component_id(),
                meta.class_id(),
                bbox.left,
                bbox.top,
                bbox.width,
                bbox.height
            );
            if bbox.is_degenerate() {
                log::debug!("degenerate box for {:?}; center match only", meta.label());
            }
            match self.kind_of(meta) {
                DetectionKind::Vehicle => out.vehicles.push(VehicleRecord::seed(
                    meta.object_id(),
                    meta.class_id(),
                    meta.label(),
                    bbox,
                )),
                DetectionKind::Plate => out.plates.push(Candidate::from_meta(meta, bbox)),
                DetectionKind::Brand => out.brands.push(Candidate::from_meta(meta, bbox)),
                DetectionKind::Unknown => out.ignored += 1,
            }
        }
        out
    }
}
