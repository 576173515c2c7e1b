use crate::geometry::BoundingBox;

/// Per-object metadata as delivered by the inference framework.
///
/// # Read-only snapshot
///
/// Implementations wrap metadata owned by the framework (often GPU-resident
/// buffers mapped for the duration of one callback). The classifier copies
/// every field it keeps, so nothing borrowed through this trait outlives the
/// processing of the frame it came from.
pub trait ObjectMeta {
    /// Model label, or plate text for the plate classifier.
    fn label(&self) -> &str;

    fn confidence(&self) -> f32;

    fn bbox(&self) -> BoundingBox;

    /// Identifier of the inference component that produced the object.
    fn unique_component_id(&self) -> i32;

    fn class_id(&self) -> i32;

    /// Tracker-assigned identifier. Zero when the object is untracked.
    fn object_id(&self) -> u64 {
        0
    }
}
