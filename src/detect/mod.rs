mod classifier;
mod meta;
mod result;

pub use classifier::{
    Candidate, ClassifiedFrame, ClassifierPolicy, DetectionClassifier, DetectionKind,
    DEFAULT_BRAND_COMPONENT_ID, DEFAULT_PLATE_COMPONENT_ID, DEFAULT_VEHICLE_CLASS_IDS,
};
pub use meta::ObjectMeta;
pub use result::{Detection, DetectionSource, FrameDetections};
