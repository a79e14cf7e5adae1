mod labels;
mod motion;
mod object;
#[cfg(feature = "object_detection")]
mod tract;
#[cfg(test)]
mod tests;

pub use labels::{coco_label, UNKNOWN_LABEL};
pub use motion::{MotionAnalyzer, MotionRegion, MotionResult};
pub use object::{
    rescale_detections, AnalyzerState, BoundingBox, DefaultObjectAnalyzerFactory, Detection,
    ObjectAnalyzer, ObjectAnalyzerFactory, ObjectAnalyzerSlot,
};
#[cfg(feature = "object_detection")]
pub use tract::TractObjectAnalyzer;
