mod opener;
mod sequence;
mod synthetic;
#[cfg(any(feature = "camera", feature = "video_decoding"))]
mod gst;
#[cfg(test)]
mod tests;

pub use opener::{DefaultSourceOpener, SourceOpener};
pub use sequence::ImageSequenceSource;
pub use synthetic::SyntheticSource;
#[cfg(feature = "camera")]
pub use gst::GstCameraSource;
#[cfg(feature = "video_decoding")]
pub use gst::GstFileSource;

use crate::error::SourceError;
use crate::frame::Frame;
use std::fmt;
use std::path::PathBuf;

/// Where frames come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSpec {
    /// Video file, image directory, single image or `stub://` source (loops)
    File(PathBuf),
    /// Live camera by device index (never loops)
    Camera(u32),
}

impl SourceSpec {
    pub fn kind(&self) -> SourceKind {
        match self {
            SourceSpec::File(_) => SourceKind::File,
            SourceSpec::Camera(_) => SourceKind::Camera,
        }
    }
}

impl fmt::Display for SourceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceSpec::File(path) => write!(f, "{}", path.display()),
            SourceSpec::Camera(index) => write!(f, "camera {}", index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    File,
    Camera,
}

/// An opened source of ordered frames
///
/// Sources are owned by exactly one thread at a time; the coordinator lends
/// the handle to the capture worker for the duration of a session.
pub trait FrameSource: Send {
    fn kind(&self) -> SourceKind;

    /// Read the next frame.
    ///
    /// File sources return `EndOfStream` after the last frame; camera sources
    /// report hiccups as `Transient`.
    fn read(&mut self) -> Result<Frame, SourceError>;

    /// Rewind to the first frame
    fn seek_to_start(&mut self) -> Result<(), SourceError>;

    /// Release the underlying device or file
    fn close(&mut self);

    /// Human-readable description used in logs and status text
    fn describe(&self) -> String;
}
