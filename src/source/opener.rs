use super::sequence::{is_image_path, ImageSequenceSource};
use super::synthetic::{SyntheticSource, STUB_SCHEME};
use super::{FrameSource, SourceSpec};
use crate::config::SourceConfig;
use crate::error::{Result, VidwatchError};
use std::path::Path;
use tracing::info;

/// Opens frame sources on behalf of the coordinator
pub trait SourceOpener: Send + Sync {
    /// Open a source, failing with `SourceUnavailable` when it cannot be read
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>>;
}

/// Opener selecting a backend from the address and enabled features
pub struct DefaultSourceOpener {
    config: SourceConfig,
}

impl DefaultSourceOpener {
    pub fn new(config: SourceConfig) -> Self {
        Self { config }
    }

    fn open_file(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let address = path.to_string_lossy();
        if address.starts_with(STUB_SCHEME) {
            return Ok(Box::new(SyntheticSource::from_address(&address)?));
        }

        if !path.exists() {
            return Err(VidwatchError::source_unavailable(format!(
                "{} does not exist",
                path.display()
            )));
        }

        if path.is_dir() || is_image_path(path) {
            return Ok(Box::new(ImageSequenceSource::open(path)?));
        }

        #[cfg(feature = "video_decoding")]
        {
            Ok(Box::new(super::GstFileSource::open(path, &self.config)?))
        }

        #[cfg(not(feature = "video_decoding"))]
        {
            Err(VidwatchError::source_unavailable(format!(
                "cannot decode {}: built without the video_decoding feature",
                path.display()
            )))
        }
    }

    #[allow(unused_variables)]
    fn open_camera(&self, index: u32) -> Result<Box<dyn FrameSource>> {
        #[cfg(feature = "camera")]
        {
            Ok(Box::new(super::GstCameraSource::open(index, &self.config)?))
        }

        #[cfg(not(feature = "camera"))]
        {
            Err(VidwatchError::source_unavailable(format!(
                "camera {} unavailable: built without the camera feature",
                index
            )))
        }
    }
}

impl SourceOpener for DefaultSourceOpener {
    fn open(&self, spec: &SourceSpec) -> Result<Box<dyn FrameSource>> {
        info!("Opening video source: {}", spec);
        match spec {
            SourceSpec::File(path) => self.open_file(path),
            SourceSpec::Camera(index) => self.open_camera(*index),
        }
    }
}
