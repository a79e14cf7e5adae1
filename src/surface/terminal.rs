use super::{ControlState, DisplaySurface};
use crate::analyzer::Detection;
use crate::config::DisplayConfig;
use crate::error::Result;
use crate::frame::Frame;
use image::ImageFormat;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Headless surface that reports through the log
///
/// Only transitions are logged (motion on/off, changed result lists, new
/// status text) so a running pipeline does not flood the output. When a
/// preview path is configured every Nth rendered frame is written there as
/// a JPEG.
pub struct TerminalSurface {
    preview_path: Option<PathBuf>,
    preview_every: u64,
    frames_rendered: AtomicU64,
    preview_errors: AtomicU64,
    last_motion: Mutex<Option<bool>>,
    last_results: Mutex<Vec<String>>,
    last_status: Mutex<String>,
    last_controls: Mutex<Option<ControlState>>,
}

impl TerminalSurface {
    pub fn new(config: &DisplayConfig) -> Self {
        if let Some(path) = &config.preview_path {
            info!(
                "Writing preview frames to {} every {} frame(s)",
                path, config.preview_every
            );
        }

        Self {
            preview_path: config.preview_path.as_ref().map(PathBuf::from),
            preview_every: config.preview_every.max(1),
            frames_rendered: AtomicU64::new(0),
            preview_errors: AtomicU64::new(0),
            last_motion: Mutex::new(None),
            last_results: Mutex::new(Vec::new()),
            last_status: Mutex::new(String::new()),
            last_controls: Mutex::new(None),
        }
    }

    pub fn frames_rendered(&self) -> u64 {
        self.frames_rendered.load(Ordering::Relaxed)
    }

    pub fn preview_errors(&self) -> u64 {
        self.preview_errors.load(Ordering::Relaxed)
    }

    pub fn last_status(&self) -> String {
        self.last_status.lock().clone()
    }

    /// Write through a temporary file so readers never see a partial JPEG
    fn write_preview(path: &Path, frame: &Frame) -> Result<()> {
        let tmp = path.with_extension("tmp");
        frame.image.save_with_format(&tmp, ImageFormat::Jpeg)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl DisplaySurface for TerminalSurface {
    fn show_frame(&self, frame: Frame) {
        let rendered = self.frames_rendered.fetch_add(1, Ordering::Relaxed) + 1;

        if let Some(path) = &self.preview_path {
            if rendered == 1 || rendered % self.preview_every == 0 {
                if let Err(e) = Self::write_preview(path, &frame) {
                    self.preview_errors.fetch_add(1, Ordering::Relaxed);
                    warn!("Failed to write preview {}: {}", path.display(), e);
                }
            }
        }

        debug!(
            "Rendered frame {} ({}x{})",
            frame.id,
            frame.width(),
            frame.height()
        );
    }

    fn set_motion_status(&self, text: &str, detected: bool) {
        let mut last = self.last_motion.lock();
        if *last != Some(detected) {
            info!("Motion: {}", text);
            *last = Some(detected);
        }
    }

    fn set_detection_results(&self, detections: &[Detection]) {
        let labels: Vec<String> = detections.iter().map(Detection::display_label).collect();

        let mut last = self.last_results.lock();
        if *last != labels {
            if labels.is_empty() {
                info!("Objects: none");
            } else {
                info!("Objects: {}", labels.join(", "));
            }
            *last = labels;
        }
    }

    fn set_status_message(&self, text: &str) {
        let mut last = self.last_status.lock();
        if *last != text {
            info!("Status: {}", text);
            *last = text.to_string();
        }
    }

    fn set_controls(&self, controls: ControlState) {
        let mut last = self.last_controls.lock();
        if *last != Some(controls) {
            debug!("Controls: {:?}", controls);
            *last = Some(controls);
        }
    }
}
