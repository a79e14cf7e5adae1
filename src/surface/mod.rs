mod mock;
mod terminal;
#[cfg(test)]
mod tests;

pub use mock::{MockSurface, SurfaceEvent};
pub use terminal::TerminalSurface;

use crate::analyzer::Detection;
use crate::frame::Frame;
use crate::pipeline::AnalysisMode;
use std::path::PathBuf;

/// Which user controls are currently usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ControlState {
    /// A source is configured, so analysis can be started
    pub start_enabled: bool,
    /// Analysis is running (the start control acts as stop)
    pub running: bool,
    /// Loading a file or switching to the camera is allowed
    pub source_controls_enabled: bool,
}

/// User commands delivered to the coordinator
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    LoadSource(PathBuf),
    UseCamera,
    ToggleStartStop,
    ChangeMode(AnalysisMode),
    Close,
}

/// Where the pipeline reports frames, results and status.
///
/// Calls arrive from worker threads as well as the control thread and must
/// not block for long; a surface that renders slowly should hand the work
/// off internally.
pub trait DisplaySurface: Send + Sync {
    /// Render a frame
    fn show_frame(&self, frame: Frame);

    /// Update the motion indicator, e.g. `("Detected", true)`
    fn set_motion_status(&self, text: &str, detected: bool);

    /// Replace the displayed result list
    fn set_detection_results(&self, detections: &[Detection]);

    /// Replace the single status line
    fn set_status_message(&self, text: &str);

    fn set_controls(&self, _controls: ControlState) {}
}
