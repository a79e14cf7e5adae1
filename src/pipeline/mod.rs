mod capture;
mod coordinator;
mod detect;
mod display;
mod handoff;
mod mode;
mod session;
mod shared;

pub use capture::{CaptureStep, CaptureWorker};
pub use coordinator::{Coordinator, CoordinatorBuilder, Flow};
pub use detect::DetectWorker;
pub use display::DisplayWorker;
pub use handoff::{HandoffQueue, Offer};
pub use mode::AnalysisMode;
pub use session::{PipelineState, SessionInfo, SessionStats, SessionStatsSnapshot};
pub use shared::LatestCell;

use crate::analyzer::Detection;
use crate::config::PipelineConfig;
use crate::frame::Frame;
use crate::surface::DisplaySurface;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Work item for the Detect worker
#[derive(Debug, Clone)]
pub struct DetectionJob {
    /// Frame downscaled for the object analyzer
    pub frame: Frame,
    /// Scale applied to produce `frame` (1.0 when not resized)
    pub scale: f64,
    /// (height, width) of the frame before downscaling
    pub original_size: (u32, u32),
}

/// Everything the workers of one session share
#[derive(Clone)]
pub struct WorkerContext {
    pub mode: LatestCell<AnalysisMode>,
    pub detections: LatestCell<Vec<Detection>>,
    pub frame_queue: HandoffQueue<Frame>,
    pub detection_queue: HandoffQueue<DetectionJob>,
    pub surface: Arc<dyn DisplaySurface>,
    pub stats: Arc<SessionStats>,
    pub cancel: CancellationToken,
    pub config: PipelineConfig,
}

impl WorkerContext {
    pub fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }
}
