use super::session::SessionStats;
use super::{DetectionJob, Offer, WorkerContext};
use crate::analyzer::MotionAnalyzer;
use crate::error::SourceError;
use crate::frame::downscale_for_detection;
use crate::source::{FrameSource, SourceKind};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Result of one capture iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStep {
    /// A frame was read and dispatched
    Processed,
    /// The read failed; try again after the given pause
    Retry(Duration),
}

/// Capture/Analyze loop: reads frames, runs motion analysis and feeds both
/// hand-off queues.
///
/// The worker owns the source and the motion analyzer while it runs and
/// hands them back when the loop ends.
pub struct CaptureWorker {
    source: Box<dyn FrameSource>,
    motion: MotionAnalyzer,
    ctx: WorkerContext,
    frame_count: u64,
    consecutive_failures: u32,
}

impl CaptureWorker {
    pub fn new(source: Box<dyn FrameSource>, motion: MotionAnalyzer, ctx: WorkerContext) -> Self {
        Self {
            source,
            motion,
            ctx,
            frame_count: 0,
            consecutive_failures: 0,
        }
    }

    /// Frames read so far in this session; not reset when a file loops
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// Run until the session is cancelled, then return the source and analyzer
    pub fn run(mut self) -> (Box<dyn FrameSource>, MotionAnalyzer) {
        info!("Capture worker started on {}", self.source.describe());

        while self.ctx.is_running() {
            let pause = match self.step() {
                CaptureStep::Processed => self.frame_interval(),
                CaptureStep::Retry(delay) => delay,
            };
            if !pause.is_zero() {
                thread::sleep(pause);
            }
        }

        info!(
            "Capture worker stopped after {} frame(s)",
            self.frame_count
        );
        (self.source, self.motion)
    }

    /// Read and dispatch a single frame
    pub fn step(&mut self) -> CaptureStep {
        let mode = self.ctx.mode.get();

        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(e) => return self.handle_read_failure(e),
        };
        self.consecutive_failures = 0;
        self.frame_count += 1;
        SessionStats::bump(&self.ctx.stats.frames_captured);

        let skip = self.ctx.config.detection_skip;
        if mode.includes_objects() && self.frame_count % (skip + 1) == 0 {
            let (scaled, scale) = downscale_for_detection(&frame, self.ctx.config.detection_max_width);
            let job = DetectionJob {
                frame: scaled,
                scale,
                original_size: frame.shape(),
            };
            match self.ctx.detection_queue.offer(job) {
                Offer::Accepted => {
                    trace!("Queued frame {} for object detection", self.frame_count);
                    SessionStats::bump(&self.ctx.stats.detection_jobs);
                }
                Offer::Dropped => SessionStats::bump(&self.ctx.stats.detection_drops),
            }
        }

        let frame = if mode.includes_motion() {
            match self.motion.detect(&frame.image) {
                Ok(result) => {
                    let text = if result.detected {
                        SessionStats::bump(&self.ctx.stats.motion_frames);
                        "Detected"
                    } else {
                        "Not Detected"
                    };
                    self.ctx.surface.set_motion_status(text, result.detected);
                    frame.with_image(result.annotated)
                }
                Err(e) => {
                    warn!("Motion analysis failed on frame {}: {}", frame.id, e);
                    frame
                }
            }
        } else {
            frame
        };

        if self.ctx.frame_queue.offer(frame) == Offer::Dropped {
            SessionStats::bump(&self.ctx.stats.display_drops);
        }

        CaptureStep::Processed
    }

    fn handle_read_failure(&mut self, error: SourceError) -> CaptureStep {
        self.consecutive_failures += 1;
        SessionStats::bump(&self.ctx.stats.read_retries);

        match self.source.kind() {
            SourceKind::Camera => {
                debug!("Camera read failed ({}), retrying", error);
                CaptureStep::Retry(self.ctx.config.camera_retry_delay())
            }
            SourceKind::File => {
                if error == SourceError::EndOfStream {
                    debug!("End of {}, looping", self.source.describe());
                    SessionStats::bump(&self.ctx.stats.loops);
                } else {
                    warn!("Read from {} failed ({}), rewinding", self.source.describe(), error);
                }

                if let Err(e) = self.source.seek_to_start() {
                    warn!("Failed to rewind {}: {}", self.source.describe(), e);
                }

                // A file that fails again straight after a rewind is paced
                // like normal playback instead of spinning
                if self.consecutive_failures > 1 {
                    CaptureStep::Retry(self.ctx.config.file_frame_interval())
                } else {
                    CaptureStep::Retry(Duration::ZERO)
                }
            }
        }
    }

    fn frame_interval(&self) -> Duration {
        match self.source.kind() {
            SourceKind::Camera => self.ctx.config.camera_frame_interval(),
            SourceKind::File => self.ctx.config.file_frame_interval(),
        }
    }
}
