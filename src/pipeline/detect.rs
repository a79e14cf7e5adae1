use super::session::SessionStats;
use super::{DetectionJob, WorkerContext};
use crate::analyzer::{rescale_detections, ObjectAnalyzer};
use crate::error::VidwatchError;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, info, trace};

/// Detect loop: runs the object analyzer on queued jobs and publishes the
/// rescaled results as the latest snapshot
pub struct DetectWorker {
    analyzer: Arc<dyn ObjectAnalyzer>,
    ctx: WorkerContext,
}

impl DetectWorker {
    pub fn new(analyzer: Arc<dyn ObjectAnalyzer>, ctx: WorkerContext) -> Self {
        Self { analyzer, ctx }
    }

    pub fn run(self) {
        info!("Detect worker started with '{}'", self.analyzer.name());

        while self.ctx.is_running() {
            self.step();
        }

        info!("Detect worker stopped");
    }

    /// Wait for one job and process it; returns false when the poll timed out
    pub fn step(&self) -> bool {
        match self
            .ctx
            .detection_queue
            .poll(self.ctx.config.queue_poll_timeout())
        {
            Some(job) => {
                self.process(job);
                true
            }
            None => false,
        }
    }

    /// Analyze one job. Failures are reported and never end the loop.
    pub fn process(&self, job: DetectionJob) {
        let analyzer = Arc::clone(&self.analyzer);
        let image = &job.frame.image;

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| analyzer.detect(image)))
            .unwrap_or_else(|_| Err(VidwatchError::detection("object analyzer panicked")));

        match outcome {
            Ok(detections) => {
                SessionStats::bump(&self.ctx.stats.detection_cycles);

                // Results for a mode that no longer shows objects would
                // resurrect a list the coordinator just cleared
                if !self.ctx.mode.get().includes_objects() {
                    trace!("Discarding detections for frame {}", job.frame.id);
                    return;
                }

                let detections = rescale_detections(detections, job.scale);
                debug!(
                    "Frame {} ({}x{}): {} detection(s)",
                    job.frame.id,
                    job.original_size.1,
                    job.original_size.0,
                    detections.len()
                );

                self.ctx.detections.store(detections.clone());
                self.ctx.surface.set_detection_results(&detections);
            }
            Err(e) => {
                SessionStats::bump(&self.ctx.stats.detection_errors);
                error!("Object detection failed on frame {}: {}", job.frame.id, e);

                let details = match e {
                    VidwatchError::Detection { details } => details,
                    other => other.to_string(),
                };
                self.ctx
                    .surface
                    .set_status_message(&format!("Detection error: {}", details));
            }
        }
    }
}
