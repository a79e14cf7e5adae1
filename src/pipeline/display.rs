use super::session::SessionStats;
use super::WorkerContext;
use crate::overlay::DetectionOverlay;
use std::sync::Arc;
use std::thread;
use tracing::{info, trace};

/// Display loop: draws the latest detections onto queued frames and hands
/// them to the surface
pub struct DisplayWorker {
    overlay: Arc<DetectionOverlay>,
    ctx: WorkerContext,
}

impl DisplayWorker {
    pub fn new(overlay: Arc<DetectionOverlay>, ctx: WorkerContext) -> Self {
        Self { overlay, ctx }
    }

    pub fn run(self) {
        info!("Display worker started");

        while self.ctx.is_running() {
            if !self.step() {
                thread::sleep(self.ctx.config.display_idle_sleep());
            }
        }

        info!("Display worker stopped");
    }

    /// Render one frame if one arrives in time; returns false on timeout
    pub fn step(&self) -> bool {
        let Some(mut frame) = self
            .ctx
            .frame_queue
            .poll(self.ctx.config.queue_poll_timeout())
        else {
            return false;
        };

        // Whatever snapshot is current now, even if older than the frame
        if self.ctx.mode.get().includes_objects() {
            let detections = self.ctx.detections.load();
            self.overlay.draw_detections(&mut frame.image, &detections);
        }

        trace!("Displaying frame {}", frame.id);
        self.ctx.surface.show_frame(frame);
        SessionStats::bump(&self.ctx.stats.frames_displayed);
        true
    }
}
