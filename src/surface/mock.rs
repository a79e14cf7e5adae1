use super::{ControlState, DisplaySurface};
use crate::analyzer::Detection;
use crate::frame::Frame;
use parking_lot::Mutex;
use tracing::trace;

/// One recorded surface call
#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceEvent {
    Frame { id: u64, position: u64 },
    MotionStatus { text: String, detected: bool },
    DetectionResults(Vec<Detection>),
    Status(String),
    Controls(ControlState),
}

/// Surface that records every call, for tests and headless runs
#[derive(Default)]
pub struct MockSurface {
    events: Mutex<Vec<SurfaceEvent>>,
    last_frame: Mutex<Option<Frame>>,
}

impl MockSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SurfaceEvent> {
        self.events.lock().clone()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }

    pub fn frames_shown(&self) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|e| matches!(e, SurfaceEvent::Frame { .. }))
            .count()
    }

    pub fn last_frame(&self) -> Option<Frame> {
        self.last_frame.lock().clone()
    }

    pub fn statuses(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::Status(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_status(&self) -> Option<String> {
        self.statuses().pop()
    }

    pub fn motion_statuses(&self) -> Vec<(String, bool)> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::MotionStatus { text, detected } => Some((text.clone(), *detected)),
                _ => None,
            })
            .collect()
    }

    pub fn detection_results(&self) -> Vec<Vec<Detection>> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                SurfaceEvent::DetectionResults(list) => Some(list.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn last_controls(&self) -> Option<ControlState> {
        self.events.lock().iter().rev().find_map(|e| match e {
            SurfaceEvent::Controls(controls) => Some(*controls),
            _ => None,
        })
    }

    fn record(&self, event: SurfaceEvent) {
        trace!("Surface event: {:?}", event);
        self.events.lock().push(event);
    }
}

impl DisplaySurface for MockSurface {
    fn show_frame(&self, frame: Frame) {
        self.record(SurfaceEvent::Frame {
            id: frame.id,
            position: frame.position,
        });
        *self.last_frame.lock() = Some(frame);
    }

    fn set_motion_status(&self, text: &str, detected: bool) {
        self.record(SurfaceEvent::MotionStatus {
            text: text.to_string(),
            detected,
        });
    }

    fn set_detection_results(&self, detections: &[Detection]) {
        self.record(SurfaceEvent::DetectionResults(detections.to_vec()));
    }

    fn set_status_message(&self, text: &str) {
        self.record(SurfaceEvent::Status(text.to_string()));
    }

    fn set_controls(&self, controls: ControlState) {
        self.record(SurfaceEvent::Controls(controls));
    }
}
