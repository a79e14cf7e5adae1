use super::AnalysisMode;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Coordinator lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
}

/// Counters updated by the workers of one session
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Frames read from the source
    pub frames_captured: AtomicU64,
    /// Frames handed to the surface by the display worker
    pub frames_displayed: AtomicU64,
    /// Frames discarded because the display slot was occupied
    pub display_drops: AtomicU64,
    /// Detection jobs accepted by the detection queue
    pub detection_jobs: AtomicU64,
    /// Detection jobs discarded because the detection slot was occupied
    pub detection_drops: AtomicU64,
    /// Completed object analyzer runs
    pub detection_cycles: AtomicU64,
    /// Object analyzer runs that failed
    pub detection_errors: AtomicU64,
    /// Frames in which motion was found
    pub motion_frames: AtomicU64,
    /// Source read failures that were retried
    pub read_retries: AtomicU64,
    /// File sources rewound after reaching the end
    pub loops: AtomicU64,
}

impl SessionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics as a snapshot
    pub fn snapshot(&self) -> SessionStatsSnapshot {
        SessionStatsSnapshot {
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_displayed: self.frames_displayed.load(Ordering::Relaxed),
            display_drops: self.display_drops.load(Ordering::Relaxed),
            detection_jobs: self.detection_jobs.load(Ordering::Relaxed),
            detection_drops: self.detection_drops.load(Ordering::Relaxed),
            detection_cycles: self.detection_cycles.load(Ordering::Relaxed),
            detection_errors: self.detection_errors.load(Ordering::Relaxed),
            motion_frames: self.motion_frames.load(Ordering::Relaxed),
            read_retries: self.read_retries.load(Ordering::Relaxed),
            loops: self.loops.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of session statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatsSnapshot {
    pub frames_captured: u64,
    pub frames_displayed: u64,
    pub display_drops: u64,
    pub detection_jobs: u64,
    pub detection_drops: u64,
    pub detection_cycles: u64,
    pub detection_errors: u64,
    pub motion_frames: u64,
    pub read_retries: u64,
    pub loops: u64,
}

/// Identity of one analysis run
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub initial_mode: AnalysisMode,
    pub source: String,
}

impl SessionInfo {
    pub fn new(initial_mode: AnalysisMode, source: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            initial_mode,
            source,
        }
    }

    pub fn elapsed(&self) -> chrono::Duration {
        Utc::now() - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = SessionStats::new();
        SessionStats::bump(&stats.frames_captured);
        SessionStats::bump(&stats.frames_captured);
        SessionStats::bump(&stats.detection_drops);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.frames_captured, 2);
        assert_eq!(snapshot.detection_drops, 1);
        assert_eq!(snapshot.frames_displayed, 0);
    }

    #[test]
    fn test_sessions_get_distinct_ids() {
        let a = SessionInfo::new(AnalysisMode::Motion, "stub://1".to_string());
        let b = SessionInfo::new(AnalysisMode::Motion, "stub://1".to_string());
        assert_ne!(a.id, b.id);
        assert!(a.elapsed() >= chrono::Duration::zero());
    }
}
