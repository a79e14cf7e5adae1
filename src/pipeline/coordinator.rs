use super::session::{PipelineState, SessionInfo, SessionStats, SessionStatsSnapshot};
use super::{
    AnalysisMode, CaptureWorker, DetectWorker, DetectionJob, DisplayWorker, HandoffQueue,
    LatestCell, WorkerContext,
};
use crate::analyzer::{
    AnalyzerState, DefaultObjectAnalyzerFactory, Detection, MotionAnalyzer, ObjectAnalyzer,
    ObjectAnalyzerFactory, ObjectAnalyzerSlot,
};
use crate::config::VidwatchConfig;
use crate::error::{Result, VidwatchError};
use crate::frame::Frame;
use crate::overlay::DetectionOverlay;
use crate::source::{DefaultSourceOpener, FrameSource, SourceKind, SourceOpener, SourceSpec};
use crate::surface::{Command, ControlState, DisplaySurface};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Whether the control loop should keep going after a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

type CaptureHandle = JoinHandle<(Box<dyn FrameSource>, MotionAnalyzer)>;

/// Workers and bookkeeping of the running session
struct ActiveSession {
    info: SessionInfo,
    stats: Arc<SessionStats>,
    ctx: WorkerContext,
    capture: Option<CaptureHandle>,
    display: Option<JoinHandle<()>>,
    detect: Option<JoinHandle<()>>,
}

/// Owns the analysis lifecycle: the source, the two hand-off queues, the
/// shared latest-value cells and the worker threads of the current session.
///
/// All methods are called from a single control thread. Stopping cancels the
/// session and joins every worker before returning, so a following start
/// never overlaps with workers of the previous run.
pub struct Coordinator {
    config: VidwatchConfig,
    opener: Arc<dyn SourceOpener>,
    surface: Arc<dyn DisplaySurface>,
    overlay: Arc<DetectionOverlay>,
    analyzer: ObjectAnalyzerSlot,
    mode: LatestCell<AnalysisMode>,
    detections: LatestCell<Vec<Detection>>,
    frame_queue: HandoffQueue<Frame>,
    detection_queue: HandoffQueue<DetectionJob>,
    source_spec: Option<SourceSpec>,
    source: Option<Box<dyn FrameSource>>,
    motion: Option<MotionAnalyzer>,
    session: Option<ActiveSession>,
    last_stats: Option<SessionStatsSnapshot>,
}

impl Coordinator {
    /// Coordinator with the default source opener and model loader
    pub fn new(config: VidwatchConfig, surface: Arc<dyn DisplaySurface>) -> Self {
        CoordinatorBuilder::new(config).surface(surface).build()
    }

    pub fn builder(config: VidwatchConfig) -> CoordinatorBuilder {
        CoordinatorBuilder::new(config)
    }

    pub fn state(&self) -> PipelineState {
        if self.session.is_some() {
            PipelineState::Running
        } else {
            PipelineState::Idle
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.is_some()
    }

    pub fn mode(&self) -> AnalysisMode {
        self.mode.get()
    }

    pub fn source_spec(&self) -> Option<&SourceSpec> {
        self.source_spec.as_ref()
    }

    pub fn has_open_source(&self) -> bool {
        self.source.is_some()
    }

    /// The current result snapshot
    pub fn latest_detections(&self) -> Arc<Vec<Detection>> {
        self.detections.load()
    }

    pub fn analyzer_state(&self) -> &AnalyzerState {
        self.analyzer.state()
    }

    pub fn session_info(&self) -> Option<&SessionInfo> {
        self.session.as_ref().map(|s| &s.info)
    }

    /// Statistics of the running session, or of the last one if idle
    pub fn session_stats(&self) -> Option<SessionStatsSnapshot> {
        match &self.session {
            Some(session) => Some(session.stats.snapshot()),
            None => self.last_stats.clone(),
        }
    }

    pub fn has_detect_worker(&self) -> bool {
        self.session
            .as_ref()
            .map(|s| s.detect.is_some())
            .unwrap_or(false)
    }

    pub fn controls(&self) -> ControlState {
        let running = self.is_running();
        ControlState {
            start_enabled: running || self.source_spec.is_some(),
            running,
            source_controls_enabled: !running,
        }
    }

    fn publish_controls(&self) {
        self.surface.set_controls(self.controls());
    }

    fn status(&self, text: &str) {
        self.surface.set_status_message(text);
    }

    /// Dispatch a user command
    pub fn handle(&mut self, command: Command) -> Flow {
        debug!("Handling command: {:?}", command);

        let outcome = match command {
            Command::LoadSource(path) => self.configure_source(SourceSpec::File(path)),
            Command::UseCamera => {
                self.configure_source(SourceSpec::Camera(self.config.source.camera_index))
            }
            Command::ToggleStartStop => {
                if self.is_running() {
                    self.stop();
                    Ok(())
                } else {
                    self.start()
                }
            }
            Command::ChangeMode(mode) => self.change_mode(mode),
            Command::Close => {
                self.shutdown();
                return Flow::Exit;
            }
        };

        if let Err(e) = outcome {
            warn!("Command failed: {}", e);
        }
        Flow::Continue
    }

    /// Select and open a new source, previewing its first frame.
    ///
    /// Any previously open source is released first, so switching between a
    /// file and the camera never holds both.
    pub fn configure_source(&mut self, spec: SourceSpec) -> Result<()> {
        if self.is_running() {
            self.status("Stop analysis before changing the source");
            return Err(VidwatchError::InvalidState {
                message: "cannot change the source while analysis is running".to_string(),
            });
        }

        self.release_source();
        if let Some(motion) = self.motion.as_mut() {
            motion.reset();
        }

        let mut source = match self.opener.open(&spec) {
            Ok(source) => source,
            Err(e) => {
                error!("Failed to open {}: {}", spec, e);
                self.source_spec = None;
                let text = match &spec {
                    SourceSpec::Camera(_) => "Error: Could not open camera".to_string(),
                    SourceSpec::File(path) => format!("Error: Could not open {}", path.display()),
                };
                self.status(&text);
                self.publish_controls();

                return Err(match e {
                    VidwatchError::SourceUnavailable { .. } => e,
                    other => VidwatchError::source_unavailable(other.to_string()),
                });
            }
        };

        match source.read() {
            Ok(frame) => {
                debug!("Previewing frame {} of {}", frame.id, spec);
                self.surface.show_frame(frame);
            }
            Err(e) => warn!("No preview frame from {}: {}", spec, e),
        }

        let text = match &spec {
            SourceSpec::File(path) => format!("Loaded: {}", path.display()),
            SourceSpec::Camera(_) => "Using camera as input".to_string(),
        };
        info!("Source configured: {}", source.describe());

        self.source = Some(source);
        self.source_spec = Some(spec);
        self.status(&text);
        self.publish_controls();
        Ok(())
    }

    /// Begin analysing the configured source. Does nothing when already running.
    pub fn start(&mut self) -> Result<()> {
        if self.is_running() {
            debug!("Start requested while running; ignoring");
            return Ok(());
        }

        let spec = match &self.source_spec {
            Some(spec) => spec.clone(),
            None => {
                self.status("Error: No video source selected");
                return Err(VidwatchError::NoSource {
                    details: "no source configured".to_string(),
                });
            }
        };

        // A released source (e.g. camera closed after a failure) is reopened
        if self.source.is_none() {
            info!("Reopening {}", spec);
            match self.opener.open(&spec) {
                Ok(source) => self.source = Some(source),
                Err(e) => {
                    error!("Failed to reopen {}: {}", spec, e);
                    let text = match spec {
                        SourceSpec::Camera(_) => "Error: Could not open camera".to_string(),
                        SourceSpec::File(ref path) => {
                            format!("Error: Could not open {}", path.display())
                        }
                    };
                    self.status(&text);
                    self.publish_controls();
                    return Err(VidwatchError::NoSource {
                        details: e.to_string(),
                    });
                }
            }
        }

        let mode = self.mode.get();
        let analyzer = if mode.includes_objects() {
            Some(self.load_analyzer()?)
        } else {
            None
        };

        let mut source = match self.source.take() {
            Some(source) => source,
            None => {
                return Err(VidwatchError::InvalidState {
                    message: "source disappeared before start".to_string(),
                })
            }
        };

        self.detections.store(Vec::new());
        self.surface.set_detection_results(&[]);
        self.frame_queue.drain();
        self.detection_queue.drain();

        if source.kind() == SourceKind::File {
            if let Err(e) = source.seek_to_start() {
                warn!("Failed to rewind {}: {}", source.describe(), e);
            }
        }

        let mut motion = self
            .motion
            .take()
            .unwrap_or_else(|| MotionAnalyzer::new(self.config.motion.clone()));
        motion.reset();

        let stats = Arc::new(SessionStats::new());
        let info = SessionInfo::new(mode, source.describe());
        let ctx = WorkerContext {
            mode: self.mode.clone(),
            detections: self.detections.clone(),
            frame_queue: self.frame_queue.clone(),
            detection_queue: self.detection_queue.clone(),
            surface: Arc::clone(&self.surface),
            stats: Arc::clone(&stats),
            cancel: CancellationToken::new(),
            config: self.config.pipeline.clone(),
        };

        let capture_worker = CaptureWorker::new(source, motion, ctx.clone());
        let capture = thread::Builder::new()
            .name("vidwatch-capture".to_string())
            .spawn(move || capture_worker.run())?;

        let mut session = ActiveSession {
            info,
            stats,
            ctx,
            capture: Some(capture),
            display: None,
            detect: None,
        };

        let display_worker = DisplayWorker::new(Arc::clone(&self.overlay), session.ctx.clone());
        match thread::Builder::new()
            .name("vidwatch-display".to_string())
            .spawn(move || display_worker.run())
        {
            Ok(handle) => session.display = Some(handle),
            Err(e) => {
                self.finish_session(session);
                return Err(e.into());
            }
        }

        if let Some(analyzer) = analyzer {
            match Self::spawn_detect(analyzer, &session.ctx) {
                Ok(handle) => session.detect = Some(handle),
                Err(e) => {
                    self.finish_session(session);
                    return Err(e);
                }
            }
        }

        info!(
            "Analysis session {} started on {} in {} mode",
            session.info.id, session.info.source, mode
        );
        self.session = Some(session);
        self.status(&format!("Analysis started ({})", mode.title()));
        self.publish_controls();
        Ok(())
    }

    /// Stop analysis and wait for every worker to exit. Does nothing when idle.
    pub fn stop(&mut self) {
        let Some(session) = self.session.take() else {
            debug!("Stop requested while idle; ignoring");
            return;
        };

        self.finish_session(session);
        self.status("Analysis stopped");
        self.publish_controls();
    }

    /// Switch the analysis mode, loading the object analyzer first if the
    /// new mode needs it while running.
    ///
    /// A failed load leaves the previous mode and results in place. The motion
    /// status is never touched here.
    pub fn change_mode(&mut self, new_mode: AnalysisMode) -> Result<()> {
        let old_mode = self.mode.get();
        if old_mode == new_mode {
            return Ok(());
        }

        let analyzer = if new_mode.includes_objects() && self.is_running() {
            Some(self.load_analyzer()?)
        } else {
            None
        };

        // The Detect worker exists before any worker can observe the new mode
        if let (Some(analyzer), Some(session)) = (analyzer, self.session.as_mut()) {
            if session.detect.is_none() {
                let handle = Self::spawn_detect(analyzer, &session.ctx)?;
                session.detect = Some(handle);
                info!("Detect worker added to running session");
            }
        }

        self.mode.store(new_mode);
        info!("Analysis mode changed: {} -> {}", old_mode, new_mode);

        if old_mode.includes_objects() != new_mode.includes_objects() {
            self.detections.store(Vec::new());
            self.surface.set_detection_results(&[]);
        }

        Ok(())
    }

    /// Stop analysis and release the source
    pub fn shutdown(&mut self) {
        info!("Shutting down coordinator");
        self.stop();
        self.release_source();
    }

    fn load_analyzer(&mut self) -> Result<Arc<dyn ObjectAnalyzer>> {
        let already_loaded = self.analyzer.is_loaded();
        if !already_loaded {
            self.status("Loading object detection model...");
        }

        match self.analyzer.ensure_loaded() {
            Ok(analyzer) => {
                if !already_loaded {
                    self.status("Model loaded successfully");
                }
                Ok(analyzer)
            }
            Err(e) => {
                self.status(&e.to_string());
                Err(e)
            }
        }
    }

    fn spawn_detect(analyzer: Arc<dyn ObjectAnalyzer>, ctx: &WorkerContext) -> Result<JoinHandle<()>> {
        let worker = DetectWorker::new(analyzer, ctx.clone());
        let handle = thread::Builder::new()
            .name("vidwatch-detect".to_string())
            .spawn(move || worker.run())?;
        Ok(handle)
    }

    /// Cancel, drain and join the workers of a session
    fn finish_session(&mut self, mut session: ActiveSession) {
        session.ctx.cancel.cancel();

        // Drained before joining so no consumer waits on a stale item
        self.frame_queue.drain();
        self.detection_queue.drain();

        if let Some(handle) = session.capture.take() {
            match handle.join() {
                Ok((source, motion)) => {
                    self.source = Some(source);
                    self.motion = Some(motion);
                }
                Err(_) => {
                    error!("Capture worker panicked; the source will be reopened on next start");
                }
            }
        }

        for (name, handle) in [("display", session.display.take()), ("detect", session.detect.take())] {
            if let Some(handle) = handle {
                if handle.join().is_err() {
                    error!("{} worker panicked", name);
                }
            }
        }

        // The capture worker may have queued one more item before exiting
        self.frame_queue.drain();
        self.detection_queue.drain();

        let stats = session.stats.snapshot();
        info!(
            "Analysis session {} finished after {}s: {} captured, {} displayed, {} display drops, \
             {} detection jobs, {} detection drops, {} detection cycles, {} detection errors, \
             {} motion frames",
            session.info.id,
            session.info.elapsed().num_seconds(),
            stats.frames_captured,
            stats.frames_displayed,
            stats.display_drops,
            stats.detection_jobs,
            stats.detection_drops,
            stats.detection_cycles,
            stats.detection_errors,
            stats.motion_frames
        );
        self.last_stats = Some(stats);
    }

    fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            debug!("Releasing {}", source.describe());
            source.close();
        }
    }
}

impl Drop for Coordinator {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            self.finish_session(session);
        }
    }
}

/// Builder for `Coordinator`, allowing collaborators to be substituted
pub struct CoordinatorBuilder {
    config: VidwatchConfig,
    opener: Option<Arc<dyn SourceOpener>>,
    surface: Option<Arc<dyn DisplaySurface>>,
    factory: Option<Box<dyn ObjectAnalyzerFactory>>,
    overlay: Option<DetectionOverlay>,
}

impl CoordinatorBuilder {
    pub fn new(config: VidwatchConfig) -> Self {
        Self {
            config,
            opener: None,
            surface: None,
            factory: None,
            overlay: None,
        }
    }

    pub fn opener(mut self, opener: Arc<dyn SourceOpener>) -> Self {
        self.opener = Some(opener);
        self
    }

    pub fn surface(mut self, surface: Arc<dyn DisplaySurface>) -> Self {
        self.surface = Some(surface);
        self
    }

    pub fn analyzer_factory(mut self, factory: Box<dyn ObjectAnalyzerFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn overlay(mut self, overlay: DetectionOverlay) -> Self {
        self.overlay = Some(overlay);
        self
    }

    pub fn build(self) -> Coordinator {
        let config = self.config;

        let opener = self
            .opener
            .unwrap_or_else(|| Arc::new(DefaultSourceOpener::new(config.source.clone())));
        let surface = self
            .surface
            .unwrap_or_else(|| Arc::new(crate::surface::TerminalSurface::new(&config.display)));
        let factory = self
            .factory
            .unwrap_or_else(|| Box::new(DefaultObjectAnalyzerFactory::new(config.detector.clone())));
        let overlay = self
            .overlay
            .unwrap_or_else(|| DetectionOverlay::new(&config.display));

        let coordinator = Coordinator {
            mode: LatestCell::new(config.pipeline.default_mode),
            detections: LatestCell::new(Vec::new()),
            frame_queue: HandoffQueue::new("frame"),
            detection_queue: HandoffQueue::new("detection"),
            opener,
            surface,
            overlay: Arc::new(overlay),
            analyzer: ObjectAnalyzerSlot::new(factory),
            source_spec: None,
            source: None,
            motion: None,
            session: None,
            last_stats: None,
            config,
        };
        coordinator.publish_controls();
        coordinator
    }
}
