use crate::config::DetectorConfig;
use crate::error::{Result, VidwatchError};
use image::RgbImage;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Pixel-space box as (x, y, width, height)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl BoundingBox {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Map a box found on a downscaled frame back to the original frame.
    ///
    /// Each component is divided by `scale` and truncated. A scale of exactly
    /// 1.0 returns the box untouched.
    pub fn rescale(self, scale: f64) -> Self {
        if scale == 1.0 {
            return self;
        }

        let undo = |v: i32| (v as f64 / scale) as i32;
        Self {
            x: undo(self.x),
            y: undo(self.y),
            width: undo(self.width),
            height: undo(self.height),
        }
    }
}

/// One recognised object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub label: String,
    /// Score in [0, 1]
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new<S: Into<String>>(label: S, confidence: f32, bbox: BoundingBox) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }

    pub fn rescaled(self, scale: f64) -> Self {
        Self {
            bbox: self.bbox.rescale(scale),
            ..self
        }
    }

    /// Text drawn next to the box and shown in result lists, e.g. `person: 87%`
    pub fn display_label(&self) -> String {
        format!("{}: {}%", self.label, (self.confidence * 100.0) as i32)
    }
}

impl fmt::Display for Detection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} at ({}, {}) {}x{}",
            self.display_label(),
            self.bbox.x,
            self.bbox.y,
            self.bbox.width,
            self.bbox.height
        )
    }
}

/// Rescale a whole result list back to original-frame coordinates
pub fn rescale_detections(detections: Vec<Detection>, scale: f64) -> Vec<Detection> {
    if scale == 1.0 {
        return detections;
    }
    detections.into_iter().map(|d| d.rescaled(scale)).collect()
}

/// Heavy object recognition model
///
/// Implementations are shared between Detect worker runs and must not keep
/// per-call state. Boxes are in the coordinates of the image passed in.
pub trait ObjectAnalyzer: Send + Sync {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>>;

    fn name(&self) -> &str {
        "object_analyzer"
    }
}

/// Builds the object analyzer on first use
pub trait ObjectAnalyzerFactory: Send + Sync {
    fn construct(&self) -> Result<Arc<dyn ObjectAnalyzer>>;
}

impl<F> ObjectAnalyzerFactory for F
where
    F: Fn() -> Result<Arc<dyn ObjectAnalyzer>> + Send + Sync,
{
    fn construct(&self) -> Result<Arc<dyn ObjectAnalyzer>> {
        self()
    }
}

/// Factory loading the ONNX model named in the detector configuration
pub struct DefaultObjectAnalyzerFactory {
    config: DetectorConfig,
}

impl DefaultObjectAnalyzerFactory {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }
}

impl ObjectAnalyzerFactory for DefaultObjectAnalyzerFactory {
    #[cfg(feature = "object_detection")]
    fn construct(&self) -> Result<Arc<dyn ObjectAnalyzer>> {
        let analyzer = super::tract::TractObjectAnalyzer::load(&self.config)?;
        Ok(Arc::new(analyzer))
    }

    #[cfg(not(feature = "object_detection"))]
    fn construct(&self) -> Result<Arc<dyn ObjectAnalyzer>> {
        Err(VidwatchError::model_load(format!(
            "cannot load {}: built without the object_detection feature",
            self.config.model_path
        )))
    }
}

/// Load state of the object analyzer
#[derive(Clone)]
pub enum AnalyzerState {
    NotLoaded,
    Loaded(Arc<dyn ObjectAnalyzer>),
    Failed(String),
}

impl fmt::Debug for AnalyzerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnalyzerState::NotLoaded => write!(f, "NotLoaded"),
            AnalyzerState::Loaded(analyzer) => write!(f, "Loaded({})", analyzer.name()),
            AnalyzerState::Failed(reason) => write!(f, "Failed({})", reason),
        }
    }
}

/// Coordinator-owned holder for the lazily constructed object analyzer.
///
/// A successful load is kept for the life of the slot unless `reset` is
/// called. A failed load is remembered and retried on the next
/// `ensure_loaded`, which only happens on a user-triggered start or mode
/// change.
pub struct ObjectAnalyzerSlot {
    factory: Box<dyn ObjectAnalyzerFactory>,
    state: AnalyzerState,
    load_attempts: u32,
}

impl ObjectAnalyzerSlot {
    pub fn new(factory: Box<dyn ObjectAnalyzerFactory>) -> Self {
        Self {
            factory,
            state: AnalyzerState::NotLoaded,
            load_attempts: 0,
        }
    }

    /// Return the loaded analyzer, constructing it if needed
    pub fn ensure_loaded(&mut self) -> Result<Arc<dyn ObjectAnalyzer>> {
        if let AnalyzerState::Loaded(analyzer) = &self.state {
            return Ok(Arc::clone(analyzer));
        }

        if let AnalyzerState::Failed(reason) = &self.state {
            info!("Retrying object analyzer load after earlier failure: {}", reason);
        }

        self.load_attempts += 1;
        match self.factory.construct() {
            Ok(analyzer) => {
                info!("Object analyzer '{}' loaded", analyzer.name());
                self.state = AnalyzerState::Loaded(Arc::clone(&analyzer));
                Ok(analyzer)
            }
            Err(e) => {
                let error = match e {
                    VidwatchError::ModelLoad { .. } => e,
                    other => VidwatchError::model_load(other.to_string()),
                };
                warn!("Object analyzer failed to load: {}", error);
                self.state = AnalyzerState::Failed(error.to_string());
                Err(error)
            }
        }
    }

    pub fn current(&self) -> Option<Arc<dyn ObjectAnalyzer>> {
        match &self.state {
            AnalyzerState::Loaded(analyzer) => Some(Arc::clone(analyzer)),
            _ => None,
        }
    }

    pub fn is_loaded(&self) -> bool {
        matches!(self.state, AnalyzerState::Loaded(_))
    }

    pub fn state(&self) -> &AnalyzerState {
        &self.state
    }

    pub fn load_attempts(&self) -> u32 {
        self.load_attempts
    }

    /// Forget the current analyzer so the next use constructs a new one
    pub fn reset(&mut self) {
        self.state = AnalyzerState::NotLoaded;
    }
}
