use crate::pipeline::AnalysisMode;
use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Largest accepted `pipeline.detection_skip`
pub const MAX_DETECTION_SKIP: u64 = 10_000;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VidwatchConfig {
    pub source: SourceConfig,
    pub motion: MotionConfig,
    pub detector: DetectorConfig,
    pub pipeline: PipelineConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SourceConfig {
    /// Camera device index (e.g., 0 for /dev/video0)
    #[serde(default = "default_camera_index")]
    pub camera_index: u32,

    /// Requested camera resolution (width, height)
    #[serde(default = "default_camera_resolution")]
    pub camera_resolution: (u32, u32),

    /// Requested camera frames per second
    #[serde(default = "default_camera_fps")]
    pub camera_fps: u32,

    /// How long a single read may wait for the next decoded frame
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Video file, image directory or `stub://` source to load on startup
    #[serde(default)]
    pub file: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct MotionConfig {
    /// Per-pixel difference needed to count as changed
    #[serde(default = "default_delta_threshold")]
    pub delta_threshold: u8,

    /// Minimum region area (in original frame pixels) to count as motion
    #[serde(default = "default_min_contour_area")]
    pub min_contour_area: f64,

    /// Gaussian blur sigma applied before differencing
    #[serde(default = "default_blur_sigma")]
    pub blur_sigma: f32,

    /// Background model learning rate (0..1)
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f32,

    /// Integer downscale applied before analysis (1=full, 2=1/2, 4=1/4)
    #[serde(default = "default_analysis_scale")]
    pub analysis_scale: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DetectorConfig {
    /// Path to the ONNX object detection model
    #[serde(default = "default_model_path")]
    pub model_path: String,

    /// Model input size (width, height)
    #[serde(default = "default_input_size")]
    pub input_size: (u32, u32),

    /// Minimum score for a detection to be reported
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f32,

    /// Output tensor holding normalised boxes
    #[serde(default = "default_boxes_output")]
    pub boxes_output: usize,

    /// Output tensor holding class ids
    #[serde(default = "default_classes_output")]
    pub classes_output: usize,

    /// Output tensor holding scores
    #[serde(default = "default_scores_output")]
    pub scores_output: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct PipelineConfig {
    /// Mode selected when the application starts
    #[serde(default = "default_mode")]
    pub default_mode: AnalysisMode,

    /// Frames skipped between object detection jobs
    #[serde(default = "default_detection_skip")]
    pub detection_skip: u64,

    /// Maximum width of frames handed to the object analyzer
    #[serde(default = "default_detection_max_width")]
    pub detection_max_width: u32,

    /// Timed wait used by consumers when polling their queue
    #[serde(default = "default_queue_poll_timeout_ms")]
    pub queue_poll_timeout_ms: u64,

    /// Pause taken by the display worker after an empty poll
    #[serde(default = "default_display_idle_sleep_ms")]
    pub display_idle_sleep_ms: u64,

    /// Capture pacing for camera sources
    #[serde(default = "default_camera_frame_interval_ms")]
    pub camera_frame_interval_ms: u64,

    /// Capture pacing for file sources
    #[serde(default = "default_file_frame_interval_ms")]
    pub file_frame_interval_ms: u64,

    /// Delay before retrying a failed camera read
    #[serde(default = "default_camera_retry_delay_ms")]
    pub camera_retry_delay_ms: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DisplayConfig {
    /// TrueType font used for detection labels
    #[serde(default = "default_font_path")]
    pub font_path: String,

    /// Label font size
    #[serde(default = "default_font_size")]
    pub font_size: f32,

    /// Optional JPEG written with the latest rendered frame
    #[serde(default)]
    pub preview_path: Option<String>,

    /// Write the preview every N rendered frames
    #[serde(default = "default_preview_every")]
    pub preview_every: u64,
}

impl PipelineConfig {
    pub fn queue_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_poll_timeout_ms)
    }

    pub fn display_idle_sleep(&self) -> Duration {
        Duration::from_millis(self.display_idle_sleep_ms)
    }

    pub fn camera_frame_interval(&self) -> Duration {
        Duration::from_millis(self.camera_frame_interval_ms)
    }

    pub fn file_frame_interval(&self) -> Duration {
        Duration::from_millis(self.file_frame_interval_ms)
    }

    pub fn camera_retry_delay(&self) -> Duration {
        Duration::from_millis(self.camera_retry_delay_ms)
    }
}

impl VidwatchConfig {
    /// Load configuration from default sources (file + environment variables)
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_file("vidwatch.toml")
    }

    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path_str = path.as_ref().to_string_lossy();
        debug!("Loading configuration from: {}", path_str);

        let settings = Config::builder()
            .set_default("source.camera_index", default_camera_index())?
            .set_default(
                "source.camera_resolution",
                vec![default_camera_resolution().0, default_camera_resolution().1],
            )?
            .set_default("source.camera_fps", default_camera_fps())?
            .set_default("source.read_timeout_ms", default_read_timeout_ms())?
            .set_default("motion.delta_threshold", default_delta_threshold() as u32)?
            .set_default("motion.min_contour_area", default_min_contour_area())?
            .set_default("motion.blur_sigma", default_blur_sigma() as f64)?
            .set_default("motion.learning_rate", default_learning_rate() as f64)?
            .set_default("motion.analysis_scale", default_analysis_scale())?
            .set_default("detector.model_path", default_model_path())?
            .set_default(
                "detector.input_size",
                vec![default_input_size().0, default_input_size().1],
            )?
            .set_default(
                "detector.confidence_threshold",
                default_confidence_threshold() as f64,
            )?
            .set_default("detector.boxes_output", default_boxes_output() as i64)?
            .set_default("detector.classes_output", default_classes_output() as i64)?
            .set_default("detector.scores_output", default_scores_output() as i64)?
            .set_default("pipeline.default_mode", default_mode().to_string())?
            .set_default("pipeline.detection_skip", default_detection_skip())?
            .set_default("pipeline.detection_max_width", default_detection_max_width())?
            .set_default(
                "pipeline.queue_poll_timeout_ms",
                default_queue_poll_timeout_ms(),
            )?
            .set_default(
                "pipeline.display_idle_sleep_ms",
                default_display_idle_sleep_ms(),
            )?
            .set_default(
                "pipeline.camera_frame_interval_ms",
                default_camera_frame_interval_ms(),
            )?
            .set_default(
                "pipeline.file_frame_interval_ms",
                default_file_frame_interval_ms(),
            )?
            .set_default(
                "pipeline.camera_retry_delay_ms",
                default_camera_retry_delay_ms(),
            )?
            .set_default("display.font_path", default_font_path())?
            .set_default("display.font_size", default_font_size() as f64)?
            .set_default("display.preview_every", default_preview_every())?
            // Add configuration file (optional)
            .add_source(File::with_name(&path_str).required(false))
            // Environment overrides as VIDWATCH_<SECTION>__<KEY>, since keys contain underscores
            .add_source(
                Environment::with_prefix("VIDWATCH")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: VidwatchConfig = settings.try_deserialize()?;

        info!("Configuration loaded successfully");
        debug!("Final configuration: {:#?}", config);

        Ok(config)
    }

    /// Serialize as TOML, in the same layout `load_from_file` reads
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.source.camera_resolution.0 == 0 || self.source.camera_resolution.1 == 0 {
            return Err(ConfigError::Message(
                "Camera resolution must be greater than 0".to_string(),
            ));
        }

        if self.source.camera_fps == 0 {
            return Err(ConfigError::Message(
                "Camera fps must be greater than 0".to_string(),
            ));
        }

        if self.motion.analysis_scale == 0 {
            return Err(ConfigError::Message(
                "Motion analysis_scale must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.motion.learning_rate) {
            return Err(ConfigError::Message(
                "Motion learning_rate must be between 0 and 1".to_string(),
            ));
        }

        if self.detector.input_size.0 == 0 || self.detector.input_size.1 == 0 {
            return Err(ConfigError::Message(
                "Detector input_size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(ConfigError::Message(
                "Detector confidence_threshold must be between 0 and 1".to_string(),
            ));
        }

        if self.pipeline.detection_skip > MAX_DETECTION_SKIP {
            return Err(ConfigError::Message(format!(
                "Pipeline detection_skip must be at most {}",
                MAX_DETECTION_SKIP
            )));
        }

        if self.pipeline.detection_max_width == 0 {
            return Err(ConfigError::Message(
                "Pipeline detection_max_width must be greater than 0".to_string(),
            ));
        }

        if self.pipeline.queue_poll_timeout_ms == 0 {
            return Err(ConfigError::Message(
                "Pipeline queue_poll_timeout_ms must be greater than 0".to_string(),
            ));
        }

        if self.display.preview_every == 0 {
            return Err(ConfigError::Message(
                "Display preview_every must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for VidwatchConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            motion: MotionConfig::default(),
            detector: DetectorConfig::default(),
            pipeline: PipelineConfig::default(),
            display: DisplayConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            camera_index: default_camera_index(),
            camera_resolution: default_camera_resolution(),
            camera_fps: default_camera_fps(),
            read_timeout_ms: default_read_timeout_ms(),
            file: None,
        }
    }
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            delta_threshold: default_delta_threshold(),
            min_contour_area: default_min_contour_area(),
            blur_sigma: default_blur_sigma(),
            learning_rate: default_learning_rate(),
            analysis_scale: default_analysis_scale(),
        }
    }
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            input_size: default_input_size(),
            confidence_threshold: default_confidence_threshold(),
            boxes_output: default_boxes_output(),
            classes_output: default_classes_output(),
            scores_output: default_scores_output(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            detection_skip: default_detection_skip(),
            detection_max_width: default_detection_max_width(),
            queue_poll_timeout_ms: default_queue_poll_timeout_ms(),
            display_idle_sleep_ms: default_display_idle_sleep_ms(),
            camera_frame_interval_ms: default_camera_frame_interval_ms(),
            file_frame_interval_ms: default_file_frame_interval_ms(),
            camera_retry_delay_ms: default_camera_retry_delay_ms(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            font_path: default_font_path(),
            font_size: default_font_size(),
            preview_path: None,
            preview_every: default_preview_every(),
        }
    }
}

// Default value functions
fn default_camera_index() -> u32 {
    0
}
fn default_camera_resolution() -> (u32, u32) {
    (640, 480)
}
fn default_camera_fps() -> u32 {
    30
}
fn default_read_timeout_ms() -> u64 {
    500
}

fn default_delta_threshold() -> u8 {
    25
}
fn default_min_contour_area() -> f64 {
    500.0
}
fn default_blur_sigma() -> f32 {
    2.0
}
fn default_learning_rate() -> f32 {
    0.05
}
fn default_analysis_scale() -> u32 {
    2
}

fn default_model_path() -> String {
    "models/ssd_mobilenet_v2.onnx".to_string()
}
fn default_input_size() -> (u32, u32) {
    (300, 300)
}
fn default_confidence_threshold() -> f32 {
    0.5
}
fn default_boxes_output() -> usize {
    1
}
fn default_classes_output() -> usize {
    2
}
fn default_scores_output() -> usize {
    4
}

fn default_mode() -> AnalysisMode {
    AnalysisMode::Motion
}
fn default_detection_skip() -> u64 {
    5
} // Process every 6th frame for object detection
fn default_detection_max_width() -> u32 {
    480
}
fn default_queue_poll_timeout_ms() -> u64 {
    100
}
fn default_display_idle_sleep_ms() -> u64 {
    10
}
fn default_camera_frame_interval_ms() -> u64 {
    30
}
fn default_file_frame_interval_ms() -> u64 {
    10
}
fn default_camera_retry_delay_ms() -> u64 {
    100
}

fn default_font_path() -> String {
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf".to_string()
}
fn default_font_size() -> f32 {
    14.0
}
fn default_preview_every() -> u64 {
    15
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = VidwatchConfig::default();

        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.detection_skip, 5);
        assert_eq!(config.pipeline.detection_max_width, 480);
        assert_eq!(config.pipeline.default_mode, AnalysisMode::Motion);
        assert_eq!(config.pipeline.camera_frame_interval(), Duration::from_millis(30));
        assert_eq!(config.pipeline.file_frame_interval(), Duration::from_millis(10));
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[pipeline]\ndefault_mode = \"both\"\ndetection_skip = 2\n\n[motion]\nmin_contour_area = 750.0"
        )
        .unwrap();

        let config = VidwatchConfig::load_from_file(file.path()).unwrap();

        assert_eq!(config.pipeline.default_mode, AnalysisMode::Both);
        assert_eq!(config.pipeline.detection_skip, 2);
        assert_eq!(config.motion.min_contour_area, 750.0);
        // Untouched values keep their defaults
        assert_eq!(config.pipeline.detection_max_width, 480);
        assert_eq!(config.source.camera_resolution, (640, 480));
    }

    #[test]
    fn test_config_validation() {
        let mut config = VidwatchConfig::default();
        config.source.camera_resolution = (0, 0);
        assert!(config.validate().is_err());

        config.source.camera_resolution = (640, 480);
        assert!(config.validate().is_ok());

        config.detector.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_detection_skip_upper_bound() {
        let mut config = VidwatchConfig::default();

        config.pipeline.detection_skip = MAX_DETECTION_SKIP;
        assert!(config.validate().is_ok());

        config.pipeline.detection_skip = u64::MAX;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_environment_overrides_multi_word_keys() {
        std::env::set_var("VIDWATCH_SOURCE__CAMERA_INDEX", "3");
        std::env::set_var("VIDWATCH_PIPELINE__QUEUE_POLL_TIMEOUT_MS", "250");

        let config = VidwatchConfig::load_from_file("does-not-exist.toml");

        std::env::remove_var("VIDWATCH_SOURCE__CAMERA_INDEX");
        std::env::remove_var("VIDWATCH_PIPELINE__QUEUE_POLL_TIMEOUT_MS");

        let config = config.unwrap();
        assert_eq!(config.source.camera_index, 3);
        assert_eq!(config.pipeline.queue_poll_timeout_ms, 250);
    }

    #[test]
    fn test_default_toml_loads_back() {
        let text = VidwatchConfig::default().to_toml().unwrap();
        assert!(text.contains("[pipeline]"));
        assert!(text.contains("default_mode = \"motion\""));

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();

        let config = VidwatchConfig::load_from_file(file.path()).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.pipeline.detection_skip, 5);
        assert_eq!(config.detector.input_size, (300, 300));
        assert_eq!(config.display.preview_path, None);
    }
}
