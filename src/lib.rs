pub mod analyzer;
pub mod app;
pub mod config;
pub mod error;
pub mod frame;
pub mod overlay;
pub mod pipeline;
pub mod source;
pub mod surface;

pub use analyzer::{
    BoundingBox, Detection, MotionAnalyzer, ObjectAnalyzer, ObjectAnalyzerFactory,
    ObjectAnalyzerSlot,
};
pub use app::{App, KeyAction, KeyboardInputHandler, ShutdownReason};
pub use config::VidwatchConfig;
pub use error::{Result, SourceError, VidwatchError};
pub use frame::Frame;
pub use pipeline::{AnalysisMode, Coordinator, CoordinatorBuilder, Flow, PipelineState};
pub use source::{FrameSource, SourceOpener, SourceSpec};
pub use surface::{Command, ControlState, DisplaySurface, MockSurface, TerminalSurface};
