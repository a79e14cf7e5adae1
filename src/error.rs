use thiserror::Error;

#[derive(Error, Debug)]
pub enum VidwatchError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Source read error: {0}")]
    Source(#[from] SourceError),

    #[error("Video source unavailable: {details}")]
    SourceUnavailable { details: String },

    #[error("No video source: {details}")]
    NoSource { details: String },

    #[error("Error loading model: {details}")]
    ModelLoad { details: String },

    #[error("Detection error: {details}")]
    Detection { details: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("System error: {message}")]
    System { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

/// Failures reported by a frame source while reading
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("end of stream")]
    EndOfStream,

    #[error("transient read failure: {details}")]
    Transient { details: String },
}

impl VidwatchError {
    pub fn system<S: Into<String>>(message: S) -> Self {
        Self::System {
            message: message.into(),
        }
    }

    pub fn component<C: Into<String>, M: Into<String>>(component: C, message: M) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn source_unavailable<S: Into<String>>(details: S) -> Self {
        Self::SourceUnavailable {
            details: details.into(),
        }
    }

    pub fn model_load<S: Into<String>>(details: S) -> Self {
        Self::ModelLoad {
            details: details.into(),
        }
    }

    pub fn detection<S: Into<String>>(details: S) -> Self {
        Self::Detection {
            details: details.into(),
        }
    }
}

impl SourceError {
    pub fn transient<S: Into<String>>(details: S) -> Self {
        Self::Transient {
            details: details.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VidwatchError>;
