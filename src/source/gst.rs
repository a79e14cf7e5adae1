use super::{FrameSource, SourceKind};
use crate::config::SourceConfig;
use crate::error::{Result, SourceError, VidwatchError};
use crate::frame::Frame;
use gstreamer::prelude::*;
use gstreamer::Pipeline;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use image::RgbImage;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// GStreamer pipeline ending in an RGB appsink, shared by camera and file sources
struct RgbPipeline {
    pipeline: Pipeline,
    appsink: AppSink,
    read_timeout: Duration,
    next_id: u64,
    position: u64,
}

impl RgbPipeline {
    fn launch(description: &str, read_timeout: Duration) -> Result<Self> {
        gstreamer::init().map_err(|e| {
            VidwatchError::source_unavailable(format!("Failed to initialize GStreamer: {}", e))
        })?;

        info!("Creating GStreamer pipeline: {}", description);

        let pipeline = gstreamer::parse::launch(description)
            .map_err(|e| {
                VidwatchError::source_unavailable(format!("Failed to create pipeline: {}", e))
            })?
            .downcast::<Pipeline>()
            .map_err(|_| VidwatchError::source_unavailable("Failed to downcast to Pipeline"))?;

        let appsink = pipeline
            .by_name("sink")
            .ok_or_else(|| VidwatchError::source_unavailable("Failed to get appsink element"))?
            .downcast::<AppSink>()
            .map_err(|_| VidwatchError::source_unavailable("Failed to downcast to AppSink"))?;

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            VidwatchError::source_unavailable(format!("Failed to start pipeline: {}", e))
        })?;

        // Device and demuxer errors surface while prerolling, not from set_state
        let (state_change, _, _) = pipeline.state(gstreamer::ClockTime::from_seconds(5));
        if let Err(e) = state_change {
            let _ = pipeline.set_state(gstreamer::State::Null);
            return Err(VidwatchError::source_unavailable(format!(
                "Pipeline failed to start: {}",
                e
            )));
        }

        Ok(Self {
            pipeline,
            appsink,
            read_timeout,
            next_id: 0,
            position: 0,
        })
    }

    fn pull(&mut self) -> std::result::Result<Frame, SourceError> {
        let timeout = gstreamer::ClockTime::from_mseconds(self.read_timeout.as_millis() as u64);
        let sample = match self.appsink.try_pull_sample(timeout) {
            Some(sample) => sample,
            None if self.appsink.is_eos() => return Err(SourceError::EndOfStream),
            None => return Err(SourceError::transient("no sample within read timeout")),
        };

        let buffer = sample
            .buffer()
            .ok_or_else(|| SourceError::transient("No buffer in sample"))?;
        let caps = sample
            .caps()
            .ok_or_else(|| SourceError::transient("No caps in sample"))?;
        let video_info = VideoInfo::from_caps(caps)
            .map_err(|e| SourceError::transient(format!("Failed to get video info: {}", e)))?;

        let map = buffer
            .map_readable()
            .map_err(|e| SourceError::transient(format!("Failed to map buffer: {}", e)))?;

        let width = video_info.width();
        let height = video_info.height();
        let stride = video_info.stride()[0] as usize;
        let row_bytes = width as usize * 3;

        // Rows may be padded; copy only the visible pixels
        let mut pixels = Vec::with_capacity(row_bytes * height as usize);
        for row in map.as_slice().chunks(stride).take(height as usize) {
            pixels.extend_from_slice(&row[..row_bytes.min(row.len())]);
        }

        let image = RgbImage::from_raw(width, height, pixels)
            .ok_or_else(|| SourceError::transient("Sample smaller than advertised frame size"))?;

        let frame = Frame::new(self.next_id, self.position, image);
        self.next_id += 1;
        self.position += 1;

        trace!("Pulled {}x{} frame {}", width, height, frame.id);
        Ok(frame)
    }

    fn stop(&self) {
        if let Err(e) = self.pipeline.set_state(gstreamer::State::Null) {
            warn!("Failed to stop GStreamer pipeline cleanly: {}", e);
        }
    }
}

/// Live camera capture through v4l2
#[cfg(feature = "camera")]
pub struct GstCameraSource {
    index: u32,
    inner: Option<RgbPipeline>,
}

#[cfg(feature = "camera")]
impl GstCameraSource {
    pub fn open(index: u32, config: &SourceConfig) -> Result<Self> {
        let (width, height) = config.camera_resolution;
        info!(
            "Opening camera {} ({}x{} @ {}fps)",
            index, width, height, config.camera_fps
        );

        // A single-buffer leaky appsink keeps latency bounded when the consumer is slow
        let description = format!(
            "v4l2src device=/dev/video{} ! \
             videoconvert ! videoscale ! \
             video/x-raw,format=RGB,width={},height={} ! \
             appsink name=sink sync=false max-buffers=1 drop=true",
            index, width, height
        );

        let inner = RgbPipeline::launch(&description, Duration::from_millis(config.read_timeout_ms))
            .map_err(|e| {
                VidwatchError::source_unavailable(format!("Could not open camera {}: {}", index, e))
            })?;

        Ok(Self {
            index,
            inner: Some(inner),
        })
    }
}

#[cfg(feature = "camera")]
impl FrameSource for GstCameraSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Camera
    }

    fn read(&mut self) -> std::result::Result<Frame, SourceError> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| SourceError::transient("camera closed"))?;

        // A live source never really ends; EOS from the driver is a glitch
        match inner.pull() {
            Err(SourceError::EndOfStream) => Err(SourceError::transient("camera reported EOS")),
            other => other,
        }
    }

    fn seek_to_start(&mut self) -> std::result::Result<(), SourceError> {
        Ok(())
    }

    fn close(&mut self) {
        if let Some(inner) = self.inner.take() {
            debug!("Releasing camera {}", self.index);
            inner.stop();
        }
    }

    fn describe(&self) -> String {
        format!("camera {}", self.index)
    }
}

#[cfg(feature = "camera")]
impl Drop for GstCameraSource {
    fn drop(&mut self) {
        self.close();
    }
}

/// Decoded video file playback
#[cfg(feature = "video_decoding")]
pub struct GstFileSource {
    location: String,
    inner: Option<RgbPipeline>,
}

#[cfg(feature = "video_decoding")]
impl GstFileSource {
    pub fn open(path: &std::path::Path, config: &SourceConfig) -> Result<Self> {
        let location = path.display().to_string();

        // Blocking appsink: decoding is paced by the capture worker
        let description = format!(
            "filesrc location=\"{}\" ! decodebin ! \
             videoconvert ! video/x-raw,format=RGB ! \
             appsink name=sink sync=false max-buffers=2 drop=false",
            location.replace('"', "\\\"")
        );

        let inner = RgbPipeline::launch(&description, Duration::from_millis(config.read_timeout_ms))?;

        Ok(Self {
            location,
            inner: Some(inner),
        })
    }
}

#[cfg(feature = "video_decoding")]
impl FrameSource for GstFileSource {
    fn kind(&self) -> SourceKind {
        SourceKind::File
    }

    fn read(&mut self) -> std::result::Result<Frame, SourceError> {
        self.inner
            .as_mut()
            .ok_or_else(|| SourceError::transient("file closed"))?
            .pull()
    }

    fn seek_to_start(&mut self) -> std::result::Result<(), SourceError> {
        let inner = self
            .inner
            .as_mut()
            .ok_or_else(|| SourceError::transient("file closed"))?;

        inner
            .pipeline
            .seek_simple(
                gstreamer::SeekFlags::FLUSH | gstreamer::SeekFlags::KEY_UNIT,
                gstreamer::ClockTime::ZERO,
            )
            .map_err(|e| SourceError::transient(format!("seek failed: {}", e)))?;
        inner.position = 0;

        debug!("Rewound {}", self.location);
        Ok(())
    }

    fn close(&mut self) {
        if let Some(inner) = self.inner.take() {
            debug!("Closing {}", self.location);
            inner.stop();
        }
    }

    fn describe(&self) -> String {
        self.location.clone()
    }
}

#[cfg(feature = "video_decoding")]
impl Drop for GstFileSource {
    fn drop(&mut self) {
        self.close();
    }
}
