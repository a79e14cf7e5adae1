use image::imageops::{self, FilterType};
use image::RgbImage;
use std::time::SystemTime;

/// A decoded RGB frame produced by a frame source
///
/// Once produced a frame is only ever moved: into a hand-off queue, then
/// into the consumer that pulls it.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic identifier assigned by the source
    pub id: u64,
    /// Position of the frame within its source (restarts at 0 when a file loops)
    pub position: u64,
    /// Timestamp when the frame was read
    pub timestamp: SystemTime,
    /// Pixel data
    pub image: RgbImage,
}

impl Frame {
    pub fn new(id: u64, position: u64, image: RgbImage) -> Self {
        Self {
            id,
            position,
            timestamp: SystemTime::now(),
            image,
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// (height, width) of the frame, matching the order images are shaped in
    pub fn shape(&self) -> (u32, u32) {
        (self.image.height(), self.image.width())
    }

    /// Number of colour channels per pixel
    pub fn channels(&self) -> u8 {
        3
    }

    /// Replace the pixel data while keeping identity and timing
    pub fn with_image(self, image: RgbImage) -> Self {
        Self { image, ..self }
    }
}

/// Scale factor needed to bring `width` down to at most `max_width`
pub fn detection_scale(width: u32, max_width: u32) -> f64 {
    if width == 0 || width <= max_width {
        1.0
    } else {
        max_width as f64 / width as f64
    }
}

/// Downscale a frame for object detection, preserving aspect ratio.
///
/// Returns the scaled frame and the scale that was applied. Frames already
/// narrower than `max_width` are copied unchanged with a scale of exactly 1.0.
pub fn downscale_for_detection(frame: &Frame, max_width: u32) -> (Frame, f64) {
    let scale = detection_scale(frame.width(), max_width);
    if scale == 1.0 {
        return (frame.clone(), scale);
    }

    let width = ((frame.width() as f64 * scale).round() as u32).max(1);
    let height = ((frame.height() as f64 * scale).round() as u32).max(1);
    let resized = imageops::resize(&frame.image, width, height, FilterType::Triangle);

    let scaled = Frame {
        id: frame.id,
        position: frame.position,
        timestamp: frame.timestamp,
        image: resized,
    };

    (scaled, scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_frame(width: u32, height: u32) -> Frame {
        Frame::new(7, 3, RgbImage::new(width, height))
    }

    #[test]
    fn test_frame_shape() {
        let frame = create_test_frame(640, 480);
        assert_eq!(frame.shape(), (480, 640));
        assert_eq!(frame.channels(), 3);
    }

    #[test]
    fn test_detection_scale() {
        assert_eq!(detection_scale(320, 480), 1.0);
        assert_eq!(detection_scale(480, 480), 1.0);
        assert_eq!(detection_scale(960, 480), 0.5);
        assert_eq!(detection_scale(1920, 480), 0.25);
    }

    #[test]
    fn test_downscale_preserves_aspect_ratio() {
        let frame = create_test_frame(1280, 720);
        let (scaled, scale) = downscale_for_detection(&frame, 480);

        assert_eq!(scale, 0.375);
        assert_eq!(scaled.width(), 480);
        assert_eq!(scaled.height(), 270);
        assert_eq!(scaled.id, 7);
        assert_eq!(scaled.position, 3);
    }

    #[test]
    fn test_small_frame_not_resized() {
        let frame = create_test_frame(320, 240);
        let (scaled, scale) = downscale_for_detection(&frame, 480);

        assert_eq!(scale, 1.0);
        assert_eq!(scaled.width(), 320);
        assert_eq!(scaled.height(), 240);
    }
}
