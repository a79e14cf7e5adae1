use crate::analyzer::{BoundingBox, Detection, MotionRegion};
use crate::config::DisplayConfig;
use crate::error::{Result, VidwatchError};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use rusttype::{Font, Scale};
use std::fs;
use tracing::{debug, warn};

pub const DETECTION_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
pub const MOTION_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const LABEL_BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);
const BOX_THICKNESS: i32 = 2;

/// Draw a hollow box `BOX_THICKNESS` pixels wide, clipped to the image
pub fn draw_box(image: &mut RgbImage, bbox: BoundingBox, color: Rgb<u8>) {
    for inset in 0..BOX_THICKNESS {
        let width = bbox.width - 2 * inset;
        let height = bbox.height - 2 * inset;
        if width <= 0 || height <= 0 {
            break;
        }
        let rect = Rect::at(bbox.x + inset, bbox.y + inset).of_size(width as u32, height as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Outline one motion region in green
pub fn draw_motion_region(image: &mut RgbImage, region: &MotionRegion) {
    draw_box(
        image,
        BoundingBox::new(
            region.x as i32,
            region.y as i32,
            region.width as i32,
            region.height as i32,
        ),
        MOTION_COLOR,
    );
}

/// Load a TrueType font for label rendering
pub fn load_font(path: &str) -> Result<Font<'static>> {
    let font_data = fs::read(path).map_err(|e| {
        VidwatchError::component("overlay", &format!("Failed to read font file '{}': {}", path, e))
    })?;

    Font::try_from_vec(font_data).ok_or_else(|| {
        VidwatchError::component("overlay", &format!("Failed to parse font file '{}'", path))
    })
}

/// Renders detection boxes and their labels onto frames
pub struct DetectionOverlay {
    font: Option<Font<'static>>,
    scale: Scale,
}

impl DetectionOverlay {
    /// Build an overlay from display settings.
    ///
    /// A missing or unreadable font is not fatal: boxes are still drawn, only
    /// the label text is left out.
    pub fn new(config: &DisplayConfig) -> Self {
        let font = match load_font(&config.font_path) {
            Ok(font) => Some(font),
            Err(e) => {
                warn!("Detection labels disabled: {}", e);
                None
            }
        };

        Self {
            font,
            scale: Scale::uniform(config.font_size),
        }
    }

    /// Overlay that only draws boxes
    pub fn boxes_only() -> Self {
        Self {
            font: None,
            scale: Scale::uniform(14.0),
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw every detection as a red box with a `label: NN%` caption above it
    pub fn draw_detections(&self, image: &mut RgbImage, detections: &[Detection]) {
        for detection in detections {
            draw_box(image, detection.bbox, DETECTION_COLOR);

            if let Some(font) = &self.font {
                self.draw_label(image, font, detection);
            }
        }

        if !detections.is_empty() {
            debug!("Drew {} detection(s) onto frame", detections.len());
        }
    }

    fn draw_label(&self, image: &mut RgbImage, font: &Font<'static>, detection: &Detection) {
        let text = detection.display_label();
        let (text_width, text_height) = text_size(self.scale, font, &text);

        let x = detection.bbox.x.max(0);
        let y = (detection.bbox.y - 10 - text_height).max(0);

        if text_width > 0 && text_height > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(x, y).of_size(text_width as u32 + 4, text_height as u32 + 4),
                LABEL_BACKGROUND,
            );
        }
        draw_text_mut(image, DETECTION_COLOR, x + 2, y + 2, self.scale, font, &text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_draw_box_outline_only() {
        let mut image = RgbImage::new(50, 50);
        draw_box(&mut image, BoundingBox::new(10, 10, 20, 20), DETECTION_COLOR);

        assert_eq!(*image.get_pixel(10, 10), DETECTION_COLOR);
        assert_eq!(*image.get_pixel(11, 15), DETECTION_COLOR);
        assert_eq!(*image.get_pixel(29, 29), DETECTION_COLOR);
        // Interior stays untouched
        assert_eq!(*image.get_pixel(20, 20), Rgb([0, 0, 0]));
    }

    #[test]
    fn test_draw_box_clips_to_image() {
        let mut image = RgbImage::new(20, 20);
        draw_box(&mut image, BoundingBox::new(-5, 15, 40, 40), DETECTION_COLOR);
        assert_eq!(*image.get_pixel(5, 15), DETECTION_COLOR);
    }

    #[test]
    fn test_degenerate_box_is_skipped() {
        let mut image = RgbImage::new(20, 20);
        draw_box(&mut image, BoundingBox::new(5, 5, 0, 10), DETECTION_COLOR);
        assert!(image.pixels().all(|p| *p == Rgb([0, 0, 0])));
    }

    #[test]
    fn test_motion_region_is_green() {
        let mut image = RgbImage::new(40, 40);
        let region = MotionRegion {
            x: 4,
            y: 4,
            width: 10,
            height: 10,
            area: 100.0,
        };
        draw_motion_region(&mut image, &region);
        assert_eq!(*image.get_pixel(4, 4), MOTION_COLOR);
    }

    #[test]
    fn test_missing_font_falls_back_to_boxes() {
        let config = DisplayConfig {
            font_path: "/nonexistent/font.ttf".to_string(),
            ..DisplayConfig::default()
        };
        let overlay = DetectionOverlay::new(&config);
        assert!(!overlay.has_font());

        let mut image = RgbImage::new(64, 64);
        let detections = vec![Detection::new("cup", 0.7, BoundingBox::new(8, 8, 16, 16))];
        overlay.draw_detections(&mut image, &detections);
        assert_eq!(*image.get_pixel(8, 8), DETECTION_COLOR);
    }

    #[test]
    fn test_load_font_missing_file() {
        assert!(load_font("/nonexistent/font.ttf").is_err());
    }
}
