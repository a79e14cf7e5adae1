use crate::config::MotionConfig;
use crate::error::{Result, VidwatchError};
use crate::overlay;

use image::imageops::{self, FilterType};
use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::{
    contrast::threshold,
    distance_transform::Norm,
    filter::gaussian_blur_f32,
    morphology::{dilate, erode},
    region_labelling::{connected_components, Connectivity},
};
use std::collections::HashMap;
use tracing::{debug, info, trace};

/// Axis-aligned region of changed pixels, in original frame coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionRegion {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// Changed pixel count scaled to original frame pixels
    pub area: f64,
}

/// Outcome of analysing one frame
#[derive(Debug, Clone)]
pub struct MotionResult {
    pub detected: bool,
    /// Input frame with every motion region outlined
    pub annotated: RgbImage,
    pub regions: Vec<MotionRegion>,
}

/// Per-component bounds accumulated while scanning the label image
#[derive(Debug, Clone, Copy)]
struct ComponentBounds {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    pixels: u64,
}

/// Motion detector built on a running-average background model
///
/// Frames are converted to grayscale, optionally downscaled, blurred and
/// compared against the background. Connected regions of changed pixels
/// larger than `min_contour_area` count as motion.
pub struct MotionAnalyzer {
    config: MotionConfig,
    background_model: Option<GrayImage>,
    pub(crate) frame_count: u64,
}

impl MotionAnalyzer {
    pub fn new(config: MotionConfig) -> Self {
        info!("Initializing motion analyzer with config: {:?}", config);

        Self {
            config,
            background_model: None,
            frame_count: 0,
        }
    }

    /// Analyze a frame for motion.
    ///
    /// The first frame (and the first frame after a resolution change) only
    /// seeds the background model and never reports motion.
    pub fn detect(&mut self, frame: &RgbImage) -> Result<MotionResult> {
        let (width, height) = frame.dimensions();
        if width == 0 || height == 0 {
            return Err(VidwatchError::component(
                "motion_analyzer",
                "cannot analyze an empty frame",
            ));
        }

        let prepared = self.prepare(frame);
        let scale_x = width as f64 / prepared.width() as f64;
        let scale_y = height as f64 / prepared.height() as f64;

        let needs_reset = self
            .background_model
            .as_ref()
            .map(|bg| bg.dimensions() != prepared.dimensions())
            .unwrap_or(true);

        if needs_reset {
            info!(
                "Initializing background model at {}x{}",
                prepared.width(),
                prepared.height()
            );
            self.background_model = Some(prepared);
            self.frame_count = 1;
            return Ok(MotionResult {
                detected: false,
                annotated: frame.clone(),
                regions: Vec::new(),
            });
        }

        let regions = match self.background_model.as_ref() {
            Some(background) => {
                let diff_image = calculate_frame_difference(background, &prepared);
                let binary_mask = threshold(&diff_image, self.config.delta_threshold);

                // Opening removes speckle noise before labelling
                let kernel_size = 1u8;
                let cleaned_mask = dilate(
                    &erode(&binary_mask, Norm::LInf, kernel_size),
                    Norm::LInf,
                    kernel_size,
                );

                let components =
                    connected_components(&cleaned_mask, Connectivity::Eight, Luma([0u8]));
                self.collect_regions(&components, scale_x, scale_y)
            }
            None => Vec::new(),
        };

        self.update_background_model(&prepared);
        self.frame_count += 1;

        let mut annotated = frame.clone();
        for region in &regions {
            overlay::draw_motion_region(&mut annotated, region);
        }

        debug!(
            "Motion analysis of frame {} found {} region(s)",
            self.frame_count,
            regions.len()
        );

        Ok(MotionResult {
            detected: !regions.is_empty(),
            annotated,
            regions,
        })
    }

    /// Grayscale, downscale and blur a frame
    fn prepare(&self, frame: &RgbImage) -> GrayImage {
        let gray = imageops::grayscale(frame);
        let scale = self.config.analysis_scale.max(1);

        let gray = if scale > 1 {
            let w = (gray.width() / scale).max(1);
            let h = (gray.height() / scale).max(1);
            imageops::resize(&gray, w, h, FilterType::Triangle)
        } else {
            gray
        };

        if self.config.blur_sigma > 0.0 {
            gaussian_blur_f32(&gray, self.config.blur_sigma)
        } else {
            gray
        }
    }

    fn collect_regions(
        &self,
        components: &ImageBuffer<Luma<u32>, Vec<u32>>,
        scale_x: f64,
        scale_y: f64,
    ) -> Vec<MotionRegion> {
        let mut bounds: HashMap<u32, ComponentBounds> = HashMap::new();

        for (x, y, pixel) in components.enumerate_pixels() {
            let label = pixel[0];
            if label == 0 {
                continue;
            }
            bounds
                .entry(label)
                .and_modify(|b| {
                    b.min_x = b.min_x.min(x);
                    b.min_y = b.min_y.min(y);
                    b.max_x = b.max_x.max(x);
                    b.max_y = b.max_y.max(y);
                    b.pixels += 1;
                })
                .or_insert(ComponentBounds {
                    min_x: x,
                    min_y: y,
                    max_x: x,
                    max_y: y,
                    pixels: 1,
                });
        }

        let mut regions: Vec<MotionRegion> = bounds
            .into_values()
            .filter_map(|b| {
                let area = b.pixels as f64 * scale_x * scale_y;
                if area <= self.config.min_contour_area {
                    trace!(
                        "Region area {:.2} below threshold {:.2}",
                        area,
                        self.config.min_contour_area
                    );
                    return None;
                }
                Some(MotionRegion {
                    x: (b.min_x as f64 * scale_x) as u32,
                    y: (b.min_y as f64 * scale_y) as u32,
                    width: ((b.max_x - b.min_x + 1) as f64 * scale_x) as u32,
                    height: ((b.max_y - b.min_y + 1) as f64 * scale_y) as u32,
                    area,
                })
            })
            .collect();

        regions.sort_by(|a, b| (a.y, a.x).cmp(&(b.y, b.x)));
        regions
    }

    /// Update background model using simple running average
    fn update_background_model(&mut self, current_frame: &GrayImage) {
        if let Some(ref mut background) = self.background_model {
            let learning_rate = self.config.learning_rate;

            for (bg_pixel, curr_pixel) in background.pixels_mut().zip(current_frame.pixels()) {
                let bg_val = bg_pixel[0] as f32;
                let curr_val = curr_pixel[0] as f32;
                bg_pixel[0] = (bg_val * (1.0 - learning_rate) + curr_val * learning_rate) as u8;
            }
        }
    }

    pub fn config(&self) -> &MotionConfig {
        &self.config
    }

    pub fn background_initialized(&self) -> bool {
        self.background_model.is_some()
    }

    /// Drop the background model so the next frame seeds a fresh one
    pub fn reset(&mut self) {
        self.background_model = None;
        self.frame_count = 0;
    }
}

/// Absolute per-pixel difference between background and current frame
fn calculate_frame_difference(background: &GrayImage, current: &GrayImage) -> GrayImage {
    let (width, height) = background.dimensions();
    let mut diff_image = GrayImage::new(width, height);

    for (x, y, bg_pixel) in background.enumerate_pixels() {
        if let Some(curr_pixel) = current.get_pixel_checked(x, y) {
            let diff = (bg_pixel[0] as i16 - curr_pixel[0] as i16).unsigned_abs() as u8;
            diff_image.put_pixel(x, y, Luma([diff]));
        }
    }

    diff_image
}
