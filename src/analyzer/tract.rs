use super::labels::coco_label;
use super::object::{BoundingBox, Detection, ObjectAnalyzer};
use crate::config::DetectorConfig;
use crate::error::{Result, VidwatchError};
use image::imageops::{self, FilterType};
use image::RgbImage;
use std::path::Path;
use tract_onnx::prelude::*;
use tracing::{debug, info};

type OnnxPlan = TypedRunnableModel<TypedModel>;

/// SSD-style ONNX detector run through tract.
///
/// The model takes a uint8 NHWC image and produces normalised
/// `(ymin, xmin, ymax, xmax)` boxes, COCO class ids and scores. Inference runs
/// on a private copy resized to the model input, and boxes are reported in the
/// coordinates of the caller's image.
pub struct TractObjectAnalyzer {
    model: OnnxPlan,
    input_width: u32,
    input_height: u32,
    confidence_threshold: f32,
    boxes_output: usize,
    classes_output: usize,
    scores_output: usize,
}

impl TractObjectAnalyzer {
    /// Load and optimise the model named in `config`
    pub fn load(config: &DetectorConfig) -> Result<Self> {
        let model_path = Path::new(&config.model_path);
        let (input_width, input_height) = config.input_size;

        info!(
            "Loading ONNX model from {} ({}x{} input)",
            model_path.display(),
            input_width,
            input_height
        );

        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .and_then(|model| {
                model.with_input_fact(
                    0,
                    InferenceFact::dt_shape(
                        u8::datum_type(),
                        tvec!(1, input_height as usize, input_width as usize, 3),
                    ),
                )
            })
            .and_then(|model| model.into_optimized())
            .and_then(|model| model.into_runnable())
            .map_err(|e| {
                VidwatchError::model_load(format!("{}: {:#}", model_path.display(), e))
            })?;

        Ok(Self {
            model,
            input_width,
            input_height,
            confidence_threshold: config.confidence_threshold,
            boxes_output: config.boxes_output,
            classes_output: config.classes_output,
            scores_output: config.scores_output,
        })
    }

    fn build_input(&self, image: &RgbImage) -> Tensor {
        let resized = imageops::resize(
            image,
            self.input_width,
            self.input_height,
            FilterType::Triangle,
        );

        tract_ndarray::Array4::from_shape_fn(
            (1, self.input_height as usize, self.input_width as usize, 3),
            |(_, y, x, channel)| resized.get_pixel(x as u32, y as u32)[channel],
        )
        .into_tensor()
    }

    fn output_values(outputs: &TVec<TValue>, index: usize, what: &str) -> Result<Vec<f32>> {
        let output = outputs.get(index).ok_or_else(|| {
            VidwatchError::detection(format!("model has no {} output at index {}", what, index))
        })?;
        let view = output.to_array_view::<f32>().map_err(|e| {
            VidwatchError::detection(format!("{} output is not f32: {:#}", what, e))
        })?;
        Ok(view.iter().copied().collect())
    }
}

impl ObjectAnalyzer for TractObjectAnalyzer {
    fn detect(&self, image: &RgbImage) -> Result<Vec<Detection>> {
        let (width, height) = image.dimensions();
        let input = self.build_input(image);

        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| VidwatchError::detection(format!("ONNX inference failed: {:#}", e)))?;

        let boxes = Self::output_values(&outputs, self.boxes_output, "boxes")?;
        let classes = Self::output_values(&outputs, self.classes_output, "classes")?;
        let scores = Self::output_values(&outputs, self.scores_output, "scores")?;

        let w = width as f32;
        let h = height as f32;
        let detections: Vec<Detection> = scores
            .iter()
            .enumerate()
            .filter(|(_, score)| **score > self.confidence_threshold)
            .filter_map(|(i, score)| {
                let coords = boxes.get(i * 4..i * 4 + 4)?;
                let (y_min, x_min, y_max, x_max) = (coords[0], coords[1], coords[2], coords[3]);
                let x_min = (x_min * w) as i32;
                let x_max = (x_max * w) as i32;
                let y_min = (y_min * h) as i32;
                let y_max = (y_max * h) as i32;
                let class_id = classes.get(i).copied().unwrap_or(0.0) as u32;

                Some(Detection::new(
                    coco_label(class_id),
                    *score,
                    BoundingBox::new(x_min, y_min, x_max - x_min, y_max - y_min),
                ))
            })
            .collect();

        debug!(
            "Object analysis of {}x{} image produced {} detection(s)",
            width,
            height,
            detections.len()
        );
        Ok(detections)
    }

    fn name(&self) -> &str {
        "tract-onnx"
    }
}
