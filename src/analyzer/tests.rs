use super::*;
use crate::error::{Result, VidwatchError};
use image::RgbImage;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct FixedAnalyzer;

impl ObjectAnalyzer for FixedAnalyzer {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(vec![Detection::new(
            "person",
            0.87,
            BoundingBox::new(10, 20, 30, 40),
        )])
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Factory that fails a configurable number of times before succeeding
struct FlakyFactory {
    failures_left: AtomicU32,
    constructed: Arc<AtomicU32>,
}

impl ObjectAnalyzerFactory for FlakyFactory {
    fn construct(&self) -> Result<Arc<dyn ObjectAnalyzer>> {
        if self.failures_left.load(Ordering::SeqCst) > 0 {
            self.failures_left.fetch_sub(1, Ordering::SeqCst);
            return Err(VidwatchError::system("weights file truncated"));
        }
        self.constructed.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(FixedAnalyzer))
    }
}

fn flaky_slot(failures: u32) -> (ObjectAnalyzerSlot, Arc<AtomicU32>) {
    let constructed = Arc::new(AtomicU32::new(0));
    let factory = FlakyFactory {
        failures_left: AtomicU32::new(failures),
        constructed: Arc::clone(&constructed),
    };
    (ObjectAnalyzerSlot::new(Box::new(factory)), constructed)
}

#[test]
fn test_rescale_divides_each_component() {
    let bbox = BoundingBox::new(100, 50, 40, 30);

    assert_eq!(bbox.rescale(0.5), BoundingBox::new(200, 100, 80, 60));
    // 100 / 0.375 = 266.67 truncates to 266
    assert_eq!(bbox.rescale(0.375), BoundingBox::new(266, 133, 106, 80));
}

#[test]
fn test_rescale_unit_scale_is_identity() {
    let detection = Detection::new("cat", 0.61, BoundingBox::new(7, 9, 13, 17));
    let rescaled = detection.clone().rescaled(1.0);

    assert_eq!(rescaled, detection);
    assert_eq!(rescale_detections(vec![detection.clone()], 1.0), vec![detection]);
}

#[test]
fn test_rescale_detections_keeps_labels() {
    let detections = vec![
        Detection::new("dog", 0.9, BoundingBox::new(10, 10, 20, 20)),
        Detection::new("car", 0.55, BoundingBox::new(0, 5, 50, 25)),
    ];

    let rescaled = rescale_detections(detections, 0.25);

    assert_eq!(rescaled[0].label, "dog");
    assert_eq!(rescaled[0].bbox, BoundingBox::new(40, 40, 80, 80));
    assert_eq!(rescaled[1].bbox, BoundingBox::new(0, 20, 200, 100));
}

#[test]
fn test_display_label_truncates_percentage() {
    let detection = Detection::new("person", 0.879, BoundingBox::new(0, 0, 1, 1));
    assert_eq!(detection.display_label(), "person: 87%");

    let detection = Detection::new("kite", 1.0, BoundingBox::new(0, 0, 1, 1));
    assert_eq!(detection.display_label(), "kite: 100%");
}

#[test]
fn test_slot_loads_once() {
    let (mut slot, constructed) = flaky_slot(0);
    assert!(matches!(slot.state(), AnalyzerState::NotLoaded));
    assert!(slot.current().is_none());

    let first = slot.ensure_loaded().unwrap();
    let second = slot.ensure_loaded().unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
    assert_eq!(slot.load_attempts(), 1);
    assert!(slot.is_loaded());
}

#[test]
fn test_slot_failure_is_reported_as_model_load() {
    let (mut slot, _) = flaky_slot(1);

    match slot.ensure_loaded() {
        Err(VidwatchError::ModelLoad { details }) => {
            assert!(details.contains("weights file truncated"));
        }
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Expected model load to fail"),
    }
    assert!(matches!(slot.state(), AnalyzerState::Failed(_)));
    assert!(slot.current().is_none());
}

#[test]
fn test_slot_retries_after_failure() {
    let (mut slot, constructed) = flaky_slot(1);

    assert!(slot.ensure_loaded().is_err());
    assert!(slot.ensure_loaded().is_ok());

    assert_eq!(slot.load_attempts(), 2);
    assert_eq!(constructed.load(Ordering::SeqCst), 1);
}

#[test]
fn test_slot_reset_forces_reconstruction() {
    let (mut slot, constructed) = flaky_slot(0);

    slot.ensure_loaded().unwrap();
    slot.reset();
    assert!(!slot.is_loaded());

    slot.ensure_loaded().unwrap();
    assert_eq!(constructed.load(Ordering::SeqCst), 2);
}

#[test]
fn test_closure_factory() {
    let factory = || -> Result<Arc<dyn ObjectAnalyzer>> { Ok(Arc::new(FixedAnalyzer)) };
    let mut slot = ObjectAnalyzerSlot::new(Box::new(factory));

    let analyzer = slot.ensure_loaded().unwrap();
    let detections = analyzer.detect(&RgbImage::new(8, 8)).unwrap();
    assert_eq!(detections[0].display_label(), "person: 87%");
}

#[cfg(not(feature = "object_detection"))]
#[test]
fn test_default_factory_without_backend() {
    let factory = DefaultObjectAnalyzerFactory::new(crate::config::DetectorConfig::default());

    match factory.construct() {
        Err(VidwatchError::ModelLoad { .. }) => {}
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Expected construction to fail without a backend"),
    }
}

#[cfg(feature = "object_detection")]
#[test]
fn test_default_factory_missing_model() {
    let mut config = crate::config::DetectorConfig::default();
    config.model_path = "/nonexistent/model.onnx".to_string();
    let factory = DefaultObjectAnalyzerFactory::new(config);

    assert!(matches!(
        factory.construct(),
        Err(VidwatchError::ModelLoad { .. })
    ));
}
