use super::*;
use crate::analyzer::BoundingBox;
use crate::config::DisplayConfig;
use image::RgbImage;

fn test_frame(id: u64) -> Frame {
    Frame::new(id, id, RgbImage::new(32, 24))
}

#[test]
fn test_mock_surface_records_calls_in_order() {
    let surface = MockSurface::new();

    surface.set_status_message("Loaded: clip.mp4");
    surface.set_motion_status("Detected", true);
    surface.show_frame(test_frame(3));
    surface.set_controls(ControlState {
        start_enabled: true,
        running: true,
        source_controls_enabled: false,
    });

    let events = surface.events();
    assert_eq!(events.len(), 4);
    assert_eq!(events[0], SurfaceEvent::Status("Loaded: clip.mp4".to_string()));
    assert_eq!(events[2], SurfaceEvent::Frame { id: 3, position: 3 });

    assert_eq!(surface.frames_shown(), 1);
    assert_eq!(surface.last_frame().map(|f| f.id), Some(3));
    assert_eq!(surface.motion_statuses(), vec![("Detected".to_string(), true)]);
    assert!(surface.last_controls().unwrap().running);
}

#[test]
fn test_mock_surface_clear() {
    let surface = MockSurface::new();
    surface.set_status_message("Ready");
    surface.clear();

    assert!(surface.events().is_empty());
    assert_eq!(surface.last_status(), None);
}

#[test]
fn test_terminal_surface_tracks_status() {
    let surface = TerminalSurface::new(&DisplayConfig::default());

    surface.set_status_message("Analysis started");
    surface.set_detection_results(&[Detection::new(
        "dog",
        0.75,
        BoundingBox::new(1, 2, 3, 4),
    )]);
    surface.show_frame(test_frame(0));
    surface.show_frame(test_frame(1));

    assert_eq!(surface.last_status(), "Analysis started");
    assert_eq!(surface.frames_rendered(), 2);
}

#[test]
fn test_terminal_surface_writes_preview() {
    let dir = tempfile::tempdir().unwrap();
    let preview = dir.path().join("preview.jpg");
    let config = DisplayConfig {
        preview_path: Some(preview.to_string_lossy().to_string()),
        preview_every: 2,
        ..DisplayConfig::default()
    };
    let surface = TerminalSurface::new(&config);

    surface.show_frame(test_frame(0));
    assert!(preview.exists());

    let decoded = image::open(&preview).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (32, 24));
    assert_eq!(surface.preview_errors(), 0);
}

#[test]
fn test_terminal_surface_counts_preview_failures() {
    let config = DisplayConfig {
        preview_path: Some("/nonexistent/dir/preview.jpg".to_string()),
        ..DisplayConfig::default()
    };
    let surface = TerminalSurface::new(&config);

    surface.show_frame(test_frame(0));

    assert_eq!(surface.preview_errors(), 1);
    assert_eq!(surface.frames_rendered(), 1);
}
