use super::*;
use crate::config::SourceConfig;
use crate::error::VidwatchError;
use image::{Rgb, RgbImage};

fn write_sequence(dir: &std::path::Path, count: u8) {
    for i in 0..count {
        let image = RgbImage::from_pixel(16, 12, Rgb([i * 10, 0, 0]));
        image.save(dir.join(format!("frame_{:03}.png", i))).unwrap();
    }
}

#[test]
fn test_image_sequence_loops_to_first_frame() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), 10);

    let mut source = ImageSequenceSource::open(dir.path()).unwrap();
    assert_eq!(source.len(), 10);
    assert_eq!(source.kind(), SourceKind::File);

    let first = source.read().unwrap();
    for _ in 1..10 {
        source.read().unwrap();
    }

    // Frame N+1 is the end of the stream; rewinding yields frame 1 again
    assert_eq!(source.read().unwrap_err(), SourceError::EndOfStream);
    source.seek_to_start().unwrap();

    let again = source.read().unwrap();
    assert_eq!(again.position, 0);
    assert_eq!(again.image, first.image);
    assert_eq!(again.id, 10);
}

#[test]
fn test_image_sequence_ignores_non_images() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), 2);
    std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

    let source = ImageSequenceSource::open(dir.path()).unwrap();
    assert_eq!(source.len(), 2);
}

#[test]
fn test_image_sequence_skips_corrupt_image() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), 3);
    // Replace the middle frame with bytes that are not a PNG
    std::fs::write(dir.path().join("frame_001.png"), b"garbage").unwrap();

    let mut source = ImageSequenceSource::open(dir.path()).unwrap();
    assert_eq!(source.len(), 3);

    let first = source.read().unwrap();
    assert_eq!(first.position, 0);

    // The frame after the corrupt image is still played
    let third = source.read().unwrap();
    assert_eq!(third.position, 2);
    assert_eq!(*third.image.get_pixel(0, 0), Rgb([20, 0, 0]));

    assert_eq!(source.read().unwrap_err(), SourceError::EndOfStream);
}

#[test]
fn test_empty_directory_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();

    match ImageSequenceSource::open(dir.path()) {
        Err(VidwatchError::SourceUnavailable { .. }) => {}
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Expected empty directory to be rejected"),
    }
}

#[test]
fn test_stub_address_parsing() {
    let source = SyntheticSource::from_address("stub://12@960x540").unwrap();
    assert_eq!(source.describe(), "stub://12@960x540");

    let source = SyntheticSource::from_address("stub://4").unwrap();
    assert_eq!(source.describe(), "stub://4@320x240");

    assert!(SyntheticSource::from_address("stub://0").is_err());
    assert!(SyntheticSource::from_address("stub://abc").is_err());
    assert!(SyntheticSource::from_address("stub://5@640").is_err());
}

#[test]
fn test_synthetic_positions_round_trip_through_pixels() {
    let mut source = SyntheticSource::new(3, 64, 48);

    for expected in 0..3 {
        let frame = source.read().unwrap();
        assert_eq!(frame.position, expected);
        assert_eq!(SyntheticSource::decode_position(&frame.image), expected);
    }

    assert_eq!(source.read().unwrap_err(), SourceError::EndOfStream);
}

#[test]
fn test_default_opener_handles_stub_and_missing_files() {
    let opener = DefaultSourceOpener::new(SourceConfig::default());

    let source = opener
        .open(&SourceSpec::File("stub://5".into()))
        .unwrap();
    assert_eq!(source.kind(), SourceKind::File);

    match opener.open(&SourceSpec::File("/definitely/not/here.mp4".into())) {
        Err(VidwatchError::SourceUnavailable { .. }) => {}
        Err(e) => panic!("Unexpected error: {}", e),
        Ok(_) => panic!("Expected missing file to be unavailable"),
    }
}

#[test]
fn test_default_opener_reads_image_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_sequence(dir.path(), 3);

    let opener = DefaultSourceOpener::new(SourceConfig::default());
    let mut source = opener
        .open(&SourceSpec::File(dir.path().to_path_buf()))
        .unwrap();

    let frame = source.read().unwrap();
    assert_eq!((frame.width(), frame.height()), (16, 12));
}

#[test]
fn test_source_spec_display() {
    assert_eq!(SourceSpec::Camera(0).to_string(), "camera 0");
    assert_eq!(SourceSpec::Camera(2).kind(), SourceKind::Camera);
    assert_eq!(
        SourceSpec::File("clips/door.mp4".into()).kind(),
        SourceKind::File
    );
}
