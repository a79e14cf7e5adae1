use super::*;
use crate::analyzer::{BoundingBox, Detection, ObjectAnalyzer};
use crate::config::VidwatchConfig;
use crate::error::Result;
use crate::overlay::DetectionOverlay;
use crate::pipeline::{AnalysisMode, Coordinator, Flow, PipelineState};
use crate::surface::{Command, MockSurface};
use crossterm::event::KeyCode;
use image::RgbImage;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

struct FixedAnalyzer;

impl ObjectAnalyzer for FixedAnalyzer {
    fn detect(&self, _image: &RgbImage) -> Result<Vec<Detection>> {
        Ok(vec![Detection::new("dog", 0.8, BoundingBox::new(1, 1, 10, 10))])
    }
}

fn create_test_app() -> (App, Arc<MockSurface>) {
    let surface = Arc::new(MockSurface::new());
    let factory = || -> Result<Arc<dyn ObjectAnalyzer>> { Ok(Arc::new(FixedAnalyzer)) };

    let coordinator = Coordinator::builder(VidwatchConfig::default())
        .surface(surface.clone())
        .analyzer_factory(Box::new(factory))
        .overlay(DetectionOverlay::boxes_only())
        .build();

    (App::new(coordinator), surface)
}

fn command(command: Command) -> KeyAction {
    KeyAction::Command(command)
}

#[test]
fn test_key_mapping() {
    let clip = Path::new("clips/door.mp4");

    assert_eq!(
        map_key(KeyCode::Char('o'), Some(clip)),
        Some(command(Command::LoadSource(clip.to_path_buf())))
    );
    assert_eq!(map_key(KeyCode::Char('o'), None), None);
    assert_eq!(map_key(KeyCode::Char('c'), None), Some(command(Command::UseCamera)));
    assert_eq!(
        map_key(KeyCode::Char(' '), None),
        Some(command(Command::ToggleStartStop))
    );
    assert_eq!(map_key(KeyCode::Char('m'), None), Some(KeyAction::CycleMode));
    assert_eq!(
        map_key(KeyCode::Char('3'), None),
        Some(command(Command::ChangeMode(AnalysisMode::Both)))
    );
    assert_eq!(map_key(KeyCode::Esc, None), Some(command(Command::Close)));
    assert_eq!(map_key(KeyCode::Char('x'), None), None);
}

#[tokio::test]
async fn test_keyboard_handler_creation() {
    let (tx, _rx) = tokio::sync::mpsc::channel(1);
    let handler = KeyboardInputHandler::new(tx, None);

    // Stopping a handler that never started is harmless
    assert!(handler.stop().await.is_ok());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_until_close() {
    let (mut app, surface) = create_test_app();
    let sender = app.sender();

    sender
        .send(command(Command::LoadSource("stub://40".into())))
        .await
        .unwrap();
    sender.send(command(Command::ToggleStartStop)).await.unwrap();
    sender.send(KeyAction::CycleMode).await.unwrap();
    sender.send(command(Command::Close)).await.unwrap();

    let reason = tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .expect("control loop did not finish");

    assert_eq!(reason, ShutdownReason::UserRequest);
    assert_eq!(app.coordinator().state(), PipelineState::Idle);
    // Motion -> Object through the cycle key
    assert_eq!(app.coordinator().mode(), AnalysisMode::Object);
    assert!(!app.coordinator().has_open_source());
    assert!(surface
        .statuses()
        .iter()
        .any(|s| s == "Loaded: stub://40"));
    assert!(app.cancellation_token().is_cancelled());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancellation_stops_running_session() {
    let (mut app, surface) = create_test_app();
    let sender = app.sender();
    let token = app.cancellation_token();

    sender
        .send(command(Command::LoadSource("stub://100".into())))
        .await
        .unwrap();
    sender.send(command(Command::ToggleStartStop)).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        token.cancel();
    });

    let reason = tokio::time::timeout(Duration::from_secs(10), app.run())
        .await
        .expect("control loop did not finish");

    assert_eq!(reason, ShutdownReason::Cancelled);
    assert!(!app.coordinator().is_running());
    assert!(surface.frames_shown() > 1);
    assert_eq!(surface.last_status().as_deref(), Some("Analysis stopped"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_dispatch_cycles_through_modes() {
    let (mut app, _surface) = create_test_app();

    for expected in [AnalysisMode::Object, AnalysisMode::Both, AnalysisMode::Motion] {
        assert_eq!(app.dispatch(KeyAction::CycleMode), Flow::Continue);
        assert_eq!(app.coordinator().mode(), expected);
    }
}
