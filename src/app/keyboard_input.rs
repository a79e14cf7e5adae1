use super::KeyAction;
use crate::error::Result;
use crate::pipeline::AnalysisMode;
use crate::surface::Command;
use crossterm::event::{self, Event, KeyCode, KeyEventKind};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Translate a key into a control-loop action
///
/// `o` loads `load_path` (ignored when none is configured), `c` switches to
/// the camera, space toggles analysis, `m` cycles the mode, `1`-`3` pick a
/// mode and `q`/Esc close.
pub fn map_key(code: KeyCode, load_path: Option<&Path>) -> Option<KeyAction> {
    let command = match code {
        KeyCode::Char('o') => Command::LoadSource(load_path?.to_path_buf()),
        KeyCode::Char('c') => Command::UseCamera,
        KeyCode::Char(' ') => Command::ToggleStartStop,
        KeyCode::Char('m') => return Some(KeyAction::CycleMode),
        KeyCode::Char('1') => Command::ChangeMode(AnalysisMode::Motion),
        KeyCode::Char('2') => Command::ChangeMode(AnalysisMode::Object),
        KeyCode::Char('3') => Command::ChangeMode(AnalysisMode::Both),
        KeyCode::Char('q') | KeyCode::Esc => Command::Close,
        _ => return None,
    };
    Some(KeyAction::Command(command))
}

/// Keyboard input handler feeding the control loop
pub struct KeyboardInputHandler {
    actions: mpsc::Sender<KeyAction>,
    load_path: Option<PathBuf>,
    cancellation_token: CancellationToken,
}

impl KeyboardInputHandler {
    pub fn new(actions: mpsc::Sender<KeyAction>, load_path: Option<PathBuf>) -> Self {
        Self {
            actions,
            load_path,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Start listening for keyboard input
    pub async fn start(&self) -> Result<()> {
        info!("Starting keyboard input handler - o: open file, c: camera, SPACE: start/stop, m/1/2/3: mode, q: quit");

        let actions = self.actions.clone();
        let load_path = self.load_path.clone();
        let cancellation_token = self.cancellation_token.clone();

        task::spawn_blocking(move || {
            if let Err(e) = enable_raw_mode() {
                error!("Failed to enable raw mode for keyboard input: {}", e);
                return;
            }

            debug!("Raw mode enabled - keyboard handler active");

            while !cancellation_token.is_cancelled() {
                match event::poll(Duration::from_millis(100)) {
                    Ok(true) => {
                        let Ok(Event::Key(key_event)) = event::read() else {
                            continue;
                        };
                        // Only handle key press events (not release)
                        if key_event.kind != KeyEventKind::Press {
                            continue;
                        }

                        match map_key(key_event.code, load_path.as_deref()) {
                            Some(action) => {
                                let closing = action == KeyAction::Command(Command::Close);
                                debug!("Key {:?} -> {:?}", key_event.code, action);

                                if actions.blocking_send(action).is_err() {
                                    warn!("Control loop is gone; keyboard handler exiting");
                                    break;
                                }
                                if closing {
                                    break;
                                }
                            }
                            None => debug!("Key pressed: {:?}", key_event.code),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => {
                        warn!("Error polling for keyboard events: {}", e);
                    }
                }
            }

            if let Err(e) = disable_raw_mode() {
                error!("Failed to disable raw mode: {}", e);
            } else {
                debug!("Raw mode disabled");
            }

            debug!("Keyboard input handler task exited");
        });

        Ok(())
    }

    /// Stop the keyboard input handler
    pub async fn stop(&self) -> Result<()> {
        info!("Stopping keyboard input handler");
        self.cancellation_token.cancel();

        // Give the task a moment to clean up and disable raw mode
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Ensure raw mode is disabled even if the task didn't clean up properly
        let _ = disable_raw_mode();

        Ok(())
    }
}
