use super::{KeyAction, ShutdownReason};
use crate::pipeline::{Coordinator, Flow};
use crate::surface::Command;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const ACTION_CHANNEL_CAPACITY: usize = 32;

/// Control loop owning the coordinator.
///
/// Commands arrive on a channel (keyboard, scripted callers) and are applied
/// one at a time; coordinator calls block while workers are joined or a model
/// loads, so they run through `block_in_place` on a multi-threaded runtime.
pub struct App {
    coordinator: Coordinator,
    action_tx: mpsc::Sender<KeyAction>,
    action_rx: mpsc::Receiver<KeyAction>,
    cancellation_token: CancellationToken,
}

impl App {
    pub fn new(coordinator: Coordinator) -> Self {
        let (action_tx, action_rx) = mpsc::channel(ACTION_CHANNEL_CAPACITY);
        Self {
            coordinator,
            action_tx,
            action_rx,
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Sender for delivering actions to the loop
    pub fn sender(&self) -> mpsc::Sender<KeyAction> {
        self.action_tx.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    pub fn coordinator_mut(&mut self) -> &mut Coordinator {
        &mut self.coordinator
    }

    /// Apply one action; returns `Flow::Exit` once the user closed the app
    pub fn dispatch(&mut self, action: KeyAction) -> Flow {
        let command = match action {
            KeyAction::Command(command) => command,
            KeyAction::CycleMode => Command::ChangeMode(self.coordinator.mode().next()),
        };

        let coordinator = &mut self.coordinator;
        task::block_in_place(|| coordinator.handle(command))
    }

    /// Run until the user closes the app, a signal arrives or the loop is
    /// cancelled, then stop analysis and release the source
    pub async fn run(&mut self) -> ShutdownReason {
        info!("Control loop running");

        let ctrl_c = signal::ctrl_c();
        tokio::pin!(ctrl_c);
        let terminate = wait_for_terminate();
        tokio::pin!(terminate);

        let reason = loop {
            tokio::select! {
                action = self.action_rx.recv() => match action {
                    Some(action) => {
                        debug!("Control loop action: {:?}", action);
                        if self.dispatch(action) == Flow::Exit {
                            break ShutdownReason::UserRequest;
                        }
                    }
                    None => break ShutdownReason::InputClosed,
                },
                result = &mut ctrl_c => {
                    if let Err(e) = result {
                        warn!("Failed to listen for Ctrl+C: {}", e);
                    }
                    info!("Received SIGINT signal (Ctrl+C)");
                    break ShutdownReason::Signal("SIGINT".to_string());
                }
                _ = &mut terminate => {
                    info!("Received SIGTERM signal");
                    break ShutdownReason::Signal("SIGTERM".to_string());
                }
                _ = self.cancellation_token.cancelled() => {
                    break ShutdownReason::Cancelled;
                }
            }
        };

        info!("Shutdown initiated: {:?}", reason);
        let coordinator = &mut self.coordinator;
        task::block_in_place(|| coordinator.shutdown());
        self.cancellation_token.cancel();

        reason
    }
}

#[cfg(unix)]
async fn wait_for_terminate() {
    match signal::unix::signal(signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            warn!("Failed to register SIGTERM handler: {}", e);
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}
