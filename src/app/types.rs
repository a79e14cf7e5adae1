use crate::surface::Command;

/// Why the control loop ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    Signal(String),
    UserRequest,
    InputClosed,
    Cancelled,
}

/// What a key press asks the control loop to do
#[derive(Debug, Clone, PartialEq)]
pub enum KeyAction {
    Command(Command),
    /// Advance to the next analysis mode
    CycleMode,
}
