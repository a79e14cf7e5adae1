mod keyboard_input;
mod runtime;
mod types;

#[cfg(test)]
mod tests;

pub use keyboard_input::{map_key, KeyboardInputHandler};
pub use runtime::App;
pub use types::{KeyAction, ShutdownReason};
