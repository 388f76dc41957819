//! Input handling module
//!
//! Keyboard state and raw mouse motion, fed from window events.

mod state;

pub use state::Input;
