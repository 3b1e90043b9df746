//! Chat surfaces for GroundChat.
//!
//! A surface relays one line of user input per turn to the controller and
//! renders the role-tagged replies back. System messages never reach it.
//!
//! Available channels:
//! - **CLI**: Interactive terminal chat (stdin/stdout)

pub mod cli;

pub use cli::CliChannel;
