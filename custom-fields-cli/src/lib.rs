//! Library half of the `custom-fields` binary: argument definitions and the
//! command implementations, kept out of `main.rs` so they can be tested.

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands};
pub use commands::CommandError;
