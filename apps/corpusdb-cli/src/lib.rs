//! corpusdb-cli
//!
//! Wiring from `Settings` to the concrete stores plus the admin and serving commands.

pub mod app;
pub mod cli;
pub mod output;

pub use app::App;
pub use cli::{run, Cli, Command};
