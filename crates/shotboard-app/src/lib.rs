//! Shotboard Application
//!
//! Command-line shell wiring the core to the local filesystem.

mod app;
mod cli;

pub use app::{App, AppConfig, AppError, CaptureRequest};
pub use cli::{Cli, Command};
