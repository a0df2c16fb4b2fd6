//! Error type for the client runtime.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use notedown_config::ConfigError;
use notedown_editor::NotedownError;
use thiserror::Error;

use crate::telemetry::TelemetryError;

#[derive(Debug, Error)]
pub(crate) enum AppError {
    #[error("failed to load configuration: {0}")]
    LoadConfiguration(Arc<ortho_config::OrthoError>),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    #[error("{0}")]
    CliUsage(clap::Error),
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),
    #[error("failed to determine the current directory: {0}")]
    CurrentDirectory(io::Error),
    #[error("failed to read {}: {source}", path.display())]
    ReadDocument { path: PathBuf, source: io::Error },
    #[error("failed to write {}: {source}", path.display())]
    WriteDocument { path: PathBuf, source: io::Error },
    #[error("failed to read command input: {0}")]
    ReadInput(io::Error),
    #[error("failed to write output: {0}")]
    WriteOutput(#[from] io::Error),
    #[error(transparent)]
    Notedown(#[from] NotedownError),
}
