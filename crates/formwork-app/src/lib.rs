//! Formwork Application
//!
//! Headless editor shell: loads a scenario, replays it through the widget
//! runtime and reports the resolved widget state.

mod scenario;
mod shell;

pub use scenario::{Scenario, Step};
pub use shell::{Report, Shell, ShellState, WidgetReport, run_scenario};

use formwork_core::CanvasError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read scenario: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid scenario: {0}")]
    Scenario(#[from] serde_json::Error),
    #[error(transparent)]
    Canvas(#[from] CanvasError),
}

pub type AppResult<T> = Result<T, AppError>;
