//! Top-level viewer errors.

use thiserror::Error;

use crate::sim::ModelError;

/// Errors that stop the viewer.
#[derive(Error, Debug)]
pub enum ViewerError {
    /// The model file could not be loaded.
    #[error("Error loading model: {0}")]
    ModelLoad(#[from] ModelError),

    /// The terminal could not be initialized.
    #[error("Could not initialize terminal: {0}")]
    WindowInit(String),

    /// The terminal window could not be set up.
    #[error("Could not create terminal window: {0}")]
    WindowCreate(#[source] std::io::Error),

    /// Terminal I/O failed while the loop was running.
    #[error("Terminal I/O error: {0}")]
    Io(#[from] std::io::Error),
}
