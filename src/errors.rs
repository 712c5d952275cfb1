use std::time::Duration;

use thiserror::Error;

use crate::types::TaskId;

/// Result alias for the automation core
pub type AutomationResult<T> = std::result::Result<T, AutomationError>;

/// Failures raised by the automation core.
///
/// Soft signals (`PageRefreshTimeout`) are consumed inside the workflows; every
/// other variant is fatal to the surrounding workflow and reaches the caller.
#[derive(Debug, Error)]
pub enum AutomationError {
    /// Browser or driver could not be started (exit code 4)
    #[error("Failed to launch browser session: {0}")]
    Launch(String),

    /// Post-login marker never appeared (exit code 6)
    #[error("Login to {target} failed: {source}")]
    Login {
        target: String,
        #[source]
        source: Box<AutomationError>,
    },

    /// Required control missing (exit code 2)
    #[error("No elements found matching locator: {0}")]
    ElementNotFound(String),

    /// Control located but never visible and enabled (exit code 3)
    #[error("Element is not interactable: {0}")]
    ElementNotInteractable(String),

    /// Pagination did not visibly refresh in time (soft end-of-data)
    #[error("Page content did not refresh within {0:?}")]
    PageRefreshTimeout(Duration),

    /// No job above the high-water mark appeared (exit code 5)
    #[error("No task newer than #{high_water_mark} appeared within {waited:?}")]
    TaskNotDetected {
        high_water_mark: TaskId,
        waited: Duration,
    },

    /// The job exists but its artifact control never became usable (exit code 5)
    #[error("Artifact for task #{task_id} was not ready within {waited:?}")]
    ArtifactNotReady { task_id: TaskId, waited: Duration },

    /// Any other bounded wait elapsed (exit code 5)
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Artifact could not be decoded into text (exit code 7)
    #[error("Failed to extract text from document: {0}")]
    Extraction(String),

    /// Raw WebDriver command failure
    #[error("WebDriver command failed: {0}")]
    WebDriver(#[from] fantoccini::error::CmdError),

    /// Anything else
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AutomationError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            AutomationError::ElementNotFound(_) => 2,
            AutomationError::ElementNotInteractable(_) => 3,
            AutomationError::Launch(_) => 4,
            AutomationError::PageRefreshTimeout(_)
            | AutomationError::Timeout(_)
            | AutomationError::TaskNotDetected { .. }
            | AutomationError::ArtifactNotReady { .. } => 5,
            AutomationError::Login { .. } => 6,
            AutomationError::Extraction(_) => 7,
            AutomationError::WebDriver(_) | AutomationError::Other(_) => 1,
        }
    }

    /// Whether the error must abort the surrounding workflow
    pub fn is_fatal(&self) -> bool {
        !matches!(self, AutomationError::PageRefreshTimeout(_))
    }

    pub(crate) fn login(target: impl Into<String>, cause: AutomationError) -> Self {
        AutomationError::Login {
            target: target.into(),
            source: Box::new(cause),
        }
    }
}

/// Map an `anyhow` error coming out of the CLI into an exit code
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<AutomationError>() {
        Some(automation) => automation.exit_code(),
        None => 1,
    }
}

#[cfg(test)]
#[path = "errors_test.rs"]
mod errors_test;
