//! Provisioning error types

use thiserror::Error;

/// Provisioning errors
///
/// Every failure that can happen while a resource is taken from "declared"
/// to "live" ends up as one of these variants. The orchestrator catches them
/// at the per-resource boundary, so none of them aborts a whole run.
#[derive(Error, Debug)]
pub enum CloudError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stack not found: {0}")]
    StackNotFound(String),

    #[error("Unsupported feature: {0}")]
    Unsupported(String),

    #[error("Stack {stack_name} failed to apply ({status}): {reason}")]
    ApplyFailed {
        stack_name: String,
        status: String,
        reason: String,
    },

    #[error("Stack {stack_name} was not deployed because stack {failed_stack} failed")]
    NotAttempted {
        stack_name: String,
        failed_stack: String,
    },

    #[error("App {app} stopped at stack {stack_name}: {cause}")]
    AppStackFailed {
        app: String,
        stack_name: String,
        cause: std::sync::Arc<CloudError>,
    },

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("API error: {0}")]
    ApiError(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Orchestration task failed: {0}")]
    TaskFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CloudError {
    /// Errors worth retrying with the executor's backoff cadence
    pub fn is_transient(&self) -> bool {
        matches!(self, CloudError::Throttled(_))
    }

    /// Missing credentials, templates or declarations
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CloudError::InvalidConfig(_) | CloudError::AuthenticationFailed(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, CloudError>;
