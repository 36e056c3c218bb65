//! AWS adapter error types

use aws_sdk_cloudformation::error::{DisplayErrorContext, ProvideErrorMetadata};
use stackflow_cloud::CloudError;
use thiserror::Error;

/// Error codes the service uses when it rate-limits a caller
const THROTTLING_CODES: [&str; 4] = [
    "Throttling",
    "ThrottlingException",
    "RequestLimitExceeded",
    "TooManyRequestsException",
];

#[derive(Error, Debug)]
pub enum AwsError {
    #[error("AWS credentials could not be loaded: {0}")]
    Credentials(String),

    #[error("Invalid AWS configuration: {0}")]
    InvalidConfig(String),

    #[error("Stack does not exist: {0}")]
    StackNotFound(String),

    #[error("{operation} throttled: {message}")]
    Throttled { operation: String, message: String },

    #[error("{operation} failed ({code}): {message}")]
    Api {
        operation: String,
        code: String,
        message: String,
    },
}

impl AwsError {
    /// Classify an SDK error returned by `operation`
    pub fn from_sdk<E>(operation: &str, err: E) -> Self
    where
        E: ProvideErrorMetadata + std::error::Error + 'static,
    {
        let code = err.code().unwrap_or("Unknown").to_string();
        let message = err
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

        if THROTTLING_CODES.contains(&code.as_str()) {
            return AwsError::Throttled {
                operation: operation.to_string(),
                message,
            };
        }
        AwsError::Api {
            operation: operation.to_string(),
            code,
            message,
        }
    }

    /// `ValidationError` with "does not exist" is how the service reports a missing stack
    pub fn is_missing_stack(&self) -> bool {
        match self {
            AwsError::StackNotFound(_) => true,
            AwsError::Api { code, message, .. } => {
                code == "ValidationError" && message.contains("does not exist")
            }
            _ => false,
        }
    }
}

impl From<AwsError> for CloudError {
    fn from(err: AwsError) -> Self {
        match err {
            AwsError::Credentials(msg) => CloudError::AuthenticationFailed(msg),
            AwsError::InvalidConfig(msg) => CloudError::InvalidConfig(msg),
            AwsError::StackNotFound(name) => CloudError::StackNotFound(name),
            AwsError::Throttled { .. } => CloudError::Throttled(err.to_string()),
            AwsError::Api { .. } => CloudError::ApiError(err.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, AwsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_stack_detection() {
        let missing = AwsError::Api {
            operation: "DescribeStacks".into(),
            code: "ValidationError".into(),
            message: "Stack with id Orders does not exist".into(),
        };
        assert!(missing.is_missing_stack());

        let other = AwsError::Api {
            operation: "CreateChangeSet".into(),
            code: "ValidationError".into(),
            message: "Template format error: JSON not well-formed".into(),
        };
        assert!(!other.is_missing_stack());
    }

    #[test]
    fn test_conversion_keeps_taxonomy() {
        let throttled: CloudError = AwsError::Throttled {
            operation: "DescribeStacks".into(),
            message: "Rate exceeded".into(),
        }
        .into();
        assert!(throttled.is_transient());

        let creds: CloudError = AwsError::Credentials("no profile named dev".into()).into();
        assert!(creds.is_configuration());
        assert!(matches!(creds, CloudError::AuthenticationFailed(_)));
    }
}
