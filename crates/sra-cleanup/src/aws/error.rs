//! AWS error classification and handling
//!
//! SDK errors are classified where they occur using the error metadata
//! (`.code()` and `.message()`), so handlers can tell a stale listing apart
//! from a real failure without string matching on Debug output.

use aws_sdk_sts::error::{DisplayErrorContext, ProvideErrorMetadata};
use thiserror::Error;

/// AWS error categories relevant to cleanup
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AwsError {
    /// Resource no longer exists (stale listing)
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// Rate limit exceeded
    #[error("Rate limit exceeded: {message}")]
    Throttled { message: String },

    /// Bucket still has objects or versions
    #[error("BucketNotEmpty: {message}")]
    BucketNotEmpty { message: String },

    /// Caller is not allowed to perform the operation
    #[error("Access denied: {message}")]
    AccessDenied { message: String },

    /// Any other AWS SDK error with code and message
    #[error("{}", sdk_message(.code.as_deref(), .message))]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Get a user-friendly suggestion for resolving this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            AwsError::AccessDenied { .. } => {
                Some("Check that the profile's role is allowed to list and delete SRA resources.")
            }
            AwsError::Throttled { .. } => {
                Some("AWS API rate limit hit. Re-run the cleanup once the account settles.")
            }
            AwsError::BucketNotEmpty { .. } => {
                Some("Some object versions could not be removed. Empty the bucket manually.")
            }
            _ => None,
        }
    }
}

fn sdk_message(code: Option<&str>, message: &str) -> String {
    match code {
        Some(code) => format!("{code}: {message}"),
        None => message.to_string(),
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "NoSuchBucket",
    "NoSuchKey",
    "NoSuchVersion",
    "NoSuchEntity",
    "ResourceNotFoundException",
    "ParameterNotFound",
    "StackSetNotFoundException",
    "StackInstanceNotFoundException",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyRequestsException",
    "RequestLimitExceeded",
    "SlowDown",
];

const ACCESS_DENIED_CODES: &[&str] = &[
    "AccessDenied",
    "AccessDeniedException",
    "UnauthorizedOperation",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        // CloudFormation reports missing stacks as a validation error
        Some("ValidationError") if message.contains("does not exist") => {
            AwsError::NotFound { message }
        }
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled { message },
        Some(c) if ACCESS_DENIED_CODES.contains(&c) => AwsError::AccessDenied { message },
        Some("BucketNotEmpty") => AwsError::BucketNotEmpty { message },
        _ => AwsError::Sdk {
            code: code.map(|s| s.to_string()),
            message,
        },
    }
}

/// Convert an SDK error into a classified [`AwsError`].
///
/// Errors without service metadata (timeouts, dispatch failures) keep their
/// full display chain as the message.
pub fn from_sdk<E>(err: E) -> AwsError
where
    E: ProvideErrorMetadata + std::error::Error + 'static,
{
    if err.code().is_none() && err.message().is_none() {
        return AwsError::Sdk {
            code: None,
            message: DisplayErrorContext(&err).to_string(),
        };
    }
    classify_aws_error(err.code(), err.message())
}

/// Recover the classified error from an anyhow chain.
///
/// Walks the chain looking for an [`AwsError`] attached at the call site.
/// Anything else is reported as a generic SDK error.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<AwsError>() {
            return e.clone();
        }
    }

    AwsError::Sdk {
        code: None,
        message: format!("{error:#}"),
    }
}

/// Remediation hint for a failure, when its AWS error class has one
pub fn suggestion_for(error: &anyhow::Error) -> Option<&'static str> {
    classify_anyhow_error(error).suggestion()
}

/// Shorthand for the stale-listing check used by every handler
pub fn is_not_found(error: &anyhow::Error) -> bool {
    classify_anyhow_error(error).is_not_found()
}
