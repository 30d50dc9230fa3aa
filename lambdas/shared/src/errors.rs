//! Error types for the Datadog custom resources

use thiserror::Error;

/// Result type alias using the custom resource Error
pub type Result<T> = std::result::Result<T, Error>;

/// Custom resource error types
#[derive(Error, Debug)]
pub enum Error {
    /// A required resource property was not supplied
    #[error("Missing resource property: {0}")]
    MissingProperty(String),

    /// A resource property had the wrong shape
    #[error("Invalid resource property {name}: {reason}")]
    InvalidProperty { name: String, reason: String },

    /// The request itself could not be read
    #[error("Malformed CloudFormation request: {0}")]
    MalformedEvent(String),

    /// CloudFormation sent a verb we do not handle
    #[error("Received unexpected request type: {0}")]
    UnexpectedRequestType(String),

    /// Network failure talking to a remote endpoint
    #[error("Transport error: {0}")]
    Transport(String),

    /// Remote API answered with a non-2xx status
    #[error("Datadog API returned error: {status} - {body}")]
    Api { status: u16, body: String },

    /// No Datadog account registration matches the AWS account
    #[error("Datadog account not found for AWS account {0}")]
    AccountNotFound(String),

    /// More than one registration matches; we refuse to guess
    #[error("Datadog account not unique: {count} registrations match AWS account {account_id}")]
    AccountNotUnique { account_id: String, count: usize },

    /// Datadog-side account id differs from the stack's account
    #[error("The AWS Account Id in Datadog does not match the AWS Account Id that the stack is running in.")]
    AccountMismatch { datadog: String, aws: String },

    /// A single permission cannot fit in a policy document
    #[error("Permission {permission} needs {size} bytes, policy budget is {budget}")]
    PermissionTooLarge {
        permission: String,
        size: usize,
        budget: usize,
    },

    /// More policy chunks than the cleanup range covers
    #[error("{count} policy chunks exceed the maximum of {max} managed policies")]
    TooManyPolicies { count: usize, max: usize },

    /// IAM entity is already absent
    #[error("No such entity: {0}")]
    NoSuchEntity(String),

    /// IAM policy still attached somewhere
    #[error("Delete conflict: {0}")]
    DeleteConflict(String),

    /// Any other AWS control-plane failure
    #[error("AWS error: {0}")]
    Aws(String),

    /// Secret missing or malformed
    #[error("Secret error: {0}")]
    Secret(String),

    /// Datacenter name in a secret has no known site
    #[error("Unknown Datadog datacenter: {0}")]
    UnknownDatacenter(String),

    /// The Lambda deadline arrived before the handler finished
    #[error("Lambda function timeout exceeded before the handler completed")]
    Timeout,

    /// JSON Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Returns the error code used in logs
    pub fn code(&self) -> &'static str {
        match self {
            Error::MissingProperty(_) => "missing_property",
            Error::InvalidProperty { .. } => "invalid_property",
            Error::MalformedEvent(_) => "malformed_event",
            Error::UnexpectedRequestType(_) => "unexpected_request_type",
            Error::Transport(_) => "transport_error",
            Error::Api { .. } => "api_error",
            Error::AccountNotFound(_) => "account_not_found",
            Error::AccountNotUnique { .. } => "account_not_unique",
            Error::AccountMismatch { .. } => "account_mismatch",
            Error::PermissionTooLarge { .. } => "permission_too_large",
            Error::TooManyPolicies { .. } => "too_many_policies",
            Error::NoSuchEntity(_) => "no_such_entity",
            Error::DeleteConflict(_) => "delete_conflict",
            Error::Aws(_) => "aws_error",
            Error::Secret(_) => "secret_error",
            Error::UnknownDatacenter(_) => "unknown_datacenter",
            Error::Timeout => "timeout",
            Error::Serialization(_) => "serialization_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether an IAM cleanup step can treat this as already done
    pub fn tolerated_during_cleanup(&self) -> bool {
        matches!(self, Error::NoSuchEntity(_) | Error::DeleteConflict(_))
    }

    /// Builds an `Api` error from a status and raw body
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Error::Api {
            status,
            body: body.into(),
        }
    }
}
