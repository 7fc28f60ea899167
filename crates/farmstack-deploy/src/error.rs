//! Typed errors for the deployment phase
//!
//! Provisioning failures carry the service error code extracted with
//! `ProvideErrorMetadata` instead of string matching on the Debug format.

use thiserror::Error;

/// Errors that abort a deployment attempt. Each failure surfaces exactly
/// once; nothing in this crate retries.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The requested region is unknown to the provisioning service table
    #[error("unknown or unspecified region '{name}' for the provisioning service")]
    Region { name: String },

    /// The provisioning API rejected or failed a call
    #[error("provisioning API error: {message}")]
    Provisioning {
        code: Option<String>,
        message: String,
    },

    /// A template body handed to the differ was not valid JSON
    #[error("malformed template body: {message}")]
    Template { message: String },
}

impl DeployError {
    /// Check if this is a region-resolution error
    pub fn is_region(&self) -> bool {
        matches!(self, DeployError::Region { .. })
    }

    /// Check if this is a provisioning API error
    pub fn is_provisioning(&self) -> bool {
        matches!(self, DeployError::Provisioning { .. })
    }

    /// The service error code, when one was extracted
    pub fn code(&self) -> Option<&str> {
        match self {
            DeployError::Provisioning { code, .. } => code.as_deref(),
            _ => None,
        }
    }
}

/// Build a provisioning error from extracted service metadata.
pub(crate) fn provisioning_error(code: Option<&str>, message: Option<&str>) -> DeployError {
    DeployError::Provisioning {
        code: code.map(str::to_string),
        message: message.unwrap_or("Unknown error").to_string(),
    }
}

/// Classify a provisioning-client failure by walking the error chain for a
/// service error and extracting its code and message.
///
/// AWS SDK operation errors implement `ProvideErrorMetadata` directly; the
/// wrappers annotate them with `anyhow::Context`, so the service error sits
/// somewhere down the chain.
pub(crate) fn classify_provisioning_error(error: &anyhow::Error) -> DeployError {
    use aws_sdk_cloudformation::error::ProvideErrorMetadata;

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<aws_sdk_cloudformation::error::SdkError<
            aws_sdk_cloudformation::operation::create_stack::CreateStackError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return provisioning_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_cloudformation::error::SdkError<
            aws_sdk_cloudformation::operation::update_stack::UpdateStackError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return provisioning_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_cloudformation::error::SdkError<
            aws_sdk_cloudformation::operation::describe_stacks::DescribeStacksError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return provisioning_error(meta.code(), meta.message());
        }
        if let Some(e) = cause.downcast_ref::<aws_sdk_cloudformation::error::SdkError<
            aws_sdk_cloudformation::operation::get_template::GetTemplateError,
        >>() {
            let meta = ProvideErrorMetadata::meta(e);
            return provisioning_error(meta.code(), meta.message());
        }
    }

    DeployError::Provisioning {
        code: None,
        message: error.to_string(),
    }
}
