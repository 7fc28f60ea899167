//! Best-effort deployment audit sink
//!
//! After a successful create or update the orchestrator hands the deployed
//! template body to an `AuditSink`. Archival is best-effort: failures are
//! logged by the caller and never abort or roll back a deployment.

use anyhow::{Context, Result};
use aws_sdk_s3::primitives::ByteStream;
use tracing::debug;

use crate::context::AwsContext;

/// Records deployed template bodies for later inspection.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    /// Record a deployed template body under a destination key.
    async fn record(&self, body: &str, destination_key: &str) -> Result<()>;
}

/// S3-backed template archive.
pub struct TemplateArchive {
    client: aws_sdk_s3::Client,
    bucket: String,
}

impl TemplateArchive {
    /// Create an archive writing into the given bucket.
    pub fn from_context(ctx: &AwsContext, bucket: impl Into<String>) -> Self {
        Self {
            client: ctx.s3_client(),
            bucket: bucket.into(),
        }
    }
}

impl AuditSink for TemplateArchive {
    async fn record(&self, body: &str, destination_key: &str) -> Result<()> {
        debug!(
            bucket = %self.bucket,
            key = %destination_key,
            size = body.len(),
            "Archiving deployed template"
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(destination_key)
            .body(ByteStream::from(body.as_bytes().to_vec()))
            .content_type("application/json")
            .send()
            .await
            .context("Failed to archive template body")?;
        Ok(())
    }
}
