//! Shared AWS configuration context
//!
//! Provides `AwsContext` for loading AWS SDK configuration once and
//! creating multiple service clients from the same config.

use std::sync::Arc;

use aws_config::{BehaviorVersion, Region, SdkConfig};

use crate::error::DeployError;
use crate::regions;

/// Shared AWS configuration context for creating service clients.
///
/// Region resolution happens here, against the static endpoint table, so an
/// unknown region fails before any client exists to call anything with.
#[derive(Clone)]
pub struct AwsContext {
    config: Arc<SdkConfig>,
    region: String,
    endpoint: &'static str,
}

impl AwsContext {
    /// Load AWS configuration for the specified region.
    ///
    /// This loads credentials and other AWS SDK settings from the
    /// environment, config files, and IAM roles.
    pub async fn new(region: &str) -> Result<Self, DeployError> {
        let endpoint = regions::endpoint_for(region)?;
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        Ok(Self {
            config: Arc::new(config),
            region: region.to_string(),
            endpoint,
        })
    }

    /// Get the underlying SDK config for direct client construction.
    pub fn sdk_config(&self) -> &SdkConfig {
        &self.config
    }

    /// Get the region string.
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Get the resolved provisioning endpoint.
    pub fn endpoint(&self) -> &'static str {
        self.endpoint
    }

    /// Create a CloudFormation client pinned to the resolved endpoint.
    pub fn cloudformation_client(&self) -> aws_sdk_cloudformation::Client {
        let config = aws_sdk_cloudformation::config::Builder::from(self.sdk_config())
            .endpoint_url(self.endpoint)
            .build();
        aws_sdk_cloudformation::Client::from_conf(config)
    }

    /// Create an S3 client from this context.
    pub fn s3_client(&self) -> aws_sdk_s3::Client {
        aws_sdk_s3::Client::new(self.sdk_config())
    }
}

impl std::fmt::Debug for AwsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AwsContext")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}
