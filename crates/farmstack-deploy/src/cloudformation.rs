//! Provisioning API client
//!
//! `CfnClient` wraps the CloudFormation SDK client with the four operations
//! this core consumes: describe, create, update, and get-template. The
//! `ProvisioningApi` trait abstracts them so orchestration logic can be unit
//! tested without hitting real AWS.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use aws_sdk_cloudformation::types::Tag;
use aws_sdk_cloudformation::Client;
use tracing::{debug, info};

use crate::context::AwsContext;
use crate::error::DeployError;

/// CloudFormation client for managing farm stacks
pub struct CfnClient {
    client: Client,
}

impl CfnClient {
    /// Create a new client (loads AWS config from the environment)
    pub async fn new(region: &str) -> Result<Self, DeployError> {
        let ctx = AwsContext::new(region).await?;
        Ok(Self::from_context(&ctx))
    }

    /// Create a client from a pre-loaded AWS context
    pub fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudformation_client(),
        }
    }

    /// Describe a stack by name. Callers only care whether the call
    /// succeeds; no response detail is consumed at this layer.
    pub async fn describe_stack(&self, stack_name: &str) -> Result<()> {
        self.client
            .describe_stacks()
            .stack_name(stack_name)
            .send()
            .await
            .context("Failed to describe stack")?;
        Ok(())
    }

    /// Fetch the live template body of a stack.
    pub async fn get_template(&self, stack_name: &str) -> Result<String> {
        debug!(stack = %stack_name, "Fetching live template");
        let response = self
            .client
            .get_template()
            .stack_name(stack_name)
            .send()
            .await
            .context("Failed to get stack template")?;

        let body = response
            .template_body()
            .context("No template body in response")?;
        Ok(body.to_string())
    }

    /// Create a stack from a template body and tag set.
    pub async fn create_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        info!(stack = %stack_name, tags = tags.len(), "Creating stack");

        let mut request = self
            .client
            .create_stack()
            .stack_name(stack_name)
            .template_body(template_body);
        for (key, value) in tags {
            let tag = Tag::builder()
                .key(key)
                .value(value)
                .build();
            request = request.tags(tag);
        }

        request.send().await.context("Failed to create stack")?;
        Ok(())
    }

    /// Replace a stack's template in place.
    pub async fn update_stack(&self, stack_name: &str, template_body: &str) -> Result<()> {
        info!(stack = %stack_name, "Updating stack");
        self.client
            .update_stack()
            .stack_name(stack_name)
            .template_body(template_body)
            .send()
            .await
            .context("Failed to update stack")?;
        Ok(())
    }
}

/// Trait for provisioning operations that can be mocked in tests.
///
/// This trait abstracts the CloudFormation client operations to enable unit
/// testing of orchestration logic without hitting real AWS.
#[allow(async_fn_in_trait)] // Internal use only, Send+Sync bounds on trait are sufficient
#[cfg_attr(test, mockall::automock)]
pub trait ProvisioningApi: Send + Sync {
    /// True when the describe call succeeds; any failure reads as absent
    async fn stack_exists(&self, stack_name: &str) -> bool;

    /// Fetch the live template body of a stack
    async fn get_template(&self, stack_name: &str) -> Result<String>;

    /// Create a stack from a template body and tag set
    async fn create_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()>;

    /// Replace a stack's template in place
    async fn update_stack(&self, stack_name: &str, template_body: &str) -> Result<()>;
}

impl ProvisioningApi for CfnClient {
    async fn stack_exists(&self, stack_name: &str) -> bool {
        match CfnClient::describe_stack(self, stack_name).await {
            Ok(()) => true,
            Err(error) => {
                debug!(stack = %stack_name, error = %error, "Describe failed; treating stack as absent");
                false
            }
        }
    }

    async fn get_template(&self, stack_name: &str) -> Result<String> {
        CfnClient::get_template(self, stack_name).await
    }

    async fn create_stack(
        &self,
        stack_name: &str,
        template_body: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<()> {
        CfnClient::create_stack(self, stack_name, template_body, tags).await
    }

    async fn update_stack(&self, stack_name: &str, template_body: &str) -> Result<()> {
        CfnClient::update_stack(self, stack_name, template_body).await
    }
}
