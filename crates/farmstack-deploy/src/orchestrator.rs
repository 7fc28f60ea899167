//! Per-deployment orchestration
//!
//! `Deployer` runs the state machine for one deployment request: resolve
//! the region, check whether the stack exists, then either create it or
//! diff against the live template and consult the update strategy (and a
//! human, when the strategy says so) before updating. Successful applies
//! notify the audit sink; a no-op diff makes no API call at all.
//!
//! Each request is processed independently; there is no shared state, no
//! retry, and no partial apply.

use std::collections::BTreeMap;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::audit::AuditSink;
use crate::cloudformation::ProvisioningApi;
use crate::diff;
use crate::error::{classify_provisioning_error, DeployError};
use crate::prompt::Confirmer;
use crate::regions;
use crate::strategy::UpdateStrategy;

/// Everything needed to deploy one serialized template.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub stack_name: String,
    pub region: String,
    pub tags: BTreeMap<String, String>,
    pub strategy: UpdateStrategy,
    pub template_body: String,
}

/// What a deployment attempt did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployOutcome {
    /// The stack did not exist and was created
    Created,
    /// The live stack was updated in place
    Updated,
    /// The proposed body matches the live one; no API call was made
    Unchanged,
    /// The strategy or the operator declined the in-place update
    Declined,
}

/// Drives one deployment request against the provisioning API.
pub struct Deployer<P, A, C> {
    provisioning: P,
    audit: A,
    confirmer: C,
}

impl<P: ProvisioningApi, A: AuditSink, C: Confirmer> Deployer<P, A, C> {
    pub fn new(provisioning: P, audit: A, confirmer: C) -> Self {
        Self {
            provisioning,
            audit,
            confirmer,
        }
    }

    /// Process one deployment request to completion.
    pub async fn deploy(&self, request: &DeploymentRequest) -> Result<DeployOutcome, DeployError> {
        regions::endpoint_for(&request.region)?;

        if self.provisioning.stack_exists(&request.stack_name).await {
            self.update(request).await
        } else {
            self.create(request).await
        }
    }

    async fn create(&self, request: &DeploymentRequest) -> Result<DeployOutcome, DeployError> {
        info!(stack = %request.stack_name, "Stack does not exist; creating");
        self.provisioning
            .create_stack(&request.stack_name, &request.template_body, &request.tags)
            .await
            .map_err(|error| classify_provisioning_error(&error))?;

        self.record_audit(request).await;
        Ok(DeployOutcome::Created)
    }

    async fn update(&self, request: &DeploymentRequest) -> Result<DeployOutcome, DeployError> {
        let live = self
            .provisioning
            .get_template(&request.stack_name)
            .await
            .map_err(|error| classify_provisioning_error(&error))?;

        let changes = diff::diff(&live, &request.template_body)?;
        if changes.is_empty() {
            info!(stack = %request.stack_name, "Live template already matches; nothing to do");
            return Ok(DeployOutcome::Unchanged);
        }
        debug!(
            stack = %request.stack_name,
            paths = ?changes.paths(),
            "Template differs from live stack"
        );

        if !request.strategy.should_update() {
            info!(
                stack = %request.stack_name,
                strategy = request.strategy.name(),
                "Strategy declines in-place updates; deploy as a new stack instead"
            );
            return Ok(DeployOutcome::Declined);
        }

        if request.strategy.should_prompt() {
            let rendered = diff::render(&live, &request.template_body);
            match self.confirmer.confirm(&rendered) {
                Ok(true) => {}
                Ok(false) => {
                    info!(stack = %request.stack_name, "Update declined by operator");
                    return Ok(DeployOutcome::Declined);
                }
                // No affirmative answer means no update
                Err(error) => {
                    warn!(stack = %request.stack_name, error = %error, "Confirmation failed; treating as declined");
                    return Ok(DeployOutcome::Declined);
                }
            }
        }

        self.provisioning
            .update_stack(&request.stack_name, &request.template_body)
            .await
            .map_err(|error| classify_provisioning_error(&error))?;

        self.record_audit(request).await;
        Ok(DeployOutcome::Updated)
    }

    /// Best-effort audit notification; failures are logged, never fatal.
    async fn record_audit(&self, request: &DeploymentRequest) {
        let destination_key = format!(
            "{}/{}.json",
            request.stack_name,
            Utc::now().format("%Y%m%dT%H%M%SZ")
        );
        if let Err(error) = self
            .audit
            .record(&request.template_body, &destination_key)
            .await
        {
            warn!(
                stack = %request.stack_name,
                key = %destination_key,
                error = %error,
                "Failed to record deployment audit"
            );
        }
    }
}
