//! Load-balancer pass

use std::collections::BTreeMap;

use farmstack_model::defaults::{
    ACCESS_LOG_EMIT_INTERVALS, HEALTH_CHECK_HEALTHY_THRESHOLD, HEALTH_CHECK_INTERVAL_SECS,
    HEALTH_CHECK_TIMEOUT_SECS, HEALTH_CHECK_UNHEALTHY_THRESHOLD,
};
use farmstack_model::{AccessLogPolicy, Listener, LoadBalancerSpec};
use tracing::debug;

use super::{logical_id, AddressingMode, FarmBuilder};
use crate::error::TemplateError;
use crate::node::{TemplateGraph, TemplateNode, Value};

impl FarmBuilder<'_> {
    /// Build one `LoadBalancer` node per spec, plus an output binding
    /// exposing each balancer's public DNS name.
    ///
    /// Returns the spec-name to logical-id map for the instance-group pass.
    pub fn build_load_balancers(
        &self,
        graph: &mut TemplateGraph,
        specs: &[LoadBalancerSpec],
        known_groups: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, String>, TemplateError> {
        let mut built = BTreeMap::new();

        for spec in specs {
            let listeners: Vec<Value> = spec
                .listeners
                .iter()
                .map(|listener| listener_entry(&spec.name, listener))
                .collect::<Result<_, _>>()?;
            if listeners.is_empty() {
                return Err(TemplateError::config(format!(
                    "load balancer '{}' has no listeners",
                    spec.name
                )));
            }

            let id = logical_id("ELB", &spec.name);
            let mut node = TemplateNode::new("AWS::ElasticLoadBalancing::LoadBalancer")
                .with("Listeners", Value::List(listeners))
                .with("HealthCheck", health_check_block(spec));

            if let Some(policy) = &spec.access_logs {
                node = node.with("AccessLoggingPolicy", access_log_block(&spec.name, policy)?);
            }
            if !spec.security_groups.is_empty() {
                node = node.with(
                    "SecurityGroups",
                    Value::List(self.membership_refs(&spec.security_groups, known_groups)?),
                );
            }
            if self.addressing_mode() == AddressingMode::Classic {
                node = node.with("AvailabilityZones", Value::GetAzs);
            }

            debug!(balancer = %spec.name, id = %id, "Built load balancer");
            graph.add_output(format!("{id}DnsName"), Value::get_att(&id, "DNSName"));
            graph.insert(id.clone(), node);
            built.insert(spec.name.clone(), id);
        }

        Ok(built)
    }
}

/// Render one listener block. Secure public protocols must carry a TLS
/// certificate identifier.
fn listener_entry(balancer: &str, listener: &Listener) -> Result<Value, TemplateError> {
    let mut entry = BTreeMap::new();
    entry.insert(
        "LoadBalancerPort".to_string(),
        Value::from(listener.lb_port),
    );
    entry.insert(
        "InstancePort".to_string(),
        Value::from(listener.instance_port),
    );
    entry.insert(
        "Protocol".to_string(),
        Value::from(listener.protocol.as_str()),
    );
    entry.insert(
        "InstanceProtocol".to_string(),
        Value::from(listener.instance_protocol.as_str()),
    );

    match &listener.tls_cert {
        Some(cert) => {
            entry.insert("SSLCertificateId".to_string(), Value::from(cert));
        }
        None if listener.protocol.is_secure() => {
            return Err(TemplateError::config(format!(
                "listener on port {} of load balancer '{balancer}' uses {} but has no TLS certificate",
                listener.lb_port, listener.protocol
            )));
        }
        None => {}
    }

    Ok(Value::Map(entry))
}

/// Render the health-check block around the composed target string.
fn health_check_block(spec: &LoadBalancerSpec) -> Value {
    let mut block = BTreeMap::new();
    block.insert("Target".to_string(), Value::Str(spec.health_check.target()));
    block.insert(
        "HealthyThreshold".to_string(),
        Value::Str(HEALTH_CHECK_HEALTHY_THRESHOLD.to_string()),
    );
    block.insert(
        "UnhealthyThreshold".to_string(),
        Value::Str(HEALTH_CHECK_UNHEALTHY_THRESHOLD.to_string()),
    );
    block.insert(
        "Interval".to_string(),
        Value::Str(HEALTH_CHECK_INTERVAL_SECS.to_string()),
    );
    block.insert(
        "Timeout".to_string(),
        Value::Str(HEALTH_CHECK_TIMEOUT_SECS.to_string()),
    );
    Value::Map(block)
}

/// Render the access-log block. An enabled policy must name a bucket and
/// one of the emit intervals the service accepts.
fn access_log_block(balancer: &str, policy: &AccessLogPolicy) -> Result<Value, TemplateError> {
    let mut block = BTreeMap::new();
    block.insert("Enabled".to_string(), Value::Bool(policy.enabled));

    if policy.enabled {
        let interval = policy.emit_interval.ok_or_else(|| {
            TemplateError::config(format!(
                "access logs on load balancer '{balancer}' are enabled but have no emit_interval"
            ))
        })?;
        if !ACCESS_LOG_EMIT_INTERVALS.contains(&interval) {
            return Err(TemplateError::config(format!(
                "access-log emit_interval on load balancer '{balancer}' must be one of {ACCESS_LOG_EMIT_INTERVALS:?}, got {interval}"
            )));
        }
        let bucket = policy.bucket.as_ref().ok_or_else(|| {
            TemplateError::config(format!(
                "access logs on load balancer '{balancer}' are enabled but have no bucket"
            ))
        })?;

        block.insert("EmitInterval".to_string(), Value::from(interval));
        block.insert("S3BucketName".to_string(), Value::from(bucket));
        block.insert(
            "S3BucketPrefix".to_string(),
            Value::Str(policy.prefix.clone().unwrap_or_default()),
        );
    }

    Ok(Value::Map(block))
}
