//! Centralized test fixtures and helpers for farmstack-template tests.
//!
//! This module provides shared fixtures to avoid duplication across test
//! modules.

use farmstack_model::{
    Capabilities, HealthCheck, InstanceGroup, Listener, LoadBalancerSpec, Protocol,
    ProvisionError, Provisioner, ProvisionerConfig,
};

/// Provisioner stub producing an empty payload and no capabilities.
pub struct NoopProvisioner;

impl Provisioner for NoopProvisioner {
    fn produce_bootstrap_payload(
        &self,
        _kind: &str,
        _args: &serde_json::Value,
    ) -> Result<Vec<u8>, ProvisionError> {
        Ok(Vec::new())
    }

    fn capabilities(&self, _kind: &str) -> Capabilities {
        Capabilities::default()
    }
}

/// Provisioner stub returning a fixed payload and capability set.
pub struct StaticProvisioner {
    pub payload: Vec<u8>,
    pub capabilities: Capabilities,
}

impl Provisioner for StaticProvisioner {
    fn produce_bootstrap_payload(
        &self,
        _kind: &str,
        _args: &serde_json::Value,
    ) -> Result<Vec<u8>, ProvisionError> {
        Ok(self.payload.clone())
    }

    fn capabilities(&self, _kind: &str) -> Capabilities {
        self.capabilities
    }
}

/// Provisioner stub refusing every kind.
pub struct FailingProvisioner;

impl Provisioner for FailingProvisioner {
    fn produce_bootstrap_payload(
        &self,
        kind: &str,
        _args: &serde_json::Value,
    ) -> Result<Vec<u8>, ProvisionError> {
        Err(ProvisionError::unsupported(kind, "no generator registered"))
    }

    fn capabilities(&self, _kind: &str) -> Capabilities {
        Capabilities::default()
    }
}

/// Create a minimal valid instance group for testing.
pub fn instance_group(name: &str, count: u32) -> InstanceGroup {
    InstanceGroup {
        name: name.to_string(),
        image_id: "ami-e97f849e".to_string(),
        instance_type: "m1.large".to_string(),
        count,
        min_count: None,
        max_count: None,
        monitoring: false,
        ssh_key: None,
        security_groups: vec![],
        load_balancer: None,
        iam_profile: None,
        provisioner: ProvisionerConfig {
            kind: "noop".to_string(),
            args: serde_json::Value::Null,
        },
    }
}

/// Create a plain HTTP load balancer with a TCP health check.
pub fn web_load_balancer(name: &str) -> LoadBalancerSpec {
    LoadBalancerSpec {
        name: name.to_string(),
        listeners: vec![Listener {
            protocol: Protocol::Http,
            lb_port: 80,
            instance_port: 8080,
            instance_protocol: Protocol::Http,
            tls_cert: None,
        }],
        health_check: HealthCheck {
            protocol: Protocol::Tcp,
            port: 8080,
            path: None,
        },
        access_logs: None,
        security_groups: vec![],
    }
}
