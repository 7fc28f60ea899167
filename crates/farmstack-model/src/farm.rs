//! Normalized farm resource descriptors
//!
//! A farm is the logical application being deployed: a set of instance
//! groups, the load balancers in front of them, and the security groups
//! protecting them. The upstream parsers normalize the farm DSL into these
//! structs; everything downstream reads them and never mutates them.
//!
//! Mutually-exclusive fields from the DSL are modeled as enums
//! ([`PortSpec`], [`RuleSource`]) so that invalid rule shapes cannot be
//! represented at all.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A complete normalized farm definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Farm {
    #[serde(default)]
    pub security_groups: Vec<SecurityGroupSpec>,
    #[serde(default)]
    pub load_balancers: Vec<LoadBalancerSpec>,
    #[serde(default)]
    pub instance_groups: Vec<InstanceGroup>,
}

/// One group of identically-configured instances and its scaling bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceGroup {
    pub name: String,
    /// Machine image to boot, e.g. "ami-e97f849e"
    pub image_id: String,
    /// Instance size class, e.g. "m1.large"
    pub instance_type: String,
    /// Desired number of running instances
    pub count: u32,
    /// Lower scaling bound; defaults to `count` when unset
    #[serde(default)]
    pub min_count: Option<u32>,
    /// Upper scaling bound; defaults to `count` when unset
    #[serde(default)]
    pub max_count: Option<u32>,
    /// Enable detailed instance monitoring
    #[serde(default)]
    pub monitoring: bool,
    #[serde(default)]
    pub ssh_key: Option<String>,
    /// Security-group reference tokens (see the reference resolver syntaxes)
    #[serde(default)]
    pub security_groups: Vec<String>,
    /// Name of a farm load balancer fronting this group
    #[serde(default)]
    pub load_balancer: Option<String>,
    /// IAM instance profile name or ARN
    #[serde(default)]
    pub iam_profile: Option<String>,
    pub provisioner: ProvisionerConfig,
}

/// Which provisioner produces this group's bootstrap payload, and with what
/// arguments. The arguments are opaque to everything but the provisioner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionerConfig {
    pub kind: String,
    #[serde(default)]
    pub args: serde_json::Value,
}

/// A named security group and its ordered ingress rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityGroupSpec {
    pub name: String,
    #[serde(default)]
    pub rules: Vec<IngressRule>,
}

/// A single ingress rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngressRule {
    /// IP protocol, e.g. "tcp", "udp", "icmp"
    pub protocol: String,
    pub ports: PortSpec,
    pub source: RuleSource,
}

/// A single port or an inclusive port range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortSpec {
    One(u16),
    Range { from: u16, to: u16 },
}

impl PortSpec {
    /// Expand to the `(from, to)` pair; a single port covers itself.
    pub fn bounds(self) -> (u16, u16) {
        match self {
            PortSpec::One(port) => (port, port),
            PortSpec::Range { from, to } => (from, to),
        }
    }
}

/// Where an ingress rule accepts traffic from. Exactly one of a CIDR block
/// or a security-group reference token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSource {
    Cidr(String),
    Group(String),
}

/// A named load balancer, its listeners, and its health check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadBalancerSpec {
    pub name: String,
    pub listeners: Vec<Listener>,
    pub health_check: HealthCheck,
    #[serde(default)]
    pub access_logs: Option<AccessLogPolicy>,
    /// Security-group reference tokens attached to the balancer itself
    #[serde(default)]
    pub security_groups: Vec<String>,
}

/// One public-port-to-instance-port forwarding rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Listener {
    pub protocol: Protocol,
    pub lb_port: u16,
    pub instance_port: u16,
    pub instance_protocol: Protocol,
    /// TLS certificate identifier; required when `protocol` is secure
    #[serde(default)]
    pub tls_cert: Option<String>,
}

/// Load-balancer health check descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheck {
    pub protocol: Protocol,
    pub port: u16,
    /// Request path; only meaningful for HTTP(S) checks
    #[serde(default)]
    pub path: Option<String>,
}

impl HealthCheck {
    /// Compose the health-check target string, `PROTOCOL:PORT[PATH]`.
    ///
    /// The path is appended only for HTTP(S) protocols; TCP/SSL checks
    /// connect without one.
    pub fn target(&self) -> String {
        match &self.path {
            Some(path) if self.protocol.is_http() => {
                format!("{}:{}{}", self.protocol, self.port, path)
            }
            _ => format!("{}:{}", self.protocol, self.port),
        }
    }
}

/// Access-log shipping policy for a load balancer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessLogPolicy {
    pub enabled: bool,
    /// Emit interval in minutes; the service accepts only 5 or 60
    #[serde(default)]
    pub emit_interval: Option<u32>,
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
}

/// Listener and health-check protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    Http,
    Https,
    Tcp,
    Ssl,
}

impl Protocol {
    /// True for the secure variants that require a TLS certificate.
    pub fn is_secure(self) -> bool {
        matches!(self, Protocol::Https | Protocol::Ssl)
    }

    /// True for the HTTP variants that health-check against a path.
    pub fn is_http(self) -> bool {
        matches!(self, Protocol::Http | Protocol::Https)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Protocol::Http => "HTTP",
            Protocol::Https => "HTTPS",
            Protocol::Tcp => "TCP",
            Protocol::Ssl => "SSL",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
