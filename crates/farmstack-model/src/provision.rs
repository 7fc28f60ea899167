//! Bootstrap-payload provisioner collaborator
//!
//! A [`Provisioner`] turns an instance group's provisioner kind and
//! arguments into the opaque bytes injected into instances at boot
//! (cloud-init multipart payloads, init metadata, and so on). The template
//! builder embeds the payload verbatim and never inspects its contents.

use serde_json::Value;
use thiserror::Error;

/// The provisioner cannot produce a payload for the requested kind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provisioner does not support kind '{kind}': {message}")]
pub struct ProvisionError {
    pub kind: String,
    pub message: String,
}

impl ProvisionError {
    pub fn unsupported(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Template features a provisioner kind needs from the graph builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// Emit a wait condition so the stack blocks on bootstrap signals
    pub wants_wait_condition: bool,
    /// The payload calls instance-profile-scoped APIs during bootstrap
    pub wants_instance_profile: bool,
}

/// Produces bootstrap payloads and declares per-kind template capabilities.
pub trait Provisioner {
    /// Produce the opaque bootstrap payload for one instance group.
    fn produce_bootstrap_payload(&self, kind: &str, args: &Value) -> Result<Vec<u8>, ProvisionError>;

    /// Declare which template features the given kind requires.
    fn capabilities(&self, kind: &str) -> Capabilities;
}
