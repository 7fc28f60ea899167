//! Typed errors for the template build phase

use farmstack_model::ProvisionError;
use thiserror::Error;

/// Errors that abort a template build. The builder never leaves a partial
/// graph behind: the first error discards everything built so far.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// A symbolic reference names a resource absent from the graph
    #[error("unresolved reference to '{name}'")]
    UnresolvedReference { name: String },

    /// A resource spec is malformed (missing sub-block, bad property value)
    #[error("invalid configuration: {message}")]
    Configuration { message: String },

    /// The provisioner collaborator refused an instance group's kind
    #[error("cannot provision instance group '{group}'")]
    Provisioning {
        group: String,
        #[source]
        source: ProvisionError,
    },
}

impl TemplateError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        TemplateError::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn unresolved(name: impl Into<String>) -> Self {
        TemplateError::UnresolvedReference { name: name.into() }
    }

    /// Check if this is an unresolved-reference error
    pub fn is_unresolved_reference(&self) -> bool {
        matches!(self, TemplateError::UnresolvedReference { .. })
    }

    /// Check if this is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, TemplateError::Configuration { .. })
    }
}
