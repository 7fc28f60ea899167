//! farmstack-template - Resource graph builder and template serializer
//!
//! This crate turns a normalized [`Farm`](farmstack_model::Farm) into a
//! fully cross-referenced CloudFormation template: security groups, load
//! balancers, and one launch-configuration/scaling-group pair per instance
//! group, with all symbolic references resolved to in-template `Ref`s or
//! external identifiers. Serialization is deterministic so template bodies
//! can be diffed meaningfully.
//!
//! ## Modules
//!
//! - [`build`]: the per-resource-family graph builder
//! - [`node`]: template nodes, property values, and the serializer
//! - [`refs`]: the three-syntax security-group reference resolver

pub mod build;
mod error;
pub mod node;
pub mod refs;

#[cfg(test)]
pub mod testing;

pub use build::{BuildOptions, FarmBuilder};
pub use error::TemplateError;
pub use node::{TemplateGraph, TemplateNode, Value};
pub use refs::ResolvedSource;
