//! Farm-to-template graph construction
//!
//! `FarmBuilder` consumes a normalized farm and produces the directed graph
//! of template nodes, one pass per resource family: security groups first,
//! then load balancers, then the launch-configuration/scaling-group pair for
//! each instance group. Every pass is pure given its inputs; the first error
//! aborts the whole build and no partial graph escapes.

mod instance_group;
mod load_balancer;
mod security_group;

use std::collections::{BTreeMap, BTreeSet};

use farmstack_model::{Farm, Provisioner};
use tracing::info;

use crate::error::TemplateError;
use crate::node::{TemplateGraph, Value};
use crate::refs::{self, ResolvedSource};

/// How security-group references are addressed for this deployment.
///
/// VPC deployments reference groups by id, classic deployments by name.
/// The choice is made once from the deployment's VPC id and threaded through
/// the whole security-group pass, never per rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AddressingMode {
    Vpc,
    Classic,
}

/// Deployment-scoped build inputs.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub stack_name: String,
    /// VPC the farm deploys into; `None` means classic networking
    pub vpc_id: Option<String>,
    /// Scaling-group termination policies, from the selected update strategy
    pub termination_policies: Vec<String>,
}

impl BuildOptions {
    pub fn new(stack_name: impl Into<String>) -> Self {
        Self {
            stack_name: stack_name.into(),
            vpc_id: None,
            termination_policies: vec!["Default".to_string()],
        }
    }

    pub fn with_vpc(mut self, vpc_id: impl Into<String>) -> Self {
        self.vpc_id = Some(vpc_id.into());
        self
    }

    pub fn with_termination_policies<I, S>(mut self, policies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.termination_policies = policies.into_iter().map(Into::into).collect();
        self
    }
}

/// Builds the template graph for one farm.
pub struct FarmBuilder<'a> {
    options: BuildOptions,
    provisioner: &'a dyn Provisioner,
}

impl<'a> FarmBuilder<'a> {
    pub fn new(options: BuildOptions, provisioner: &'a dyn Provisioner) -> Self {
        Self {
            options,
            provisioner,
        }
    }

    pub(crate) fn addressing_mode(&self) -> AddressingMode {
        if self.options.vpc_id.is_some() {
            AddressingMode::Vpc
        } else {
            AddressingMode::Classic
        }
    }

    pub(crate) fn stack_name(&self) -> &str {
        &self.options.stack_name
    }

    /// Build the complete graph for a farm, atomically.
    pub fn build(&self, farm: &Farm) -> Result<TemplateGraph, TemplateError> {
        let mut graph = TemplateGraph::new(format!("{} farm", self.options.stack_name));

        let groups = self.build_security_groups(&mut graph, &farm.security_groups)?;
        let balancers = self.build_load_balancers(&mut graph, &farm.load_balancers, &groups)?;
        self.build_instance_groups(&mut graph, &farm.instance_groups, &groups, &balancers)?;

        graph.verify_references()?;
        info!(
            stack = %self.options.stack_name,
            resources = graph.len(),
            "Built farm template"
        );
        Ok(graph)
    }

    /// Resolve security-group membership tokens for launch configurations
    /// and load balancers: the `=` form becomes an in-template reference,
    /// everything else passes through as a literal name or id.
    fn membership_refs(
        &self,
        tokens: &[String],
        known_groups: &BTreeMap<String, String>,
    ) -> Result<Vec<Value>, TemplateError> {
        let known_names: BTreeSet<String> = known_groups.keys().cloned().collect();
        tokens
            .iter()
            .map(|token| match refs::resolve(token, &known_names)? {
                ResolvedSource::Local(name) => {
                    let id = known_groups
                        .get(&name)
                        .ok_or_else(|| TemplateError::unresolved(&name))?;
                    Ok(Value::reference(id.clone()))
                }
                // Launch configurations and balancers address external
                // groups by bare name or id only
                ResolvedSource::External { .. } | ResolvedSource::Literal(_) => {
                    Ok(Value::from(token))
                }
            })
            .collect()
    }
}

/// Derive a globally-unique logical id by prefixing a fixed marker onto the
/// spec name, keeping only the characters the service accepts.
pub(crate) fn logical_id(marker: &str, name: &str) -> String {
    let mut id = String::with_capacity(marker.len() + name.len());
    id.push_str(marker);
    id.extend(name.chars().filter(char::is_ascii_alphanumeric));
    id
}
