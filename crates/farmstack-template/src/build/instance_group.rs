//! Instance-group pass: one launch-configuration/scaling-group pair each

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use farmstack_model::defaults::WAIT_CONDITION_TIMEOUT_SECS;
use farmstack_model::InstanceGroup;
use tracing::debug;

use super::{logical_id, FarmBuilder};
use crate::error::TemplateError;
use crate::node::{TemplateGraph, TemplateNode, Value};

impl FarmBuilder<'_> {
    /// Build the launch configuration and scaling group for each instance
    /// group, consulting the provisioner for the bootstrap payload and the
    /// template capabilities of each group's provisioner kind.
    pub fn build_instance_groups(
        &self,
        graph: &mut TemplateGraph,
        groups: &[InstanceGroup],
        known_groups: &BTreeMap<String, String>,
        known_balancers: &BTreeMap<String, String>,
    ) -> Result<(), TemplateError> {
        for group in groups {
            self.build_instance_group(graph, group, known_groups, known_balancers)?;
        }
        Ok(())
    }

    fn build_instance_group(
        &self,
        graph: &mut TemplateGraph,
        group: &InstanceGroup,
        known_groups: &BTreeMap<String, String>,
        known_balancers: &BTreeMap<String, String>,
    ) -> Result<(), TemplateError> {
        let capabilities = self.provisioner.capabilities(&group.provisioner.kind);
        let payload = self
            .provisioner
            .produce_bootstrap_payload(&group.provisioner.kind, &group.provisioner.args)
            .map_err(|source| TemplateError::Provisioning {
                group: group.name.clone(),
                source,
            })?;

        let lc_id = logical_id("LC", &group.name);
        let asg_id = logical_id("ASG", &group.name);

        let mut security_groups = self.membership_refs(&group.security_groups, known_groups)?;

        let balancer_id = match &group.load_balancer {
            Some(name) => {
                let id = known_balancers
                    .get(name)
                    .ok_or_else(|| TemplateError::unresolved(name))?;
                // Instances must admit balancer traffic, so the balancer's
                // own group membership carries over to the launch config
                if let Some(Value::List(members)) =
                    graph.get(id).and_then(|node| node.property("SecurityGroups"))
                {
                    security_groups.extend(members.iter().cloned());
                }
                Some(id.clone())
            }
            None => None,
        };

        // The payload is opaque: embed it verbatim, never inspect it
        let mut launch_config = TemplateNode::new("AWS::AutoScaling::LaunchConfiguration")
            .with("ImageId", &group.image_id)
            .with("InstanceType", &group.instance_type)
            .with("InstanceMonitoring", group.monitoring)
            .with("UserData", STANDARD.encode(&payload));
        if let Some(key) = &group.ssh_key {
            launch_config = launch_config.with("KeyName", key);
        }
        if !security_groups.is_empty() {
            launch_config = launch_config.with("SecurityGroups", Value::List(security_groups));
        }
        match &group.iam_profile {
            Some(profile) => {
                launch_config = launch_config.with("IamInstanceProfile", profile);
            }
            None if capabilities.wants_instance_profile => {
                return Err(TemplateError::config(format!(
                    "provisioner kind '{}' requires an IAM profile, but instance group '{}' has none",
                    group.provisioner.kind, group.name
                )));
            }
            None => {}
        }

        let (min, max) = capacity_bounds(group)?;
        let identity = format!("{}::{}", self.stack_name(), group.name);
        let mut scaling_group = TemplateNode::new("AWS::AutoScaling::AutoScalingGroup")
            .with("LaunchConfigurationName", Value::reference(&lc_id))
            .with("MinSize", min)
            .with("MaxSize", max)
            .with("DesiredCapacity", group.count)
            .with("AvailabilityZones", Value::GetAzs)
            .with("Tags", Value::List(vec![name_tag(&identity)]))
            .with(
                "TerminationPolicies",
                Value::List(
                    self.options
                        .termination_policies
                        .iter()
                        .map(Value::from)
                        .collect(),
                ),
            );
        if let Some(id) = balancer_id {
            scaling_group = scaling_group
                .with("LoadBalancerNames", Value::List(vec![Value::reference(id)]));
        }

        debug!(
            group = %group.name,
            desired = group.count,
            min,
            max,
            "Built instance group"
        );
        graph.insert(lc_id, launch_config);
        graph.insert(asg_id.clone(), scaling_group);

        if capabilities.wants_wait_condition {
            self.build_wait_condition(graph, group, &asg_id);
        }
        Ok(())
    }

    /// Block stack completion on bootstrap signals from every instance in
    /// the group.
    fn build_wait_condition(&self, graph: &mut TemplateGraph, group: &InstanceGroup, asg_id: &str) {
        let handle_id = logical_id("WCH", &group.name);
        let condition_id = logical_id("WC", &group.name);

        graph.insert(
            handle_id.clone(),
            TemplateNode::new("AWS::CloudFormation::WaitConditionHandle"),
        );
        graph.insert(
            condition_id,
            TemplateNode::new("AWS::CloudFormation::WaitCondition")
                .after(asg_id)
                .with("Handle", Value::reference(handle_id))
                .with("Count", group.count)
                .with("Timeout", WAIT_CONDITION_TIMEOUT_SECS.to_string()),
        );
    }
}

/// Resolve the scaling bounds: unset bounds default to the desired count,
/// and the desired count must sit inside the declared bounds.
fn capacity_bounds(group: &InstanceGroup) -> Result<(u32, u32), TemplateError> {
    let min = group.min_count.unwrap_or(group.count);
    let max = group.max_count.unwrap_or(group.count);
    if min > max {
        return Err(TemplateError::config(format!(
            "instance group '{}' has min_count {min} above max_count {max}",
            group.name
        )));
    }
    if group.count < min || group.count > max {
        return Err(TemplateError::config(format!(
            "instance group '{}' has count {} outside [{min}, {max}]",
            group.name, group.count
        )));
    }
    Ok((min, max))
}

/// The scaling group's identity tag, propagated to instances at launch.
fn name_tag(identity: &str) -> Value {
    let mut tag = BTreeMap::new();
    tag.insert("Key".to_string(), Value::from("Name"));
    tag.insert("Value".to_string(), Value::from(identity));
    tag.insert("PropagateAtLaunch".to_string(), Value::Bool(true));
    Value::Map(tag)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildOptions;
    use crate::testing::{
        instance_group, web_load_balancer, FailingProvisioner, NoopProvisioner, StaticProvisioner,
    };
    use farmstack_model::{Capabilities, Farm, Provisioner};

    fn build_with(provisioner: &dyn Provisioner, farm: &Farm) -> Result<TemplateGraph, TemplateError> {
        FarmBuilder::new(BuildOptions::new("teststack"), provisioner).build(farm)
    }

    fn farm_with_group(group: InstanceGroup) -> Farm {
        Farm {
            instance_groups: vec![group],
            ..Default::default()
        }
    }

    #[test]
    fn capacity_defaults_to_count() {
        let provisioner = NoopProvisioner;
        let graph = build_with(&provisioner, &farm_with_group(instance_group("app", 6))).unwrap();
        let asg = graph.get("ASGapp").unwrap();
        assert_eq!(asg.property("MinSize"), Some(&Value::Int(6)));
        assert_eq!(asg.property("MaxSize"), Some(&Value::Int(6)));
        assert_eq!(asg.property("DesiredCapacity"), Some(&Value::Int(6)));
    }

    #[test]
    fn explicit_bounds_map_straight_through() {
        let mut group = instance_group("app", 4);
        group.min_count = Some(2);
        group.max_count = Some(8);
        let provisioner = NoopProvisioner;
        let graph = build_with(&provisioner, &farm_with_group(group)).unwrap();
        let asg = graph.get("ASGapp").unwrap();
        assert_eq!(asg.property("MinSize"), Some(&Value::Int(2)));
        assert_eq!(asg.property("MaxSize"), Some(&Value::Int(8)));
        assert_eq!(asg.property("DesiredCapacity"), Some(&Value::Int(4)));
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut group = instance_group("app", 4);
        group.min_count = Some(8);
        group.max_count = Some(2);
        let provisioner = NoopProvisioner;
        let err = build_with(&provisioner, &farm_with_group(group)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn count_outside_bounds_is_rejected() {
        let mut group = instance_group("app", 9);
        group.min_count = Some(1);
        group.max_count = Some(3);
        let provisioner = NoopProvisioner;
        let err = build_with(&provisioner, &farm_with_group(group)).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn end_to_end_minimal_group() {
        // One bare instance group and an empty payload: exactly the
        // launch-config/scaling-group pair, nothing else
        let provisioner = NoopProvisioner;
        let graph = build_with(&provisioner, &farm_with_group(instance_group("app", 6))).unwrap();

        let names: Vec<&str> = graph.resource_names().collect();
        assert_eq!(names, vec!["ASGapp", "LCapp"]);

        let body = graph.serialize();
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        let asg = &parsed["Resources"]["ASGapp"]["Properties"];
        assert_eq!(asg["MinSize"], 6);
        assert_eq!(asg["MaxSize"], 6);
        assert_eq!(asg["DesiredCapacity"], 6);
        assert_eq!(
            parsed["Resources"]["LCapp"]["Properties"]["UserData"],
            ""
        );
    }

    #[test]
    fn bootstrap_payload_is_embedded_base64() {
        let provisioner = StaticProvisioner {
            payload: b"#!/bin/bash\necho hello\n".to_vec(),
            capabilities: Capabilities::default(),
        };
        let graph = build_with(&provisioner, &farm_with_group(instance_group("app", 1))).unwrap();
        match graph.get("LCapp").unwrap().property("UserData") {
            Some(Value::Str(encoded)) => {
                let decoded = STANDARD.decode(encoded).unwrap();
                assert_eq!(decoded, b"#!/bin/bash\necho hello\n");
            }
            other => panic!("expected encoded user data, got {other:?}"),
        }
    }

    #[test]
    fn provisioner_refusal_aborts_the_build() {
        let provisioner = FailingProvisioner;
        let err = build_with(&provisioner, &farm_with_group(instance_group("app", 1))).unwrap_err();
        match err {
            TemplateError::Provisioning { group, .. } => assert_eq!(group, "app"),
            other => panic!("expected provisioning error, got {other:?}"),
        }
    }

    #[test]
    fn instance_profile_capability_requires_a_profile() {
        let provisioner = StaticProvisioner {
            payload: Vec::new(),
            capabilities: Capabilities {
                wants_instance_profile: true,
                ..Default::default()
            },
        };
        let err = build_with(&provisioner, &farm_with_group(instance_group("app", 1))).unwrap_err();
        assert!(err.is_configuration());

        let mut group = instance_group("app", 1);
        group.iam_profile = Some("app-profile".to_string());
        let graph = build_with(&provisioner, &farm_with_group(group)).unwrap();
        assert_eq!(
            graph.get("LCapp").unwrap().property("IamInstanceProfile"),
            Some(&Value::Str("app-profile".to_string()))
        );
    }

    #[test]
    fn wait_condition_capability_emits_the_pair() {
        let provisioner = StaticProvisioner {
            payload: Vec::new(),
            capabilities: Capabilities {
                wants_wait_condition: true,
                ..Default::default()
            },
        };
        let graph = build_with(&provisioner, &farm_with_group(instance_group("app", 3))).unwrap();
        assert!(graph.get("WCHapp").is_some());
        let condition = graph.get("WCapp").unwrap();
        assert_eq!(condition.property("Count"), Some(&Value::Int(3)));
        assert_eq!(condition.property("Handle"), Some(&Value::reference("WCHapp")));
    }

    #[test]
    fn security_group_tokens_resolve_or_pass_through() {
        let mut group = instance_group("app", 1);
        group.security_groups = vec!["=web".to_string(), "corp-bastion".to_string()];
        let farm = Farm {
            security_groups: vec![farmstack_model::SecurityGroupSpec {
                name: "web".to_string(),
                rules: vec![],
            }],
            instance_groups: vec![group],
            ..Default::default()
        };
        let provisioner = NoopProvisioner;
        let graph = build_with(&provisioner, &farm).unwrap();
        assert_eq!(
            graph.get("LCapp").unwrap().property("SecurityGroups"),
            Some(&Value::List(vec![
                Value::reference("SGweb"),
                Value::Str("corp-bastion".to_string()),
            ]))
        );
    }

    #[test]
    fn unknown_local_security_group_fails() {
        let mut group = instance_group("app", 1);
        group.security_groups = vec!["=missing".to_string()];
        let provisioner = NoopProvisioner;
        let err = build_with(&provisioner, &farm_with_group(group)).unwrap_err();
        assert!(err.is_unresolved_reference());
    }

    #[test]
    fn load_balancer_attachment_propagates_membership() {
        let mut balancer = web_load_balancer("frontend");
        balancer.security_groups = vec!["elb-sg".to_string()];
        let mut group = instance_group("app", 2);
        group.load_balancer = Some("frontend".to_string());
        let farm = Farm {
            load_balancers: vec![balancer],
            instance_groups: vec![group],
            ..Default::default()
        };
        let provisioner = NoopProvisioner;
        let graph = build_with(&provisioner, &farm).unwrap();

        let asg = graph.get("ASGapp").unwrap();
        assert_eq!(
            asg.property("LoadBalancerNames"),
            Some(&Value::List(vec![Value::reference("ELBfrontend")]))
        );
        // The balancer's own membership carried over to the launch config
        assert_eq!(
            graph.get("LCapp").unwrap().property("SecurityGroups"),
            Some(&Value::List(vec![Value::Str("elb-sg".to_string())]))
        );
    }

    #[test]
    fn unknown_load_balancer_fails() {
        let mut group = instance_group("app", 1);
        group.load_balancer = Some("missing".to_string());
        let provisioner = NoopProvisioner;
        let err = build_with(&provisioner, &farm_with_group(group)).unwrap_err();
        assert!(err.is_unresolved_reference());
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn scaling_group_carries_identity_tag_and_policies() {
        let provisioner = NoopProvisioner;
        let builder = FarmBuilder::new(
            BuildOptions::new("prod").with_termination_policies(["OldestInstance", "Default"]),
            &provisioner,
        );
        let graph = builder
            .build(&farm_with_group(instance_group("app", 1)))
            .unwrap();
        let asg = graph.get("ASGapp").unwrap();

        assert_eq!(
            asg.property("Tags"),
            Some(&Value::List(vec![name_tag("prod::app")]))
        );
        assert_eq!(
            asg.property("TerminationPolicies"),
            Some(&Value::List(vec![
                Value::from("OldestInstance"),
                Value::from("Default"),
            ]))
        );
    }

    #[test]
    fn monitoring_and_ssh_key_flow_through() {
        let mut group = instance_group("app", 1);
        group.monitoring = true;
        group.ssh_key = Some("deploy-key".to_string());
        let provisioner = NoopProvisioner;
        let graph = build_with(&provisioner, &farm_with_group(group)).unwrap();
        let lc = graph.get("LCapp").unwrap();
        assert_eq!(lc.property("InstanceMonitoring"), Some(&Value::Bool(true)));
        assert_eq!(lc.property("KeyName"), Some(&Value::Str("deploy-key".to_string())));
    }
}
