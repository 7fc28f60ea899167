//! Security-group pass

use std::collections::{BTreeMap, BTreeSet};

use farmstack_model::{IngressRule, RuleSource, SecurityGroupSpec};
use tracing::debug;

use super::{logical_id, AddressingMode, FarmBuilder};
use crate::error::TemplateError;
use crate::node::{TemplateGraph, TemplateNode, Value};
use crate::refs::{self, ResolvedSource};

impl FarmBuilder<'_> {
    /// Build one `SecurityGroup` node per spec.
    ///
    /// Rule sources referencing other farm groups resolve against the groups
    /// already built in this pass, so specs can only point backwards in
    /// their declared order. Returns the spec-name to logical-id map for the
    /// later passes.
    pub fn build_security_groups(
        &self,
        graph: &mut TemplateGraph,
        specs: &[SecurityGroupSpec],
    ) -> Result<BTreeMap<String, String>, TemplateError> {
        let mut built = BTreeMap::new();
        let mut known = BTreeSet::new();

        for spec in specs {
            let ingress: Vec<Value> = spec
                .rules
                .iter()
                .map(|rule| self.ingress_entry(rule, &known))
                .collect::<Result<_, _>>()?;

            let id = logical_id("SG", &spec.name);
            let mut node = TemplateNode::new("AWS::EC2::SecurityGroup")
                .with(
                    "GroupDescription",
                    format!("{} security group for {}", spec.name, self.stack_name()),
                )
                .with("SecurityGroupIngress", Value::List(ingress));
            if let Some(vpc_id) = &self.options.vpc_id {
                node = node.with("VpcId", vpc_id);
            }

            debug!(group = %spec.name, id = %id, rules = spec.rules.len(), "Built security group");
            graph.insert(id.clone(), node);
            known.insert(spec.name.clone());
            built.insert(spec.name.clone(), id);
        }

        Ok(built)
    }

    /// Render one ingress rule. A bare port expands to an equal from/to
    /// pair; group sources resolve per the deployment's addressing mode.
    fn ingress_entry(
        &self,
        rule: &IngressRule,
        known: &BTreeSet<String>,
    ) -> Result<Value, TemplateError> {
        let (from_port, to_port) = rule.ports.bounds();
        let mut entry = BTreeMap::new();
        entry.insert("IpProtocol".to_string(), Value::from(&rule.protocol));
        entry.insert("FromPort".to_string(), Value::from(from_port));
        entry.insert("ToPort".to_string(), Value::from(to_port));

        match &rule.source {
            RuleSource::Cidr(cidr) => {
                entry.insert("CidrIp".to_string(), Value::from(cidr));
            }
            RuleSource::Group(token) => {
                let mode = self.addressing_mode();
                match (refs::resolve(token, known)?, mode) {
                    (ResolvedSource::Local(name), AddressingMode::Vpc) => {
                        entry.insert(
                            "SourceSecurityGroupId".to_string(),
                            Value::reference(logical_id("SG", &name)),
                        );
                    }
                    (ResolvedSource::Local(name), AddressingMode::Classic) => {
                        entry.insert(
                            "SourceSecurityGroupName".to_string(),
                            Value::reference(logical_id("SG", &name)),
                        );
                    }
                    (ResolvedSource::External { owner, group }, AddressingMode::Classic) => {
                        entry.insert("SourceSecurityGroupName".to_string(), Value::Str(group));
                        entry.insert("SourceSecurityGroupOwnerId".to_string(), Value::Str(owner));
                    }
                    (ResolvedSource::External { .. }, AddressingMode::Vpc) => {
                        return Err(TemplateError::config(format!(
                            "cross-account group '{token}' cannot be referenced by name inside a VPC"
                        )));
                    }
                    (ResolvedSource::Literal(name), AddressingMode::Vpc) => {
                        entry.insert("SourceSecurityGroupId".to_string(), Value::Str(name));
                    }
                    (ResolvedSource::Literal(name), AddressingMode::Classic) => {
                        entry.insert("SourceSecurityGroupName".to_string(), Value::Str(name));
                    }
                }
            }
        }

        Ok(Value::Map(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::BuildOptions;
    use crate::testing::NoopProvisioner;
    use farmstack_model::PortSpec;

    fn spec(name: &str, rules: Vec<IngressRule>) -> SecurityGroupSpec {
        SecurityGroupSpec {
            name: name.to_string(),
            rules,
        }
    }

    fn cidr_rule(port: u16, cidr: &str) -> IngressRule {
        IngressRule {
            protocol: "tcp".to_string(),
            ports: PortSpec::One(port),
            source: RuleSource::Cidr(cidr.to_string()),
        }
    }

    fn group_rule(token: &str) -> IngressRule {
        IngressRule {
            protocol: "tcp".to_string(),
            ports: PortSpec::Range { from: 9000, to: 9100 },
            source: RuleSource::Group(token.to_string()),
        }
    }

    fn build(specs: &[SecurityGroupSpec], vpc: bool) -> Result<TemplateGraph, TemplateError> {
        let provisioner = NoopProvisioner;
        let options = if vpc {
            BuildOptions::new("teststack").with_vpc("vpc-abc123")
        } else {
            BuildOptions::new("teststack")
        };
        let builder = FarmBuilder::new(options, &provisioner);
        let mut graph = TemplateGraph::new("test");
        builder.build_security_groups(&mut graph, specs)?;
        Ok(graph)
    }

    fn first_ingress(graph: &TemplateGraph, id: &str) -> BTreeMap<String, Value> {
        match graph.get(id).unwrap().property("SecurityGroupIngress") {
            Some(Value::List(items)) => match &items[0] {
                Value::Map(entry) => entry.clone(),
                other => panic!("expected map entry, got {other:?}"),
            },
            other => panic!("expected ingress list, got {other:?}"),
        }
    }

    #[test]
    fn bare_port_expands_to_equal_bounds() {
        let graph = build(&[spec("web", vec![cidr_rule(80, "10.1.2.0/24")])], false).unwrap();
        let entry = first_ingress(&graph, "SGweb");
        assert_eq!(entry["FromPort"], Value::Int(80));
        assert_eq!(entry["ToPort"], Value::Int(80));
        assert_eq!(entry["CidrIp"], Value::Str("10.1.2.0/24".to_string()));
        assert_eq!(entry["IpProtocol"], Value::Str("tcp".to_string()));
    }

    #[test]
    fn port_range_keeps_both_bounds() {
        let graph = build(&[spec("db", vec![group_rule("other")])], false).unwrap();
        let entry = first_ingress(&graph, "SGdb");
        assert_eq!(entry["FromPort"], Value::Int(9000));
        assert_eq!(entry["ToPort"], Value::Int(9100));
    }

    #[test]
    fn local_reference_renders_by_name_in_classic_mode() {
        let specs = [spec("web", vec![]), spec("app", vec![group_rule("=web")])];
        let graph = build(&specs, false).unwrap();
        let entry = first_ingress(&graph, "SGapp");
        assert_eq!(
            entry["SourceSecurityGroupName"],
            Value::reference("SGweb")
        );
        assert!(!entry.contains_key("SourceSecurityGroupId"));
    }

    #[test]
    fn local_reference_renders_by_id_in_vpc_mode() {
        let specs = [spec("web", vec![]), spec("app", vec![group_rule("=web")])];
        let graph = build(&specs, true).unwrap();
        let entry = first_ingress(&graph, "SGapp");
        assert_eq!(entry["SourceSecurityGroupId"], Value::reference("SGweb"));
        assert!(!entry.contains_key("SourceSecurityGroupName"));
    }

    #[test]
    fn vpc_mode_sets_vpc_id_on_the_group() {
        let graph = build(&[spec("web", vec![])], true).unwrap();
        assert_eq!(
            graph.get("SGweb").unwrap().property("VpcId"),
            Some(&Value::Str("vpc-abc123".to_string()))
        );
    }

    #[test]
    fn external_owner_rule_in_classic_mode() {
        let graph = build(&[spec("app", vec![group_rule("acct123/bar")])], false).unwrap();
        let entry = first_ingress(&graph, "SGapp");
        assert_eq!(
            entry["SourceSecurityGroupName"],
            Value::Str("bar".to_string())
        );
        assert_eq!(
            entry["SourceSecurityGroupOwnerId"],
            Value::Str("acct123".to_string())
        );
    }

    #[test]
    fn external_owner_rule_rejected_in_vpc_mode() {
        let err = build(&[spec("app", vec![group_rule("acct123/bar")])], true).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn literal_rule_renders_per_mode() {
        let classic = build(&[spec("app", vec![group_rule("corp-bastion")])], false).unwrap();
        assert_eq!(
            first_ingress(&classic, "SGapp")["SourceSecurityGroupName"],
            Value::Str("corp-bastion".to_string())
        );

        let vpc = build(&[spec("app", vec![group_rule("sg-0123456789")])], true).unwrap();
        assert_eq!(
            first_ingress(&vpc, "SGapp")["SourceSecurityGroupId"],
            Value::Str("sg-0123456789".to_string())
        );
    }

    #[test]
    fn forward_reference_is_unresolved() {
        // "app" references "web", but "web" is declared after it
        let specs = [spec("app", vec![group_rule("=web")]), spec("web", vec![])];
        let err = build(&specs, false).unwrap_err();
        assert!(err.is_unresolved_reference());
    }

    #[test]
    fn build_is_atomic_on_failure() {
        let provisioner = NoopProvisioner;
        let builder = FarmBuilder::new(BuildOptions::new("teststack"), &provisioner);
        let farm = farmstack_model::Farm {
            security_groups: vec![spec("app", vec![group_rule("=missing")])],
            ..Default::default()
        };
        assert!(builder.build(&farm).is_err());
    }
}
