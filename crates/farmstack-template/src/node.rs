//! Template nodes, property values, and the deterministic serializer
//!
//! The output template is a tree of named, typed resource nodes whose
//! property values may be literals, lists, nested objects, or references to
//! other nodes. All maps are `BTreeMap`s so a fixed graph always serializes
//! byte-identically; indentation is a presentation choice with no semantic
//! effect.

use std::collections::{BTreeMap, BTreeSet};

use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::error::TemplateError;
use farmstack_model::defaults::TEMPLATE_FORMAT_VERSION;

/// A template property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// Reference to another node in the same graph, `{"Ref": name}`
    Ref(String),
    /// Attribute of another node, `{"Fn::GetAtt": [name, attr]}`
    GetAtt(String, String),
    /// The region's availability zones, `{"Fn::GetAZs": ""}`
    GetAzs,
}

impl Value {
    /// Reference to a node by logical id.
    pub fn reference(name: impl Into<String>) -> Self {
        Value::Ref(name.into())
    }

    /// Attribute lookup on a node by logical id.
    pub fn get_att(name: impl Into<String>, attr: impl Into<String>) -> Self {
        Value::GetAtt(name.into(), attr.into())
    }

    /// Collect the logical ids this value points at, recursively.
    fn collect_refs<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        match self {
            Value::Ref(name) | Value::GetAtt(name, _) => {
                out.insert(name);
            }
            Value::List(items) => {
                for item in items {
                    item.collect_refs(out);
                }
            }
            Value::Map(map) => {
                for value in map.values() {
                    value.collect_refs(out);
                }
            }
            Value::Str(_) | Value::Int(_) | Value::Bool(_) | Value::GetAzs => {}
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::Str(s.clone())
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<u16> for Value {
    fn from(n: u16) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<u32> for Value {
    fn from(n: u32) -> Self {
        Value::Int(i64::from(n))
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Str(s) => serializer.serialize_str(s),
            Value::Int(n) => serializer.serialize_i64(*n),
            Value::Bool(b) => serializer.serialize_bool(*b),
            Value::List(items) => items.serialize(serializer),
            Value::Map(map) => map.serialize(serializer),
            Value::Ref(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Value::GetAtt(name, attr) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[name, attr])?;
                map.end()
            }
            Value::GetAzs => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAZs", "")?;
                map.end()
            }
        }
    }
}

/// A named, typed entity in the template graph.
#[derive(Debug, Clone, PartialEq)]
pub struct TemplateNode {
    kind: &'static str,
    properties: BTreeMap<String, Value>,
    depends_on: Option<String>,
}

impl TemplateNode {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            properties: BTreeMap::new(),
            depends_on: None,
        }
    }

    /// Set a property, builder-style.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// Sequence this node after another node by logical id.
    pub fn after(mut self, logical_id: impl Into<String>) -> Self {
        self.depends_on = Some(logical_id.into());
        self
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    fn collect_refs<'a>(&'a self, out: &mut BTreeSet<&'a str>) {
        for value in self.properties.values() {
            value.collect_refs(out);
        }
        if let Some(dep) = &self.depends_on {
            out.insert(dep);
        }
    }
}

impl Serialize for TemplateNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        if let Some(dep) = &self.depends_on {
            map.serialize_entry("DependsOn", dep)?;
        }
        if !self.properties.is_empty() {
            map.serialize_entry("Properties", &self.properties)?;
        }
        map.serialize_entry("Type", self.kind)?;
        map.end()
    }
}

/// The finished resource graph: every node keyed by logical id, plus the
/// output bindings exposed to calling layers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateGraph {
    description: Option<String>,
    resources: BTreeMap<String, TemplateNode>,
    outputs: BTreeMap<String, Value>,
}

impl TemplateGraph {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: Some(description.into()),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub(crate) fn insert(&mut self, logical_id: String, node: TemplateNode) {
        self.resources.insert(logical_id, node);
    }

    pub(crate) fn add_output(&mut self, key: String, value: Value) {
        self.outputs.insert(key, value);
    }

    pub fn get(&self, logical_id: &str) -> Option<&TemplateNode> {
        self.resources.get(logical_id)
    }

    pub fn resource_names(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn outputs(&self) -> &BTreeMap<String, Value> {
        &self.outputs
    }

    /// Verify that every reference points at a node present in this graph.
    ///
    /// Runs at the end of the build, never at serialization time: a graph
    /// that serializes is already known to be internally consistent.
    pub(crate) fn verify_references(&self) -> Result<(), TemplateError> {
        let mut referenced = BTreeSet::new();
        for node in self.resources.values() {
            node.collect_refs(&mut referenced);
        }
        for value in self.outputs.values() {
            value.collect_refs(&mut referenced);
        }
        for name in referenced {
            if !self.resources.contains_key(name) {
                return Err(TemplateError::unresolved(name));
            }
        }
        Ok(())
    }

    /// Render the canonical template body with indentation.
    pub fn serialize(&self) -> String {
        serde_json::to_string_pretty(self).expect("template graph serialization cannot fail")
    }

    /// Render the canonical template body without whitespace.
    pub fn serialize_compact(&self) -> String {
        serde_json::to_string(self).expect("template graph serialization cannot fail")
    }
}

/// Wraps an output value in the `{"Value": ...}` shape the service expects.
struct OutputBinding<'a>(&'a Value);

impl Serialize for OutputBinding<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry("Value", self.0)?;
        map.end()
    }
}

impl Serialize for TemplateGraph {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("AWSTemplateFormatVersion", TEMPLATE_FORMAT_VERSION)?;
        if let Some(description) = &self.description {
            map.serialize_entry("Description", description)?;
        }
        if !self.outputs.is_empty() {
            let bindings: BTreeMap<&str, OutputBinding<'_>> = self
                .outputs
                .iter()
                .map(|(key, value)| (key.as_str(), OutputBinding(value)))
                .collect();
            map.serialize_entry("Outputs", &bindings)?;
        }
        map.serialize_entry("Resources", &self.resources)?;
        map.end()
    }
}
