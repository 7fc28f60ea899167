//! Template-body diffing
//!
//! The diff answers one question: which template paths changed between the
//! live body and the proposed body. It decides whether an update is a no-op
//! and whether to prompt; it is never used to compute a partial update.

use std::collections::BTreeSet;

use similar::TextDiff;

use crate::error::DeployError;

/// The ordered list of changed template paths between two bodies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffResult {
    changed: Vec<String>,
}

impl DiffResult {
    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    /// Dot-separated paths of every added, removed, or changed entry.
    pub fn paths(&self) -> &[String] {
        &self.changed
    }
}

/// Compute the changed paths between two template bodies.
pub fn diff(deployed: &str, proposed: &str) -> Result<DiffResult, DeployError> {
    let old = parse(deployed, "deployed")?;
    let new = parse(proposed, "proposed")?;

    let mut changed = Vec::new();
    walk("", &old, &new, &mut changed);
    Ok(DiffResult { changed })
}

/// Render a human-facing unified diff of the two bodies.
///
/// Both sides are re-rendered as sorted pretty JSON first so the diff shows
/// semantic changes rather than formatting noise.
pub fn render(deployed: &str, proposed: &str) -> String {
    let old = pretty(deployed);
    let new = pretty(proposed);
    TextDiff::from_lines(&old, &new)
        .unified_diff()
        .context_radius(3)
        .header("deployed", "proposed")
        .to_string()
}

fn parse(body: &str, label: &str) -> Result<serde_json::Value, DeployError> {
    serde_json::from_str(body).map_err(|error| DeployError::Template {
        message: format!("{label} body is not valid JSON: {error}"),
    })
}

fn pretty(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => {
            let mut rendered =
                serde_json::to_string_pretty(&value).unwrap_or_else(|_| body.to_string());
            rendered.push('\n');
            rendered
        }
        Err(_) => body.to_string(),
    }
}

/// Walk two JSON values in key order, recording the path of every
/// difference. Objects recurse; arrays and scalars are leaves.
fn walk(path: &str, old: &serde_json::Value, new: &serde_json::Value, out: &mut Vec<String>) {
    use serde_json::Value;

    match (old, new) {
        (Value::Object(old_map), Value::Object(new_map)) => {
            let keys: BTreeSet<&String> = old_map.keys().chain(new_map.keys()).collect();
            for key in keys {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                match (old_map.get(key), new_map.get(key)) {
                    (Some(old_value), Some(new_value)) => walk(&child, old_value, new_value, out),
                    // Present on only one side
                    _ => out.push(child),
                }
            }
        }
        _ if old != new => {
            out.push(if path.is_empty() { "$".to_string() } else { path.to_string() });
        }
        _ => {}
    }
}
