//! Update strategies
//!
//! A strategy is a small stateless policy value answering four questions
//! about a pending deployment: may the live stack be updated in place,
//! must a human confirm first, which template paths could change without
//! confirmation, and which instances go first when the group scales in.

use std::sync::LazyLock;

use regex::Regex;

/// Template paths the prompted strategy considers cosmetic: the bootstrap
/// payload of a launch configuration. Precompiled once; the orchestrator
/// currently prompts regardless and treats this as informational metadata
/// for stricter future variants.
static BOOTSTRAP_PAYLOAD_PATHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^Resources\.LC[A-Za-z0-9]*\.Properties\.UserData$")
        .expect("bootstrap payload path pattern is valid")
});

/// How a deployment treats an existing stack whose template differs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UpdateStrategy {
    /// Never mutate a live stack; a differing template becomes a new stack
    #[default]
    BlueGreen,
    /// Update the live stack without asking
    InPlace,
    /// Update the live stack after a human confirms the diff
    PromptedInPlace,
}

impl UpdateStrategy {
    /// Select a strategy by name, defaulting to blue-green for unknown or
    /// absent names.
    pub fn from_name(name: &str) -> Self {
        match name {
            "in-place" => UpdateStrategy::InPlace,
            "prompted" | "prompted-in-place" => UpdateStrategy::PromptedInPlace,
            _ => UpdateStrategy::BlueGreen,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            UpdateStrategy::BlueGreen => "blue-green",
            UpdateStrategy::InPlace => "in-place",
            UpdateStrategy::PromptedInPlace => "prompted-in-place",
        }
    }

    /// May a differing live stack be updated in place at all?
    pub fn should_update(self) -> bool {
        match self {
            UpdateStrategy::BlueGreen => false,
            UpdateStrategy::InPlace | UpdateStrategy::PromptedInPlace => true,
        }
    }

    /// Must a human confirm the diff before the update call?
    pub fn should_prompt(self) -> bool {
        matches!(self, UpdateStrategy::PromptedInPlace)
    }

    /// Scaling-group termination policies for farms deployed under this
    /// strategy.
    pub fn termination_policies(self) -> &'static [&'static str] {
        match self {
            UpdateStrategy::BlueGreen | UpdateStrategy::InPlace => &["Default"],
            UpdateStrategy::PromptedInPlace => &["OldestInstance", "Default"],
        }
    }

    /// Template paths that may change without confirmation, when defined
    /// for the strategy.
    pub fn allowed_update_paths(self) -> Option<&'static Regex> {
        match self {
            UpdateStrategy::PromptedInPlace => Some(&BOOTSTRAP_PAYLOAD_PATHS),
            _ => None,
        }
    }
}
