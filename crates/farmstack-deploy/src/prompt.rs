//! Human confirmation for in-place updates
//!
//! When the selected strategy prompts, the orchestrator renders the template
//! diff and asks for an affirmative answer before touching the live stack.
//! The terminal read is blocking; there is nothing else to do until a human
//! decides.

use anyhow::{Context, Result};
use dialoguer::Confirm;

/// Asks a human whether a rendered diff should be applied.
#[cfg_attr(test, mockall::automock)]
pub trait Confirmer: Send + Sync {
    /// Present the rendered diff and return the operator's answer.
    fn confirm(&self, rendered_diff: &str) -> Result<bool>;
}

/// Terminal-backed confirmer, defaulting to "no".
pub struct ConsoleConfirmer;

impl Confirmer for ConsoleConfirmer {
    fn confirm(&self, rendered_diff: &str) -> Result<bool> {
        println!("{rendered_diff}");
        Confirm::new()
            .with_prompt("Apply these changes to the running stack?")
            .default(false)
            .interact()
            .context("Failed to read confirmation")
    }
}
