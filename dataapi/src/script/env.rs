//! Variable environment for one script run.
//!
//! A single [`Environment`] is created per top-level evaluation and shared by
//! mutable reference with every nested evaluation, so assignments are visible
//! for the rest of the run.  Nothing is rolled back on error.

use std::collections::HashMap;

use super::value::Value;

/// Raw argument text of the call being dispatched.
pub const PARAMS_KEY: &str = "params";
/// Most recent scalar produced by an expression.
pub const VALUE_KEY: &str = "val";
/// Most recent raw outbound response.
pub const RESPONSE_KEY: &str = "res";

/// Name of the slot `ParallelPost` fills for request `index`.
pub fn parallel_slot(index: usize) -> String {
    format!("ParallelPost{index}")
}

/// Identifier → value mapping.
#[derive(Debug, Default, Clone)]
pub struct Environment {
    vars: HashMap<String, Value>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or overwrite) a variable.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Remove a variable, returning its value.
    pub fn take(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// The last stored response, if any.
    pub fn response(&self) -> Option<&Value> {
        self.vars.get(RESPONSE_KEY)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
