//! Gate rules configuration and validation.
//!
//! Rules describe leaf counters and the compound gates built from them. Gates
//! reference members by name; a member is either a counter or another gate,
//! which allows trees of any depth as long as no gate contains itself.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use tracing::info;

use super::bucket::TimeUnit;
use super::compound::GroupRule;
use super::counter::ResetRule;
use crate::error::{Result, UsageGateError};
use crate::store::Context;

/// A complete set of counter and gate definitions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    /// Context for counters that do not name one
    #[serde(default)]
    pub context: Context,
    /// Leaf counters by name
    #[serde(default)]
    pub counters: BTreeMap<String, CounterRule>,
    /// Compound gates by name
    #[serde(default)]
    pub gates: BTreeMap<String, GateRule>,
}

/// Definition of a time-bucketed counter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterRule {
    /// Calendar bucket size
    pub unit: TimeUnit,
    /// Uses allowed per bucket before the counter reports reached
    pub limit: u64,
    #[serde(default)]
    pub reset_rule: ResetRule,
    /// Overrides the rules-level context
    #[serde(default)]
    pub context: Option<Context>,
}

/// Definition of a compound gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateRule {
    #[serde(default)]
    pub rule: GroupRule,
    /// Counter or gate names, in evaluation order
    #[serde(default)]
    pub members: Vec<String>,
}

impl RulesConfig {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load rules from a YAML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading gate rules");

        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Load and validate rules from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let rules: RulesConfig = serde_yaml::from_str(yaml)
            .map_err(|e| UsageGateError::Config(format!("Failed to parse gate rules: {}", e)))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Context a counter's values are stored under.
    pub fn context_for<'a>(&'a self, rule: &'a CounterRule) -> &'a Context {
        rule.context.as_ref().unwrap_or(&self.context)
    }

    /// Check names, contexts, member references and gate cycles.
    pub fn validate(&self) -> Result<()> {
        let contexts = std::iter::once(&self.context)
            .chain(self.counters.values().filter_map(|rule| rule.context.as_ref()));
        for context in contexts {
            if !context.is_unambiguous() {
                return Err(UsageGateError::Config(format!(
                    "Invalid context '{}': names must be non-empty and must not contain '__'",
                    context
                )));
            }
        }

        for name in self.counters.keys().chain(self.gates.keys()) {
            if name.trim().is_empty() {
                return Err(UsageGateError::Config(
                    "Counter and gate names must not be empty".to_string(),
                ));
            }
        }

        if let Some(name) = self.counters.keys().find(|n| self.gates.contains_key(*n)) {
            return Err(UsageGateError::Config(format!(
                "'{}' is defined both as a counter and as a gate",
                name
            )));
        }

        for (gate, rule) in &self.gates {
            for member in &rule.members {
                if !self.counters.contains_key(member) && !self.gates.contains_key(member) {
                    return Err(UsageGateError::Config(format!(
                        "Gate '{}' references unknown member '{}'",
                        gate, member
                    )));
                }
            }
        }

        let mut done = HashSet::new();
        for gate in self.gates.keys() {
            self.check_cycle(gate, &mut Vec::new(), &mut done)?;
        }

        Ok(())
    }

    fn check_cycle<'a>(
        &'a self,
        gate: &'a str,
        path: &mut Vec<&'a str>,
        done: &mut HashSet<&'a str>,
    ) -> Result<()> {
        if done.contains(gate) {
            return Ok(());
        }
        if path.contains(&gate) {
            path.push(gate);
            return Err(UsageGateError::Config(format!(
                "Gate cycle detected: {}",
                path.join(" -> ")
            )));
        }

        path.push(gate);
        if let Some(rule) = self.gates.get(gate) {
            for member in &rule.members {
                if self.gates.contains_key(member.as_str()) {
                    self.check_cycle(member, path, done)?;
                }
            }
        }
        path.pop();
        done.insert(gate);

        Ok(())
    }
}
