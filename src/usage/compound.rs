//! Compound counters combining several gates under one rule.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{trace, warn};

use super::gate::UsageCounter;
use crate::error::{Result, UsageGateError};

/// How a compound counter combines its members' reached state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupRule {
    /// Reached when at least one member is reached
    Any,
    /// Reached when every member is reached
    #[default]
    All,
}

/// A counter that owns no state and delegates to its members.
///
/// Members may be leaf counters or other compounds. `increment` and `reset`
/// reach every member regardless of the rule, so members on different time
/// units keep rolling over independently. The fan-out is a sequence of
/// independent writes, not a transaction.
#[derive(Debug, Clone)]
pub struct CompoundCounter {
    counters: Vec<Arc<dyn UsageCounter>>,
    rule: GroupRule,
}

impl CompoundCounter {
    pub fn new(counters: Vec<Arc<dyn UsageCounter>>, rule: GroupRule) -> Self {
        Self { counters, rule }
    }

    pub fn counters(&self) -> &[Arc<dyn UsageCounter>] {
        &self.counters
    }

    pub fn rule(&self) -> GroupRule {
        self.rule
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Apply `op` to every member, returning the first failure afterwards.
    fn fan_out<F>(&self, action: &str, op: F) -> Result<()>
    where
        F: Fn(&dyn UsageCounter) -> Result<()>,
    {
        let mut first_error: Option<UsageGateError> = None;

        for (index, counter) in self.counters.iter().enumerate() {
            if let Err(e) = op(counter.as_ref()) {
                warn!(action = action, member = index, error = %e, "Compound member failed");
                first_error.get_or_insert(e);
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl UsageCounter for CompoundCounter {
    fn increment(&self) -> Result<()> {
        trace!(members = self.counters.len(), "Incrementing compound counter");
        self.fan_out("increment", |counter| counter.increment())
    }

    fn reset_with(&self, force: bool) -> Result<()> {
        trace!(members = self.counters.len(), force = force, "Resetting compound counter");
        self.fan_out("reset", |counter| counter.reset_with(force))
    }

    fn is_limit_reached(&self) -> Result<bool> {
        match self.rule {
            GroupRule::All => {
                for counter in &self.counters {
                    if !counter.is_limit_reached()? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            GroupRule::Any => {
                for counter in &self.counters {
                    if counter.is_limit_reached()? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }
}
