//! Named gate registry built from rules.

use chrono::FixedOffset;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

use super::clock::Clock;
use super::compound::CompoundCounter;
use super::counter::{CounterStatus, TimeBucketedCounter};
use super::gate::UsageCounter;
use super::rules::RulesConfig;
use crate::error::{Result, UsageGateError};
use crate::store::CounterStore;

/// Counters and gates resolved by name.
///
/// Every counter is constructed once against the shared store and clock,
/// and every gate once, so a subtree referenced by two gates is the same
/// instance in both.
pub struct GateRegistry {
    counters: HashMap<String, Arc<TimeBucketedCounter>>,
    gates: HashMap<String, Arc<CompoundCounter>>,
    members: HashMap<String, Vec<String>>,
    /// Counters then gates, each sorted by name
    names: Vec<String>,
}

impl GateRegistry {
    /// Validate `rules` and build every counter and gate they declare.
    pub fn build(
        rules: &RulesConfig,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
        utc_offset: FixedOffset,
    ) -> Result<Self> {
        rules.validate()?;

        let mut counters = HashMap::new();
        for (name, rule) in &rules.counters {
            let counter = TimeBucketedCounter::new(
                name.clone(),
                rules.context_for(rule).clone(),
                rule.unit,
                rule.limit,
                store.clone(),
                clock.clone(),
            )
            .with_reset_rule(rule.reset_rule)
            .with_utc_offset(utc_offset);

            debug!(
                counter = %name,
                context = %counter.context(),
                unit = %rule.unit,
                limit = rule.limit,
                "Registered usage counter"
            );
            counters.insert(name.clone(), Arc::new(counter));
        }

        let members: HashMap<String, Vec<String>> = rules
            .gates
            .iter()
            .map(|(name, rule)| (name.clone(), rule.members.clone()))
            .collect();

        let mut registry = Self {
            counters,
            gates: HashMap::new(),
            members,
            names: rules
                .counters
                .keys()
                .chain(rules.gates.keys())
                .cloned()
                .collect(),
        };

        for (name, rule) in &rules.gates {
            registry.build_gate(name, rules)?;
            debug!(gate = %name, rule = ?rule.rule, members = rule.members.len(), "Registered gate");
        }

        info!(
            counters = registry.counters.len(),
            gates = registry.gates.len(),
            "Gate registry ready"
        );
        Ok(registry)
    }

    fn build_gate(&mut self, name: &str, rules: &RulesConfig) -> Result<Arc<CompoundCounter>> {
        if let Some(gate) = self.gates.get(name) {
            return Ok(gate.clone());
        }

        let rule = rules
            .gates
            .get(name)
            .ok_or_else(|| UsageGateError::UnknownGate(name.to_string()))?;

        let mut children: Vec<Arc<dyn UsageCounter>> = Vec::with_capacity(rule.members.len());
        for member in &rule.members {
            if let Some(counter) = self.counters.get(member) {
                children.push(counter.clone());
            } else {
                children.push(self.build_gate(member, rules)?);
            }
        }

        let gate = Arc::new(CompoundCounter::new(children, rule.rule));
        self.gates.insert(name.to_string(), gate.clone());
        Ok(gate)
    }

    /// Resolve a counter or gate by name.
    pub fn gate(&self, name: &str) -> Option<Arc<dyn UsageCounter>> {
        if let Some(counter) = self.counters.get(name) {
            return Some(counter.clone());
        }
        self.gates
            .get(name)
            .map(|gate| gate.clone() as Arc<dyn UsageCounter>)
    }

    /// Resolve a counter or gate by name, failing on unknown names.
    pub fn require(&self, name: &str) -> Result<Arc<dyn UsageCounter>> {
        self.gate(name)
            .ok_or_else(|| UsageGateError::UnknownGate(name.to_string()))
    }

    /// Resolve a leaf counter by name.
    pub fn counter(&self, name: &str) -> Option<Arc<TimeBucketedCounter>> {
        self.counters.get(name).cloned()
    }

    /// All counter and gate names: counters first, then gates, each sorted.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Distinct leaf counters under `name`, in member order.
    pub fn leaves(&self, name: &str) -> Result<Vec<Arc<TimeBucketedCounter>>> {
        if self.gate(name).is_none() {
            return Err(UsageGateError::UnknownGate(name.to_string()));
        }

        let mut seen = HashSet::new();
        let mut leaves = Vec::new();
        self.collect_leaves(name, &mut seen, &mut leaves);
        Ok(leaves)
    }

    fn collect_leaves(
        &self,
        name: &str,
        seen: &mut HashSet<String>,
        leaves: &mut Vec<Arc<TimeBucketedCounter>>,
    ) {
        if let Some(counter) = self.counters.get(name) {
            if seen.insert(name.to_string()) {
                leaves.push(counter.clone());
            }
            return;
        }
        if let Some(members) = self.members.get(name) {
            for member in members {
                self.collect_leaves(member, seen, leaves);
            }
        }
    }

    /// Status of every leaf counter under `name`.
    pub fn statuses(&self, name: &str) -> Result<Vec<CounterStatus>> {
        self.leaves(name)?
            .iter()
            .map(|counter| counter.status())
            .collect()
    }

    /// Status of every counter in the registry, sorted by name.
    pub fn all_statuses(&self) -> Result<Vec<CounterStatus>> {
        self.names
            .iter()
            .filter_map(|name| self.counters.get(name))
            .map(|counter| counter.status())
            .collect()
    }
}
