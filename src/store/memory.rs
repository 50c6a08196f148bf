//! In-process counter store backed by DashMap.

use dashmap::DashMap;
use std::collections::BTreeMap;
use tracing::trace;

use super::backend::CounterStore;
use super::context::Context;
use crate::error::Result;

/// Thread-safe in-memory counter store.
///
/// Entries are keyed on the exact `(context, key)` pair, so clearing one
/// context never touches another. Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: DashMap<(Context, String), u64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored values across all contexts.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the store holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl CounterStore for MemoryStore {
    fn set_counter(&self, value: u64, key: &str, context: &Context) -> Result<()> {
        trace!(context = %context, key = key, value = value, "Setting counter");
        self.values.insert((context.clone(), key.to_string()), value);
        Ok(())
    }

    fn counter_value(&self, key: &str, context: &Context) -> Result<u64> {
        let value = self
            .values
            .get(&(context.clone(), key.to_string()))
            .map(|v| *v)
            .unwrap_or(0);
        Ok(value)
    }

    fn clear(&self, context: &Context) -> Result<()> {
        self.values.retain(|(ctx, _), _| ctx != context);
        Ok(())
    }

    fn entries(&self, context: &Context) -> Result<BTreeMap<String, u64>> {
        Ok(self
            .values
            .iter()
            .filter(|entry| &entry.key().0 == context)
            .map(|entry| (entry.key().1.clone(), *entry.value()))
            .collect())
    }
}
