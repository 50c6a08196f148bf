//! Counter store trait for abstracting in-memory and durable backends.

use std::collections::BTreeMap;
use std::fmt::Debug;

use super::context::Context;
use crate::error::Result;

/// Trait for counter store implementations.
///
/// A store maps `(context, key)` to a non-negative count. It is shared by
/// every counter constructed against it, so implementations must tolerate
/// interleaved reads and writes to distinct keys. Absent keys read as zero.
pub trait CounterStore: Send + Sync + Debug {
    /// Persist `value` for `key` in `context`, overwriting any prior value.
    fn set_counter(&self, value: u64, key: &str, context: &Context) -> Result<()>;

    /// Return the stored value for `key` in `context`, or 0 if absent.
    fn counter_value(&self, key: &str, context: &Context) -> Result<u64>;

    /// Remove every value stored under `context`.
    fn clear(&self, context: &Context) -> Result<()>;

    /// All keys stored under `context`, without the context prefix.
    fn entries(&self, context: &Context) -> Result<BTreeMap<String, u64>>;
}
