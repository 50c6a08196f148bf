//! Rate gate trait shared by leaf and compound counters.

use std::fmt::Debug;

use crate::error::Result;

/// Trait for usage counter implementations.
///
/// Leaf counters and compound counters are peers behind this trait, so a
/// compound can hold either kind and callers can gate on either kind
/// without caring which one they have.
pub trait UsageCounter: Send + Sync + Debug {
    /// Record one occurrence of the gated action.
    fn increment(&self) -> Result<()>;

    /// Reset usage. A forced reset ignores the reset rule.
    fn reset_with(&self, force: bool) -> Result<()>;

    /// Whether the gate is currently closed.
    fn is_limit_reached(&self) -> Result<bool>;

    /// Reset usage if the reset rule allows it.
    fn reset(&self) -> Result<()> {
        self.reset_with(false)
    }

    /// Reset usage regardless of the reset rule.
    fn force_reset(&self) -> Result<()> {
        self.reset_with(true)
    }

    /// Record one occurrence and report whether the gate is now closed.
    fn record(&self) -> Result<bool> {
        self.increment()?;
        self.is_limit_reached()
    }
}
