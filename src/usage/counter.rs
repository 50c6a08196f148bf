//! Time-bucketed usage counter implementation.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::bucket::TimeUnit;
use super::clock::Clock;
use super::gate::UsageCounter;
use crate::error::Result;
use crate::store::{Context, CounterStore};

/// Policy deciding whether a non-forced reset clears usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetRule {
    /// Every reset clears usage
    #[default]
    Always,
    /// Reset only clears usage while the limit is reached
    #[serde(alias = "onlyReached")]
    OnlyReached,
    /// Only forced resets clear usage
    Never,
}

/// Point-in-time view of a counter, used for inspection and CLI output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CounterStatus {
    pub name: String,
    pub context: Context,
    pub unit: TimeUnit,
    pub limit: u64,
    pub usages: u64,
    pub limit_reached: bool,
    /// Key the current bucket is stored under
    pub bucket: String,
    pub resets_in_secs: u64,
}

/// A counter that counts occurrences per calendar day or month.
///
/// The count lives in the shared store under `"{name}_{bucketToken}"`. When
/// the clock crosses into a new bucket the counter simply reads a fresh key,
/// so usage drops to zero while the previous bucket's value stays intact.
pub struct TimeBucketedCounter {
    name: String,
    context: Context,
    unit: TimeUnit,
    limit: u64,
    reset_rule: ResetRule,
    utc_offset: FixedOffset,
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
}

impl TimeBucketedCounter {
    /// Create a counter with the `always` reset rule and UTC calendar.
    pub fn new(
        name: impl Into<String>,
        context: Context,
        unit: TimeUnit,
        limit: u64,
        store: Arc<dyn CounterStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            name: name.into(),
            context,
            unit,
            limit,
            reset_rule: ResetRule::default(),
            utc_offset: Utc.fix(),
            store,
            clock,
        }
    }

    /// Use `rule` for non-forced resets.
    pub fn with_reset_rule(mut self, rule: ResetRule) -> Self {
        self.reset_rule = rule;
        self
    }

    /// Evaluate calendar boundaries at `offset` instead of UTC.
    pub fn with_utc_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    pub fn unit(&self) -> TimeUnit {
        self.unit
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn reset_rule(&self) -> ResetRule {
        self.reset_rule
    }

    pub fn utc_offset(&self) -> FixedOffset {
        self.utc_offset
    }

    fn local_now(&self) -> DateTime<FixedOffset> {
        self.clock.now().with_timezone(&self.utc_offset)
    }

    /// Key of the bucket the clock currently falls in.
    pub fn storage_key(&self) -> String {
        format!("{}_{}", self.name, self.unit.bucket_token(&self.local_now()))
    }

    /// Usage recorded in the current bucket.
    pub fn usages(&self) -> Result<u64> {
        self.store.counter_value(&self.storage_key(), &self.context)
    }

    fn can_reset(&self) -> Result<bool> {
        match self.reset_rule {
            ResetRule::Always => Ok(true),
            ResetRule::OnlyReached => self.is_limit_reached(),
            ResetRule::Never => Ok(false),
        }
    }

    /// Time left until the clock enters the next bucket.
    pub fn time_until_rollover(&self) -> Duration {
        let now = self.local_now();
        self.unit
            .next_rollover(&now)
            .and_then(|next| next.signed_duration_since(now).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Snapshot of the counter at the current instant.
    pub fn status(&self) -> Result<CounterStatus> {
        let bucket = self.storage_key();
        let usages = self.store.counter_value(&bucket, &self.context)?;

        Ok(CounterStatus {
            name: self.name.clone(),
            context: self.context.clone(),
            unit: self.unit,
            limit: self.limit,
            usages,
            limit_reached: usages > self.limit,
            bucket,
            resets_in_secs: self.time_until_rollover().as_secs(),
        })
    }
}

impl fmt::Debug for TimeBucketedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimeBucketedCounter")
            .field("name", &self.name)
            .field("context", &self.context)
            .field("unit", &self.unit)
            .field("limit", &self.limit)
            .field("reset_rule", &self.reset_rule)
            .field("utc_offset", &self.utc_offset)
            .finish()
    }
}

impl UsageCounter for TimeBucketedCounter {
    fn increment(&self) -> Result<()> {
        // Read and write the same bucket even if the clock ticks in between.
        let key = self.storage_key();
        let usages = self.store.counter_value(&key, &self.context)?;
        let next = usages.saturating_add(1);
        self.store.set_counter(next, &key, &self.context)?;

        trace!(
            counter = %self.name,
            context = %self.context,
            bucket = %key,
            usages = next,
            limit = self.limit,
            "Incremented usage counter"
        );
        Ok(())
    }

    fn reset_with(&self, force: bool) -> Result<()> {
        if force || self.can_reset()? {
            let key = self.storage_key();
            self.store.set_counter(0, &key, &self.context)?;
            debug!(counter = %self.name, bucket = %key, force = force, "Reset usage counter");
        } else {
            debug!(
                counter = %self.name,
                rule = ?self.reset_rule,
                "Reset skipped by reset rule"
            );
        }
        Ok(())
    }

    fn is_limit_reached(&self) -> Result<bool> {
        Ok(self.usages()? > self.limit)
    }
}
