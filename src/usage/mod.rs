//! Usage counting and rate gate logic.

mod bucket;
mod clock;
mod compound;
mod counter;
mod gate;
mod registry;
mod rules;

pub use bucket::TimeUnit;
pub use clock::{Clock, ManualClock, SystemClock};
pub use compound::{CompoundCounter, GroupRule};
pub use counter::{CounterStatus, ResetRule, TimeBucketedCounter};
pub use gate::UsageCounter;
pub use registry::GateRegistry;
pub use rules::{CounterRule, GateRule, RulesConfig};
