//! Counter storage.
//!
//! Counters never own their state. Every time-bucketed counter writes into a
//! shared [`CounterStore`], namespaced by a [`Context`]. Two backends are
//! provided: an in-process [`MemoryStore`] and a durable [`JsonFileStore`].

mod backend;
mod context;
mod file;
mod memory;

pub use backend::CounterStore;
pub use context::{storage_key, Context};
pub use file::JsonFileStore;
pub use memory::MemoryStore;
