//! Usagegate - calendar-bucketed usage counters and rate gates
//!
//! This crate decides whether a rate-limited action is currently allowed.
//! Leaf counters count occurrences per calendar day or month in a shared
//! counter store, and compound counters combine them under `all` / `any`
//! rules. A YAML rules layer and a named registry sit on top for callers
//! that configure their gates declaratively.

pub mod config;
pub mod error;
pub mod store;
pub mod usage;
