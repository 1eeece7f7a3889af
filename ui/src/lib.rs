//! Shared UI crate for BiasXplorer. The report engine and its views live here;
//! platform crates only launch it.

pub mod core;
pub mod report;
pub mod views;
