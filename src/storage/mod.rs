//! Persistence adapters. The domain core depends only on the
//! `EventStore` and `RosterStore` ports; this module is the one place that
//! knows about SQL.

pub mod sqlite;

pub use sqlite::SqliteStore;
