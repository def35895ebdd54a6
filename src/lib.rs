//! Rotation Engine Library
//!
//! Exposes the domain core (event log, roster, hit accumulator, replacement
//! store, sequence generator, overlay composer, eligibility filter, and the
//! `RotationEngine` facade tying them together) plus the ambient
//! configuration, error, persistence, cache and HTTP layers, for use by the
//! binary and the integration test suite.

pub mod api;
pub mod cache;
pub mod config;
pub mod eligibility;
pub mod error;
pub mod event;
pub mod event_log;
pub mod hit_accumulator;
pub mod lead_store;
pub mod middleware;
pub mod models;
pub mod overlay;
pub mod query;
pub mod replacement_store;
pub mod resolver;
pub mod roster;
pub mod sequence;
pub mod storage;

pub use error::{EngineError, EngineResult};
pub use resolver::RotationEngine;
