//! Core data model: reps, lanes, leads, and property types.
//!
//! `Lane` is always derived from `unit_count`; it is never stored on a `Lead`.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Opaque rep identity, supplied by the caller.
pub type RepId = String;

/// Opaque lead identity, supplied by the caller.
pub type LeadId = String;

/// `unit_count >= this` puts a lead in the `1kplus` lane.
pub const UNIT_COUNT_1KPLUS_THRESHOLD: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    Sub1k,
    OneKPlus,
}

impl Lane {
    /// Derives the lane for a given unit count.
    pub fn for_unit_count(unit_count: i64) -> Lane {
        if unit_count >= UNIT_COUNT_1KPLUS_THRESHOLD {
            Lane::OneKPlus
        } else {
            Lane::Sub1k
        }
    }

    pub const ALL: [Lane; 2] = [Lane::Sub1k, Lane::OneKPlus];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Mfh,
    Mf,
    Sfh,
    Commercial,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepStatus {
    Active,
    Ooo,
}

/// Per-rep capability/eligibility parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepParameters {
    pub property_types: BTreeSet<PropertyType>,
    pub max_units: Option<i64>,
    pub can_handle_1kplus: bool,
}

/// A sales representative on the roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rep {
    pub id: RepId,
    pub display_name: String,
    pub parameters: RepParameters,
    /// Dense 1..N position in the sub1k base order.
    pub sub1k_order: u32,
    /// Dense 1..N position in the 1kplus base order; present iff `can_handle_1kplus`.
    pub over1k_order: Option<u32>,
    pub status: RepStatus,
}

impl Rep {
    pub fn is_active(&self) -> bool {
        matches!(self.status, RepStatus::Active)
    }

    pub fn order_for(&self, lane: Lane) -> Option<u32> {
        match lane {
            Lane::Sub1k => Some(self.sub1k_order),
            Lane::OneKPlus => self.over1k_order,
        }
    }
}

/// An immutable lead. Lane is derived from `unit_count`, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub account_number: String,
    pub url: String,
    pub property_types: BTreeSet<PropertyType>,
    pub unit_count: i64,
    pub assigned_rep: RepId,
    pub action_date: NaiveDate,
    pub comments: Vec<String>,
}

impl Lead {
    pub fn lane(&self) -> Lane {
        Lane::for_unit_count(self.unit_count)
    }
}
