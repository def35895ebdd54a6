//! Eligibility Filter.

use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::models::{Lane, PropertyType, Rep};

/// A prospective lead's attributes, as seen by the eligibility filter.
#[derive(Debug, Clone)]
pub struct ProspectiveLead {
    pub property_types: BTreeSet<PropertyType>,
    pub unit_count: i64,
    pub day: NaiveDate,
}

impl ProspectiveLead {
    pub fn lane(&self) -> Lane {
        Lane::for_unit_count(self.unit_count)
    }
}

/// Filters `active_reps` (already sorted by base order for the lane) down to
/// those eligible for `lead`. Property types use any-match semantics: a rep
/// is eligible if its set intersects the lead's set at all.
pub fn filter(
    active_reps: &[Rep],
    lead: &ProspectiveLead,
    ooo_today: &std::collections::HashSet<String>,
) -> Vec<Rep> {
    active_reps
        .iter()
        .filter(|rep| !ooo_today.contains(&rep.id))
        .filter(|rep| lead.unit_count < 1000 || rep.parameters.can_handle_1kplus)
        .filter(|rep| {
            rep.parameters
                .max_units
                .map_or(true, |max| lead.unit_count <= max)
        })
        .filter(|rep| {
            !rep.parameters
                .property_types
                .is_disjoint(&lead.property_types)
        })
        .cloned()
        .collect()
}
