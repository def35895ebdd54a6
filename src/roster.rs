//! The Roster: active reps and per-lane base orders.

use crate::error::{EngineError, EngineResult};
use crate::models::{Lane, Rep, RepId, RepStatus};

/// A versioned snapshot of the roster. `version` increments on every
/// mutation and is one leg of the derived-view cache key.
#[derive(Debug, Clone, Default)]
pub struct RosterSnapshot {
    pub version: u64,
    pub reps: Vec<Rep>,
}

/// Owns the rep roster and its per-lane base orders.
#[derive(Default)]
pub struct Roster {
    snapshot: parking_lot::RwLock<RosterSnapshot>,
}

impl Roster {
    pub fn new(reps: Vec<Rep>) -> Self {
        Self {
            snapshot: parking_lot::RwLock::new(RosterSnapshot { version: 1, reps }),
        }
    }

    pub fn snapshot(&self) -> RosterSnapshot {
        self.snapshot.read().clone()
    }

    /// Active reps for `lane`, filtered by `can_handle_1kplus` when
    /// `lane == OneKPlus`, sorted by that lane's order field.
    pub fn list_active(&self, lane: Lane) -> Vec<Rep> {
        let snapshot = self.snapshot.read();
        let mut reps: Vec<Rep> = snapshot
            .reps
            .iter()
            .filter(|r| r.is_active())
            .filter(|r| r.order_for(lane).is_some())
            .cloned()
            .collect();
        reps.sort_by_key(|r| r.order_for(lane).unwrap());
        reps
    }

    /// Replaces `lane`'s order field. `new_order` must be a permutation of
    /// the currently eligible reps for that lane. Crate-private: mutations
    /// go through `RotationEngine::reorder_roster` so the change-notification
    /// fan-out can't be bypassed.
    pub(crate) fn reorder(&self, lane: Lane, new_order: &[RepId]) -> EngineResult<()> {
        let mut snapshot = self.snapshot.write();
        let eligible: Vec<RepId> = {
            let mut ids: Vec<RepId> = snapshot
                .reps
                .iter()
                .filter(|r| r.order_for(lane).is_some())
                .map(|r| r.id.clone())
                .collect();
            ids.sort();
            ids
        };
        let mut given = new_order.to_vec();
        given.sort();
        if given != eligible {
            return Err(EngineError::InvalidOrder { lane });
        }

        for rep in snapshot.reps.iter_mut() {
            if let Some(pos) = new_order.iter().position(|id| id == &rep.id) {
                let order = pos as u32 + 1;
                match lane {
                    Lane::Sub1k => rep.sub1k_order = order,
                    Lane::OneKPlus => rep.over1k_order = Some(order),
                }
            }
        }
        snapshot.version += 1;
        Ok(())
    }

    /// Creates or patches a rep, then densifies both lanes' orders to 1..N.
    /// Crate-private: mutations go through `RotationEngine::upsert_rep`.
    pub(crate) fn upsert_rep(&self, rep: Rep) {
        let mut snapshot = self.snapshot.write();
        if let Some(existing) = snapshot.reps.iter_mut().find(|r| r.id == rep.id) {
            *existing = rep;
        } else {
            snapshot.reps.push(rep);
        }
        Self::densify(&mut snapshot.reps);
        snapshot.version += 1;
    }

    /// Removes a rep and densifies both lanes' orders. Crate-private:
    /// mutations go through `RotationEngine::remove_rep`.
    pub(crate) fn remove_rep(&self, rep_id: &str) {
        let mut snapshot = self.snapshot.write();
        snapshot.reps.retain(|r| r.id != rep_id);
        Self::densify(&mut snapshot.reps);
        snapshot.version += 1;
    }

    fn densify(reps: &mut [Rep]) {
        for lane in Lane::ALL {
            let mut ordered: Vec<&mut Rep> = reps
                .iter_mut()
                .filter(|r| r.order_for(lane).is_some())
                .collect();
            ordered.sort_by_key(|r| r.order_for(lane).unwrap());
            for (i, rep) in ordered.into_iter().enumerate() {
                let order = i as u32 + 1;
                match lane {
                    Lane::Sub1k => rep.sub1k_order = order,
                    Lane::OneKPlus => {
                        if rep.parameters.can_handle_1kplus {
                            rep.over1k_order = Some(order);
                        } else {
                            rep.over1k_order = None;
                        }
                    }
                }
            }
        }
    }
}

/// Persistence port for the roster. Unlike the event log, the roster is
/// configuration state rather than an append-only stream: it is loaded once
/// at startup and overwritten wholesale on every mutation.
pub trait RosterStore: Send + Sync {
    fn load(&self) -> anyhow::Result<Option<RosterSnapshot>>;
    fn save(&self, snapshot: &RosterSnapshot) -> anyhow::Result<()>;
}
