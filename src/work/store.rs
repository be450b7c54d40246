//! # In-memory work store.
//!
//! Maps work id → [`WorkUnit`] and maintains the three disjoint membership
//! bags (pending, active, terminal-implicit). Every transition method checks
//! the state precondition and returns `None` when it no longer holds, so a
//! unit that was cancelled between a scheduler snapshot and the transition
//! is left untouched.
//!
//! ## Rules
//! - A unit is in the pending bag iff `state == Pending`.
//! - A unit is in the active bag iff `state == Running`.
//! - Terminal states are immutable; `completed_at` is set exactly at the
//!   terminal transition, `started_at` exactly at dispatch.
//! - The retry path (`requeue`) is the only `RUNNING → PENDING` edge and
//!   clears `started_at`.

use std::collections::{HashMap, HashSet};
use std::time::{Instant, SystemTime};

use serde_json::Value;
use tokio::sync::RwLock;

use super::unit::{WorkState, WorkUnit};

/// Filter for [`WorkStore::list`] / [`crate::Cue::list`].
#[derive(Clone, Debug)]
pub struct WorkFilter {
    /// Only units in this state.
    pub state: Option<WorkState>,
    /// Only units of this task type.
    pub task: Option<String>,
    /// Maximum number of units returned (oldest first).
    pub limit: usize,
}

impl Default for WorkFilter {
    fn default() -> Self {
        Self {
            state: None,
            task: None,
            limit: 100,
        }
    }
}

/// Outcome of a cancellation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOutcome {
    /// No unit with that id exists.
    NotFound,
    /// The unit was pending and is now cancelled.
    Cancelled,
    /// The unit is running; intent was recorded and the result will be
    /// discarded at completion.
    Requested,
    /// The unit was already terminal; nothing changed.
    AlreadyTerminal(WorkState),
}

struct StoreInner {
    units: HashMap<String, WorkUnit>,
    pending: HashSet<String>,
    active: HashSet<String>,
}

/// Process-lifetime mapping from work id to the authoritative record.
pub struct WorkStore {
    inner: RwLock<StoreInner>,
}

impl WorkStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                units: HashMap::new(),
                pending: HashSet::new(),
                active: HashSet::new(),
            }),
        }
    }

    /// Inserts a freshly submitted unit (must be `Pending`).
    pub async fn insert(&self, unit: WorkUnit) {
        debug_assert_eq!(unit.state, WorkState::Pending);
        let mut inner = self.inner.write().await;
        inner.pending.insert(unit.id.clone());
        inner.units.insert(unit.id.clone(), unit);
    }

    /// Snapshot read of a single unit.
    pub async fn get(&self, id: &str) -> Option<WorkUnit> {
        self.inner.read().await.units.get(id).cloned()
    }

    /// Snapshot read of units matching `filter`, oldest first.
    pub async fn list(&self, filter: &WorkFilter) -> Vec<WorkUnit> {
        let inner = self.inner.read().await;
        let mut out: Vec<WorkUnit> = inner
            .units
            .values()
            .filter(|u| filter.state.map_or(true, |s| u.state == s))
            .filter(|u| filter.task.as_deref().map_or(true, |t| u.task == t))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        out.truncate(filter.limit);
        out
    }

    /// Snapshot of every pending unit, in no particular order.
    pub async fn pending_snapshot(&self) -> Vec<WorkUnit> {
        let inner = self.inner.read().await;
        inner
            .pending
            .iter()
            .filter_map(|id| inner.units.get(id))
            .cloned()
            .collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.read().await.pending.len()
    }

    pub async fn active_count(&self) -> usize {
        self.inner.read().await.active.len()
    }

    /// Dispatch transition: `PENDING → RUNNING`.
    ///
    /// Sets `started_at`, increments `attempt`, clears the retry hold.
    /// Returns the post-transition snapshot, or `None` if the unit is no
    /// longer pending.
    pub async fn move_to_active(&self, id: &str) -> Option<WorkUnit> {
        let mut inner = self.inner.write().await;
        let unit = inner.units.get_mut(id)?;
        if unit.state != WorkState::Pending {
            return None;
        }
        unit.state = WorkState::Running;
        unit.started_at = Some(SystemTime::now());
        unit.attempt += 1;
        unit.next_eligible = None;
        let snap = unit.clone();
        inner.pending.remove(id);
        inner.active.insert(id.to_string());
        Some(snap)
    }

    /// Success transition: `RUNNING → COMPLETED` with a result body.
    pub async fn complete(&self, id: &str, result: Value) -> Option<WorkUnit> {
        self.finish_running(id, WorkState::Completed, Some(result), None)
            .await
    }

    /// Terminal failure transition: `RUNNING → FAILED`.
    pub async fn fail(&self, id: &str, error: impl Into<String>) -> Option<WorkUnit> {
        self.finish_running(id, WorkState::Failed, None, Some(error.into()))
            .await
    }

    /// Discard transition: `RUNNING → CANCELLED` (cancellation intent won).
    pub async fn mark_cancelled(&self, id: &str) -> Option<WorkUnit> {
        self.finish_running(id, WorkState::Cancelled, None, None)
            .await
    }

    /// Retry transition: `RUNNING → PENDING` with a backoff hold.
    ///
    /// Clears `started_at`, records the failed attempt's error, and stamps
    /// the earliest instant the next dispatch may happen.
    pub async fn requeue(
        &self,
        id: &str,
        error: impl Into<String>,
        next_eligible: Instant,
    ) -> Option<WorkUnit> {
        let mut inner = self.inner.write().await;
        let unit = inner.units.get_mut(id)?;
        if unit.state != WorkState::Running {
            return None;
        }
        unit.state = WorkState::Pending;
        unit.started_at = None;
        unit.error = Some(error.into());
        unit.next_eligible = Some(next_eligible);
        let snap = unit.clone();
        inner.active.remove(id);
        inner.pending.insert(id.to_string());
        Some(snap)
    }

    /// Skip transition: `PENDING → COMPLETED` with no result body and
    /// `started_at` unset.
    pub async fn skip(&self, id: &str) -> Option<WorkUnit> {
        let mut inner = self.inner.write().await;
        let unit = inner.units.get_mut(id)?;
        if unit.state != WorkState::Pending {
            return None;
        }
        unit.state = WorkState::Completed;
        unit.completed_at = Some(SystemTime::now());
        let snap = unit.clone();
        inner.pending.remove(id);
        Some(snap)
    }

    /// Age-policy transition: `PENDING → FAILED` (pending/stall timeout).
    pub async fn expire(&self, id: &str, error: impl Into<String>) -> Option<WorkUnit> {
        let mut inner = self.inner.write().await;
        let unit = inner.units.get_mut(id)?;
        if unit.state != WorkState::Pending {
            return None;
        }
        unit.state = WorkState::Failed;
        unit.error = Some(error.into());
        unit.completed_at = Some(SystemTime::now());
        let snap = unit.clone();
        inner.pending.remove(id);
        Some(snap)
    }

    /// Cancels a unit per the three-way semantics.
    pub async fn cancel(&self, id: &str) -> CancelOutcome {
        let mut inner = self.inner.write().await;
        let Some(unit) = inner.units.get_mut(id) else {
            return CancelOutcome::NotFound;
        };
        match unit.state {
            WorkState::Pending => {
                unit.state = WorkState::Cancelled;
                unit.completed_at = Some(SystemTime::now());
                inner.pending.remove(id);
                CancelOutcome::Cancelled
            }
            WorkState::Running => {
                unit.cancel_requested = true;
                CancelOutcome::Requested
            }
            state => CancelOutcome::AlreadyTerminal(state),
        }
    }

    fn finish_running_sync(
        inner: &mut StoreInner,
        id: &str,
        state: WorkState,
        result: Option<Value>,
        error: Option<String>,
    ) -> Option<WorkUnit> {
        let unit = inner.units.get_mut(id)?;
        if unit.state != WorkState::Running {
            return None;
        }
        unit.state = state;
        unit.completed_at = Some(SystemTime::now());
        if result.is_some() {
            unit.result = result;
        }
        if error.is_some() {
            unit.error = error;
        }
        let snap = unit.clone();
        inner.active.remove(id);
        Some(snap)
    }

    async fn finish_running(
        &self,
        id: &str,
        state: WorkState,
        result: Option<Value>,
        error: Option<String>,
    ) -> Option<WorkUnit> {
        let mut inner = self.inner.write().await;
        Self::finish_running_sync(&mut inner, id, state, result, error)
    }
}

impl Default for WorkStore {
    fn default() -> Self {
        Self::new()
    }
}
