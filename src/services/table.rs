//! # Service table: per-service admission arithmetic.
//!
//! Holds each registered service's limits together with its live counters:
//! the active-use count and the ring of recent dispatch timestamps.
//!
//! ## Rules
//! - [`ServiceTable::try_reserve`] is the only way to take a slot; it checks
//!   and reserves under one exclusive map-entry guard, so a winner observed
//!   admissible is admissible when reserved.
//! - [`ServiceTable::release`] decrements the active count when a handler
//!   terminates (success, failure, or cancellation); historical timestamps
//!   age out of the window on their own.
//! - The windowed count is computed lazily: each check evicts timestamps
//!   `<= now - window` from the front of the ring.

use std::collections::VecDeque;
use std::time::Instant;

use dashmap::DashMap;

use crate::error::CueError;
use crate::services::ServiceSpec;

/// Why a service would (or would not) admit a dispatch right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmitState {
    /// A dispatch would be admitted.
    Admissible,
    /// All concurrency slots are in use.
    AtConcurrency,
    /// The sliding-window dispatch budget is exhausted.
    RateExhausted,
    /// The service is not registered.
    Unknown,
}

/// Live state of a single service.
struct ServiceState {
    spec: ServiceSpec,
    active: usize,
    dispatches: VecDeque<Instant>,
}

impl ServiceState {
    fn new(spec: ServiceSpec) -> Self {
        Self {
            spec,
            active: 0,
            dispatches: VecDeque::new(),
        }
    }

    /// Evicts timestamps that fell out of the window, then classifies.
    fn admit_state(&mut self, now: Instant) -> AdmitState {
        if let Some(limit) = self.spec.concurrency_limit() {
            if self.active >= limit {
                return AdmitState::AtConcurrency;
            }
        }
        if let Some(rate) = self.spec.rate_limit() {
            let horizon = now.checked_sub(rate.window);
            while let Some(front) = self.dispatches.front() {
                match horizon {
                    Some(h) if *front <= h => {
                        self.dispatches.pop_front();
                    }
                    _ => break,
                }
            }
            if self.dispatches.len() >= rate.count as usize {
                return AdmitState::RateExhausted;
            }
        }
        AdmitState::Admissible
    }
}

/// Registry of services with their live admission counters.
pub struct ServiceTable {
    services: DashMap<String, ServiceState>,
}

impl ServiceTable {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Registers a service.
    ///
    /// Re-registering with identical parameters is a no-op; different
    /// parameters are a configuration error.
    pub fn register(&self, spec: ServiceSpec) -> Result<(), CueError> {
        if let Some(existing) = self.services.get(spec.name()) {
            if existing.spec == spec {
                return Ok(());
            }
            return Err(CueError::config(format!(
                "service '{}' already registered with different parameters",
                spec.name()
            )));
        }
        self.services
            .insert(spec.name().to_string(), ServiceState::new(spec));
        Ok(())
    }

    /// True if a service with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Classifies whether `name` would admit a dispatch at `now`.
    ///
    /// Evicts aged-out window timestamps as a side effect.
    pub fn admit_state(&self, name: &str, now: Instant) -> AdmitState {
        match self.services.get_mut(name) {
            Some(mut state) => state.admit_state(now),
            None => AdmitState::Unknown,
        }
    }

    /// True iff a dispatch on `name` would be admitted at `now`.
    pub fn can_admit(&self, name: &str, now: Instant) -> bool {
        self.admit_state(name, now) == AdmitState::Admissible
    }

    /// Atomically checks admission and, if admissible, takes a slot and
    /// records the dispatch timestamp.
    ///
    /// Must be paired with exactly one [`release`](Self::release) once the
    /// handler terminates.
    pub fn try_reserve(&self, name: &str, now: Instant) -> bool {
        let Some(mut state) = self.services.get_mut(name) else {
            return false;
        };
        if state.admit_state(now) != AdmitState::Admissible {
            return false;
        }
        state.active += 1;
        state.dispatches.push_back(now);
        true
    }

    /// Returns a concurrency slot after a handler terminated.
    ///
    /// Window timestamps are intentionally untouched.
    pub fn release(&self, name: &str) {
        if let Some(mut state) = self.services.get_mut(name) {
            state.active = state.active.saturating_sub(1);
        }
    }

    /// Current active-use count (diagnostics).
    pub fn active_count(&self, name: &str) -> usize {
        self.services.get(name).map(|s| s.active).unwrap_or(0)
    }
}

impl Default for ServiceTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RateLimit;
    use std::time::Duration;

    #[test]
    fn concurrency_slots_bound_reservations() {
        let table = ServiceTable::new();
        table
            .register(ServiceSpec::new("api").concurrent(2))
            .unwrap();

        let now = Instant::now();
        assert!(table.try_reserve("api", now));
        assert!(table.try_reserve("api", now));
        assert!(!table.try_reserve("api", now));
        assert_eq!(table.admit_state("api", now), AdmitState::AtConcurrency);

        table.release("api");
        assert!(table.try_reserve("api", now));
    }

    #[test]
    fn release_does_not_refund_the_window() {
        let table = ServiceTable::new();
        table
            .register(
                ServiceSpec::new("api").rate(RateLimit::new(2, Duration::from_secs(60))),
            )
            .unwrap();

        let now = Instant::now();
        assert!(table.try_reserve("api", now));
        table.release("api");
        assert!(table.try_reserve("api", now));
        table.release("api");

        // Both dispatches still inside the window: budget exhausted even
        // though no slot is held.
        assert_eq!(table.admit_state("api", now), AdmitState::RateExhausted);
        assert!(!table.try_reserve("api", now));
    }

    #[test]
    fn window_timestamps_age_out() {
        let table = ServiceTable::new();
        table
            .register(
                ServiceSpec::new("api").rate(RateLimit::new(1, Duration::from_millis(10))),
            )
            .unwrap();

        let start = Instant::now();
        assert!(table.try_reserve("api", start));
        assert!(!table.can_admit("api", start));
        // Past the window the old timestamp is evicted.
        assert!(table.can_admit("api", start + Duration::from_millis(11)));
    }

    #[test]
    fn unlimited_service_always_admits() {
        let table = ServiceTable::new();
        table.register(ServiceSpec::new("local")).unwrap();
        let now = Instant::now();
        for _ in 0..100 {
            assert!(table.try_reserve("local", now));
        }
    }

    #[test]
    fn zero_rate_admits_nothing() {
        let table = ServiceTable::new();
        table
            .register(ServiceSpec::new("api").rate(RateLimit::new(0, Duration::from_secs(1))))
            .unwrap();
        assert!(!table.try_reserve("api", Instant::now()));
    }

    #[test]
    fn conflicting_reregistration_is_rejected() {
        let table = ServiceTable::new();
        table
            .register(ServiceSpec::new("api").concurrent(2))
            .unwrap();
        // Identical spec: fine.
        table
            .register(ServiceSpec::new("api").concurrent(2))
            .unwrap();
        // Different spec: config error.
        let err = table
            .register(ServiceSpec::new("api").concurrent(3))
            .unwrap_err();
        assert_eq!(err.as_label(), "cue_config");
    }

    #[test]
    fn unknown_service_is_classified() {
        let table = ServiceTable::new();
        assert_eq!(
            table.admit_state("ghost", Instant::now()),
            AdmitState::Unknown
        );
        assert!(!table.try_reserve("ghost", Instant::now()));
    }
}
