//! Shared proxy pool with selection, scoring, and rotation
//!
//! The pool is the only state shared across site schedulers. It owns every
//! proxy record: `acquire` scans candidates under a pool-wide read lock and
//! binds one under that record's own lock, `release` feeds request outcomes
//! back into the record's counters, and `force_rotate` makes the next
//! acquire for a site prefer a different egress.

use crate::config::{Config, PoolConfig, ProxyEntry, SelectionStrategy};
use crate::proxy::record::{ProxyEndpoint, ProxyHealth, ProxyState};
use crate::state::RequestOutcome;
use crate::ScoutError;
use rand::Rng;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Instant;

/// One proxy in the pool: immutable endpoint plus lock-guarded mutable state
#[derive(Debug)]
pub struct ProxySlot {
    endpoint: ProxyEndpoint,
    state: Mutex<ProxyState>,
}

impl ProxySlot {
    fn new(endpoint: ProxyEndpoint) -> Self {
        Self {
            endpoint,
            state: Mutex::new(ProxyState::new()),
        }
    }

    /// The proxy's immutable identity
    pub fn endpoint(&self) -> &ProxyEndpoint {
        &self.endpoint
    }

    /// Locks the mutable state for inspection or mutation
    pub fn state(&self) -> MutexGuard<'_, ProxyState> {
        self.state.lock().unwrap()
    }
}

/// A bound proxy handed out by `acquire`
///
/// The lease identifies which proxy served the request so the outcome can
/// be scored against the right record via `release`.
#[derive(Debug, Clone)]
pub struct ProxyLease {
    slot: Arc<ProxySlot>,
}

impl ProxyLease {
    /// The endpoint to route the request through
    pub fn endpoint(&self) -> &ProxyEndpoint {
        self.slot.endpoint()
    }
}

/// Per-site selection bookkeeping
#[derive(Debug, Default)]
struct SiteBinding {
    /// Slot index of the proxy most recently handed to this site
    bound: Option<usize>,

    /// Slot index the next acquire should avoid, set by `force_rotate`
    excluded: Option<usize>,
}

/// Snapshot of pool health totals
#[derive(Debug, Clone)]
pub struct PoolStatus {
    pub total: usize,
    pub healthy: usize,
    pub degraded: usize,
    pub deactivated: usize,

    /// Success rate aggregated over every recorded outcome in the pool
    pub success_rate: f64,
}

/// The shared proxy pool
pub struct ProxyPool {
    slots: RwLock<Vec<Arc<ProxySlot>>>,
    settings: PoolConfig,
    round_robin_cursor: AtomicUsize,
    bindings: Mutex<HashMap<String, SiteBinding>>,
}

impl ProxyPool {
    /// Creates a pool from proxy entries and pool-wide settings
    pub fn new(entries: &[ProxyEntry], settings: PoolConfig) -> Self {
        let slots = entries
            .iter()
            .map(|entry| Arc::new(ProxySlot::new(ProxyEndpoint::from_entry(entry))))
            .collect();

        Self {
            slots: RwLock::new(slots),
            settings,
            round_robin_cursor: AtomicUsize::new(0),
            bindings: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a pool from a full configuration
    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.proxies, config.pool.clone())
    }

    /// Number of proxies in the pool
    pub fn len(&self) -> usize {
        self.slots.read().unwrap().len()
    }

    /// Whether the pool holds no proxies at all
    pub fn is_empty(&self) -> bool {
        self.slots.read().unwrap().is_empty()
    }

    /// Pool-wide settings (used by the health prober)
    pub fn settings(&self) -> &PoolConfig {
        &self.settings
    }

    /// Snapshot of every slot, for the health prober's scan
    pub fn slots(&self) -> Vec<Arc<ProxySlot>> {
        self.slots.read().unwrap().clone()
    }

    /// Picks a healthy proxy for the given site
    ///
    /// Selection never returns a Deactivated, Degraded, or site-banned
    /// proxy. When `force_rotate` marked the previously bound proxy, it is
    /// excluded as long as an alternative exists.
    ///
    /// # Errors
    ///
    /// `ScoutError::NoHealthyProxy` when no candidate qualifies. Callers
    /// treat this as fatal-for-now and retry in a later cycle rather than
    /// spinning on the pool.
    pub fn acquire(&self, site: &str) -> Result<ProxyLease, ScoutError> {
        let slots = self.slots.read().unwrap();

        let candidates: Vec<usize> = slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| {
                !slot.endpoint().is_banned_for(site) && slot.state().is_selectable()
            })
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            return Err(ScoutError::NoHealthyProxy {
                site: site.to_string(),
            });
        }

        // Honor a pending rotation exclusion, but never at the cost of
        // returning nothing when the excluded proxy is the only one left
        let excluded = {
            let mut bindings = self.bindings.lock().unwrap();
            bindings.entry(site.to_string()).or_default().excluded.take()
        };

        let eligible: Vec<usize> = match excluded {
            Some(ex) => {
                let filtered: Vec<usize> =
                    candidates.iter().copied().filter(|&i| i != ex).collect();
                if filtered.is_empty() {
                    candidates
                } else {
                    filtered
                }
            }
            None => candidates,
        };

        let chosen = match self.settings.selection_strategy {
            SelectionStrategy::Score => self.select_by_score(&slots, &eligible),
            SelectionStrategy::RoundRobin => self.select_round_robin(&eligible),
            SelectionStrategy::Random => self.select_random(&eligible),
        };

        let slot = slots[chosen].clone();
        slot.state().mark_used(Instant::now());

        {
            let mut bindings = self.bindings.lock().unwrap();
            bindings.entry(site.to_string()).or_default().bound = Some(chosen);
        }

        tracing::debug!(
            "Acquired proxy {} for site {} ({:?})",
            slot.endpoint().label(),
            site,
            self.settings.selection_strategy
        );

        Ok(ProxyLease { slot })
    }

    /// Feeds a request outcome back into the leased proxy's record
    pub fn release(&self, lease: ProxyLease, outcome: &RequestOutcome) {
        let label = lease.endpoint().label();
        let mut state = lease.slot.state();

        if outcome.status.is_success() {
            state.record_success();
        } else {
            let deactivated =
                state.record_failure(outcome.describe(), &self.settings, Instant::now());
            if deactivated {
                tracing::warn!(
                    "Proxy {} deactivated after {} consecutive failures (success rate {:.2})",
                    label,
                    state.consecutive_failures,
                    state.success_rate()
                );
            }
        }
    }

    /// Makes the next `acquire` for this site avoid its currently bound proxy
    pub fn force_rotate(&self, site: &str) {
        let mut bindings = self.bindings.lock().unwrap();
        let binding = bindings.entry(site.to_string()).or_default();
        if let Some(bound) = binding.bound {
            binding.excluded = Some(bound);
            tracing::debug!("Forcing proxy rotation for site {}", site);
        }
    }

    /// Counts proxies by health and aggregates the pool-wide success rate
    pub fn status(&self) -> PoolStatus {
        let slots = self.slots.read().unwrap();

        let mut status = PoolStatus {
            total: slots.len(),
            healthy: 0,
            degraded: 0,
            deactivated: 0,
            success_rate: 0.0,
        };

        let mut successes: u64 = 0;
        let mut samples: u64 = 0;

        for slot in slots.iter() {
            let state = slot.state();
            match state.health {
                ProxyHealth::Healthy => status.healthy += 1,
                ProxyHealth::Degraded => status.degraded += 1,
                ProxyHealth::Deactivated => status.deactivated += 1,
            }
            successes += state.success_count as u64;
            samples += state.sample_count() as u64;
        }

        if samples > 0 {
            status.success_rate = successes as f64 / samples as f64;
        }

        status
    }

    /// Highest success rate wins; ties go to the least-recently-used proxy
    fn select_by_score(&self, slots: &[Arc<ProxySlot>], eligible: &[usize]) -> usize {
        let mut best = eligible[0];
        let (mut best_rate, mut best_used) = {
            let state = slots[best].state();
            (state.success_rate(), state.last_used)
        };

        for &idx in &eligible[1..] {
            let state = slots[idx].state();
            let rate = state.success_rate();
            // None (never used) sorts before any Some, which is exactly
            // the least-recently-used preference
            let better = rate > best_rate || (rate == best_rate && state.last_used < best_used);
            if better {
                best = idx;
                best_rate = rate;
                best_used = state.last_used;
            }
        }

        best
    }

    /// Cyclic walk over the eligible set
    fn select_round_robin(&self, eligible: &[usize]) -> usize {
        let step = self.round_robin_cursor.fetch_add(1, Ordering::Relaxed);
        eligible[step % eligible.len()]
    }

    /// Uniform pick over the eligible set
    fn select_random(&self, eligible: &[usize]) -> usize {
        let pick = rand::thread_rng().gen_range(0..eligible.len());
        eligible[pick]
    }
}
