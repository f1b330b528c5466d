//! Proxy pool module
//!
//! This module owns every proxy record and all mutation of proxy state.
//!
//! # Components
//!
//! - `ProxyEndpoint` / `ProxyState`: a proxy's immutable identity and its
//!   lock-guarded health, counters, and cooldown state
//! - `ProxyPool`: selection (score / round-robin / random), outcome scoring,
//!   and forced rotation, shared by every site scheduler
//! - `HealthProber`: the background loop that re-qualifies proxies after
//!   cooldown and optionally hygiene-checks healthy ones

mod pool;
mod prober;
mod record;

// Re-export main types
pub use pool::{PoolStatus, ProxyLease, ProxyPool, ProxySlot};
pub use prober::{probe_endpoint, HealthProber, ProbeOutcome};
pub use record::{ProxyEndpoint, ProxyHealth, ProxyState};
