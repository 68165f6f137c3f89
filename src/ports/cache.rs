//! Cache Port - Small On-Disk Caches
//!
//! Two caches survive restarts: detected plan tiers (keyed by
//! credential fingerprint) and the last economy snapshot. Both are
//! best-effort; a missing or unreadable cache is `Ok(None)` territory
//! for callers, and write failures are logged, not fatal.

use async_trait::async_trait;

use crate::domain::capability::PlanCapability;
use crate::domain::economy::EconomySnapshot;

/// Persisted plan tiers.
#[async_trait]
pub trait CapabilityStore: Send + Sync + 'static {
    /// Cached plan for `fingerprint`, if any.
    async fn load(&self, fingerprint: &str) -> anyhow::Result<Option<PlanCapability>>;

    /// Store the plan for `fingerprint`, keeping entries for other keys.
    async fn save(&self, fingerprint: &str, plan: &PlanCapability) -> anyhow::Result<()>;
}

/// Persisted economy snapshot.
#[async_trait]
pub trait EconomyStore: Send + Sync + 'static {
    async fn load(&self) -> anyhow::Result<Option<EconomySnapshot>>;

    async fn save(&self, snapshot: &EconomySnapshot) -> anyhow::Result<()>;
}
