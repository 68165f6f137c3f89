//! Capability Registry - Plan Tier Detection
//!
//! Probes each asset class once against its seed symbol and caches the
//! result keyed by a fingerprint of the API key. A cached plan is
//! trusted until the cache is removed by hand.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::domain::capability::{CapabilityTier, PlanCapability};
use crate::domain::ticker::AssetClass;
use crate::ports::cache::CapabilityStore;
use crate::ports::market_data::MarketDataProvider;

/// Bytes of the digest kept in the fingerprint.
const FINGERPRINT_BYTES: usize = 8;

/// Stable, non-reversible cache key for an API credential.
pub fn fingerprint(api_key: &str) -> String {
    let digest = hmac_sha256::Hash::hash(api_key.as_bytes());
    digest[..FINGERPRINT_BYTES]
        .iter()
        .map(|b| format!("{b:02x}"))
        .collect()
}

/// Detects and remembers plan tiers.
pub struct CapabilityRegistry {
    provider: Arc<dyn MarketDataProvider>,
    store: Arc<dyn CapabilityStore>,
    fingerprint: String,
}

impl CapabilityRegistry {
    pub fn new(
        provider: Arc<dyn MarketDataProvider>,
        store: Arc<dyn CapabilityStore>,
        api_key: &str,
    ) -> Self {
        Self {
            provider,
            store,
            fingerprint: fingerprint(api_key),
        }
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Cached plan if present, otherwise probe every class and cache.
    ///
    /// Never fails: cache errors are logged and treated as a miss, and
    /// probe errors fall back to bar polling for that class.
    #[instrument(skip(self), fields(fingerprint = %self.fingerprint))]
    pub async fn load_or_probe(&self) -> PlanCapability {
        match self.store.load(&self.fingerprint).await {
            Ok(Some(plan)) => {
                info!(
                    stocks = %plan.stocks,
                    indices = %plan.indices,
                    currencies = %plan.currencies,
                    "Using cached plan capability"
                );
                return plan;
            }
            Ok(None) => {}
            Err(e) => warn!(error = %e, "Plan cache unreadable, probing"),
        }

        info!("Detecting API plan entitlements");
        let mut plan = PlanCapability::default();
        for class in AssetClass::ALL {
            plan.set(class, self.detect(class).await);
        }

        if let Err(e) = self.store.save(&self.fingerprint, &plan).await {
            warn!(error = %e, "Failed to persist plan capability");
        }
        info!(
            stocks = %plan.stocks,
            indices = %plan.indices,
            currencies = %plan.currencies,
            "Plan capability detected"
        );
        plan
    }

    /// Probe one class.
    ///
    /// A usable batch snapshot proves the starter tier, which bundles a
    /// delayed websocket; crypto starter streams in real time. A rejected
    /// probe means bar polling, and so does a probe that failed outright.
    /// Probes only run on a cache miss, so no cached tier is ever lowered.
    pub async fn detect(&self, class: AssetClass) -> CapabilityTier {
        match self.provider.probe_capability(class).await {
            Ok(true) if class == AssetClass::Crypto => CapabilityTier::RealTime,
            Ok(true) => CapabilityTier::Streaming,
            Ok(false) => CapabilityTier::Polling,
            Err(e) => {
                warn!(class = %class, error = %e, "Capability probe failed");
                CapabilityTier::Polling
            }
        }
    }
}
