//! Data-plan capability tiers.
//!
//! Each asset class is entitled independently. The tier decides which
//! channel the class may use: batch snapshots, a streaming feed (real
//! time or delayed), or the per-symbol bar fallback.

use serde::{Deserialize, Serialize};

use super::ticker::AssetClass;

/// Entitlement level for one asset class, ordered from least to most
/// capable so tiers can be compared and floored with `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    /// No usable entitlement; the class is not fetched at all.
    None,
    /// Per-symbol bar polling only (free plans).
    Polling,
    /// Batch snapshots plus a delayed streaming feed.
    Streaming,
    /// Batch snapshots plus a real-time streaming feed.
    RealTime,
}

impl CapabilityTier {
    /// Whether one batch snapshot call can cover the whole watchlist.
    pub const fn has_batch_snapshot(self) -> bool {
        matches!(self, Self::Streaming | Self::RealTime)
    }

    /// Whether a streaming connection may be opened.
    pub const fn has_streaming(self) -> bool {
        matches!(self, Self::Streaming | Self::RealTime)
    }

    /// Whether streamed data is real time (no post-close drain needed).
    pub const fn is_real_time(self) -> bool {
        matches!(self, Self::RealTime)
    }

    /// Whether the class can be fetched by any channel.
    pub const fn is_entitled(self) -> bool {
        !matches!(self, Self::None)
    }
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::None => "none",
            Self::Polling => "polling",
            Self::Streaming => "streaming",
            Self::RealTime => "real_time",
        };
        f.write_str(s)
    }
}

/// Detected tiers for every asset class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCapability {
    #[serde(default = "default_tier")]
    pub stocks: CapabilityTier,
    #[serde(default = "default_tier")]
    pub indices: CapabilityTier,
    #[serde(default = "default_tier")]
    pub currencies: CapabilityTier,
}

impl Default for PlanCapability {
    fn default() -> Self {
        Self {
            stocks: default_tier(),
            indices: default_tier(),
            currencies: default_tier(),
        }
    }
}

impl PlanCapability {
    /// Tier for `class`.
    pub const fn tier(&self, class: AssetClass) -> CapabilityTier {
        match class {
            AssetClass::Stocks => self.stocks,
            AssetClass::Indices => self.indices,
            AssetClass::Crypto => self.currencies,
        }
    }

    /// Replace the tier for `class`.
    pub fn set(&mut self, class: AssetClass, tier: CapabilityTier) {
        match class {
            AssetClass::Stocks => self.stocks = tier,
            AssetClass::Indices => self.indices = tier,
            AssetClass::Crypto => self.currencies = tier,
        }
    }

    /// True when every listed class that streams does so in real time.
    ///
    /// Classes not in `active` are ignored, so a delayed index plan does
    /// not force a grace window on a stocks-only watchlist.
    pub fn all_real_time(&self, active: &[AssetClass]) -> bool {
        active
            .iter()
            .filter(|c| c.follows_session())
            .all(|c| self.tier(*c).is_real_time())
    }
}

/// Lowest tier that still lets the dashboard fill: bar polling.
const fn default_tier() -> CapabilityTier {
    CapabilityTier::Polling
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_flags() {
        assert!(!CapabilityTier::Polling.has_batch_snapshot());
        assert!(!CapabilityTier::Polling.has_streaming());
        assert!(CapabilityTier::Streaming.has_streaming());
        assert!(!CapabilityTier::Streaming.is_real_time());
        assert!(CapabilityTier::RealTime.is_real_time());
        assert!(!CapabilityTier::None.is_entitled());
    }

    #[test]
    fn test_tier_ordering_supports_floor() {
        assert!(CapabilityTier::RealTime > CapabilityTier::Streaming);
        assert_eq!(
            CapabilityTier::Polling.max(CapabilityTier::Streaming),
            CapabilityTier::Streaming
        );
    }

    #[test]
    fn test_all_real_time_ignores_crypto_and_inactive() {
        let plan = PlanCapability {
            stocks: CapabilityTier::RealTime,
            indices: CapabilityTier::Streaming,
            currencies: CapabilityTier::Streaming,
        };
        assert!(plan.all_real_time(&[AssetClass::Stocks, AssetClass::Crypto]));
        assert!(!plan.all_real_time(&[AssetClass::Stocks, AssetClass::Indices]));
    }

    #[test]
    fn test_serde_snake_case_with_defaults() {
        let plan: PlanCapability =
            serde_json::from_str(r#"{"stocks":"real_time","indices":"streaming"}"#).unwrap();
        assert_eq!(plan.stocks, CapabilityTier::RealTime);
        assert_eq!(plan.currencies, CapabilityTier::Polling);
    }
}
