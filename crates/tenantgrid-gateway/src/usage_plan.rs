//! Per-tier usage plans and their API keys.
//!
//! Key values are derived from the edge's public API URL and the tier, so
//! anyone can recompute them. They are stand-ins for the emulator that
//! identify a usage plan. They are not secrets and do not authenticate callers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tenantgrid_core::Tier;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiKey {
    pub name: String,
    pub value: String,
}

impl ApiKey {
    /// Stable, publicly derivable key for a tier of one edge deployment.
    pub fn derive(seed: &str, tier: Tier) -> Self {
        let digest = Sha256::digest(format!("{seed}/{tier}").as_bytes());
        Self {
            name: format!("api-key-{tier}"),
            value: hex::encode(&digest[..20]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsagePlan {
    pub tier: Tier,
    /// Requests per day.
    pub quota_per_day: u32,
    pub burst_limit: u32,
    /// Steady-state requests per second.
    pub rate_limit: u32,
    pub api_key: ApiKey,
}

impl UsagePlan {
    pub fn for_tier(tier: Tier, seed: &str) -> Self {
        let (quota_per_day, burst_limit, rate_limit) = match tier {
            Tier::Basic => (1_000, 50, 50),
            Tier::Advanced => (3_000, 100, 75),
            Tier::Premium => (5_000, 200, 100),
            Tier::Platinum => (10_000, 300, 300),
        };
        Self {
            tier,
            quota_per_day,
            burst_limit,
            rate_limit,
            api_key: ApiKey::derive(seed, tier),
        }
    }

    /// One plan per tier.
    pub fn standard(seed: &str) -> Vec<Self> {
        Tier::ALL.iter().map(|t| Self::for_tier(*t, seed)).collect()
    }
}

/// The plan for a tier, falling back to the basic plan.
pub fn plan_for(plans: &[UsagePlan], tier: Tier) -> Option<&UsagePlan> {
    plans
        .iter()
        .find(|p| p.tier == tier)
        .or_else(|| plans.iter().find(|p| p.tier == Tier::Basic))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_grow_with_tier() {
        let plans = UsagePlan::standard("https://api.example.com");
        let quotas: Vec<u32> = plans.iter().map(|p| p.quota_per_day).collect();
        assert_eq!(quotas, vec![1_000, 3_000, 5_000, 10_000]);
        let platinum = &plans[3];
        assert_eq!((platinum.burst_limit, platinum.rate_limit), (300, 300));
    }

    #[test]
    fn keys_are_stable_and_distinct() {
        let a = ApiKey::derive("seed", Tier::Basic);
        assert_eq!(a, ApiKey::derive("seed", Tier::Basic));
        assert_ne!(a.value, ApiKey::derive("seed", Tier::Premium).value);
        assert_ne!(a.value, ApiKey::derive("other", Tier::Basic).value);
        assert_eq!(a.value.len(), 40);
    }

    #[test]
    fn missing_plan_falls_back_to_basic() {
        let plans = vec![UsagePlan::for_tier(Tier::Basic, "s")];
        assert_eq!(plan_for(&plans, Tier::Premium).unwrap().tier, Tier::Basic);
        assert!(plan_for(&[], Tier::Basic).is_none());
    }
}
