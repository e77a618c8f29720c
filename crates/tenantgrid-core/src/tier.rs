//! Tier policy — maps a subscription tier to a topology shape.
//!
//! The table is total: every input string resolves to a profile. Unknown
//! tiers fall back to the pooled basic profile so onboarding never
//! hard-fails on a typo; the fallback is logged at `warn`.
//!
//! | Tier | Isolation | Substrate | Reverse proxy |
//! |---|---|---|---|
//! | basic / unknown | pooled | fargate | no |
//! | advanced | siloed | ec2 | yes |
//! | premium | siloed | ec2 | yes |
//! | platinum | siloed | ec2 | yes |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

/// Minimum replica count for every tenant service.
pub const MIN_CAPACITY: u32 = 2;

/// Maximum replica count for every tenant service.
pub const MAX_CAPACITY: u32 = 5;

/// Subscription tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Basic,
    Advanced,
    Premium,
    Platinum,
}

impl Tier {
    pub const ALL: [Tier; 4] = [Tier::Basic, Tier::Advanced, Tier::Premium, Tier::Platinum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Advanced => "advanced",
            Tier::Premium => "premium",
            Tier::Platinum => "platinum",
        }
    }

    /// Lenient parse: unknown or empty input yields `None`.
    pub fn parse_lenient(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "basic" => Some(Tier::Basic),
            "advanced" => Some(Tier::Advanced),
            "premium" => Some(Tier::Premium),
            "platinum" => Some(Tier::Platinum),
            _ => None,
        }
    }
}

impl FromStr for Tier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Tier::parse_lenient(s).ok_or_else(|| CoreError::UnknownTier(s.to_string()))
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How strongly a tenant's compute is isolated from other tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationMode {
    Pooled,
    Siloed,
}

/// Compute substrate a tenant's services run on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComputeSubstrate {
    Fargate,
    Ec2,
}

/// Topology shape derived from a tier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierProfile {
    pub tier: Tier,
    pub isolation_mode: IsolationMode,
    pub compute_substrate: ComputeSubstrate,
    pub requires_reverse_proxy: bool,
    pub min_capacity: u32,
    pub max_capacity: u32,
}

impl TierProfile {
    /// Profile for an already-parsed tier.
    pub fn for_tier(tier: Tier) -> Self {
        let siloed = !matches!(tier, Tier::Basic);
        Self {
            tier,
            isolation_mode: if siloed {
                IsolationMode::Siloed
            } else {
                IsolationMode::Pooled
            },
            compute_substrate: if siloed {
                ComputeSubstrate::Ec2
            } else {
                ComputeSubstrate::Fargate
            },
            requires_reverse_proxy: siloed,
            min_capacity: MIN_CAPACITY,
            max_capacity: MAX_CAPACITY,
        }
    }
}

/// The tier decision table.
pub struct TierPolicy;

impl TierPolicy {
    /// Resolve a raw tier string to its profile. Never fails.
    pub fn resolve(tier: &str) -> TierProfile {
        match Tier::parse_lenient(tier) {
            Some(t) => TierProfile::for_tier(t),
            None => {
                warn!(tier, "unknown tier, falling back to pooled basic profile");
                TierProfile::for_tier(Tier::Basic)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pooled_tiers() {
        for raw in ["basic", "BASIC", "unknown", "", "  ", "gold"] {
            let p = TierPolicy::resolve(raw);
            assert_eq!(p.isolation_mode, IsolationMode::Pooled, "tier {raw:?}");
            assert_eq!(p.compute_substrate, ComputeSubstrate::Fargate, "tier {raw:?}");
            assert!(!p.requires_reverse_proxy, "tier {raw:?}");
            assert_eq!(p.tier, Tier::Basic);
        }
    }

    #[test]
    fn siloed_tiers_case_insensitive() {
        for raw in ["advanced", "Premium", "PLATINUM", " premium "] {
            let p = TierPolicy::resolve(raw);
            assert_eq!(p.isolation_mode, IsolationMode::Siloed, "tier {raw:?}");
            assert_eq!(p.compute_substrate, ComputeSubstrate::Ec2, "tier {raw:?}");
            assert!(p.requires_reverse_proxy, "tier {raw:?}");
        }
    }

    #[test]
    fn capacity_is_fixed() {
        for tier in Tier::ALL {
            let p = TierProfile::for_tier(tier);
            assert_eq!((p.min_capacity, p.max_capacity), (2, 5));
        }
    }

    #[test]
    fn strict_parse_rejects_unknown() {
        assert_eq!("Advanced".parse::<Tier>().unwrap(), Tier::Advanced);
        assert!(matches!("silver".parse::<Tier>(), Err(CoreError::UnknownTier(_))));
    }

    #[test]
    fn tier_serializes_lowercase() {
        let json = serde_json::to_string(&Tier::Platinum).unwrap();
        assert_eq!(json, "\"platinum\"");
    }
}
