//! Target-tracking autoscaling for tenant services.
//!
//! Each backend service scales between the profile's capacity bounds with
//! two independent target-tracking triggers, memory and CPU, both at 75%.
//! Either trigger above target scales out; scale-in happens only when both
//! are below target.

use serde::{Deserialize, Serialize};
use tenantgrid_core::TierProfile;
use tracing::debug;

/// Target utilization of both triggers, in percent.
pub const TARGET_UTILIZATION_PCT: f64 = 75.0;

/// A scaling decision for a single service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScaleDecision {
    /// Scale to the specified task count.
    ScaleTo(u32),
    /// No change needed.
    NoChange,
}

/// Observed average utilization of a service, in percent.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Utilization {
    pub cpu_pct: f64,
    pub memory_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalingPolicy {
    pub service: String,
    pub min_capacity: u32,
    pub max_capacity: u32,
    pub memory_target_pct: f64,
    pub cpu_target_pct: f64,
}

impl ScalingPolicy {
    pub fn for_service(service: &str, profile: &TierProfile) -> Self {
        Self {
            service: service.to_string(),
            min_capacity: profile.min_capacity,
            max_capacity: profile.max_capacity,
            memory_target_pct: TARGET_UTILIZATION_PCT,
            cpu_target_pct: TARGET_UTILIZATION_PCT,
        }
    }

    /// Decide the task count for `current` running tasks at `usage`.
    pub fn evaluate(&self, current: u32, usage: &Utilization) -> ScaleDecision {
        let clamp = |n: u32| n.clamp(self.min_capacity, self.max_capacity);

        if current < self.min_capacity || current > self.max_capacity {
            return ScaleDecision::ScaleTo(clamp(current));
        }

        // Task count each trigger would track to on its own.
        let desired = |value: f64, target: f64| -> u32 {
            ((f64::from(current) * value / target).ceil() as u32).max(1)
        };
        let by_memory = desired(usage.memory_pct, self.memory_target_pct);
        let by_cpu = desired(usage.cpu_pct, self.cpu_target_pct);

        let memory_high = usage.memory_pct > self.memory_target_pct;
        let cpu_high = usage.cpu_pct > self.cpu_target_pct;

        if memory_high || cpu_high {
            let to = clamp(by_memory.max(by_cpu));
            if to > current {
                debug!(
                    service = %self.service,
                    from = current,
                    to,
                    cpu = usage.cpu_pct,
                    memory = usage.memory_pct,
                    "scaling out"
                );
                return ScaleDecision::ScaleTo(to);
            }
            return ScaleDecision::NoChange;
        }

        let memory_low = usage.memory_pct < self.memory_target_pct;
        let cpu_low = usage.cpu_pct < self.cpu_target_pct;
        if memory_low && cpu_low {
            let to = clamp(by_memory.max(by_cpu));
            if to < current {
                debug!(
                    service = %self.service,
                    from = current,
                    to,
                    cpu = usage.cpu_pct,
                    memory = usage.memory_pct,
                    "scaling in"
                );
                return ScaleDecision::ScaleTo(to);
            }
        }

        ScaleDecision::NoChange
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenantgrid_core::Tier;

    fn policy() -> ScalingPolicy {
        ScalingPolicy::for_service("orders", &TierProfile::for_tier(Tier::Basic))
    }

    fn usage(cpu: f64, memory: f64) -> Utilization {
        Utilization {
            cpu_pct: cpu,
            memory_pct: memory,
        }
    }

    #[test]
    fn defaults_from_profile() {
        let p = policy();
        assert_eq!((p.min_capacity, p.max_capacity), (2, 5));
        assert_eq!(p.memory_target_pct, 75.0);
        assert_eq!(p.cpu_target_pct, 75.0);
    }

    #[test]
    fn either_trigger_scales_out() {
        let p = policy();
        assert_eq!(p.evaluate(2, &usage(150.0, 10.0)), ScaleDecision::ScaleTo(4));
        assert_eq!(p.evaluate(2, &usage(10.0, 120.0)), ScaleDecision::ScaleTo(4));
    }

    #[test]
    fn scale_out_is_capped() {
        assert_eq!(policy().evaluate(4, &usage(300.0, 300.0)), ScaleDecision::ScaleTo(5));
        assert_eq!(policy().evaluate(5, &usage(300.0, 300.0)), ScaleDecision::NoChange);
    }

    #[test]
    fn scale_in_needs_both_low() {
        let p = policy();
        // CPU low but memory at target: hold.
        assert_eq!(p.evaluate(4, &usage(10.0, 75.0)), ScaleDecision::NoChange);
        assert_eq!(p.evaluate(4, &usage(10.0, 20.0)), ScaleDecision::ScaleTo(2));
    }

    #[test]
    fn scale_in_respects_min() {
        assert_eq!(policy().evaluate(2, &usage(0.0, 0.0)), ScaleDecision::NoChange);
    }

    #[test]
    fn out_of_bounds_count_is_clamped() {
        assert_eq!(policy().evaluate(0, &usage(0.0, 0.0)), ScaleDecision::ScaleTo(2));
        assert_eq!(policy().evaluate(9, &usage(50.0, 50.0)), ScaleDecision::ScaleTo(5));
    }
}
