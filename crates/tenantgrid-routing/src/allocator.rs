//! Priority allocators for the shared listener.
//!
//! Listener rule priorities live in `[1, 50000)` and must be unique per
//! listener. The allocator only proposes a priority; the listener performs
//! the uniqueness check on insert, so a proposal that collides is simply
//! re-drawn by the caller.
//!
//! - [`RandomDraw`] draws uniformly over `[0, 50000)` without looking at
//!   occupancy. Collisions are possible (birthday bound) and a draw of `0`
//!   is rejected by the listener. This is the default.
//! - [`Sequential`] and [`TenantHash`] consult occupancy and never propose a
//!   taken slot.

use std::collections::{BTreeMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sha2::{Digest, Sha256};
use tenantgrid_core::config::AllocatorKind;
use tenantgrid_state::RoutingRule;

/// Exclusive upper bound of the priority space.
pub const PRIORITY_SPACE: u32 = 50_000;

/// Identity of the rule a priority is being allocated for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleKey {
    pub tenant_id: String,
    pub service_name: String,
}

/// Read-only view of the priorities already registered on a listener.
#[derive(Clone, Copy)]
pub struct Occupied<'a>(pub(crate) &'a BTreeMap<u32, RoutingRule>);

impl Occupied<'_> {
    pub fn contains(&self, priority: u32) -> bool {
        self.0.contains_key(&priority)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Proposes listener rule priorities.
///
/// Called with the listener lock held. `None` means the allocator has
/// nothing left to propose.
pub trait RuleAllocator: Send {
    fn name(&self) -> &'static str;

    fn next_priority(&mut self, key: &RuleKey, occupied: Occupied<'_>) -> Option<u32>;
}

/// Build the allocator selected in config.
pub fn allocator_for(kind: AllocatorKind) -> Box<dyn RuleAllocator> {
    match kind {
        AllocatorKind::Random => Box::new(RandomDraw::new()),
        AllocatorKind::Sequential => Box::new(Sequential),
        AllocatorKind::TenantHash => Box::new(TenantHash),
    }
}

// ── Random draw ────────────────────────────────────────────────────

/// Uniform draw over `[0, 50000)`, blind to occupancy.
pub struct RandomDraw {
    rng: StdRng,
}

impl RandomDraw {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
        }
    }

    /// Deterministic sequence, for reproducible runs.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for RandomDraw {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleAllocator for RandomDraw {
    fn name(&self) -> &'static str {
        "random"
    }

    fn next_priority(&mut self, _key: &RuleKey, _occupied: Occupied<'_>) -> Option<u32> {
        Some(self.rng.random_range(0..PRIORITY_SPACE))
    }
}

// ── Sequential ─────────────────────────────────────────────────────

/// Lowest free priority.
pub struct Sequential;

impl RuleAllocator for Sequential {
    fn name(&self) -> &'static str {
        "sequential"
    }

    fn next_priority(&mut self, _key: &RuleKey, occupied: Occupied<'_>) -> Option<u32> {
        (1..PRIORITY_SPACE).find(|p| !occupied.contains(*p))
    }
}

// ── Tenant hash ────────────────────────────────────────────────────

/// Stable priority derived from `tenant/service`, probing forward past
/// occupied slots.
pub struct TenantHash;

impl TenantHash {
    /// Home slot for a key, in `[1, 50000)`.
    pub fn home_slot(key: &RuleKey) -> u32 {
        let digest = Sha256::digest(format!("{}/{}", key.tenant_id, key.service_name).as_bytes());
        let h = digest
            .iter()
            .take(8)
            .fold(0u64, |acc, b| (acc << 8) | u64::from(*b));
        1 + (h % u64::from(PRIORITY_SPACE - 1)) as u32
    }
}

impl RuleAllocator for TenantHash {
    fn name(&self) -> &'static str {
        "tenant-hash"
    }

    fn next_priority(&mut self, key: &RuleKey, occupied: Occupied<'_>) -> Option<u32> {
        let span = PRIORITY_SPACE - 1;
        let home = Self::home_slot(key) - 1;
        (0..span)
            .map(|offset| 1 + (home + offset) % span)
            .find(|p| !occupied.contains(*p))
    }
}

// ── Scripted ───────────────────────────────────────────────────────

/// Replays a fixed list of priorities, repeating the last one forever.
///
/// Used to force collisions deterministically.
pub struct ScriptedAllocator {
    queue: VecDeque<u32>,
    last: Option<u32>,
}

impl ScriptedAllocator {
    pub fn new(priorities: impl IntoIterator<Item = u32>) -> Self {
        Self {
            queue: priorities.into_iter().collect(),
            last: None,
        }
    }
}

impl RuleAllocator for ScriptedAllocator {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn next_priority(&mut self, _key: &RuleKey, _occupied: Occupied<'_>) -> Option<u32> {
        if let Some(p) = self.queue.pop_front() {
            self.last = Some(p);
        }
        self.last
    }
}
