//! C5 — Replica Selector.
//!
//! Chooses one replica per segment group deterministically. The default
//! policy is round-robin keyed by an opaque hash derived from the
//! request; the selector is stateful across requests so the cursor
//! advances globally, and must be safe for concurrent use without a
//! process-wide singleton lock (spec.md §9) — realized with `dashmap`,
//! whose per-shard locking gives exactly that fine-grained
//! synchronization, sourced from this workspace's `knhk` sibling crate's
//! ambient stack.

use std::hash::{Hash, Hasher};

use dashmap::DashMap;
use std::collections::hash_map::DefaultHasher;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::model::{SegmentIdSet, ServerInstance};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionGranularity {
    PerSegment,
    PerSegmentIdSet,
}

/// Deterministic replica-selection policy. Pluggable per spec.md §9's
/// design note: a closed set of variants `{RoundRobin, Random, Hash}`,
/// chosen by configuration at dispatch time, not by dynamic discovery.
pub trait ReplicaPolicy: Send + Sync {
    fn select<'a>(
        &self,
        group_key: u64,
        candidates: &'a [ServerInstance],
    ) -> Option<&'a ServerInstance>;
}

/// Global per-replica-set counter, advanced under fine-grained
/// synchronization (one `AtomicUsize` per group key, held in a
/// `DashMap`), never a single process-wide lock.
#[derive(Default)]
pub struct RoundRobinPolicy {
    cursors: DashMap<u64, AtomicUsize>,
}

impl ReplicaPolicy for RoundRobinPolicy {
    fn select<'a>(
        &self,
        group_key: u64,
        candidates: &'a [ServerInstance],
    ) -> Option<&'a ServerInstance> {
        if candidates.is_empty() {
            return None;
        }
        let cursor = self.cursors.entry(group_key).or_insert_with(|| AtomicUsize::new(0));
        let idx = cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        candidates.get(idx)
    }
}

pub struct ReplicaSelector {
    policy: Box<dyn ReplicaPolicy>,
    granularity: SelectionGranularity,
}

impl Default for ReplicaSelector {
    fn default() -> Self {
        Self {
            policy: Box::new(RoundRobinPolicy::default()),
            granularity: SelectionGranularity::PerSegmentIdSet,
        }
    }
}

impl ReplicaSelector {
    pub fn new(policy: Box<dyn ReplicaPolicy>, granularity: SelectionGranularity) -> Self {
        Self { policy, granularity }
    }

    /// Group key for the current granularity. Per-segment-id-set (the
    /// default) hashes the sorted segment names as a unit; per-segment
    /// would hash each segment name individually, producing a cursor per
    /// segment instead of per group — left as a future granularity for
    /// callers that need it, not exercised by this selector's current
    /// call sites.
    pub fn group_key(&self, segments: &SegmentIdSet, hash_key: &str) -> u64 {
        let mut hasher = DefaultHasher::new();
        hash_key.hash(&mut hasher);
        if self.granularity == SelectionGranularity::PerSegmentIdSet {
            let mut sorted: Vec<&String> = segments.iter().collect();
            sorted.sort();
            for seg in sorted {
                seg.hash(&mut hasher);
            }
        }
        hasher.finish()
    }

    pub fn select<'a>(
        &self,
        segments: &SegmentIdSet,
        hash_key: &str,
        candidates: &'a [ServerInstance],
    ) -> Option<&'a ServerInstance> {
        let key = self.group_key(segments, hash_key);
        self.policy.select(key, candidates)
    }
}

/// One distinct segment assignment together with every server that
/// claims to hold it — the "candidate replicas per segment group" input
/// spec.md §4.5 describes. Grouping is by segment-set equality since the
/// routing provider's lookup may list several replica servers against
/// the identical segment set.
pub struct SegmentGroup {
    pub segments: SegmentIdSet,
    pub candidates: Vec<ServerInstance>,
}

/// Group a raw `{server -> segments}` candidate map (C4's output) by
/// identical segment assignment. `SegmentIdSet` (a `HashSet<String>`)
/// cannot itself be a `HashMap` key, so grouping is done by linear scan —
/// the candidate counts per request are small (replica factor, typically
/// single digits), so this stays cheap in practice.
pub fn group_by_segments(
    candidates: std::collections::HashMap<ServerInstance, SegmentIdSet>,
) -> Vec<SegmentGroup> {
    let mut groups: Vec<SegmentGroup> = Vec::new();
    'servers: for (server, segments) in candidates {
        for group in groups.iter_mut() {
            if group.segments == segments {
                group.candidates.push(server);
                continue 'servers;
            }
        }
        groups.push(SegmentGroup {
            segments,
            candidates: vec![server],
        });
    }
    groups
}

impl ReplicaSelector {
    /// Pick one replica per segment group, producing the final
    /// `{server -> segments}` assignment the dispatcher fans out over.
    pub fn select_assignment(
        &self,
        groups: Vec<SegmentGroup>,
        hash_key: &str,
    ) -> std::collections::HashMap<ServerInstance, SegmentIdSet> {
        let mut assignment = std::collections::HashMap::new();
        for group in groups {
            if let Some(server) = self.select(&group.segments, hash_key, &group.candidates) {
                assignment.insert(server.clone(), group.segments);
            }
        }
        assignment
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn servers(n: usize) -> Vec<ServerInstance> {
        (0..n).map(|i| ServerInstance::new(format!("s{i}"), 8080)).collect()
    }

    fn segs(names: &[&str]) -> SegmentIdSet {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn round_robin_cycles_through_candidates() {
        let selector = ReplicaSelector::default();
        let candidates = servers(3);
        let segments = segs(&["seg0"]);

        let picks: Vec<_> = (0..6)
            .map(|_| selector.select(&segments, "h", &candidates).unwrap().hostname.clone())
            .collect();

        assert_eq!(picks, vec!["s0", "s1", "s2", "s0", "s1", "s2"]);
    }

    #[test]
    fn different_segment_groups_advance_independent_cursors() {
        let selector = ReplicaSelector::default();
        let candidates = servers(2);

        let a = selector.select(&segs(&["a"]), "h", &candidates).unwrap().hostname.clone();
        let b = selector.select(&segs(&["b"]), "h", &candidates).unwrap().hostname.clone();
        // Fresh cursors both start at index 0.
        assert_eq!(a, "s0");
        assert_eq!(b, "s0");
    }

    #[test]
    fn empty_candidates_returns_none() {
        let selector = ReplicaSelector::default();
        assert!(selector.select(&segs(&["a"]), "h", &[]).is_none());
    }

    #[test]
    fn concurrent_selection_is_safe() {
        use std::sync::Arc;
        use std::thread;

        let selector = Arc::new(ReplicaSelector::default());
        let candidates = Arc::new(servers(4));
        let segments = Arc::new(segs(&["seg0"]));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let selector = Arc::clone(&selector);
                let candidates = Arc::clone(&candidates);
                let segments = Arc::clone(&segments);
                thread::spawn(move || {
                    for _ in 0..100 {
                        assert!(selector.select(&segments, "h", &candidates).is_some());
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
    }

    #[test]
    fn group_by_segments_merges_replica_servers() {
        use std::collections::HashMap;

        let shared = segs(&["seg0", "seg1"]);
        let mut candidates = HashMap::new();
        candidates.insert(ServerInstance::new("s0", 8080), shared.clone());
        candidates.insert(ServerInstance::new("s1", 8080), shared.clone());
        candidates.insert(ServerInstance::new("s2", 8080), segs(&["seg2"]));

        let groups = group_by_segments(candidates);
        assert_eq!(groups.len(), 2);
        let shared_group = groups.iter().find(|g| g.segments == shared).unwrap();
        assert_eq!(shared_group.candidates.len(), 2);
    }

    #[test]
    fn select_assignment_picks_one_server_per_group() {
        use std::collections::HashMap;

        let shared = segs(&["seg0"]);
        let mut candidates = HashMap::new();
        candidates.insert(ServerInstance::new("s0", 8080), shared.clone());
        candidates.insert(ServerInstance::new("s1", 8080), shared.clone());

        let groups = group_by_segments(candidates);
        let selector = ReplicaSelector::default();
        let assignment = selector.select_assignment(groups, "h");
        assert_eq!(assignment.len(), 1);
    }
}
