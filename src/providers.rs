//! A5 — external collaborator contracts and their in-process stand-ins.
//!
//! `RoutingProvider` and `TimeBoundaryProvider` are the trait contracts
//! spec.md §6 specifies for the routing-table provider and time-boundary
//! provider, both out of scope as production collaborators. The `Static*`
//! implementations here are deterministic, test-friendly stand-ins —
//! never the production routing layer — grounded in
//! `swarm::gossip::GossipRegistry`'s `OnceLock`-backed read-snapshot
//! style (the concurrency-safe snapshot shape is reused; gossip/cluster
//! membership itself is not, per spec.md §1's Non-goals).

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::model::{SegmentIdSet, ServerInstance};

#[derive(Debug, Clone, PartialEq)]
pub struct OwnedTimeBoundaryInfo {
    pub time_column: String,
    pub time_value: i64,
}

/// Read-only snapshot of `{server -> segment set}` per physical table.
/// Must be safe for concurrent reads; the same lookup within one request
/// must return the same mapping (callers may cache).
#[async_trait]
pub trait RoutingProvider: Send + Sync {
    async fn exists(&self, physical_table_name: &str) -> bool;
    async fn lookup(
        &self,
        physical_table_name: &str,
        routing_options: &[String],
    ) -> HashMap<ServerInstance, SegmentIdSet>;
    async fn dump_snapshot(&self, table_name: &str) -> String;
}

#[async_trait]
pub trait TimeBoundaryProvider: Send + Sync {
    async fn get_time_boundary_info_for(
        &self,
        offline_table_name: &str,
    ) -> Option<OwnedTimeBoundaryInfo>;
}

/// In-memory routing snapshot. `routing_options` is accepted but ignored
/// by this stand-in — a real provider would use it to scope the lookup
/// (e.g. to a tenant or replica group).
#[derive(Default)]
pub struct StaticRoutingProvider {
    tables: RwLock<HashMap<String, HashMap<ServerInstance, SegmentIdSet>>>,
}

impl StaticRoutingProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with no assigned servers (useful for `exists`
    /// checks in tests that don't care about dispatch targets).
    pub fn register_table(&self, physical_table_name: &str) {
        self.tables
            .write()
            .entry(physical_table_name.to_string())
            .or_default();
    }

    pub fn assign(&self, physical_table_name: &str, server: ServerInstance, segments: SegmentIdSet) {
        self.tables
            .write()
            .entry(physical_table_name.to_string())
            .or_default()
            .insert(server, segments);
    }
}

#[async_trait]
impl RoutingProvider for StaticRoutingProvider {
    async fn exists(&self, physical_table_name: &str) -> bool {
        self.tables.read().contains_key(physical_table_name)
    }

    async fn lookup(
        &self,
        physical_table_name: &str,
        _routing_options: &[String],
    ) -> HashMap<ServerInstance, SegmentIdSet> {
        self.tables
            .read()
            .get(physical_table_name)
            .cloned()
            .unwrap_or_default()
    }

    async fn dump_snapshot(&self, table_name: &str) -> String {
        match self.tables.read().get(table_name) {
            Some(servers) => format!("{table_name}: {} server(s)", servers.len()),
            None => format!("{table_name}: no snapshot"),
        }
    }
}

#[derive(Default)]
pub struct StaticTimeBoundaryProvider {
    boundaries: RwLock<HashMap<String, OwnedTimeBoundaryInfo>>,
}

impl StaticTimeBoundaryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, offline_table_name: &str, time_column: &str, time_value: i64) {
        self.boundaries.write().insert(
            offline_table_name.to_string(),
            OwnedTimeBoundaryInfo {
                time_column: time_column.to_string(),
                time_value,
            },
        );
    }
}

#[async_trait]
impl TimeBoundaryProvider for StaticTimeBoundaryProvider {
    async fn get_time_boundary_info_for(
        &self,
        offline_table_name: &str,
    ) -> Option<OwnedTimeBoundaryInfo> {
        self.boundaries.read().get(offline_table_name).cloned()
    }
}
