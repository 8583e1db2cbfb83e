//! Drives one query through C1–C9, end to end.
//!
//! Grounded in `swarm::coordinator::execute_distributed_query`'s
//! top-level orchestration function, generalized from a single
//! SQL-dispatch-reduce shot into the full validate/match/split/route/
//! select/scatter/gather/deserialize/reduce pipeline, and extended with
//! the observable per-query state machine spec.md §4.9 names.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{info_span, warn, Instrument};

use crate::config::BrokerConfig;
use crate::deserialize::deserialize_all;
use crate::dispatcher::dispatch;
use crate::error::{BrokerError, ProcessingException};
use crate::gather::GatherOutcome;
use crate::model::{BrokerRequest, BrokerResponse, BrokerResult, DataTable, ServerInstance};
use crate::providers::{RoutingProvider, TimeBoundaryProvider};
use crate::replica_selector::{group_by_segments, ReplicaSelector};
use crate::reduce;
use crate::routing::resolve_candidates;
use crate::splitter;
use crate::table_matcher::{match_table, MatchedTables};
use crate::transport::Transport;
use crate::validator;

/// The observable lifecycle spec.md §4.9 names. `COMPILE_FAILED` is not
/// modeled here: compilation happens upstream in `compiler.rs`, before a
/// `BrokerRequest` — and therefore this state machine — exists at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Compiled,
    Validated,
    ValidateFailed,
    Routed,
    Scattered,
    Gathered,
    Reduced,
    Returned,
}

pub struct Pipeline {
    pub config: Arc<BrokerConfig>,
    pub routing: Arc<dyn RoutingProvider>,
    pub time_boundary: Arc<dyn TimeBoundaryProvider>,
    pub transport: Arc<dyn Transport>,
    pub replica_selector: Arc<ReplicaSelector>,
}

impl Pipeline {
    pub fn new(
        config: Arc<BrokerConfig>,
        routing: Arc<dyn RoutingProvider>,
        time_boundary: Arc<dyn TimeBoundaryProvider>,
        transport: Arc<dyn Transport>,
    ) -> Self {
        Self {
            config,
            routing,
            time_boundary,
            transport,
            replica_selector: Arc::new(ReplicaSelector::default()),
        }
    }

    /// Run one query end to end, producing the client-facing
    /// `BrokerResponse`. Never short-circuits transport-level: only
    /// `QueryValidation` causes an early return with no dispatch.
    pub async fn execute(&self, request_id: u64, request: BrokerRequest) -> BrokerResponse {
        let started = Instant::now();
        let span = info_span!("query", request_id, table = %request.query_source);

        async {
            let mut state = QueryState::Compiled;

            if let Err(err) = validator::validate(&request, self.config.response_limit) {
                state = QueryState::ValidateFailed;
                warn!(?state, "query validation failed");
                return BrokerResponse::with_exception(err.into_exception());
            }
            let request = validator::optimize(request);
            state = QueryState::Validated;

            let matched = match_table(&request.query_source, self.routing.as_ref())
                .instrument(info_span!("table_match"))
                .await;

            let response = match matched {
                MatchedTables::None => BrokerResponse::empty(),
                MatchedTables::Raw(physical) | MatchedTables::Offline(physical) | MatchedTables::Realtime(physical) => {
                    self.run_single(request_id, &request, &physical, None, &mut state).await
                }
                MatchedTables::Hybrid { offline, realtime } => {
                    self.run_hybrid(request_id, &request, &offline, &realtime, &mut state).await
                }
            };

            state = QueryState::Returned;
            tracing::debug!(?state, elapsed_ms = started.elapsed().as_millis() as u64, "query complete");

            let mut response = response;
            response.time_used_ms = started.elapsed().as_millis() as u64;
            response
        }
        .instrument(span)
        .await
    }

    async fn run_single(
        &self,
        request_id: u64,
        request: &BrokerRequest,
        physical_table: &str,
        federated_sequence: Option<u32>,
        state: &mut QueryState,
    ) -> BrokerResponse {
        let gathered = self
            .scatter_gather(request_id, request, physical_table, federated_sequence, state)
            .await;

        match gathered {
            Ok((tables, mut exceptions)) => {
                *state = QueryState::Gathered;
                let outcome = reduce::reduce(request, tables);
                *state = QueryState::Reduced;
                exceptions.extend(outcome.exceptions);
                BrokerResponse {
                    result: outcome.result,
                    exceptions,
                    num_docs_scanned: outcome.num_docs_scanned,
                    num_entries_scanned_in_filter: outcome.num_entries_scanned_in_filter,
                    num_entries_scanned_post_filter: outcome.num_entries_scanned_post_filter,
                    total_docs: outcome.total_docs,
                    time_used_ms: 0,
                    trace_info: outcome.trace_info,
                }
            }
            Err(exception) => BrokerResponse::with_exception(exception),
        }
    }

    async fn run_hybrid(
        &self,
        request_id: u64,
        request: &BrokerRequest,
        offline_table: &str,
        realtime_table: &str,
        state: &mut QueryState,
    ) -> BrokerResponse {
        let boundary = self.time_boundary.get_time_boundary_info_for(offline_table).await;
        let split = splitter::split(request, offline_table, realtime_table, boundary.as_ref());

        // Both sub-requests share one wall-clock window: they race
        // concurrently rather than stacking two full `timeout_ms`
        // budgets back to back (spec.md §5/§6 — one per-request
        // deadline, not one per split). Each leg tracks its own
        // `QueryState` since they run on separate futures and can't
        // share a single `&mut` across the join; `state` is reconciled
        // once both are done.
        let mut offline_state = *state;
        let mut realtime_state = *state;
        let (offline_result, realtime_result) = tokio::join!(
            self.scatter_gather(request_id, &split.offline, offline_table, Some(0), &mut offline_state),
            self.scatter_gather(request_id, &split.realtime, realtime_table, Some(1), &mut realtime_state),
        );
        *state = QueryState::Scattered;

        let mut tables = HashMap::new();
        let mut exceptions = Vec::new();

        match offline_result {
            Ok((t, e)) => {
                tables.extend(t);
                exceptions.extend(e);
            }
            Err(e) => exceptions.push(e),
        }
        match realtime_result {
            Ok((t, e)) => {
                tables.extend(t);
                exceptions.extend(e);
            }
            Err(e) => exceptions.push(e),
        }

        *state = QueryState::Gathered;
        let outcome = reduce::reduce(request, tables);
        *state = QueryState::Reduced;
        exceptions.extend(outcome.exceptions);

        BrokerResponse {
            result: outcome.result,
            exceptions,
            num_docs_scanned: outcome.num_docs_scanned,
            num_entries_scanned_in_filter: outcome.num_entries_scanned_in_filter,
            num_entries_scanned_post_filter: outcome.num_entries_scanned_post_filter,
            total_docs: outcome.total_docs,
            time_used_ms: 0,
            trace_info: outcome.trace_info,
        }
    }

    /// C4 through C8 for one physical sub-request: resolve candidates,
    /// pick replicas, dispatch, gather, deserialize. Shard-scoped
    /// failures never short-circuit; they surface as
    /// `ProcessingException`s alongside whatever tables did come back.
    async fn scatter_gather(
        &self,
        request_id: u64,
        request: &BrokerRequest,
        physical_table: &str,
        federated_sequence: Option<u32>,
        state: &mut QueryState,
    ) -> Result<(HashMap<ServerInstance, DataTable>, Vec<ProcessingException>), ProcessingException> {
        let candidates = resolve_candidates(physical_table, request, self.routing.as_ref())
            .instrument(info_span!("resolve_candidates", physical_table))
            .await;

        if candidates.is_empty() {
            *state = QueryState::Routed;
            return Ok((HashMap::new(), Vec::new()));
        }

        let groups = group_by_segments(candidates);
        let assignment = self.replica_selector.select_assignment(groups, &request.bucket_hash_key);
        *state = QueryState::Routed;

        let future = dispatch(
            request_id,
            request,
            &self.config.broker_id,
            assignment,
            Arc::clone(&self.transport),
        )
        .map_err(|e: BrokerError| e.into_exception())?;
        *state = QueryState::Scattered;

        let GatherOutcome {
            successes,
            failures,
            response_times_ms: _,
        } = future.await_all(Duration::from_millis(self.config.timeout_ms)).await;

        let mut exceptions: Vec<ProcessingException> = failures
            .into_iter()
            .map(|(server, reason)| {
                BrokerError::BrokerGather {
                    server: server.display_id(),
                    reason,
                }
                .into_exception()
            })
            .collect();

        let deserialized = deserialize_all(successes, federated_sequence);
        exceptions.extend(deserialized.exceptions);

        Ok((deserialized.tables, exceptions))
    }
}
