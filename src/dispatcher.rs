//! C6 — Scatter Dispatcher.
//!
//! For each `(server, segmentIdSet)` pair, builds an `InstanceRequest`,
//! serializes it with a fresh `bincode` call per dispatch (never a
//! shared serializer across concurrent calls — spec.md §9), and sends it
//! asynchronously through the transport. Fan-out is grouped by server,
//! one `tokio::spawn` per server, matching
//! `swarm::coordinator::execute_distributed_query`'s per-node spawn loop.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::{BrokerError, BrokerResult};
use crate::gather::CompositeFuture;
use crate::model::{BrokerRequest, InstanceRequest, SegmentIdSet, ServerInstance};
use crate::replica_selector::SegmentGroup;
use crate::transport::Transport;

/// Optional speculative duplication to a second replica after a
/// per-request threshold, disabled by default (spec.md §4.6). When
/// enabled, a group with more than one candidate races its primary
/// against a delayed secondary send and keeps whichever responds first.
#[derive(Debug, Clone, Copy)]
pub struct SpeculativeExecution {
    pub threshold: Duration,
}

fn build_instance_request(
    request_id: u64,
    broker_request: &BrokerRequest,
    segments: SegmentIdSet,
    broker_id: &str,
) -> InstanceRequest {
    InstanceRequest {
        request_id,
        trace_enabled: broker_request.trace,
        broker_request: broker_request.clone(),
        segments,
        broker_id: broker_id.to_string(),
    }
}

fn serialize_request(instance_request: &InstanceRequest) -> BrokerResult<Vec<u8>> {
    // A fresh `bincode` call per dispatch: there is no shared serializer
    // instance to accidentally reuse across concurrent scatter calls.
    bincode::serialize(instance_request)
        .map_err(|e| BrokerError::Internal(format!("failed to serialize InstanceRequest: {e}")))
}

/// Dispatch one sub-request across every assigned server, with no
/// speculative duplication (`speculative = None`, the default).
pub fn dispatch(
    request_id: u64,
    broker_request: &BrokerRequest,
    broker_id: &str,
    assignment: HashMap<ServerInstance, SegmentIdSet>,
    transport: Arc<dyn Transport>,
) -> BrokerResult<CompositeFuture> {
    dispatch_with_groups(
        request_id,
        broker_request,
        broker_id,
        assignment
            .into_iter()
            .map(|(server, segments)| SegmentGroup {
                segments,
                candidates: vec![server],
            })
            .collect(),
        transport,
        None,
    )
}

/// Dispatch given the full per-group candidate list (as produced by
/// `replica_selector::group_by_segments`), optionally racing a secondary
/// candidate after `speculative.threshold`. `groups[i].candidates[0]` is
/// treated as the already-selected primary (the caller runs replica
/// selection before calling this).
pub fn dispatch_with_groups(
    request_id: u64,
    broker_request: &BrokerRequest,
    broker_id: &str,
    groups: Vec<SegmentGroup>,
    transport: Arc<dyn Transport>,
    speculative: Option<SpeculativeExecution>,
) -> BrokerResult<CompositeFuture> {
    let mut handles = Vec::with_capacity(groups.len());

    for group in groups {
        let Some(primary) = group.candidates.first().cloned() else {
            continue;
        };
        let instance_request =
            build_instance_request(request_id, broker_request, group.segments.clone(), broker_id);
        let payload = serialize_request(&instance_request)?;

        let secondary = speculative.and_then(|_| group.candidates.get(1).cloned());
        let started = Instant::now();
        let transport_for_task = Arc::clone(&transport);
        let primary_for_task = primary.clone();

        debug!(
            request_id,
            server = %primary.display_id(),
            segments = group.segments.len(),
            speculative = secondary.is_some(),
            "dispatching sub-request"
        );

        let handle = match (secondary, speculative) {
            (Some(secondary_server), Some(spec)) => {
                let threshold = spec.threshold;
                tokio::spawn(async move {
                    race_primary_and_secondary(
                        transport_for_task,
                        primary_for_task,
                        secondary_server,
                        payload,
                        threshold,
                    )
                    .await
                })
            }
            _ => tokio::spawn(async move {
                transport_for_task.send(&primary_for_task, payload).await
            }),
        };

        handles.push((primary, started, handle));
    }

    Ok(CompositeFuture::new(handles))
}

async fn race_primary_and_secondary(
    transport: Arc<dyn Transport>,
    primary: ServerInstance,
    secondary: ServerInstance,
    payload: Vec<u8>,
    threshold: Duration,
) -> Result<Vec<u8>, String> {
    let primary_send = transport.send(&primary, payload.clone());
    tokio::pin!(primary_send);

    tokio::select! {
        result = &mut primary_send => return result,
        _ = tokio::time::sleep(threshold) => {}
    }

    let secondary_send = transport.send(&secondary, payload);
    tokio::pin!(secondary_send);

    tokio::select! {
        result = &mut primary_send => result,
        result = secondary_send => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ResponseFormat;
    use crate::transport::InProcessTransport;
    use std::collections::HashMap as StdHashMap;

    fn request() -> BrokerRequest {
        BrokerRequest {
            query_source: "t_OFFLINE".to_string(),
            selection: None,
            aggregations: None,
            group_by: None,
            filter: None,
            response_format: ResponseFormat::Selection,
            trace: false,
            debug_options: StdHashMap::new(),
            bucket_hash_key: "k".to_string(),
        }
    }

    #[tokio::test]
    async fn dispatch_sends_to_every_assigned_server() {
        let transport = Arc::new(InProcessTransport::new());
        let s1 = ServerInstance::new("s1", 8080);
        let s2 = ServerInstance::new("s2", 8080);
        transport.respond_immediately(s1.clone(), vec![1]);
        transport.respond_immediately(s2.clone(), vec![2]);

        let mut assignment = HashMap::new();
        assignment.insert(s1.clone(), ["seg0".to_string()].into_iter().collect());
        assignment.insert(s2.clone(), ["seg1".to_string()].into_iter().collect());

        let req = request();
        let future = dispatch(1, &req, "broker-1", assignment, transport).unwrap();
        let outcome = future.await_all(Duration::from_secs(5)).await;
        assert_eq!(outcome.successes.len(), 2);
    }

    #[tokio::test]
    async fn speculative_disabled_by_default_ignores_secondary_candidates() {
        let transport = Arc::new(InProcessTransport::new());
        let primary = ServerInstance::new("s1", 8080);
        let secondary = ServerInstance::new("s2", 8080);
        transport.respond_immediately(primary.clone(), vec![9]);
        // secondary intentionally left unregistered: if dispatch() (no
        // speculative) ever contacted it, the send would error and the
        // primary's result would be unaffected either way, but asserting
        // only one handle exists proves the secondary was never used.
        let groups = vec![SegmentGroup {
            segments: ["seg0".to_string()].into_iter().collect(),
            candidates: vec![primary.clone(), secondary],
        }];
        let req = request();
        let future = dispatch_with_groups(1, &req, "broker-1", groups, transport, None).unwrap();
        let outcome = future.await_all(Duration::from_secs(5)).await;
        assert_eq!(outcome.successes.len(), 1);
        assert!(outcome.successes.contains_key(&primary));
    }
}
