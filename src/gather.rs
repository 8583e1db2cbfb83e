//! C7 — Gather Collector, and the `CompositeFuture` primitive it awaits.
//!
//! Grounded in `swarm::coordinator::execute_distributed_query`'s
//! `tokio::spawn`-per-node loop that joins all handles and splits
//! results into `(all_node_batches, errors)`; generalized here into a
//! standalone, reusable primitive with an explicit deadline and
//! best-effort cancellation, since spec.md §9 calls this out as "the one
//! non-trivial concurrency primitive" of the core.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::model::ServerInstance;

pub struct GatherOutcome {
    pub successes: HashMap<ServerInstance, Vec<u8>>,
    pub failures: HashMap<ServerInstance, String>,
    pub response_times_ms: HashMap<ServerInstance, u64>,
}

impl GatherOutcome {
    pub fn is_empty(&self) -> bool {
        self.successes.is_empty()
    }
}

/// Exposes completion-on-all, completion-on-deadline, per-child timing,
/// and cancellation. Fans out by server (one `JoinHandle` per server),
/// not by segment — grouping by server is done upstream in the
/// dispatcher, per spec.md §9.
pub struct CompositeFuture {
    handles: Vec<(ServerInstance, Instant, JoinHandle<Result<Vec<u8>, String>>)>,
}

impl CompositeFuture {
    pub fn new(handles: Vec<(ServerInstance, Instant, JoinHandle<Result<Vec<u8>, String>>)>) -> Self {
        Self { handles }
    }

    /// Await every per-server future up to `timeout`. On deadline,
    /// outstanding futures are aborted (best-effort) and their slots
    /// become entries in `failures` rather than `successes` — the
    /// caller (C7) turns those into `BrokerGatherError` exceptions.
    pub async fn await_all(mut self, timeout: Duration) -> GatherOutcome {
        let mut successes = HashMap::new();
        let mut failures = HashMap::new();
        let mut response_times_ms = HashMap::new();

        let mut abort_handles = Vec::with_capacity(self.handles.len());
        let mut pending: FuturesUnordered<_> = self
            .handles
            .drain(..)
            .map(|(server, started, handle)| {
                abort_handles.push((server.clone(), handle.abort_handle()));
                async move {
                    let result = handle.await;
                    (server, started.elapsed().as_millis() as u64, result)
                }
            })
            .collect();

        let sleep = tokio::time::sleep(timeout);
        tokio::pin!(sleep);

        loop {
            if pending.is_empty() {
                break;
            }
            tokio::select! {
                next = pending.next() => {
                    let Some((server, elapsed, join_result)) = next else { break };
                    response_times_ms.insert(server.clone(), elapsed);
                    match join_result {
                        Ok(Ok(bytes)) => {
                            successes.insert(server, bytes);
                        }
                        Ok(Err(reason)) => {
                            failures.insert(server, reason);
                        }
                        Err(join_err) => {
                            failures.insert(server, format!("task join error: {join_err}"));
                        }
                    }
                }
                _ = &mut sleep => {
                    warn!(outstanding = pending.len(), "gather deadline elapsed, cancelling outstanding shards");
                    for (server, abort_handle) in &abort_handles {
                        if !successes.contains_key(server) && !failures.contains_key(server) {
                            abort_handle.abort();
                            failures.entry(server.clone()).or_insert_with(|| "deadline exceeded".to_string());
                        }
                    }
                    break;
                }
            }
        }

        GatherOutcome {
            successes,
            failures,
            response_times_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spawn_ok(millis: u64, payload: Vec<u8>) -> JoinHandle<Result<Vec<u8>, String>> {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Ok(payload)
        })
    }

    fn spawn_err(millis: u64, reason: &'static str) -> JoinHandle<Result<Vec<u8>, String>> {
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(millis)).await;
            Err(reason.to_string())
        })
    }

    #[tokio::test(start_paused = true)]
    async fn all_complete_before_deadline() {
        let s1 = ServerInstance::new("s1", 8080);
        let s2 = ServerInstance::new("s2", 8080);
        let handles = vec![
            (s1.clone(), Instant::now(), spawn_ok(5, vec![1])),
            (s2.clone(), Instant::now(), spawn_ok(5, vec![2])),
        ];
        let outcome = CompositeFuture::new(handles)
            .await_all(Duration::from_millis(1000))
            .await;
        assert_eq!(outcome.successes.len(), 2);
        assert!(outcome.failures.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shard_failure_is_collected_not_thrown() {
        let s1 = ServerInstance::new("s1", 8080);
        let s2 = ServerInstance::new("s2", 8080);
        let handles = vec![
            (s1.clone(), Instant::now(), spawn_ok(5, vec![1])),
            (s2.clone(), Instant::now(), spawn_err(5, "boom")),
        ];
        let outcome = CompositeFuture::new(handles)
            .await_all(Duration::from_millis(1000))
            .await;
        assert_eq!(outcome.successes.len(), 1);
        assert_eq!(outcome.failures.get(&s2).unwrap(), "boom");
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_produces_partial_result() {
        let s1 = ServerInstance::new("s1", 8080);
        let s2 = ServerInstance::new("s2", 8080);
        let handles = vec![
            (s1.clone(), Instant::now(), spawn_ok(5, vec![1])),
            (s2.clone(), Instant::now(), spawn_ok(5000, vec![2])),
        ];
        let outcome = CompositeFuture::new(handles)
            .await_all(Duration::from_millis(50))
            .await;
        assert_eq!(outcome.successes.len(), 1);
        assert!(outcome.successes.contains_key(&s1));
        assert_eq!(outcome.failures.get(&s2).unwrap(), "deadline exceeded");
    }
}
