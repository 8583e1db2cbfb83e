//! Transport contract (spec.md §6) and its in-process stand-in.
//!
//! The real transport — on-wire RPC to a fleet of servers — is out of
//! scope (spec.md §1). `InProcessTransport` is a deterministic,
//! test-friendly stand-in whose per-server behavior is injectable,
//! grounded in `swarm::coordinator::execute_distributed_query`'s
//! `tokio::spawn(async move { flight_client::query_node(...).await })`
//! fan-out shape — here the RPC client call is replaced by a configurable
//! closure-or-canned-response per server.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;

use crate::model::ServerInstance;

#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `payload` to `server` and await its response bytes. Errors
    /// are shard-scoped: the caller collects them as
    /// `BrokerError::BrokerGather`, never propagates them as a
    /// whole-query failure.
    async fn send(&self, server: &ServerInstance, payload: Vec<u8>) -> Result<Vec<u8>, String>;
}

#[derive(Clone)]
pub enum ServerBehavior {
    Respond { latency: Duration, payload: Vec<u8> },
    Fail { latency: Duration, reason: String },
}

#[derive(Default)]
pub struct InProcessTransport {
    behaviors: DashMap<ServerInstance, ServerBehavior>,
}

impl InProcessTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_behavior(&self, server: ServerInstance, behavior: ServerBehavior) {
        self.behaviors.insert(server, behavior);
    }

    pub fn respond_immediately(&self, server: ServerInstance, payload: Vec<u8>) {
        self.set_behavior(
            server,
            ServerBehavior::Respond {
                latency: Duration::ZERO,
                payload,
            },
        );
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn send(&self, server: &ServerInstance, _payload: Vec<u8>) -> Result<Vec<u8>, String> {
        let behavior = self.behaviors.get(server).map(|b| b.value().clone());
        match behavior {
            Some(ServerBehavior::Respond { latency, payload }) => {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                Ok(payload)
            }
            Some(ServerBehavior::Fail { latency, reason }) => {
                if !latency.is_zero() {
                    tokio::time::sleep(latency).await;
                }
                Err(reason)
            }
            None => Err(format!(
                "no behavior registered for server {}",
                server.display_id()
            )),
        }
    }
}
