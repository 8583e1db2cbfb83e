//! Broker configuration, loaded from the process environment.
//!
//! Mirrors the `pinot.broker.*` configuration keys named by the external
//! interface contract, one env var per key, with the same
//! parse-then-validate shape `swarm::config::ClusterConfig` uses for
//! `SWARM_CONFIG`.

use std::env;
use std::net::SocketAddr;

use crate::error::{BrokerError, BrokerResult};

#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// `pinot.broker.query.response.limit` — upper bound on selection
    /// size and group-by top-N.
    pub response_limit: u32,
    /// `pinot.broker.timeoutMs` — per-request deadline.
    pub timeout_ms: u64,
    /// `pinot.broker.id` — broker identifier embedded in each per-server
    /// request.
    pub broker_id: String,
    /// HTTP listen address for the query entry point. Not part of
    /// spec.md's configuration table (which treats the entry point's
    /// binding as out of scope), but required to run the binary.
    pub listen_addr: SocketAddr,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            response_limit: u32::MAX,
            timeout_ms: 10_000,
            broker_id: local_hostname(),
            listen_addr: "0.0.0.0:8099".parse().unwrap(),
        }
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown-broker".to_string())
}

impl BrokerConfig {
    /// Read configuration from the environment, falling back to defaults
    /// for any key that is unset, then validate the result.
    pub fn from_env() -> BrokerResult<Self> {
        let mut cfg = Self::default();

        if let Ok(raw) = env::var("PINOT_BROKER_QUERY_RESPONSE_LIMIT") {
            cfg.response_limit = raw.parse().map_err(|e| {
                BrokerError::Internal(format!(
                    "PINOT_BROKER_QUERY_RESPONSE_LIMIT is not a valid u32: {e}"
                ))
            })?;
        }

        if let Ok(raw) = env::var("PINOT_BROKER_TIMEOUT_MS") {
            cfg.timeout_ms = raw.parse().map_err(|e| {
                BrokerError::Internal(format!("PINOT_BROKER_TIMEOUT_MS is not a valid u64: {e}"))
            })?;
        }

        if let Ok(raw) = env::var("PINOT_BROKER_ID") {
            cfg.broker_id = raw;
        }

        if let Ok(raw) = env::var("PINOT_BROKER_LISTEN_ADDR") {
            cfg.listen_addr = raw
                .parse()
                .map_err(|e| BrokerError::Internal(format!("PINOT_BROKER_LISTEN_ADDR '{raw}' is not a valid SocketAddr: {e}")))?;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> BrokerResult<()> {
        if self.response_limit == 0 {
            return Err(BrokerError::Internal(
                "response_limit must be non-zero".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(BrokerError::Internal(
                "timeout_ms must be non-zero".to_string(),
            ));
        }
        if self.broker_id.trim().is_empty() {
            return Err(BrokerError::Internal(
                "broker_id must be non-empty".to_string(),
            ));
        }
        Ok(())
    }
}
