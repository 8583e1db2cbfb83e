//! Server identity and segment assignment.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// `(hostname, port, sequence)`. `sequence` disambiguates two responses
/// from the same physical server in a federated (hybrid) query — one for
/// offline, one for realtime. It is `0` for non-federated responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerInstance {
    pub hostname: String,
    pub port: u16,
    pub sequence: u32,
}

impl ServerInstance {
    pub fn new(hostname: impl Into<String>, port: u16) -> Self {
        Self {
            hostname: hostname.into(),
            port,
            sequence: 0,
        }
    }

    pub fn with_sequence(&self, sequence: u32) -> Self {
        Self {
            sequence,
            ..self.clone()
        }
    }

    pub fn display_id(&self) -> String {
        format!("{}:{}:{}", self.hostname, self.port, self.sequence)
    }
}

pub type SegmentIdSet = HashSet<String>;
