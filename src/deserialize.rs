//! C8 — Response Deserializer.
//!
//! Input: `server -> bytes`. Output: `server -> DataTable`; per-server
//! deserialization failures become `InternalError` exceptions and that
//! server is dropped from the reduction input.

use std::collections::HashMap;

use crate::error::ProcessingException;
use crate::model::{DataTable, ServerInstance};

pub struct DeserializeOutcome {
    pub tables: HashMap<ServerInstance, DataTable>,
    pub exceptions: Vec<ProcessingException>,
}

/// Deserialize every successful shard's bytes into a typed `DataTable`.
/// `federated_sequence` re-stamps the server identity's `sequence` field
/// when this batch belongs to one sub-request of a hybrid (federated)
/// query, so offline and realtime responses from the same physical
/// server are distinguishable in the reduce map (spec.md §4.8).
pub fn deserialize_all(
    raw: HashMap<ServerInstance, Vec<u8>>,
    federated_sequence: Option<u32>,
) -> DeserializeOutcome {
    let mut tables = HashMap::new();
    let mut exceptions = Vec::new();

    for (server, bytes) in raw {
        match bincode::deserialize::<DataTable>(&bytes) {
            Ok(table) => {
                let identity = match federated_sequence {
                    Some(seq) => server.with_sequence(seq),
                    None => server,
                };
                tables.insert(identity, table);
            }
            Err(e) => {
                exceptions.push(
                    crate::error::BrokerError::RequestDeserialization {
                        server: server.display_id(),
                        reason: e.to_string(),
                    }
                    .into_exception(),
                );
            }
        }
    }

    DeserializeOutcome { tables, exceptions }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnType, DataSchema, DataTableMetadata};

    fn sample_table() -> DataTable {
        DataTable {
            schema: DataSchema {
                columns: vec![("a".to_string(), ColumnType::Long)],
            },
            rows: vec![],
            metadata: DataTableMetadata::default(),
        }
    }

    #[test]
    fn valid_payload_deserializes() {
        let server = ServerInstance::new("s1", 8080);
        let bytes = bincode::serialize(&sample_table()).unwrap();
        let mut raw = HashMap::new();
        raw.insert(server.clone(), bytes);

        let outcome = deserialize_all(raw, None);
        assert!(outcome.exceptions.is_empty());
        assert!(outcome.tables.contains_key(&server));
    }

    #[test]
    fn invalid_payload_becomes_exception_and_drops_server() {
        let server = ServerInstance::new("s1", 8080);
        let mut raw = HashMap::new();
        raw.insert(server.clone(), vec![0xFF, 0xFE, 0xFD]);

        let outcome = deserialize_all(raw, None);
        assert!(outcome.tables.is_empty());
        assert_eq!(outcome.exceptions.len(), 1);
        assert_eq!(
            outcome.exceptions[0].error_code,
            crate::error::CODE_REQUEST_DESERIALIZATION
        );
    }

    #[test]
    fn federated_sequence_restamps_identity() {
        let server = ServerInstance::new("s1", 8080);
        let bytes = bincode::serialize(&sample_table()).unwrap();
        let mut raw = HashMap::new();
        raw.insert(server.clone(), bytes);

        let outcome = deserialize_all(raw, Some(1));
        let restamped = server.with_sequence(1);
        assert!(outcome.tables.contains_key(&restamped));
    }
}
