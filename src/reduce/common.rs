//! Schema-mismatch handling shared by the aggregation and group-by
//! reduce paths (selection has its own variant in `selection.rs` because
//! it also needs the reference schema for column projection).

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{BrokerError, ProcessingException};
use crate::model::{DataTable, ServerInstance, Value};

/// Total order over `Value` used by both the selection sort merge and
/// group-by's descending-by-value ordering. `Null` sorts lowest; `OBJECT`
/// values have no natural order and compare equal, leaving any
/// surrounding tie-break to decide.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Long(x), Value::Long(y)) => x.cmp(y),
        (Value::Double(x), Value::Double(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Long(x), Value::Double(y)) => (*x as f64).partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Double(x), Value::Long(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => x.cmp(y),
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

pub fn drop_schema_mismatches(
    tables: HashMap<ServerInstance, DataTable>,
) -> (HashMap<ServerInstance, DataTable>, Vec<ProcessingException>) {
    let mut iter = tables.into_iter();
    let Some((first_server, first_table)) = iter.next() else {
        return (HashMap::new(), Vec::new());
    };
    let reference = first_table.schema.clone();

    let mut kept = HashMap::new();
    kept.insert(first_server, first_table);
    let mut dropped = Vec::new();

    for (server, table) in iter {
        if table.schema.matches(&reference) {
            kept.insert(server, table);
        } else {
            dropped.push(server.display_id());
        }
    }

    let exceptions = if dropped.is_empty() {
        Vec::new()
    } else {
        vec![BrokerError::MergeResponse {
            dropped_servers: dropped,
        }
        .into_exception()]
    };

    (kept, exceptions)
}
