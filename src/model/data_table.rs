//! The server-side wire-level partial result unit and the request
//! envelope sent to each server.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::request::BrokerRequest;
use super::server::SegmentIdSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnType {
    Long,
    Double,
    String,
    Object,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataSchema {
    pub columns: Vec<(String, ColumnType)>,
}

impl DataSchema {
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Schema equality used by C9 to decide whether a shard's table may
    /// be merged with the reference schema (column name + type, in
    /// order).
    pub fn matches(&self, other: &DataSchema) -> bool {
        self.columns == other.columns
    }
}

/// An `OBJECT`-typed aggregation intermediate. A closed set of sketch
/// payloads, sufficient for the associative merges C9 requires without
/// pulling in a full approximate-sketch crate (spec.md does not mandate
/// sketch accuracy guarantees for this core).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ObjectValue {
    /// AVG's carried intermediate: `(sum, count)`.
    SumCount { sum: f64, count: i64 },
    /// A coarse distinct-count sketch: the literal set of seen values.
    /// Exact rather than approximate, since this core does not implement
    /// a real HyperLogLog variant; merging is still a plain set union.
    DistinctSet(Vec<String>),
    /// A percentile estimator carried as a sorted sample; merging
    /// concatenates and re-sorts.
    PercentileSample(Vec<f64>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Value {
    Long(i64),
    Double(f64),
    Str(String),
    Object(ObjectValue),
    Null,
}

pub type Row = Vec<Value>;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DataTableMetadata {
    pub num_docs_scanned: i64,
    pub num_entries_scanned_in_filter: i64,
    pub num_entries_scanned_post_filter: i64,
    pub total_docs: i64,
    pub trace: Option<String>,
    /// Keyed `"Exception<code>"`, per spec.md §3.
    pub exceptions: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataTable {
    pub schema: DataSchema,
    pub rows: Vec<Row>,
    pub metadata: DataTableMetadata,
}

impl DataTable {
    pub fn empty_with_schema(schema: DataSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
            metadata: DataTableMetadata::default(),
        }
    }
}

/// `(requestId, traceFlag, brokerRequest, segmentNames, brokerId)` — the
/// payload a scatter call sends to one server, per spec.md §4.6.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceRequest {
    pub request_id: u64,
    pub trace_enabled: bool,
    pub broker_request: BrokerRequest,
    pub segments: SegmentIdSet,
    pub broker_id: String,
}
