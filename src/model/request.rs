//! The compiled query tree the rest of the pipeline operates on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::filter::FilterSubQueryMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationFunction {
    Count,
    Sum,
    Min,
    Max,
    Avg,
    DistinctCount,
    Percentile(u8),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationInfo {
    pub function: AggregationFunction,
    /// `None` for `COUNT(*)`.
    pub column: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortColumn {
    pub ascending: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionInfo {
    pub columns: Vec<String>,
    pub size: u32,
    /// Parallel to a subset of `columns`; present only when `ORDER BY`
    /// was specified. `(column, ascending)` pairs in declared order.
    pub sort_sequence: Option<Vec<(String, SortColumn)>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupByInfo {
    pub expressions: Vec<String>,
    pub top_n: u32,
}

/// Which of the three reduce paths (`spec.md` §4.9) this request takes.
/// Selected by request shape at compile time, not re-derived at reduce
/// time, matching the "closed set of variants... selected at dispatch"
/// design note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseFormat {
    Selection,
    Aggregation,
    GroupBy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerRequest {
    pub query_source: String,
    pub selection: Option<SelectionInfo>,
    pub aggregations: Option<Vec<AggregationInfo>>,
    pub group_by: Option<GroupByInfo>,
    pub filter: Option<FilterSubQueryMap>,
    pub response_format: ResponseFormat,
    pub trace: bool,
    pub debug_options: HashMap<String, String>,
    pub bucket_hash_key: String,
}

impl BrokerRequest {
    /// Parse the comma-separated `routingOptions` debug option, per
    /// spec.md §4.4.
    pub fn routing_options(&self) -> Vec<String> {
        self.debug_options
            .get("routingOptions")
            .map(|raw| raw.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn has_group_by(&self) -> bool {
        self.group_by.is_some()
    }
}
