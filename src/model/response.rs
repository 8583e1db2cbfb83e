//! The merged result returned to the client.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::ProcessingException;

use super::data_table::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionResults {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregationResult {
    pub function_name: String,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupByEntry {
    pub group_key: Vec<String>,
    pub value: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupByResult {
    pub function_name: String,
    pub group_by_columns: Vec<String>,
    pub entries: Vec<GroupByEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BrokerResult {
    Selection(SelectionResults),
    Aggregation(Vec<AggregationResult>),
    GroupBy(Vec<GroupByResult>),
    Empty,
}

/// Fields: selection-results OR aggregation-results OR group-by
/// aggregation-results (spec.md §3), realized as a single `result`
/// variant rather than three parallel `Option` fields — `BrokerResult`
/// is the closed set of exactly those three shapes plus `Empty`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrokerResponse {
    pub result: BrokerResult,
    pub exceptions: Vec<ProcessingException>,
    pub num_docs_scanned: i64,
    pub num_entries_scanned_in_filter: i64,
    pub num_entries_scanned_post_filter: i64,
    pub total_docs: i64,
    pub time_used_ms: u64,
    pub trace_info: Option<HashMap<String, String>>,
}

impl BrokerResponse {
    pub fn empty() -> Self {
        Self {
            result: BrokerResult::Empty,
            exceptions: Vec::new(),
            num_docs_scanned: 0,
            num_entries_scanned_in_filter: 0,
            num_entries_scanned_post_filter: 0,
            total_docs: 0,
            time_used_ms: 0,
            trace_info: None,
        }
    }

    pub fn with_exception(exception: ProcessingException) -> Self {
        let mut resp = Self::empty();
        resp.exceptions.push(exception);
        resp
    }
}
