//! C9 — Reduce Service.
//!
//! Selects one of three reduction paths by request shape (spec.md §4.9),
//! each grounded in `swarm::aggregation`'s associative decomposition
//! table in spirit (adapted from SQL rewriting to a typed in-memory
//! merge), then applies the metadata-reduction rules shared by all three
//! paths.

pub mod aggregation;
pub mod common;
pub mod group_by;
pub mod metadata;
pub mod selection;

use std::collections::HashMap;

use crate::error::ProcessingException;
use crate::model::{BrokerRequest, BrokerResult, DataTable, ResponseFormat, ServerInstance};

pub struct ReduceOutcome {
    pub result: BrokerResult,
    pub exceptions: Vec<ProcessingException>,
    pub num_docs_scanned: i64,
    pub num_entries_scanned_in_filter: i64,
    pub num_entries_scanned_post_filter: i64,
    pub total_docs: i64,
    pub trace_info: Option<HashMap<String, String>>,
}

/// If all data tables have zero rows, retain exactly one (preferring one
/// that still carries a non-empty data schema) so the reducer can
/// produce a correctly-shaped empty result, per spec.md §4.9's
/// Empty-input rule.
fn apply_empty_input_rule(
    tables: HashMap<ServerInstance, DataTable>,
) -> HashMap<ServerInstance, DataTable> {
    if tables.is_empty() || tables.values().any(|t| !t.rows.is_empty()) {
        return tables;
    }

    let keep_key = tables
        .iter()
        .find(|(_, t)| !t.schema.columns.is_empty())
        .or_else(|| tables.iter().next())
        .map(|(server, _)| server.clone());

    match keep_key {
        Some(key) => {
            let mut tables = tables;
            let kept = tables.remove(&key).expect("key came from this map");
            let mut result = HashMap::new();
            result.insert(key, kept);
            result
        }
        None => tables,
    }
}

pub fn reduce(request: &BrokerRequest, tables: HashMap<ServerInstance, DataTable>) -> ReduceOutcome {
    let tables = apply_empty_input_rule(tables);

    let meta = metadata::summarize(&tables, request.trace);

    let (result, merge_exceptions) = match request.response_format {
        ResponseFormat::Selection => {
            let selection = request
                .selection
                .as_ref()
                .expect("Selection response format implies a selection clause");
            let (selection_results, exceptions) = selection::reduce(tables, selection);
            (BrokerResult::Selection(selection_results), exceptions)
        }
        ResponseFormat::Aggregation => {
            let aggregations = request
                .aggregations
                .as_ref()
                .expect("Aggregation response format implies an aggregation list");
            let (agg_results, exceptions) = aggregation::reduce(tables, aggregations);
            (BrokerResult::Aggregation(agg_results), exceptions)
        }
        ResponseFormat::GroupBy => {
            let aggregations = request
                .aggregations
                .as_ref()
                .expect("GroupBy response format implies an aggregation list");
            let group_by = request
                .group_by
                .as_ref()
                .expect("GroupBy response format implies a group-by clause");
            let (group_results, exceptions) = group_by::reduce(tables, aggregations, group_by);
            (BrokerResult::GroupBy(group_results), exceptions)
        }
    };

    let mut exceptions = meta.exceptions;
    exceptions.extend(merge_exceptions);

    ReduceOutcome {
        result,
        exceptions,
        num_docs_scanned: meta.counters.num_docs_scanned,
        num_entries_scanned_in_filter: meta.counters.num_entries_scanned_in_filter,
        num_entries_scanned_post_filter: meta.counters.num_entries_scanned_post_filter,
        total_docs: meta.counters.total_docs,
        trace_info: meta.trace_info,
    }
}
