//! Metadata reduction shared by all three C9 reduce paths (spec.md §4.9):
//! sum the four execution counters, collect `Exception<code>` metadata
//! entries, and — when tracing is enabled — collect each server's trace
//! text into a `hostname -> text` map.

use std::collections::HashMap;

use crate::error::{ProcessingException, CODE_INTERNAL};
use crate::model::{DataTable, ServerInstance};

#[derive(Debug, Default, Clone, Copy)]
pub struct Counters {
    pub num_docs_scanned: i64,
    pub num_entries_scanned_in_filter: i64,
    pub num_entries_scanned_post_filter: i64,
    pub total_docs: i64,
}

pub struct MetadataOutcome {
    pub counters: Counters,
    pub exceptions: Vec<ProcessingException>,
    pub trace_info: Option<HashMap<String, String>>,
}

pub fn summarize(
    tables: &HashMap<ServerInstance, DataTable>,
    trace_enabled: bool,
) -> MetadataOutcome {
    let mut counters = Counters::default();
    let mut exceptions = Vec::new();
    let mut trace_info = trace_enabled.then(HashMap::new);

    for (server, table) in tables {
        counters.num_docs_scanned += table.metadata.num_docs_scanned;
        counters.num_entries_scanned_in_filter += table.metadata.num_entries_scanned_in_filter;
        counters.num_entries_scanned_post_filter += table.metadata.num_entries_scanned_post_filter;
        counters.total_docs += table.metadata.total_docs;

        for (key, message) in &table.metadata.exceptions {
            exceptions.push(ProcessingException {
                error_code: parse_exception_code(key),
                message: message.clone(),
            });
        }

        if let Some(map) = trace_info.as_mut() {
            if let Some(trace) = &table.metadata.trace {
                map.insert(server.hostname.clone(), trace.clone());
            }
        }
    }

    MetadataOutcome {
        counters,
        exceptions,
        trace_info,
    }
}

/// Parse the numeric suffix of an `"Exception<code>"` metadata key.
/// Unparseable codes fall back to `InternalError`, per spec.md §9's
/// Open Question (b).
fn parse_exception_code(key: &str) -> i32 {
    key.strip_prefix("Exception")
        .and_then(|suffix| suffix.parse::<i32>().ok())
        .unwrap_or(CODE_INTERNAL)
}
