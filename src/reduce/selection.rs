//! C9 — Selection reduce path.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::ProcessingException;
use crate::model::{DataSchema, DataTable, ServerInstance, SelectionInfo, SelectionResults, Value};

use super::common::{compare_values, drop_schema_mismatches};

pub fn reduce(
    tables: HashMap<ServerInstance, DataTable>,
    selection: &SelectionInfo,
) -> (SelectionResults, Vec<ProcessingException>) {
    let (kept, exceptions) = drop_schema_mismatches(tables);

    let reference_schema = kept
        .values()
        .next()
        .map(|t| t.schema.clone())
        .unwrap_or(DataSchema { columns: vec![] });

    let column_indices: Vec<usize> = selection
        .columns
        .iter()
        .map(|c| {
            reference_schema
                .columns
                .iter()
                .position(|(name, _)| name == c)
                .unwrap_or(usize::MAX)
        })
        .collect();

    let mut tagged_rows: Vec<(ServerInstance, usize, crate::model::Row)> = Vec::new();
    for (server, table) in &kept {
        for (row_index, row) in table.rows.iter().enumerate() {
            tagged_rows.push((server.clone(), row_index, row.clone()));
        }
    }

    if let Some(sort_sequence) = &selection.sort_sequence {
        let sort_indices: Vec<(usize, bool)> = sort_sequence
            .iter()
            .map(|(col, sort)| {
                let idx = reference_schema
                    .columns
                    .iter()
                    .position(|(name, _)| name == col)
                    .unwrap_or(usize::MAX);
                (idx, sort.ascending)
            })
            .collect();

        tagged_rows.sort_by(|(sa, ia, ra), (sb, ib, rb)| {
            for &(col_idx, ascending) in &sort_indices {
                if col_idx == usize::MAX {
                    continue;
                }
                let cmp = compare_values(&ra[col_idx], &rb[col_idx]);
                let cmp = if ascending { cmp } else { cmp.reverse() };
                if cmp != Ordering::Equal {
                    return cmp;
                }
            }
            // Ties broken by (serverId, rowIndex) for a total order.
            (sa, ia).cmp(&(sb, ib))
        });
    }

    tagged_rows.truncate(selection.size as usize);

    let projected: Vec<Vec<Value>> = tagged_rows
        .into_iter()
        .map(|(_, _, row)| {
            column_indices
                .iter()
                .map(|&idx| {
                    if idx == usize::MAX {
                        Value::Null
                    } else {
                        row.get(idx).cloned().unwrap_or(Value::Null)
                    }
                })
                .collect()
        })
        .collect();

    (
        SelectionResults {
            columns: selection.columns.clone(),
            rows: projected,
        },
        exceptions,
    )
}
