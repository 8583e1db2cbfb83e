//! C3 — Hybrid Request Splitter.
//!
//! Invoked when the table matcher resolves both an offline and a
//! realtime physical table. Produces two deep-copied requests with table
//! names rewritten and a time-boundary filter AND-combined with the
//! original filter.

use tracing::warn;

use crate::model::{FilterOperator, FilterQuery, FilterSubQueryMap};
use crate::model::BrokerRequest;
use crate::providers::OwnedTimeBoundaryInfo;

pub struct SplitRequests {
    pub offline: BrokerRequest,
    pub realtime: BrokerRequest,
}

/// Split `request` into an offline sub-request (`time < timeValue`) and a
/// realtime sub-request (`time >= timeValue`). If `time_boundary` is
/// `None`, no time filter is added and a warning is logged — the two
/// sub-queries may then overlap. This is accepted degradation, per
/// spec.md §4.3 and its Open Question (a): the degradation itself is
/// silent in the source, so the warning here is log-only and does not
/// populate the response's `exceptions` list.
pub fn split(
    request: &BrokerRequest,
    offline_table: &str,
    realtime_table: &str,
    time_boundary: Option<&OwnedTimeBoundaryInfo>,
) -> SplitRequests {
    let mut offline = request.clone();
    offline.query_source = offline_table.to_string();
    let mut realtime = request.clone();
    realtime.query_source = realtime_table.to_string();

    match time_boundary {
        Some(boundary) => {
            attach_time_filter(&mut offline, boundary, Operand::LessThan);
            attach_time_filter(&mut realtime, boundary, Operand::GreaterOrEqual);
        }
        None => {
            warn!(
                offline_table,
                realtime_table, "no time-boundary info available; hybrid sub-queries may overlap"
            );
        }
    }

    SplitRequests { offline, realtime }
}

enum Operand {
    LessThan,
    GreaterOrEqual,
}

fn attach_time_filter(request: &mut BrokerRequest, boundary: &OwnedTimeBoundaryInfo, operand: Operand) {
    let next_negative_id = request
        .filter
        .as_ref()
        .map(|m| m.nodes.keys().filter(|&&id| id < 0).min().copied().unwrap_or(0) - 1)
        .unwrap_or(-1);

    let time_node = FilterQuery {
        id: next_negative_id,
        operator: FilterOperator::Range,
        column: Some(boundary.time_column.clone()),
        values: match operand {
            // `(*, timeValue)` for offline, `[timeValue, *)` for realtime.
            Operand::LessThan => vec!["*".to_string(), boundary.time_value.to_string()],
            Operand::GreaterOrEqual => vec![boundary.time_value.to_string(), "*".to_string()],
        },
        children: vec![],
    };
    let time_filter = FilterSubQueryMap::single(time_node);

    request.filter = Some(match request.filter.take() {
        None => time_filter,
        Some(mut existing) => {
            let original_root = existing.root_id;
            let time_root = existing.absorb(time_filter);
            let and_id = existing
                .nodes
                .keys()
                .filter(|&&id| id < 0)
                .min()
                .copied()
                .unwrap_or(0)
                - 1;
            existing.nodes.insert(
                and_id,
                FilterQuery {
                    id: and_id,
                    operator: FilterOperator::And,
                    column: None,
                    values: vec![],
                    children: vec![original_root, time_root],
                },
            );
            existing.root_id = and_id;
            existing
        }
    });
}
