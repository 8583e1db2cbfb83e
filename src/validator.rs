//! C1 — Request Validator & Optimizer.
//!
//! Rejects oversized limits; rewrites the request tree for downstream
//! efficiency via an idempotent structural optimization pass.

use crate::error::{BrokerError, BrokerResult};
use crate::model::BrokerRequest;

/// Validate `request` against the configured response limit. If the
/// request carries a group-by, the group-by top-N must not exceed
/// `response_limit`; otherwise the selection size must not.
pub fn validate(request: &BrokerRequest, response_limit: u32) -> BrokerResult<()> {
    if let Some(group_by) = &request.group_by {
        if group_by.top_n > response_limit {
            return Err(BrokerError::QueryValidation(format!(
                "group-by top-N {} exceeds configured response limit {}",
                group_by.top_n, response_limit
            )));
        }
    } else if let Some(selection) = &request.selection {
        if selection.size > response_limit {
            return Err(BrokerError::QueryValidation(format!(
                "selection size {} exceeds configured response limit {}",
                selection.size, response_limit
            )));
        }
    }
    Ok(())
}

/// Idempotent structural rewrite: trivial filter simplification and
/// clause normalization. Contract: `optimize(optimize(r)) == optimize(r)`,
/// and the result is semantically equivalent to the input for all server
/// states.
pub fn optimize(mut request: BrokerRequest) -> BrokerRequest {
    if let Some(filter) = request.filter.take() {
        request.filter = Some(simplify_filter(filter));
    }
    request
}

fn simplify_filter(mut map: crate::model::FilterSubQueryMap) -> crate::model::FilterSubQueryMap {
    use crate::model::FilterOperator;

    // Collapse AND/OR nodes with exactly one child into that child —
    // a no-op simplification that is safe regardless of server state
    // and stable once no such node remains.
    loop {
        let collapsible = map.nodes.iter().find_map(|(&id, node)| {
            if matches!(node.operator, FilterOperator::And | FilterOperator::Or)
                && node.children.len() == 1
            {
                Some((id, node.children[0]))
            } else {
                None
            }
        });

        let Some((parent_id, only_child)) = collapsible else {
            break;
        };

        map.nodes.remove(&parent_id);
        if map.root_id == parent_id {
            map.root_id = only_child;
        }
        for node in map.nodes.values_mut() {
            for child in node.children.iter_mut() {
                if *child == parent_id {
                    *child = only_child;
                }
            }
        }
    }

    map
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AggregationFunction, AggregationInfo, FilterOperator, FilterQuery, FilterSubQueryMap,
        GroupByInfo, ResponseFormat, SelectionInfo,
    };
    use std::collections::HashMap;

    fn base_request() -> BrokerRequest {
        BrokerRequest {
            query_source: "t".to_string(),
            selection: Some(SelectionInfo {
                columns: vec!["a".to_string()],
                size: 5,
                sort_sequence: None,
            }),
            aggregations: None,
            group_by: None,
            filter: None,
            response_format: ResponseFormat::Selection,
            trace: false,
            debug_options: HashMap::new(),
            bucket_hash_key: "k".to_string(),
        }
    }

    #[test]
    fn selection_within_limit_passes() {
        let req = base_request();
        assert!(validate(&req, 1000).is_ok());
    }

    #[test]
    fn selection_exceeding_limit_fails() {
        let req = base_request();
        assert!(validate(&req, 1).is_err());
    }

    #[test]
    fn group_by_top_n_checked_instead_of_selection() {
        let mut req = base_request();
        req.group_by = Some(GroupByInfo {
            expressions: vec!["b".to_string()],
            top_n: 5000,
        });
        req.aggregations = Some(vec![AggregationInfo {
            function: AggregationFunction::Count,
            column: None,
        }]);
        let err = validate(&req, 1000).unwrap_err();
        assert!(matches!(err, BrokerError::QueryValidation(_)));
    }

    fn leaf(id: i32) -> FilterQuery {
        FilterQuery {
            id,
            operator: FilterOperator::Eq,
            column: Some("a".to_string()),
            values: vec!["1".to_string()],
            children: vec![],
        }
    }

    #[test]
    fn optimize_is_idempotent() {
        let mut req = base_request();
        let mut nodes = HashMap::new();
        nodes.insert(2, leaf(2));
        nodes.insert(
            1,
            FilterQuery {
                id: 1,
                operator: FilterOperator::And,
                column: None,
                values: vec![],
                children: vec![2],
            },
        );
        req.filter = Some(FilterSubQueryMap { nodes, root_id: 1 });

        let once = optimize(req.clone());
        let twice = optimize(once.clone());
        assert_eq!(
            once.filter.as_ref().unwrap().root_id,
            twice.filter.as_ref().unwrap().root_id
        );
        assert_eq!(once.filter.unwrap().nodes.len(), twice.filter.unwrap().nodes.len());
    }

    #[test]
    fn optimize_collapses_single_child_and() {
        let mut req = base_request();
        let mut nodes = HashMap::new();
        nodes.insert(2, leaf(2));
        nodes.insert(
            1,
            FilterQuery {
                id: 1,
                operator: FilterOperator::And,
                column: None,
                values: vec![],
                children: vec![2],
            },
        );
        req.filter = Some(FilterSubQueryMap { nodes, root_id: 1 });

        let optimized = optimize(req);
        let filter = optimized.filter.unwrap();
        assert_eq!(filter.root_id, 2);
        assert_eq!(filter.nodes.len(), 1);
    }
}
