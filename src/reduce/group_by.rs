//! C9 — Group-by reduce path.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::ProcessingException;
use crate::model::{
    AggregationInfo, DataTable, GroupByEntry, GroupByInfo, GroupByResult, ServerInstance, Value,
};

use super::aggregation::merge_values;
use super::common::{compare_values, drop_schema_mismatches};

/// Row convention for group-by `DataTable`s: the first
/// `group_by.expressions.len()` columns carry the group-key values, one
/// column per remaining aggregation follows in declared order.
pub fn reduce(
    tables: HashMap<ServerInstance, DataTable>,
    aggregations: &[AggregationInfo],
    group_by: &GroupByInfo,
) -> (Vec<GroupByResult>, Vec<ProcessingException>) {
    let (kept, exceptions) = drop_schema_mismatches(tables);
    let num_group_cols = group_by.expressions.len();

    let mut results = Vec::with_capacity(aggregations.len());
    for (agg_idx, agg) in aggregations.iter().enumerate() {
        let mut partials: HashMap<Vec<String>, Vec<Value>> = HashMap::new();

        for table in kept.values() {
            for row in &table.rows {
                if row.len() < num_group_cols {
                    continue;
                }
                let key: Vec<String> = row[..num_group_cols].iter().map(format_group_value).collect();
                let value = row.get(num_group_cols + agg_idx).cloned().unwrap_or(Value::Null);
                partials.entry(key).or_default().push(value);
            }
        }

        let mut entries: Vec<GroupByEntry> = partials
            .into_iter()
            .map(|(group_key, values)| GroupByEntry {
                group_key,
                value: merge_values(agg.function, values),
            })
            .collect();

        // Descending by value; ties broken lexicographically by
        // group-key. Non-numeric values (e.g. a string-valued
        // aggregation) order by their formatted string, which `Value`'s
        // `Str` comparison already does.
        entries.sort_by(|a, b| {
            let cmp = compare_values(&a.value, &b.value).reverse();
            if cmp != Ordering::Equal {
                cmp
            } else {
                a.group_key.cmp(&b.group_key)
            }
        });
        entries.truncate(group_by.top_n as usize);

        results.push(GroupByResult {
            function_name: super::aggregation::function_name(agg),
            group_by_columns: group_by.expressions.clone(),
            entries,
        });
    }

    (results, exceptions)
}

fn format_group_value(value: &Value) -> String {
    match value {
        Value::Long(x) => x.to_string(),
        Value::Double(x) => x.to_string(),
        Value::Str(x) => x.clone(),
        Value::Null => String::new(),
        Value::Object(_) => "<object>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AggregationFunction, ColumnType, DataSchema, DataTableMetadata};

    fn schema() -> DataSchema {
        DataSchema {
            columns: vec![
                ("g".to_string(), ColumnType::String),
                ("cnt".to_string(), ColumnType::Long),
            ],
        }
    }

    fn table(rows: Vec<(&str, i64)>) -> DataTable {
        DataTable {
            schema: schema(),
            rows: rows
                .into_iter()
                .map(|(g, c)| vec![Value::Str(g.to_string()), Value::Long(c)])
                .collect(),
            metadata: DataTableMetadata::default(),
        }
    }

    #[test]
    fn merges_and_orders_descending_truncated_to_top_n() {
        let mut tables = HashMap::new();
        tables.insert(
            ServerInstance::new("s1", 8080),
            table(vec![("a", 10), ("b", 5)]),
        );
        tables.insert(
            ServerInstance::new("s2", 8080),
            table(vec![("a", 5), ("c", 20)]),
        );

        let group_by = GroupByInfo {
            expressions: vec!["g".to_string()],
            top_n: 2,
        };
        let aggregations = vec![AggregationInfo {
            function: AggregationFunction::Count,
            column: None,
        }];

        let (results, exceptions) = reduce(tables, &aggregations, &group_by);
        assert!(exceptions.is_empty());
        let entries = &results[0].entries;
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].group_key, vec!["c".to_string()]);
        assert_eq!(entries[1].group_key, vec!["a".to_string()]);
    }
}
