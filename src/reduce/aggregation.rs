//! C9 — Aggregation (no group-by) reduce path.
//!
//! Conceptual descendant of `swarm::aggregation`'s associative
//! node/merge decomposition table (COUNT->SUM, SUM->SUM, MIN/MAX
//! identity, AVG->sum+count pair), adapted from a SQL-string rewrite
//! into a pure typed merge over already-computed per-shard values — no
//! SQL is parsed or re-executed at this stage.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::ProcessingException;
use crate::model::{
    AggregationFunction, AggregationInfo, AggregationResult, DataTable, ObjectValue,
    ServerInstance, Value,
};

use super::common::{compare_values, drop_schema_mismatches};

pub fn reduce(
    tables: HashMap<ServerInstance, DataTable>,
    aggregations: &[AggregationInfo],
) -> (Vec<AggregationResult>, Vec<ProcessingException>) {
    let (kept, exceptions) = drop_schema_mismatches(tables);

    let mut results = Vec::with_capacity(aggregations.len());
    for (i, agg) in aggregations.iter().enumerate() {
        let shard_values: Vec<Value> = kept
            .values()
            .filter_map(|table| table.rows.first().and_then(|row| row.get(i)).cloned())
            .collect();

        let value = merge_values(agg.function, shard_values);
        results.push(AggregationResult {
            function_name: function_name(agg),
            value,
        });
    }

    (results, exceptions)
}

pub(crate) fn function_name(agg: &AggregationInfo) -> String {
    let fname = match agg.function {
        AggregationFunction::Count => "count",
        AggregationFunction::Sum => "sum",
        AggregationFunction::Min => "min",
        AggregationFunction::Max => "max",
        AggregationFunction::Avg => "avg",
        AggregationFunction::DistinctCount => "distinctcount",
        AggregationFunction::Percentile(_) => "percentile",
    };
    match &agg.column {
        Some(col) => format!("{fname}({col})"),
        None => format!("{fname}(*)"),
    }
}

/// Apply the aggregation function's associative reduction law across
/// every shard's partial value for one aggregation slot.
pub fn merge_values(function: AggregationFunction, values: Vec<Value>) -> Value {
    match function {
        AggregationFunction::Count | AggregationFunction::Sum => merge_numeric_sum(values),
        AggregationFunction::Min => merge_extremum(values, Ordering::Less),
        AggregationFunction::Max => merge_extremum(values, Ordering::Greater),
        AggregationFunction::Avg => merge_avg(values),
        AggregationFunction::DistinctCount => merge_distinct_count(values),
        AggregationFunction::Percentile(p) => merge_percentile(values, p),
    }
}

fn merge_numeric_sum(values: Vec<Value>) -> Value {
    let mut all_integral = true;
    let mut total = 0.0f64;
    for v in &values {
        match v {
            Value::Long(x) => total += *x as f64,
            Value::Double(x) => {
                all_integral = false;
                total += x;
            }
            _ => {}
        }
    }
    if all_integral {
        Value::Long(total as i64)
    } else {
        Value::Double(total)
    }
}

fn merge_extremum(values: Vec<Value>, keep_if: Ordering) -> Value {
    let mut best: Option<Value> = None;
    for v in values {
        best = Some(match best {
            None => v,
            Some(current) => {
                if compare_values(&v, &current) == keep_if {
                    v
                } else {
                    current
                }
            }
        });
    }
    best.unwrap_or(Value::Null)
}

/// `reduce(a, b) = (sum_a + sum_b, cnt_a + cnt_b)`. The final
/// presentation divides sum by count once merging is complete.
fn merge_avg(values: Vec<Value>) -> Value {
    let mut total_sum = 0.0f64;
    let mut total_count = 0i64;
    for v in values {
        if let Value::Object(ObjectValue::SumCount { sum, count }) = v {
            total_sum += sum;
            total_count += count;
        }
    }
    if total_count == 0 {
        Value::Null
    } else {
        Value::Double(total_sum / total_count as f64)
    }
}

fn merge_distinct_count(values: Vec<Value>) -> Value {
    let mut seen = std::collections::HashSet::new();
    for v in values {
        if let Value::Object(ObjectValue::DistinctSet(items)) = v {
            seen.extend(items);
        }
    }
    Value::Long(seen.len() as i64)
}

fn merge_percentile(values: Vec<Value>, percentile: u8) -> Value {
    let mut samples = Vec::new();
    for v in values {
        if let Value::Object(ObjectValue::PercentileSample(items)) = v {
            samples.extend(items);
        }
    }
    if samples.is_empty() {
        return Value::Null;
    }
    samples.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let rank = ((percentile as f64 / 100.0) * (samples.len() - 1) as f64).round() as usize;
    Value::Double(samples[rank.min(samples.len() - 1)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_longs_stays_integral() {
        let values = vec![Value::Long(70), Value::Long(30)];
        assert!(matches!(merge_numeric_sum(values), Value::Long(100)));
    }

    #[test]
    fn sum_is_associative_and_commutative() {
        let a = merge_numeric_sum(vec![Value::Long(1), Value::Long(2), Value::Long(3)]);
        let b = merge_numeric_sum(vec![Value::Long(3), Value::Long(1), Value::Long(2)]);
        assert!(matches!((a, b), (Value::Long(x), Value::Long(y)) if x == y));
    }

    #[test]
    fn max_picks_largest() {
        let values = vec![Value::Long(3), Value::Long(9), Value::Long(1)];
        assert!(matches!(merge_extremum(values, Ordering::Greater), Value::Long(9)));
    }

    #[test]
    fn min_picks_smallest() {
        let values = vec![Value::Long(3), Value::Long(9), Value::Long(1)];
        assert!(matches!(merge_extremum(values, Ordering::Less), Value::Long(1)));
    }

    #[test]
    fn avg_merges_sum_count_pairs() {
        let values = vec![
            Value::Object(ObjectValue::SumCount { sum: 10.0, count: 2 }),
            Value::Object(ObjectValue::SumCount { sum: 20.0, count: 2 }),
        ];
        let result = merge_avg(values);
        assert!(matches!(result, Value::Double(x) if (x - 7.5).abs() < 1e-9));
    }

    #[test]
    fn distinct_count_unions_sets() {
        let values = vec![
            Value::Object(ObjectValue::DistinctSet(vec!["a".to_string(), "b".to_string()])),
            Value::Object(ObjectValue::DistinctSet(vec!["b".to_string(), "c".to_string()])),
        ];
        assert!(matches!(merge_distinct_count(values), Value::Long(3)));
    }

    #[test]
    fn empty_input_yields_null_for_avg() {
        assert!(matches!(merge_avg(vec![]), Value::Null));
    }
}

#[cfg(test)]
mod law_tests {
    use super::*;
    use proptest::prelude::*;

    fn as_long(value: &Value) -> i64 {
        match value {
            Value::Long(x) => *x,
            _ => panic!("expected Value::Long, got {value:?}"),
        }
    }

    proptest! {
        /// SUM/COUNT's reduction is order-independent: merging all shard
        /// values at once equals merging any grouping of them and then
        /// merging the per-group results (spec.md §8's associativity law).
        #[test]
        fn sum_merge_is_associative_and_commutative(mut xs in proptest::collection::vec(-1000i64..1000, 0..20)) {
            let whole = as_long(&merge_numeric_sum(xs.iter().map(|x| Value::Long(*x)).collect()));

            // split point partitions xs into two groups, merge each, then merge the two partials
            let split = xs.len() / 2;
            let (left, right) = xs.split_at(split);
            let left_partial = merge_numeric_sum(left.iter().map(|x| Value::Long(*x)).collect());
            let right_partial = merge_numeric_sum(right.iter().map(|x| Value::Long(*x)).collect());
            let regrouped = as_long(&merge_numeric_sum(vec![left_partial, right_partial]));
            prop_assert_eq!(whole, regrouped);

            // commutativity: reversing input order does not change the result
            xs.reverse();
            let reversed = as_long(&merge_numeric_sum(xs.iter().map(|x| Value::Long(*x)).collect()));
            prop_assert_eq!(whole, reversed);
        }

        #[test]
        fn max_merge_is_associative_and_commutative(mut xs in proptest::collection::vec(-1000i64..1000, 2..20)) {
            let whole = as_long(&merge_extremum(xs.iter().map(|x| Value::Long(*x)).collect(), Ordering::Greater));

            // xs.len() >= 2 guarantees both groups are non-empty, so
            // neither partial merge degenerates to Value::Null.
            let split = xs.len() / 2;
            let (left, right) = xs.split_at(split.max(1));
            let left_partial = merge_extremum(left.iter().map(|x| Value::Long(*x)).collect(), Ordering::Greater);
            let right_partial = merge_extremum(right.iter().map(|x| Value::Long(*x)).collect(), Ordering::Greater);
            let regrouped = as_long(&merge_extremum(vec![left_partial, right_partial], Ordering::Greater));
            prop_assert_eq!(whole, regrouped);

            xs.reverse();
            let reversed = as_long(&merge_extremum(xs.iter().map(|x| Value::Long(*x)).collect(), Ordering::Greater));
            prop_assert_eq!(whole, reversed);
        }

        #[test]
        fn min_merge_is_associative_and_commutative(mut xs in proptest::collection::vec(-1000i64..1000, 2..20)) {
            let whole = as_long(&merge_extremum(xs.iter().map(|x| Value::Long(*x)).collect(), Ordering::Less));

            let split = xs.len() / 2;
            let (left, right) = xs.split_at(split.max(1));
            let left_partial = merge_extremum(left.iter().map(|x| Value::Long(*x)).collect(), Ordering::Less);
            let right_partial = merge_extremum(right.iter().map(|x| Value::Long(*x)).collect(), Ordering::Less);
            let regrouped = as_long(&merge_extremum(vec![left_partial, right_partial], Ordering::Less));
            prop_assert_eq!(whole, regrouped);

            xs.reverse();
            let reversed = as_long(&merge_extremum(xs.iter().map(|x| Value::Long(*x)).collect(), Ordering::Less));
            prop_assert_eq!(whole, reversed);
        }

        /// AVG's `(sum, count)` merge law: averaging the merged pair
        /// equals the true mean of the concatenated raw values, for any
        /// partitioning into shards.
        #[test]
        fn avg_sum_count_law_matches_true_mean(groups in proptest::collection::vec(proptest::collection::vec(-1000i64..1000, 1..10), 1..8)) {
            let partials: Vec<Value> = groups
                .iter()
                .map(|g| {
                    let sum: f64 = g.iter().map(|x| *x as f64).sum();
                    Value::Object(ObjectValue::SumCount { sum, count: g.len() as i64 })
                })
                .collect();
            let merged = merge_avg(partials);

            let all: Vec<i64> = groups.into_iter().flatten().collect();
            let true_mean = all.iter().map(|x| *x as f64).sum::<f64>() / all.len() as f64;

            match merged {
                Value::Double(x) => prop_assert!((x - true_mean).abs() < 1e-6),
                other => prop_assert!(false, "expected Value::Double, got {other:?}"),
            }
        }

        /// Merging in an empty, schema-matching shard must not change the
        /// aggregate (spec.md §8's "reduce over {Di} equals reduce over
        /// {Di} union {empty}" law, specialized to SUM).
        #[test]
        fn merging_empty_shard_is_identity_for_sum(xs in proptest::collection::vec(-1000i64..1000, 0..20)) {
            let without_empty = as_long(&merge_numeric_sum(xs.iter().map(|x| Value::Long(*x)).collect()));
            let mut with_empty: Vec<Value> = xs.iter().map(|x| Value::Long(*x)).collect();
            // an empty shard contributes no partial value to the merge input at all
            with_empty.extend(Vec::<Value>::new());
            let with_empty_result = as_long(&merge_numeric_sum(with_empty));
            prop_assert_eq!(without_empty, with_empty_result);
        }
    }
}
