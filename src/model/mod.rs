pub mod data_table;
pub mod filter;
pub mod request;
pub mod response;
pub mod server;

pub use data_table::{ColumnType, DataSchema, DataTable, DataTableMetadata, InstanceRequest, ObjectValue, Row, Value};
pub use filter::{FilterOperator, FilterQuery, FilterSubQueryMap};
pub use request::{AggregationFunction, AggregationInfo, BrokerRequest, GroupByInfo, ResponseFormat, SelectionInfo, SortColumn};
pub use response::{AggregationResult, BrokerResponse, BrokerResult, GroupByEntry, GroupByResult, SelectionResults};
pub use server::{SegmentIdSet, ServerInstance};

use std::sync::atomic::{AtomicU64, Ordering};

static REQUEST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Allocate a fresh, monotonically increasing `requestId` for a newly
/// submitted query (spec.md §3's lifecycle). spec.md only requires
/// "monotonically increasing and unique" with no persistence/crash
/// recovery requirement stated, so an in-memory counter fully satisfies
/// it — see DESIGN.md.
pub fn next_request_id() -> u64 {
    REQUEST_ID_COUNTER.fetch_add(1, Ordering::Relaxed)
}
