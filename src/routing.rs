//! C4 — Candidate Server Resolver.
//!
//! Consults the routing provider with `(physicalTableName, routingOptions)`.
//! Empty output is not an error; it simply contributes no work to the
//! dispatcher.

use std::collections::HashMap;

use crate::model::{BrokerRequest, SegmentIdSet, ServerInstance};
use crate::providers::RoutingProvider;

pub async fn resolve_candidates(
    physical_table_name: &str,
    request: &BrokerRequest,
    routing: &dyn RoutingProvider,
) -> HashMap<ServerInstance, SegmentIdSet> {
    let options = request.routing_options();
    routing.lookup(physical_table_name, &options).await
}
