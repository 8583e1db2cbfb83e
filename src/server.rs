//! A4 — Query entry point: `POST /query`.
//!
//! Grounded in `sem_os_server::router`/`handlers::health`'s axum shape
//! (shared state via `Extension`, handlers returning `Result<Json<_>,
//! AppError>`), generalized from Semantic-OS's JSON contract to spec.md
//! §6's broker request/response contract. `ob-poc-web` and `knhk`
//! contribute the same `axum`+`tower-http` stack this module depends
//! on — the teacher itself has no HTTP surface.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tower_http::trace::TraceLayer;

use crate::compiler;
use crate::error::{BrokerError, ProcessingException};
use crate::model::{next_request_id, BrokerResponse, BrokerResult, Value};
use crate::pipeline::Pipeline;

pub fn build_router(pipeline: Arc<Pipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/query", post(query))
        .layer(Extension(pipeline))
        .layer(TraceLayer::new_for_http())
}

async fn health() -> Json<JsonValue> {
    Json(json!({"status": "ok"}))
}

#[derive(Debug, Deserialize)]
pub struct QueryRequestEnvelope {
    pql: String,
    #[serde(default)]
    trace: bool,
    /// `"k=v;k=v"`, per spec.md §6 — split here into the debug-options
    /// map `BrokerRequest` carries.
    #[serde(default, rename = "debugOptions")]
    debug_options: String,
}

async fn query(
    Extension(pipeline): Extension<Arc<Pipeline>>,
    Json(envelope): Json<QueryRequestEnvelope>,
) -> Result<Json<JsonValue>, AppError> {
    let debug_options = parse_debug_options(&envelope.debug_options);
    let bucket_hash_key = envelope.pql.clone();

    let request = compiler::compile(&envelope.pql, envelope.trace, debug_options, bucket_hash_key)
        .map_err(AppError)?;

    let request_id = next_request_id();
    let response = pipeline.execute(request_id, request).await;
    Ok(Json(to_wire_contract(response)))
}

fn parse_debug_options(raw: &str) -> HashMap<String, String> {
    raw.split(';')
        .filter(|s| !s.is_empty())
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim().to_string();
            let value = parts.next().unwrap_or("").trim().to_string();
            Some((key, value))
        })
        .collect()
}

/// Map the internal `BrokerResponse` onto spec.md §6's wire shape:
/// exactly one of `selectionResults`/`aggregationResults`/
/// `groupByResults` is present, alongside the execution counters,
/// `exceptions`, `timeUsedMs`, and (when tracing was requested)
/// `traceInfo`.
fn to_wire_contract(response: BrokerResponse) -> JsonValue {
    let mut body = serde_json::Map::new();

    match response.result {
        BrokerResult::Selection(selection) => {
            body.insert(
                "selectionResults".to_string(),
                json!({
                    "columns": selection.columns,
                    "rows": selection.rows.into_iter().map(row_to_json).collect::<Vec<_>>(),
                }),
            );
        }
        BrokerResult::Aggregation(results) => {
            let rendered: Vec<JsonValue> = results
                .into_iter()
                .map(|r| json!({"function": r.function_name, "value": value_to_json(r.value)}))
                .collect();
            body.insert("aggregationResults".to_string(), JsonValue::Array(rendered));
        }
        BrokerResult::GroupBy(results) => {
            let rendered: Vec<JsonValue> = results
                .into_iter()
                .map(|r| {
                    json!({
                        "function": r.function_name,
                        "groupByColumns": r.group_by_columns,
                        "groupByResult": r.entries.into_iter().map(|e| json!({
                            "group": e.group_key,
                            "value": value_to_json(e.value),
                        })).collect::<Vec<_>>(),
                    })
                })
                .collect();
            body.insert("aggregationResults".to_string(), JsonValue::Array(rendered));
        }
        BrokerResult::Empty => {}
    }

    body.insert(
        "exceptions".to_string(),
        serde_json::to_value(&response.exceptions).unwrap_or_default(),
    );
    body.insert("numDocsScanned".to_string(), json!(response.num_docs_scanned));
    body.insert(
        "numEntriesScannedInFilter".to_string(),
        json!(response.num_entries_scanned_in_filter),
    );
    body.insert(
        "numEntriesScannedPostFilter".to_string(),
        json!(response.num_entries_scanned_post_filter),
    );
    body.insert("totalDocs".to_string(), json!(response.total_docs));
    body.insert("timeUsedMs".to_string(), json!(response.time_used_ms));
    if let Some(trace_info) = response.trace_info {
        body.insert("traceInfo".to_string(), json!(trace_info));
    }

    JsonValue::Object(body)
}

fn row_to_json(row: Vec<Value>) -> JsonValue {
    JsonValue::Array(row.into_iter().map(value_to_json).collect())
}

fn value_to_json(value: Value) -> JsonValue {
    match value {
        Value::Long(x) => json!(x),
        Value::Double(x) => json!(x),
        Value::Str(x) => json!(x),
        Value::Null => JsonValue::Null,
        Value::Object(_) => JsonValue::String("<object>".to_string()),
    }
}

/// Wraps a compile-time `BrokerError` (the only error this HTTP layer can
/// surface before a pipeline run even starts) as an axum response.
/// Pipeline-internal errors never reach here — they are already folded
/// into `BrokerResponse.exceptions` by the time `query` returns.
struct AppError(BrokerError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let exception: ProcessingException = self.0.into_exception();
        let status = StatusCode::BAD_REQUEST;
        let body = json!({"exceptions": [exception], "timeUsedMs": 0});
        (status, Json(body)).into_response()
    }
}
