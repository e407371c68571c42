//! HTTP request handlers.

use crate::error::{AppError, Result};
use crate::rpc::{Procedure, RpcContext};
use crate::server::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::Html,
};
use serde::Deserialize;
use serde_json::{Value, json};

// ============================================================================
// WEB PAGES
// ============================================================================

/// Index page (simple HTML).
pub async fn index(State(state): State<AppState>) -> Html<String> {
    let procedures: String = Procedure::ALL
        .iter()
        .map(|p| {
            let method = if p.is_mutation() { "POST" } else { "GET/POST" };
            format!("        <li><code>{method} /rpc/{}</code></li>\n", p.name())
        })
        .collect();

    let html = format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <title>{title}</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 2rem auto; padding: 0 1rem; }}
        h1 {{ color: #333; }}
        code {{ background: #e8e8e8; padding: 0.2rem 0.4rem; border-radius: 4px; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <p>Procedures take JSON input and answer with <code>{{"data": ...}}</code>.</p>
    <ul>
{procedures}    </ul>
</body>
</html>"#,
        title = state.config.server.title,
        procedures = procedures,
    );

    Html(html)
}

/// Liveness probe.
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

// ============================================================================
// RPC
// ============================================================================

/// Query string of a GET procedure call.
#[derive(Debug, Deserialize)]
pub struct RpcQuery {
    /// JSON-encoded input.
    pub input: Option<String>,
}

/// Call a procedure with a JSON body. An empty body means no input.
pub async fn rpc_post(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let procedure = lookup(&name)?;
    let input = if body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::Validation(format!("Malformed JSON body: {}", e)))?
    };

    call(&state, procedure, &headers, input)
}

/// Call a query procedure with `?input=<json>`.
pub async fn rpc_get(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(query): Query<RpcQuery>,
) -> Result<Json<Value>> {
    let procedure = lookup(&name)?;
    if procedure.is_mutation() {
        return Err(AppError::Validation(format!(
            "{} is a mutation and must be called with POST",
            procedure
        )));
    }

    let input = match query.input.as_deref() {
        None | Some("") => Value::Null,
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| AppError::Validation(format!("Malformed input parameter: {}", e)))?,
    };

    call(&state, procedure, &headers, input)
}

fn lookup(name: &str) -> Result<Procedure> {
    Procedure::parse(name)
        .ok_or_else(|| AppError::NotFound(format!("No procedure named {}", name)))
}

fn call(
    state: &AppState,
    procedure: Procedure,
    headers: &HeaderMap,
    input: Value,
) -> Result<Json<Value>> {
    let ctx = RpcContext::from_token(state.rpc.auth(), extract_token(headers))?;
    let data = state.rpc.dispatch(&ctx, procedure, input)?;
    Ok(Json(json!({ "data": data })))
}

// ============================================================================
// HELPERS
// ============================================================================

/// Extract Bearer token from Authorization header.
fn extract_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|s| s.to_string())
}
