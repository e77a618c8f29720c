//! Edge emulator.
//!
//! An axum router standing in for the edge API plus the shared listener:
//! it authorizes each request, forwards it as the edge would, and resolves
//! it through the listener. Responds with the routing decision as JSON.
//!
//! | Status | Meaning |
//! |---|---|
//! | 200 | a listener rule matched |
//! | 401 | missing or invalid token |
//! | 403 | caller may not call the service |
//! | 404 | no edge route, or the listener's default action |

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::{Json, Router};
use serde::Serialize;
use tenantgrid_routing::{Listener, RouteDecision};
use tracing::debug;

use crate::authorizer::Authorizer;
use crate::edge::{EdgeDescriptor, ForwardedRequest};
use crate::error::GatewayError;

/// Shared state for edge handlers.
#[derive(Clone)]
pub struct EdgeState {
    pub edge: Arc<EdgeDescriptor>,
    pub authorizer: Arc<Authorizer>,
    pub listener: Arc<Listener>,
}

#[derive(Serialize)]
struct EdgeResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    forwarded: Option<ForwardedRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    decision: Option<RouteDecision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

fn error_response(err: &GatewayError) -> axum::response::Response {
    let status = match err {
        e if e.is_unauthorized() => StatusCode::UNAUTHORIZED,
        GatewayError::ServiceNotAllowed { .. } => StatusCode::FORBIDDEN,
        _ => StatusCode::NOT_FOUND,
    };
    (
        status,
        Json(EdgeResponse {
            forwarded: None,
            decision: None,
            error: Some(err.to_string()),
        }),
    )
        .into_response()
}

/// Build the edge router.
pub fn build_router(state: EdgeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/{service}", any(proxy))
        .route("/{service}/{id}", any(proxy))
        .with_state(state)
}

/// GET /health
async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Any method on `/{service}` and `/{service}/{id}`.
async fn proxy(
    State(state): State<EdgeState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> impl IntoResponse {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let context = match state.authorizer.authorize(authorization) {
        Ok(c) => c,
        Err(e) => return error_response(&e),
    };
    let forwarded = match state.edge.forward(method.as_str(), uri.path(), &context) {
        Ok(f) => f,
        Err(e) => return error_response(&e),
    };

    let decision = state.listener.route(&forwarded.route_request()).await;
    debug!(path = %forwarded.path, tenant_id = %context.tenant_id, ?decision, "edge request routed");
    let status = match decision {
        RouteDecision::Forward { .. } => StatusCode::OK,
        RouteDecision::Rejected { status } => {
            StatusCode::from_u16(status).unwrap_or(StatusCode::NOT_FOUND)
        }
    };
    (
        status,
        Json(EdgeResponse {
            forwarded: Some(forwarded),
            decision: Some(decision),
            error: None,
        }),
    )
        .into_response()
}
