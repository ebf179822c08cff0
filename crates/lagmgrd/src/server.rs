//! HTTP/JSON surface of the LAG service.
//!
//! Routes:
//! - `POST /Net.LagManagement/{CreateLag,DeleteLag,AddLagMember,RemoveLagMember,GetLag,ListLags}`
//! - `GET /health`
//! - `GET /metrics`

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::error::{LagError, LagResult};
use crate::metrics::Operation;
use crate::rpc::{
    CreateLagRequest, LagIdRequest, LagMembersRequest, LagResponse, LagStatus,
};
use crate::service::LagService;

/// Maps a status to its HTTP code.
pub fn http_status(status: LagStatus) -> StatusCode {
    match status {
        LagStatus::Ok => StatusCode::OK,
        LagStatus::InvalidArgument => StatusCode::BAD_REQUEST,
        LagStatus::NotFound => StatusCode::NOT_FOUND,
        LagStatus::AlreadyExists | LagStatus::AlreadyMember => StatusCode::CONFLICT,
        LagStatus::Busy => StatusCode::SERVICE_UNAVAILABLE,
        LagStatus::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn respond(result: LagResult<LagResponse>) -> Response {
    let body = match result {
        Ok(body) => body,
        Err(e) => {
            debug!(status = %e.status(), error = %e, "Request failed");
            LagResponse::from(&e)
        }
    };
    (http_status(body.status), Json(body)).into_response()
}

fn body<T>(payload: Result<Json<T>, JsonRejection>) -> LagResult<T> {
    payload
        .map(|Json(req)| req)
        .map_err(|rejection| LagError::invalid_argument(rejection.body_text()))
}

/// Builds the router for a service.
pub fn router(service: LagService) -> Router {
    let rpc = format!("/{}", crate::rpc::SERVICE_NAME);
    Router::new()
        .route(&format!("{}/CreateLag", rpc), post(create_lag))
        .route(&format!("{}/DeleteLag", rpc), post(delete_lag))
        .route(&format!("{}/AddLagMember", rpc), post(add_lag_member))
        .route(&format!("{}/RemoveLagMember", rpc), post(remove_lag_member))
        .route(&format!("{}/GetLag", rpc), post(get_lag))
        .route(&format!("{}/ListLags", rpc), post(list_lags))
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(service)
}

/// Serves until `shutdown` resolves, then stops accepting connections and
/// finishes in-flight requests.
pub async fn serve<F>(listener: TcpListener, service: LagService, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "LAG management service listening");
    }
    axum::serve(listener, router(service))
        .with_graceful_shutdown(shutdown)
        .await
}

async fn create_lag(
    State(service): State<LagService>,
    payload: Result<Json<CreateLagRequest>, JsonRejection>,
) -> Response {
    let result: LagResult<LagResponse> = async {
        let req = body(payload).map_err(|e| service.reject(Operation::CreateLag, e))?;
        let id = service
            .create_lag(req.lag_id.as_deref(), &req.member_ids())
            .await?;
        Ok(LagResponse::ok().with_lag_id(id.to_string()))
    }
    .await;
    respond(result)
}

async fn delete_lag(
    State(service): State<LagService>,
    payload: Result<Json<LagIdRequest>, JsonRejection>,
) -> Response {
    let result: LagResult<LagResponse> = async {
        let req = body(payload).map_err(|e| service.reject(Operation::DeleteLag, e))?;
        service.delete_lag(&req.lag_id).await?;
        Ok(LagResponse::ok().with_lag_id(req.lag_id))
    }
    .await;
    respond(result)
}

async fn add_lag_member(
    State(service): State<LagService>,
    payload: Result<Json<LagMembersRequest>, JsonRejection>,
) -> Response {
    let result: LagResult<LagResponse> = async {
        let req = body(payload).map_err(|e| service.reject(Operation::AddLagMember, e))?;
        service
            .add_lag_members(&req.lag_id, &req.member_ids())
            .await?;
        Ok(LagResponse::ok().with_lag_id(req.lag_id))
    }
    .await;
    respond(result)
}

async fn remove_lag_member(
    State(service): State<LagService>,
    payload: Result<Json<LagMembersRequest>, JsonRejection>,
) -> Response {
    let result: LagResult<LagResponse> = async {
        let req = body(payload).map_err(|e| service.reject(Operation::RemoveLagMember, e))?;
        service
            .remove_lag_members(&req.lag_id, &req.member_ids())
            .await?;
        Ok(LagResponse::ok().with_lag_id(req.lag_id))
    }
    .await;
    respond(result)
}

async fn get_lag(
    State(service): State<LagService>,
    payload: Result<Json<LagIdRequest>, JsonRejection>,
) -> Response {
    let result: LagResult<LagResponse> = async {
        let req = body(payload)?;
        let info = service.get_lag(&req.lag_id).await?;
        Ok(LagResponse::ok().with_lag(info))
    }
    .await;
    respond(result)
}

async fn list_lags(State(service): State<LagService>) -> Response {
    let result = service
        .list_lags()
        .await
        .map(|lags| LagResponse::ok().with_lags(lags));
    respond(result)
}

async fn health_handler(State(service): State<LagService>) -> impl IntoResponse {
    if service.gate().is_serving() {
        (
            StatusCode::OK,
            Json(serde_json::json!({ "status": "SERVING" })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "status": "NOT_SERVING" })),
        )
    }
}

async fn metrics_handler(State(service): State<LagService>) -> impl IntoResponse {
    match service.metrics().gather_text() {
        Ok(text) => (
            StatusCode::OK,
            [("content-type", TextEncoder::new().format_type().to_string())],
            text,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to encode metrics",
            )
                .into_response()
        }
    }
}
