//! Helpers shared by the component routers.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::store::StoreError;

pub(crate) fn error_response(status: StatusCode, error: impl std::fmt::Display) -> Response {
    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}

/// Runs a storage-bound service call on tokio's blocking pool so SQLite work
/// and the busy timeout never stall an async worker.
pub(crate) async fn run_blocking<T, E, F>(call: F) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: From<StoreError> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(join) => Err(StoreError::from(join).into()),
    }
}
