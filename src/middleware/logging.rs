use axum::{
    extract::Request,
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::error::LoggedError;

const REQUEST_ID: &str = "x-request-id";

/// Tags each request with an id and logs its outcome. Failed handlers leave a
/// [`LoggedError`] in the response extensions; its detail is logged here and
/// never reaches the client.
pub async fn logging_middleware(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let request_id = Uuid::new_v4().to_string();
    let start = Instant::now();

    let mut response = next.run(req).await;

    let status = response.status();
    let elapsed = start.elapsed();

    match response.extensions().get::<LoggedError>() {
        Some(failure) if status.is_server_error() => error!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            code = failure.code,
            detail = %failure.detail,
            "Failed to process request"
        ),
        Some(failure) => warn!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            code = failure.code,
            detail = %failure.detail,
            "Rejected request"
        ),
        None => info!(
            request_id = %request_id,
            method = %method,
            uri = %uri,
            status = %status,
            elapsed = ?elapsed,
            "Processed request"
        ),
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID, value);
    }

    response
}
