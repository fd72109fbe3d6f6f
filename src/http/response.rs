//! JSON error responses.
//!
//! Every non-RPC failure the bridge produces has the same shape:
//! `{"error": <short kind>, "message": <detail>}`.

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

pub fn json_error(status: StatusCode, error: &str, message: impl Into<String>) -> Response {
    let message: String = message.into();
    (status, Json(json!({ "error": error, "message": message }))).into_response()
}

pub fn not_found(path: &str) -> Response {
    json_error(StatusCode::NOT_FOUND, "Not Found", format!("No route for {}", path))
}

pub fn method_not_allowed(method: &str, path: &str) -> Response {
    json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method Not Allowed",
        format!("{} is not supported on {}", method, path),
    )
}

/// Give the bare 413 and 408 produced by the limit and timeout layers the
/// same JSON shape as every other failure.
pub async fn normalize_layer_errors(response: Response) -> Response {
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/json"));
    if is_json {
        return response;
    }
    match response.status() {
        StatusCode::PAYLOAD_TOO_LARGE => json_error(
            StatusCode::PAYLOAD_TOO_LARGE,
            "Payload Too Large",
            "Request body exceeds the configured limit",
        ),
        StatusCode::REQUEST_TIMEOUT => json_error(
            StatusCode::REQUEST_TIMEOUT,
            "Request Timeout",
            "Request did not complete within the configured timeout",
        ),
        _ => response,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use serde_json::Value;

    #[tokio::test]
    async fn bare_layer_errors_become_json() {
        for status in [StatusCode::PAYLOAD_TOO_LARGE, StatusCode::REQUEST_TIMEOUT] {
            let response = normalize_layer_errors(status.into_response()).await;
            assert_eq!(response.status(), status);
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            let body: Value = serde_json::from_slice(&bytes).unwrap();
            assert!(body["error"].is_string());
            assert!(body["message"].is_string());
        }
    }

    #[tokio::test]
    async fn other_responses_pass_through() {
        let response = normalize_layer_errors(StatusCode::NO_CONTENT.into_response()).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let json = json_error(StatusCode::PAYLOAD_TOO_LARGE, "custom", "kept");
        let response = normalize_layer_errors(json).await;
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "custom");
    }
}
