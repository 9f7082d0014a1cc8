//! Authentication error types.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Message for both a missing and an invalid credential, so the two are
/// indistinguishable to the client.
pub const NOT_AUTHENTICATED: &str = "Authentication credentials were not provided.";

/// Rejection of the `Auth` extractor. Leaves cookies untouched.
#[derive(Debug)]
pub struct ApiAuthError;

impl IntoResponse for ApiAuthError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct ErrorResponse {
            detail: &'static str,
        }

        let mut response = (
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                detail: NOT_AUTHENTICATED,
            }),
        )
            .into_response();

        response.headers_mut().insert(
            header::WWW_AUTHENTICATE,
            HeaderValue::from_static("Bearer realm=\"api\""),
        );

        response
    }
}
