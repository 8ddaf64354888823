//! Tests for `AppError` -> HTTP response mapping.
//!
//! These call `IntoResponse` directly on `AppError` values; no router is
//! involved.

use atelier_api::error::AppError;
use atelier_core::error::CoreError;
use atelier_core::params::ParseError;
use atelier_core::store::StoreError;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use http_body_util::BodyExt;
use uuid::Uuid;

async fn error_to_response(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    (status, json)
}

// ---------------------------------------------------------------------------
// Test: CoreError::NotFound maps to 404 with NOT_FOUND code
// ---------------------------------------------------------------------------

#[tokio::test]
async fn not_found_error_returns_404() {
    let id = Uuid::nil();
    let err = AppError::Core(CoreError::NotFound {
        entity: "Generation job",
        id,
    });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "NOT_FOUND");
    assert_eq!(json["error"], format!("Generation job with id {id} not found"));
}

// ---------------------------------------------------------------------------
// Test: ParseError maps to 400 with the user-facing message
// ---------------------------------------------------------------------------

#[tokio::test]
async fn parse_error_returns_400_with_message() {
    let err = AppError::Parse(ParseError::MissingValue { flag: "--steps" });

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["code"], "PARSE_ERROR");
    assert_eq!(json["error"], "--steps requires a value");
}

// ---------------------------------------------------------------------------
// Test: store errors are sanitized, duplicates are conflicts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn store_backend_error_is_sanitized() {
    let err = AppError::Store(StoreError::Backend("password authentication failed".into()));

    let (status, json) = error_to_response(err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["code"], "INTERNAL_ERROR");
    assert_eq!(json["error"], "An internal error occurred");
}

#[tokio::test]
async fn duplicate_job_returns_409() {
    let (status, json) = error_to_response(AppError::Store(StoreError::Duplicate(Uuid::nil()))).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["code"], "CONFLICT");
}

// ---------------------------------------------------------------------------
// Test: Forbidden and Unauthorized keep their messages
// ---------------------------------------------------------------------------

#[tokio::test]
async fn forbidden_and_unauthorized_map_to_403_and_401() {
    let (status, json) =
        error_to_response(AppError::Core(CoreError::Forbidden("nope".into()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(json["error"], "nope");

    let (status, json) =
        error_to_response(AppError::Core(CoreError::Unauthorized("token".into()))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["code"], "UNAUTHORIZED");
}
