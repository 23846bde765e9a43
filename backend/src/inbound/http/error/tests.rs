//! Tests for HTTP error mapping.

use super::*;
use actix_web::ResponseError;
use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use rstest::{fixture, rstest};
use serde_json::json;

const TRACE_ID: &str = "00000000-0000-0000-0000-000000000000";

#[fixture]
fn expected_trace_id() -> String {
    TRACE_ID.to_owned()
}

#[fixture]
fn internal_error_case(expected_trace_id: String) -> Error {
    Error::internal("provider said: invalid api key sk-123")
        .with_trace_id(expected_trace_id)
        .with_details(json!({"upstream": "secret"}))
}

#[fixture]
fn invalid_request_case(expected_trace_id: String) -> Error {
    Error::invalid_request("Image is required")
        .with_trace_id(expected_trace_id)
        .with_details(json!({"field": "image"}))
}

#[rstest]
#[case(Error::invalid_request("bad"), 400)]
#[case(Error::cancelled("Request cancelled by user"), 499)]
#[case(Error::not_configured("no key"), 500)]
#[case(Error::internal("boom"), 500)]
fn status_code_matches_error_code(#[case] error: Error, #[case] expected: u16) {
    assert_eq!(ResponseError::status_code(&error).as_u16(), expected);
}

async fn assert_error_response(
    error: Error,
    expected_status: StatusCode,
    expected_trace_id: Option<&str>,
) -> Error {
    let response = ResponseError::error_response(&error);
    assert_eq!(response.status(), expected_status);

    let header = response.headers().get(TRACE_ID_HEADER);
    match expected_trace_id {
        Some(expected) => {
            let trace_id = header
                .expect("trace-id header is set by error_response")
                .to_str()
                .expect("trace-id not valid UTF-8");
            assert_eq!(trace_id, expected);
        }
        None => assert!(header.is_none(), "trace-id header should not be present"),
    }

    let bytes = to_bytes(response.into_body())
        .await
        .expect("reading response body succeeds");

    serde_json::from_slice(&bytes).expect("Error JSON deserialisation succeeds")
}

#[rstest]
#[actix_web::test]
async fn internal_errors_are_redacted(
    #[from(internal_error_case)] internal_error: Error,
    expected_trace_id: String,
) {
    let redacted = assert_error_response(
        internal_error,
        StatusCode::INTERNAL_SERVER_ERROR,
        Some(expected_trace_id.as_str()),
    )
    .await;

    assert_eq!(redacted.code(), ErrorCode::InternalError);
    assert_eq!(redacted.message(), FAILED_MESSAGE);
    assert!(redacted.details().is_none());
}

#[rstest]
#[actix_web::test]
async fn validation_errors_keep_message_and_details(
    #[from(invalid_request_case)] invalid_request: Error,
    expected_trace_id: String,
) {
    let payload = assert_error_response(
        invalid_request,
        StatusCode::BAD_REQUEST,
        Some(expected_trace_id.as_str()),
    )
    .await;

    assert_eq!(payload.code(), ErrorCode::InvalidRequest);
    assert_eq!(payload.message(), "Image is required");
    assert_eq!(payload.details(), Some(&json!({"field": "image"})));
}

#[rstest]
#[actix_web::test]
async fn configuration_errors_are_not_redacted() {
    let payload = assert_error_response(
        Error::not_configured("Image edit provider credential is not configured"),
        StatusCode::INTERNAL_SERVER_ERROR,
        None,
    )
    .await;

    assert_eq!(payload.code(), ErrorCode::NotConfigured);
    assert_eq!(
        payload.message(),
        "Image edit provider credential is not configured"
    );
}

#[rstest]
#[actix_web::test]
async fn cancelled_errors_use_client_closed_status() {
    let status = StatusCode::from_u16(499).expect("499 is a valid status");
    let payload =
        assert_error_response(Error::cancelled("Request cancelled by user"), status, None).await;

    assert_eq!(payload.code(), ErrorCode::Cancelled);
}

#[rstest]
fn actix_errors_become_redacted_internal_errors() {
    let actix_error = actix_web::error::ErrorBadGateway("upstream detail");
    let error: Error = actix_error.into();

    assert_eq!(error.code(), ErrorCode::InternalError);
    assert_eq!(error.message(), FAILED_MESSAGE);
}
