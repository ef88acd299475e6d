//! Problem Details assertions that do not depend on arena types.

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ProblemDetailsLike {
    #[serde(rename = "type")]
    type_: String,
    title: String,
    status: u16,
    detail: String,
    code: String,
}

/// Assert that a response carries the stable error contract:
/// status, `code`, a `type` URL ending in the kebab-cased code, and
/// optionally a detail substring.
pub async fn assert_problem_details(
    resp: HttpResponse,
    expected_code: &str,
    expected_status: StatusCode,
    expected_detail_contains: Option<&str>,
) {
    assert_eq!(resp.status(), expected_status);

    let content_type = resp
        .headers()
        .get(actix_web::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert_eq!(content_type, "application/problem+json");

    let body = actix_web::body::to_bytes(resp.into_body())
        .await
        .unwrap_or_else(|_| panic!("response body should be readable"));
    let problem: ProblemDetailsLike =
        serde_json::from_slice(&body).expect("body should be ProblemDetails JSON");

    assert_eq!(problem.code, expected_code);
    assert_eq!(problem.status, expected_status.as_u16());
    assert!(!problem.title.is_empty());
    let slug = expected_code.to_ascii_lowercase().replace('_', "-");
    assert!(
        problem.type_.ends_with(&slug),
        "type '{}' should end with '{slug}'",
        problem.type_
    );

    if let Some(expected) = expected_detail_contains {
        assert!(
            problem.detail.contains(expected),
            "expected detail to contain '{expected}', got '{}'",
            problem.detail
        );
    }
}
