//! YAML tests talking to a mocked HTTP server.

#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        clippy::missing_errors_doc,
        clippy::assertions_on_result_states,
        clippy::print_stdout,
        clippy::print_stderr,
        clippy::tests_outside_test_module,
        reason = "Test allows"
    )
)]

use citrus_runtime::{Citrus, TestResult, load_test_str};
use integration_tests::fixture_config;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CREATE_USER: &str = r#"
name: create-user
endpoints:
  - http:
      client:
        name: userClient
        requestUrl: BASE_URL
        requestMethod: POST
        timeout: 2000
actions:
  - send:
      endpoint: userClient
      message:
        headers:
          - name: citrus_http_request_uri
            value: /users
          - name: X-Request-User
            value: ${fixtureUser}
        body:
          data: '{"name": "${fixtureUser}"}'
  - receive:
      endpoint: userClient
      message:
        headers:
          - name: citrus_http_status_code
            value: EXPECTED_STATUS
        body:
          data: '{"id": "@isNumber()@", "name": "citrus"}'
      extract:
        body:
          - path: $.id
            variable: userId
  - send:
      endpoint: userClient
      message:
        headers:
          - name: citrus_http_method
            value: GET
          - name: citrus_http_request_uri
            value: /users/${userId}
  - receive:
      endpoint: userClient
      validate:
        - jsonPath:
            - expression: $.name
              value: citrus
"#;

async fn run_against(server: &MockServer, expected_status: &str) -> TestResult {
    let reports = TempDir::new().unwrap();
    let citrus = Citrus::new(fixture_config(reports.path()));
    let yaml = CREATE_USER
        .replace("BASE_URL", &server.uri())
        .replace("EXPECTED_STATUS", expected_status);
    let test = load_test_str(&yaml).unwrap();
    citrus.run(&test).await
}

async fn mock_user_api() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(header("X-Request-User", "citrus"))
        .and(body_string_contains("\"name\": \"citrus\""))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header("Content-Type", "application/json")
                .set_body_string(r#"{"id": 7, "name": "citrus"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/users/7"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Content-Type", "application/json")
                .set_body_string(r#"{"id": 7, "name": "citrus"}"#),
        )
        .expect(1)
        .mount(&server)
        .await;
    server
}

#[tokio::test]
async fn test_http_request_and_response_validation() {
    let server = mock_user_api().await;
    let result = run_against(&server, "201").await;
    assert!(result.is_success(), "{:?}", result.cause);
}

#[tokio::test]
async fn test_http_status_mismatch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let result = run_against(&server, "201").await;
    assert!(result.is_failed());
    assert!(result.cause.is_some());
}
