//! Tests written the way a berapi suite would use the facade.

use std::sync::Arc;
use std::time::Duration;

use berapi::prelude::*;
use berapi::tracking_client_builder;
use serde_json::json;

fn settings() -> Settings {
    Settings::builder()
        .without_env()
        .base_url("https://api.example.com")
        .header("X-Suite", "smoke")
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_question_mark_on_calls_and_assertions() -> berapi::Result<()> {
    let transport = MockTransport::new().json(
        201,
        &json!({"id": 42, "name": "Ada", "roles": ["admin"], "active": true}),
    );
    let client = Client::builder()
        .settings(settings())
        .transport(transport)
        .build()?;

    client
        .post("/users")
        .json(&json!({"name": "Ada"}))
        .send()
        .await?
        .assert_status(201)?
        .assert_json_path("name", "Ada")?
        .assert_value_in("roles.0", ["admin", "owner"])?
        .assert_not_empty("roles")?
        .assert_json_schema_from_sample(&json!({"id": 1, "name": "", "roles": [""], "active": false}))?;
    Ok(())
}

#[tokio::test]
async fn test_assertion_failure_converts() {
    let client = Client::builder()
        .settings(settings())
        .transport(MockTransport::new().json(200, &json!({"id": 1})))
        .build()
        .unwrap();

    let result: berapi::Result<()> = async {
        client.get("/users/1").send().await?.assert_has_key("email")?;
        Ok::<(), Error>(())
    }
    .await;

    let err = result.unwrap_err();
    assert!(err.is_assertion());
    assert!(matches!(
        err,
        Error::Assertion(AssertionError::JsonPath {
            actual: Actual::Absent,
            ..
        })
    ));
}

#[tokio::test(start_paused = true)]
async fn test_tracking_client_records_retries() {
    let settings = Settings::builder()
        .without_env()
        .base_url("https://api.example.com")
        .retry_enabled(true)
        .max_retries(2)
        .backoff_factor(Duration::from_millis(100))
        .build()
        .unwrap();
    let transport = Arc::new(
        MockTransport::new()
            .reply(MockReply::new(503))
            .json(200, &json!({"ok": true})),
    );
    let (builder, tracker) = tracking_client_builder(settings, ["X-API-Key"]);
    let client = builder
        .api_key("k-123")
        .transport(Arc::clone(&transport))
        .build()
        .unwrap();

    let response = client.get("/health").send().await.unwrap();
    response.assert_2xx().unwrap();
    assert_eq!(response.attempt(), 1);

    let entries = tracker.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].status, Some(503));
    assert_eq!(entries[1].status, Some(200));
    assert_eq!(entries[0].request_id, entries[1].request_id);
    // the api key middleware runs after tracking, so the tracker never sees it
    assert!(entries[0].request_headers.get("x-api-key").is_none());
    assert_eq!(
        transport.calls()[0].request.header("x-api-key"),
        Some("k-123")
    );
}

#[tokio::test]
async fn test_soft_checks_through_facade() {
    let client = Client::builder()
        .settings(settings())
        .transport(MockTransport::new().json(500, &json!({"error": "boom"})))
        .build()
        .unwrap();

    let response = client.get("/").send().await.unwrap();
    response
        .soft()
        .assert_2xx()
        .assert_contains("boom")
        .assert_header("content-type", "text/plain");

    let failures = response.soft_failures();
    assert_eq!(failures.len(), 2);
    assert!(matches!(
        response.assert_no_soft_failures(),
        Err(AssertionError::SoftFailures { .. })
    ));
}
