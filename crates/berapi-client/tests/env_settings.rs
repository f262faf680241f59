//! A client built without settings picks up `BERAPI__*` overrides.
//!
//! Kept in its own test binary since it mutates the process environment.

use std::time::Duration;

use berapi_client::{Client, MockTransport};

#[test]
fn test_client_without_settings_reads_environment() {
    std::env::set_var("BERAPI__TIMEOUT", "7");
    std::env::set_var("BERAPI__BASE_URL", "https://env.example.com");

    let client = Client::builder()
        .transport(MockTransport::new())
        .build()
        .unwrap();

    assert_eq!(client.settings().timeout(), Duration::from_secs(7));
    assert_eq!(client.settings().base_url(), Some("https://env.example.com"));
    assert_eq!(
        client.resolve_url("/users").unwrap(),
        "https://env.example.com/users"
    );
}
