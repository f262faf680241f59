//! Clients preconfigured for request tracking.

use std::sync::Arc;

use berapi_client::{Client, ClientBuilder};
use berapi_config::Settings;
use berapi_core::BerapiResult;
use berapi_middleware::{LoggingMiddleware, RequestTracker};

/// Returns a builder with logging and tracking middleware installed, plus
/// the tracker it feeds.
///
/// Headers named in `mask_headers` are stored masked. More middleware or
/// another transport can still be added before `build`.
pub fn tracking_client_builder<I, S>(
    settings: Settings,
    mask_headers: I,
) -> (ClientBuilder, Arc<RequestTracker>)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let tracker = Arc::new(RequestTracker::new().mask_headers(mask_headers));
    let builder = Client::builder()
        .settings(settings)
        .middleware(LoggingMiddleware::new())
        .tracker(Arc::clone(&tracker));
    (builder, tracker)
}

/// Creates a client that records every attempt into a new tracker.
///
/// # Example
///
/// ```
/// use berapi::{create_tracking_client, Settings};
///
/// let settings = Settings::builder()
///     .without_env()
///     .base_url("https://api.example.com")
///     .build()
///     .unwrap();
/// let (client, tracker) = create_tracking_client(settings, ["Authorization"]).unwrap();
///
/// assert_eq!(client.pipeline().names(), vec!["logging", "tracking"]);
/// assert!(tracker.is_empty());
/// ```
pub fn create_tracking_client<I, S>(
    settings: Settings,
    mask_headers: I,
) -> BerapiResult<(Client, Arc<RequestTracker>)>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let (builder, tracker) = tracking_client_builder(settings, mask_headers);
    Ok((builder.build()?, tracker))
}
