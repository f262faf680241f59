//! The client and its request builder.

use std::fmt;
use std::sync::Arc;

use berapi_assert::Response;
use berapi_config::{Settings, SettingsBuilder};
use berapi_core::{BerapiError, BerapiResult, RequestContext, Transport};
use berapi_middleware::{
    ApiKeyMiddleware, BearerAuthMiddleware, BoxedMiddleware, Middleware, Pipeline,
    PipelineBuilder, RequestTracker, TrackingMiddleware,
};
use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, Method};
use serde::Serialize;

use crate::retry::{self, RetryPolicy};
use crate::transport::ReqwestTransport;

struct Inner {
    settings: Settings,
    default_headers: HeaderMap,
    policy: RetryPolicy,
    pipeline: Pipeline,
    transport: Arc<dyn Transport>,
}

/// An HTTP test client.
///
/// Cheap to clone; clones share settings, pipeline and transport.
///
/// # Example
///
/// ```no_run
/// use berapi_client::Client;
/// use berapi_config::{Settings, SettingsBuilder};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let client = Client::builder()
///     .settings(Settings::builder().base_url("https://api.example.com").build()?)
///     .bearer_token("secret")
///     .build()?;
///
/// client
///     .get("/users/1")
///     .send()
///     .await?
///     .assert_2xx()?
///     .assert_has_key("email")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

impl Client {
    /// Creates a client from the defaults and the `BERAPI__*` environment,
    /// using the `reqwest` transport.
    pub fn new() -> BerapiResult<Self> {
        Self::builder().build()
    }

    /// Creates a client builder.
    #[must_use]
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Returns the client settings.
    pub fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    /// Returns the retry policy derived from the settings.
    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.inner.policy
    }

    /// Returns the middleware pipeline.
    pub fn pipeline(&self) -> &Pipeline {
        &self.inner.pipeline
    }

    /// Starts a GET request.
    pub fn get(&self, path: &str) -> RequestBuilder {
        self.request(Method::GET, path)
    }

    /// Starts a POST request.
    pub fn post(&self, path: &str) -> RequestBuilder {
        self.request(Method::POST, path)
    }

    /// Starts a PUT request.
    pub fn put(&self, path: &str) -> RequestBuilder {
        self.request(Method::PUT, path)
    }

    /// Starts a PATCH request.
    pub fn patch(&self, path: &str) -> RequestBuilder {
        self.request(Method::PATCH, path)
    }

    /// Starts a DELETE request.
    pub fn delete(&self, path: &str) -> RequestBuilder {
        self.request(Method::DELETE, path)
    }

    /// Starts a request with any supported method.
    ///
    /// `path` is joined to the base url unless it is already absolute.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        RequestBuilder::new(self.clone(), method, path)
    }

    /// Resolves `path` against the base url.
    ///
    /// Absolute urls are returned as they are.
    pub fn resolve_url(&self, path: &str) -> BerapiResult<String> {
        if is_absolute(path) {
            return Ok(path.to_string());
        }
        match self.inner.settings.base_url() {
            Some(base) => Ok(join_url(base, path)),
            None => Err(BerapiError::invalid_request(format!(
                "relative url '{path}' and no base_url configured"
            ))),
        }
    }

    /// Runs a prepared request through the retry loop and the pipeline.
    pub async fn execute(&self, request: RequestContext) -> BerapiResult<Response> {
        let inner = &self.inner;
        let context =
            retry::execute(&inner.policy, &inner.pipeline, inner.transport.as_ref(), request)
                .await?;
        Ok(Response::new(context))
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("settings", &self.inner.settings)
            .field("pipeline", &self.inner.pipeline)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Client`].
#[must_use]
pub struct ClientBuilder {
    settings: Option<Settings>,
    pipeline: PipelineBuilder,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientBuilder {
    /// Creates a builder with default settings and no middleware.
    pub fn new() -> Self {
        Self {
            settings: None,
            pipeline: Pipeline::builder(),
            transport: None,
        }
    }

    /// Sets the client settings.
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = Some(settings);
        self
    }

    /// Appends a middleware.
    pub fn middleware<M: Middleware>(mut self, middleware: M) -> Self {
        self.pipeline = self.pipeline.add(middleware);
        self
    }

    /// Appends a middleware that is also held elsewhere.
    pub fn middleware_shared(mut self, middleware: BoxedMiddleware) -> Self {
        self.pipeline = self.pipeline.add_shared(middleware);
        self
    }

    /// Appends a [`BearerAuthMiddleware`].
    pub fn bearer_token(self, token: impl Into<String>) -> Self {
        self.middleware(BearerAuthMiddleware::new(token))
    }

    /// Appends an [`ApiKeyMiddleware`] using the default header.
    pub fn api_key(self, key: impl Into<String>) -> Self {
        self.middleware(ApiKeyMiddleware::new(key))
    }

    /// Appends a [`TrackingMiddleware`] feeding `tracker`.
    pub fn tracker(self, tracker: Arc<RequestTracker>) -> Self {
        self.middleware(TrackingMiddleware::new(tracker))
    }

    /// Replaces the default `reqwest` transport.
    pub fn transport<T: Transport>(mut self, transport: T) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the client.
    ///
    /// # Errors
    ///
    /// [`BerapiError::InvalidRequest`] if a default header is not a valid
    /// header or the environment holds a bad `BERAPI__*` override, or a
    /// transport error if the `reqwest` client cannot be built.
    pub fn build(self) -> BerapiResult<Client> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => resolve_settings(Settings::builder())?,
        };
        let default_headers = header_map(settings.headers().iter())?;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new()?),
        };

        Ok(Client {
            inner: Arc::new(Inner {
                policy: RetryPolicy::from_settings(&settings),
                default_headers,
                settings,
                pipeline: self.pipeline.build(),
                transport,
            }),
        })
    }
}

/// A request being assembled. Nothing is sent until [`send`](Self::send).
///
/// Builder errors (a bad header, a body that fails to serialize) are held
/// and returned by `send`.
#[must_use = "a request does nothing until it is sent"]
pub struct RequestBuilder {
    client: Client,
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: Option<Bytes>,
    error: Option<BerapiError>,
}

impl RequestBuilder {
    fn new(client: Client, method: Method, path: &str) -> Self {
        Self {
            client,
            method,
            path: path.to_string(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            error: None,
        }
    }

    /// Sets a header, overriding the client defaults.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Sets several headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers
            .extend(headers.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    /// Appends a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Sets `Authorization: Bearer <token>` for this request only.
    pub fn bearer_token(self, token: &str) -> Self {
        self.header(AUTHORIZATION.as_str(), format!("Bearer {token}"))
    }

    /// Serializes `body` as JSON and sets the Content-Type.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Self {
        match serde_json::to_vec(body) {
            Ok(bytes) => {
                self.body = Some(Bytes::from(bytes));
                self.header(CONTENT_TYPE.as_str(), "application/json")
            }
            Err(e) => {
                self.error
                    .get_or_insert_with(|| BerapiError::invalid_request(format!("invalid JSON body: {e}")));
                self
            }
        }
    }

    /// Sets an `application/x-www-form-urlencoded` body.
    pub fn form<I, K, V>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        self.body = Some(Bytes::from(encode_pairs(fields)));
        self.header(CONTENT_TYPE.as_str(), "application/x-www-form-urlencoded")
    }

    /// Sets a raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Builds the request context without sending it.
    pub fn build(self) -> BerapiResult<RequestContext> {
        if let Some(error) = self.error {
            return Err(error);
        }

        let mut url = self.client.resolve_url(&self.path)?;
        if !self.query.is_empty() {
            url.push(if url.contains('?') { '&' } else { '?' });
            url.push_str(&encode_pairs(self.query.iter().map(|(k, v)| (k, v))));
        }

        let mut request = RequestContext::new(self.method, url)?
            .with_headers(self.client.inner.default_headers.clone());
        for (name, value) in &self.headers {
            request = request.with_header(name, value)?;
        }
        if let Some(body) = self.body {
            request = request.with_body(body);
        }
        Ok(request)
    }

    /// Sends the request and waits for the final response.
    pub async fn send(self) -> BerapiResult<Response> {
        let client = self.client.clone();
        let request = self.build()?;
        client.execute(request).await
    }
}

impl fmt::Debug for RequestBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestBuilder")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

fn is_absolute(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn join_url(base: &str, path: &str) -> String {
    if path.is_empty() {
        return base.to_string();
    }
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn encode_pairs<I, K, V>(pairs: I) -> String
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: AsRef<str>,
{
    pairs
        .into_iter()
        .map(|(k, v)| {
            format!(
                "{}={}",
                urlencoding::encode(k.as_ref()),
                urlencoding::encode(v.as_ref())
            )
        })
        .collect::<Vec<_>>()
        .join("&")
}

/// Settings for a builder that was never given any.
fn resolve_settings(builder: SettingsBuilder) -> BerapiResult<Settings> {
    builder
        .build()
        .map_err(|e| BerapiError::invalid_request(format!("invalid settings: {e}")))
}

fn header_map<'a, I>(headers: I) -> BerapiResult<HeaderMap>
where
    I: Iterator<Item = (&'a String, &'a String)>,
{
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
            BerapiError::invalid_request(format!("invalid default header '{name}': {e}"))
        })?;
        let header_value = HeaderValue::from_str(value).map_err(|e| {
            BerapiError::invalid_request(format!("invalid value for default header '{name}': {e}"))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}
