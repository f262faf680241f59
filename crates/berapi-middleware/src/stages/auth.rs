//! Authentication header middlewares.

use std::future;

use berapi_core::{BerapiResult, BoxFuture, RequestContext};

use crate::middleware::Middleware;

/// Default header used by [`ApiKeyMiddleware`].
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

/// Sets `Authorization: Bearer <token>` on every request.
///
/// # Example
///
/// ```
/// use berapi_middleware::{BearerAuthMiddleware, Pipeline};
///
/// let pipeline = Pipeline::builder()
///     .add(BearerAuthMiddleware::new("s3cr3t"))
///     .build();
/// ```
#[derive(Clone)]
pub struct BearerAuthMiddleware {
    token: String,
}

impl BearerAuthMiddleware {
    /// Creates the middleware for `token`.
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl std::fmt::Debug for BearerAuthMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BearerAuthMiddleware")
            .field("token", &"***")
            .finish()
    }
}

impl Middleware for BearerAuthMiddleware {
    fn name(&self) -> &'static str {
        "bearer_auth"
    }

    fn transform_request<'a>(
        &'a self,
        request: RequestContext,
    ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
        let value = format!("Bearer {}", self.token);
        Box::pin(future::ready(request.with_header("Authorization", value)))
    }
}

/// Sets an API key header on every request.
#[derive(Clone)]
pub struct ApiKeyMiddleware {
    key: String,
    header: String,
}

impl ApiKeyMiddleware {
    /// Creates the middleware using the `X-API-Key` header.
    pub fn new(key: impl Into<String>) -> Self {
        Self::with_header(key, DEFAULT_API_KEY_HEADER)
    }

    /// Creates the middleware using a custom header name.
    pub fn with_header(key: impl Into<String>, header: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            header: header.into(),
        }
    }

    /// Returns the header this middleware sets.
    pub fn header_name(&self) -> &str {
        &self.header
    }
}

impl std::fmt::Debug for ApiKeyMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyMiddleware")
            .field("header", &self.header)
            .field("key", &"***")
            .finish()
    }
}

impl Middleware for ApiKeyMiddleware {
    fn name(&self) -> &'static str {
        "api_key"
    }

    fn transform_request<'a>(
        &'a self,
        request: RequestContext,
    ) -> BoxFuture<'a, BerapiResult<RequestContext>> {
        Box::pin(future::ready(request.with_header(&self.header, &self.key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Method;

    fn request() -> RequestContext {
        RequestContext::new(Method::GET, "https://example.com/me").unwrap()
    }

    #[tokio::test]
    async fn test_bearer_auth() {
        let out = BearerAuthMiddleware::new("test-token-123")
            .transform_request(request())
            .await
            .unwrap();
        assert_eq!(out.header("authorization"), Some("Bearer test-token-123"));
    }

    #[tokio::test]
    async fn test_bearer_auth_replaces_existing() {
        let request = request().with_header("Authorization", "Basic abc").unwrap();
        let out = BearerAuthMiddleware::new("t")
            .transform_request(request)
            .await
            .unwrap();
        assert_eq!(out.header("authorization"), Some("Bearer t"));
    }

    #[tokio::test]
    async fn test_api_key_default_header() {
        let middleware = ApiKeyMiddleware::new("secret-key");
        assert_eq!(middleware.header_name(), "X-API-Key");

        let out = middleware.transform_request(request()).await.unwrap();
        assert_eq!(out.header("x-api-key"), Some("secret-key"));
    }

    #[tokio::test]
    async fn test_api_key_custom_header() {
        let out = ApiKeyMiddleware::with_header("k", "X-Custom-Auth")
            .transform_request(request())
            .await
            .unwrap();
        assert_eq!(out.header("x-custom-auth"), Some("k"));
        assert_eq!(out.header("x-api-key"), None);
    }

    #[tokio::test]
    async fn test_invalid_header_name_fails() {
        let result = ApiKeyMiddleware::with_header("k", "bad header")
            .transform_request(request())
            .await;
        assert!(result.is_err());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let debug = format!("{:?}", BearerAuthMiddleware::new("s3cr3t"));
        assert!(!debug.contains("s3cr3t"));
    }
}
