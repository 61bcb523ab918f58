//! The single gateway every backend call goes through.
//!
//! # Design
//! `ApiClient::send` turns an `ApiRequest` into one HTTP round trip and
//! always returns an `ApiResponse`; failures at any step (serializing the
//! body, locating the endpoint, the transport, authorization, parsing the
//! reply) become error envelopes at the point they happen. The mutating
//! helpers (`post`, `put`, `patch`, `delete`) first GET `Route::CsrfToken`
//! so the transport picks up a fresh CSRF cookie, then send the real request
//! with that token in its headers. Targets on another origin still go out,
//! but never carry the token.
//!
//! Calls are independent. Nothing here queues, de-duplicates or times out
//! requests. `spawn` runs a call as its own task so a caller can drop a
//! superseded request with `PendingCall::cancel`; without that, every call
//! runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use serde::Serialize;
use serde_json::{Map, Value};
use tokio::task::JoinHandle;
use url::Url;

use crate::auth::{AuthInterceptor, AuthState, UnauthorizedHook};
use crate::config::{ClientConfig, ConfigError};
use crate::csrf::{CookieJar, CookieSource, CsrfCoordinator};
use crate::error::ApiError;
use crate::http::{merge_headers, HttpMethod, HttpRequest, HttpResponse};
use crate::response::ApiResponse;
use crate::routes::Route;
use crate::transport::{Transport, UreqTransport};

const DEFAULT_HEADERS: [(&str, &str); 2] = [
    ("Accept", "application/json"),
    ("Content-Type", "application/json"),
];

/// Where a request goes: a registered route, or a URL the caller already
/// built (typically from `ApiClient::route_url`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Route(Route),
    Url(String),
}

impl From<Route> for Target {
    fn from(route: Route) -> Self {
        Target::Route(route)
    }
}

/// One call's worth of input. Consumed by the client.
#[derive(Debug, Clone)]
pub struct ApiRequest<B = ()> {
    pub method: HttpMethod,
    pub target: Target,
    pub body: Option<B>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    /// A bodiless GET to `target`.
    pub fn to(target: impl Into<Target>) -> Self {
        Self {
            method: HttpMethod::Get,
            target: target.into(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::to(Target::Url(url.into()))
    }
}

impl<B> ApiRequest<B> {
    pub fn method(mut self, method: HttpMethod) -> Self {
        self.method = method;
        self
    }

    /// Attach a JSON body. Serialization happens when the request is sent.
    pub fn json<T: Serialize>(self, body: T) -> ApiRequest<T> {
        ApiRequest {
            method: self.method,
            target: self.target,
            body: Some(body),
            headers: self.headers,
        }
    }

    /// Add a header override; overrides beat the defaults and the CSRF header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

pub struct ApiClient<T> {
    base: Url,
    transport: Arc<T>,
    csrf: CsrfCoordinator,
    interceptor: AuthInterceptor,
}

impl ApiClient<UreqTransport> {
    /// A networked client sharing the process-wide cookie jar.
    pub fn connect(config: &ClientConfig) -> Result<Self, ConfigError> {
        let jar = CookieJar::ambient();
        let transport = UreqTransport::new(&config.base()?, jar.clone());
        Self::new(config, transport, Arc::new(jar))
    }
}

impl<T: Transport> ApiClient<T> {
    /// `cookies` is where the CSRF token is read from; it must be the store
    /// `transport` writes `Set-Cookie` headers into.
    pub fn new(
        config: &ClientConfig,
        transport: T,
        cookies: Arc<dyn CookieSource>,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            base: config.base()?,
            transport: Arc::new(transport),
            csrf: CsrfCoordinator::new(
                cookies,
                config.csrf_cookie_name.clone(),
                config.csrf_header_name.clone(),
            ),
            interceptor: AuthInterceptor::default(),
        })
    }

    /// Replace the no-op reaction to 401/403 responses.
    pub fn on_unauthorized(mut self, hook: impl UnauthorizedHook + 'static) -> Self {
        self.interceptor = AuthInterceptor::new(Arc::new(hook));
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Absolute URL of `route`, for callers that build a `Target::Url`.
    pub fn route_url(&self, route: &Route) -> Result<Url, ApiError> {
        self.locate(&Target::Route(route.clone()))
    }

    pub async fn get<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        self.send(request.method(HttpMethod::Get)).await
    }

    pub async fn post<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        self.mutate(request.method(HttpMethod::Post)).await
    }

    pub async fn put<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        self.mutate(request.method(HttpMethod::Put)).await
    }

    pub async fn patch<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        self.mutate(request.method(HttpMethod::Patch)).await
    }

    pub async fn delete<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        self.mutate(request.method(HttpMethod::Delete)).await
    }

    /// `send` for GET, the CSRF-primed path for every other verb.
    pub async fn call<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        if request.method.is_mutating() {
            self.mutate(request).await
        } else {
            self.send(request).await
        }
    }

    /// Run `call` as a tokio task. Must be called within a tokio runtime.
    pub fn spawn<B>(&self, request: ApiRequest<B>) -> PendingCall
    where
        B: Serialize + Send + 'static,
    {
        let client = self.clone();
        PendingCall {
            handle: tokio::spawn(async move { client.call(request).await }),
        }
    }

    /// Send exactly one request, with no CSRF priming.
    pub async fn send<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        let method = request.method;
        match self.try_send(request).await {
            Ok(response) => response,
            Err(err) => {
                tracing::debug!(%method, kind = ?err.kind(), error = %err, "request failed");
                err.into()
            }
        }
    }

    async fn mutate<B: Serialize>(&self, request: ApiRequest<B>) -> ApiResponse {
        // The token request's outcome is irrelevant: without a cookie the
        // real request fails server-side and reports that itself.
        let primed = self.send(ApiRequest::to(Route::CsrfToken)).await;
        if primed.is_error() {
            tracing::warn!(
                reason = primed.message().unwrap_or_default(),
                "CSRF token request failed, sending anyway"
            );
        }

        let ApiRequest {
            method,
            target,
            body,
            headers,
        } = request;
        // The token is a credential: it only goes to the base URL's origin.
        let same_origin = self
            .locate(&target)
            .is_ok_and(|url| url.origin() == self.base.origin());
        let headers = if same_origin {
            self.csrf.attach(headers)
        } else {
            tracing::debug!(%method, "cross-origin target, CSRF header withheld");
            headers
        };
        self.send(ApiRequest {
            method,
            target,
            body,
            headers,
        })
        .await
    }

    async fn try_send<B: Serialize>(&self, request: ApiRequest<B>) -> Result<ApiResponse, ApiError> {
        let ApiRequest {
            method,
            target,
            body,
            headers,
        } = request;

        let body = body
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(ApiError::Serialization)?;
        let headers = merge_headers(default_headers(), headers);
        let url = self.locate(&target)?;

        tracing::debug!(%method, %url, "dispatching request");
        let response = self
            .transport
            .execute(HttpRequest {
                method,
                url: url.into(),
                headers,
                body,
            })
            .await
            .map_err(|err| {
                tracing::warn!(%method, error = %err, "transport failed");
                ApiError::Transport(err)
            })?;

        if self.interceptor.inspect(response.status) == AuthState::Intercepted {
            return Err(ApiError::Unauthorized {
                status: response.status,
            });
        }
        interpret(response)
    }

    fn locate(&self, target: &Target) -> Result<Url, ApiError> {
        let raw = match target {
            Target::Route(route) => route.resolve(),
            Target::Url(url) => url.clone(),
        };
        if raw.trim().is_empty() {
            return Err(ApiError::UnknownLocation(raw));
        }
        let url = self
            .base
            .join(&raw)
            .map_err(|e| ApiError::UnknownLocation(format!("{raw}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::UnknownLocation(raw));
        }
        Ok(url)
    }
}

impl<T> Clone for ApiClient<T> {
    fn clone(&self) -> Self {
        Self {
            base: self.base.clone(),
            transport: Arc::clone(&self.transport),
            csrf: self.csrf.clone(),
            interceptor: self.interceptor.clone(),
        }
    }
}

impl<T> std::fmt::Debug for ApiClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base", &self.base.as_str())
            .field("csrf", &self.csrf)
            .finish_non_exhaustive()
    }
}

/// A call running on its own task. Resolves to the call's `ApiResponse`.
#[derive(Debug)]
pub struct PendingCall {
    handle: JoinHandle<ApiResponse>,
}

impl PendingCall {
    /// Abort the call. Awaiting it afterwards yields a cancelled envelope
    /// unless the call had already finished.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Future for PendingCall {
    type Output = ApiResponse;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(response)) => Poll::Ready(response),
            Poll::Ready(Err(err)) => {
                if !err.is_cancelled() {
                    tracing::error!(error = %err, "spawned request panicked");
                }
                Poll::Ready(ApiError::Cancelled.into())
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

fn default_headers() -> Vec<(String, String)> {
    DEFAULT_HEADERS
        .iter()
        .map(|(name, value)| (name.to_string(), value.to_string()))
        .collect()
}

/// Empty or whitespace-only bodies read as `{}`.
fn parse_body(body: &str) -> serde_json::Result<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_str(body)
}

fn interpret(response: HttpResponse) -> Result<ApiResponse, ApiError> {
    let status = response.status;
    if !response.is_success() {
        let payload = match parse_body(&response.body) {
            Ok(Value::Object(payload)) => payload,
            _ => Map::new(),
        };
        return Ok(ApiResponse::rejected(payload, status));
    }
    match parse_body(&response.body) {
        Ok(Value::Object(payload)) => Ok(ApiResponse::success(payload, status)),
        Ok(Value::Null) => Ok(ApiResponse::success(Map::new(), status)),
        _ => Err(ApiError::InvalidFormat { status }),
    }
}
