//! API client layer for the recipe backend.
//!
//! # Overview
//! Every backend call goes through `ApiClient`. It resolves a `Route` (or a
//! raw URL) against the configured base URL, serializes the body, sends the
//! request through a `Transport`, and normalizes whatever happens into an
//! `ApiResponse`: the server's JSON object on success, `{isError, message,
//! errors?}` on failure. Calls never return `Err` and never panic on I/O.
//!
//! # Design
//! - `Route` is a closed enum; an unregistered endpoint cannot be named.
//! - Mutating verbs prime the CSRF cookie with a GET to `Route::CsrfToken`
//!   and echo it back in a header (`csrf`).
//! - 401/403 short-circuit response parsing and fire an injected
//!   `UnauthorizedHook` (`auth`).
//! - The network sits behind `Transport` so tests substitute canned
//!   responses. `UreqTransport` is the real one and owns the cookie jar.

pub mod auth;
pub mod client;
pub mod config;
pub mod csrf;
pub mod error;
pub mod feedback;
pub mod http;
pub mod response;
pub mod routes;
pub mod transport;
pub mod types;

pub use auth::{AuthInterceptor, AuthState, NoopHook, UnauthorizedHook};
pub use client::{ApiClient, ApiRequest, PendingCall, Target};
pub use config::{ClientConfig, ConfigError};
pub use csrf::{CookieJar, CookieSource, CsrfCoordinator};
pub use error::{ApiError, ErrorKind, TransportError};
pub use feedback::{handled_api_error, FormFeedback};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use response::ApiResponse;
pub use routes::Route;
pub use transport::{Transport, UreqTransport};
pub use types::{Equipment, Matches, NewEquipment, NewRecipe, Recipe, Signup};
