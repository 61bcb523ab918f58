//! CSRF token storage and header injection.
//!
//! # Design
//! The backend hands out its CSRF token as a cookie in response to a GET on
//! `Route::CsrfToken` and expects it echoed back in a header on every
//! mutating request. The cookie lives in a process-wide `CookieJar`
//! (`CookieJar::ambient()`): the transport writes it from `Set-Cookie`
//! headers, everything else only reads it through `CookieSource`. Tests hand
//! the client their own `CookieSource` instead of the ambient jar.

use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::http::merge_headers;

/// Read access to cookies previously set by the server.
pub trait CookieSource: Send + Sync {
    fn cookie(&self, name: &str) -> Option<String>;
}

impl<F> CookieSource for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn cookie(&self, name: &str) -> Option<String> {
        self(name)
    }
}

/// Shared name/value cookie store for a single origin.
///
/// Clones share the same underlying map.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    cookies: Arc<RwLock<BTreeMap<String, String>>>,
}

impl CookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide jar. Populated by responses to same-origin requests
    /// and read before every mutating request until the server rotates or
    /// clears the token.
    pub fn ambient() -> CookieJar {
        static AMBIENT: OnceLock<CookieJar> = OnceLock::new();
        AMBIENT.get_or_init(CookieJar::new).clone()
    }

    pub fn set(&self, name: impl Into<String>, value: impl Into<String>) {
        self.cookies.write().insert(name.into(), value.into());
    }

    pub fn remove(&self, name: &str) {
        self.cookies.write().remove(name);
    }

    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    /// Apply one `Set-Cookie` header value. An empty value, a non-positive
    /// `Max-Age` or an `Expires` date in the past deletes the cookie.
    /// `Max-Age` takes precedence over `Expires` when both are present.
    pub fn store_set_cookie(&self, header: &str) {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let value = value.trim().trim_matches('"');

        let mut max_age = None;
        let mut expires = None;
        for attribute in parts {
            let Some((key, attr_value)) = attribute.split_once('=') else {
                continue;
            };
            let key = key.trim();
            if key.eq_ignore_ascii_case("max-age") {
                max_age = attr_value.trim().parse::<i64>().ok();
            } else if key.eq_ignore_ascii_case("expires") {
                expires = DateTime::parse_from_rfc2822(attr_value.trim()).ok();
            }
        }
        let expired = match (max_age, expires) {
            (Some(age), _) => age <= 0,
            (None, Some(at)) => at <= Utc::now(),
            (None, None) => false,
        };

        if value.is_empty() || expired {
            self.remove(name);
        } else {
            self.set(name, value);
        }
    }

    /// Value for a `Cookie` request header, or `None` when empty.
    pub fn header_value(&self) -> Option<String> {
        let cookies = self.cookies.read();
        if cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = cookies
            .iter()
            .map(|(name, value)| format!("{name}={value}"))
            .collect();
        Some(pairs.join("; "))
    }
}

impl CookieSource for CookieJar {
    fn cookie(&self, name: &str) -> Option<String> {
        self.cookies.read().get(name).cloned()
    }
}

/// Reads the CSRF cookie and turns it into a request header.
#[derive(Clone)]
pub struct CsrfCoordinator {
    cookies: Arc<dyn CookieSource>,
    cookie_name: String,
    header_name: String,
}

impl CsrfCoordinator {
    pub fn new(
        cookies: Arc<dyn CookieSource>,
        cookie_name: impl Into<String>,
        header_name: impl Into<String>,
    ) -> Self {
        Self {
            cookies,
            cookie_name: cookie_name.into(),
            header_name: header_name.into(),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.cookies.cookie(&self.cookie_name)
    }

    /// Header overrides for a mutating request: the CSRF header first, then
    /// the caller's overrides, which win on conflict. No token, no header.
    pub fn attach(&self, overrides: Vec<(String, String)>) -> Vec<(String, String)> {
        let token_header = self
            .token()
            .map(|token| vec![(self.header_name.clone(), token)])
            .unwrap_or_default();
        merge_headers(token_header, overrides)
    }
}

impl std::fmt::Debug for CsrfCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CsrfCoordinator")
            .field("cookie_name", &self.cookie_name)
            .field("header_name", &self.header_name)
            .finish_non_exhaustive()
    }
}
