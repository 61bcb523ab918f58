//! HTTP transport types exchanged between the dispatcher and a `Transport`.
//!
//! # Design
//! Requests and responses are plain data. The dispatcher builds an
//! `HttpRequest`, hands it to whatever `Transport` the client was built
//! with, and interprets the `HttpResponse` it gets back. Keeping the wire
//! shapes as owned data is what lets tests swap the network for a recording
//! mock and assert on exactly what would have been sent.

use std::fmt;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
        }
    }

    /// Whether the backend requires a CSRF token for this verb.
    pub fn is_mutating(self) -> bool {
        !matches!(self, HttpMethod::Get)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An HTTP request described as plain data.
///
/// `url` is always absolute; the dispatcher resolves routes against the
/// configured base URL before building one of these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<String>,
}

impl HttpRequest {
    /// First value of `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// An HTTP response described as plain data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Overlay `overrides` onto `base`. An override replaces every entry of
/// `base` with the same (case-insensitive) name.
pub fn merge_headers(
    mut base: Vec<(String, String)>,
    overrides: Vec<(String, String)>,
) -> Vec<(String, String)> {
    for (name, value) in overrides {
        base.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
        base.push((name, value));
    }
    base
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(k: &str, v: &str) -> (String, String) {
        (k.to_string(), v.to_string())
    }

    #[test]
    fn only_get_is_non_mutating() {
        assert!(!HttpMethod::Get.is_mutating());
        for method in [
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Patch,
            HttpMethod::Delete,
        ] {
            assert!(method.is_mutating(), "{method} should be mutating");
        }
    }

    #[test]
    fn merge_overrides_win_case_insensitively() {
        let merged = merge_headers(
            vec![pair("Accept", "application/json"), pair("Content-Type", "application/json")],
            vec![pair("content-type", "text/plain"), pair("X-Extra", "1")],
        );
        assert_eq!(
            merged,
            vec![
                pair("Accept", "application/json"),
                pair("content-type", "text/plain"),
                pair("X-Extra", "1"),
            ]
        );
    }

    #[test]
    fn header_lookup_ignores_case() {
        let response = HttpResponse {
            status: 204,
            headers: vec![pair("Set-Cookie", "csrftoken=abc; Path=/")],
            body: String::new(),
        };
        assert_eq!(response.header("set-cookie"), Some("csrftoken=abc; Path=/"));
        assert!(response.is_success());
        assert!(!HttpResponse::new(422, "").is_success());
    }
}
