//! The network seam.
//!
//! # Design
//! `Transport` executes one `HttpRequest` and yields the raw `HttpResponse`,
//! interpreting nothing: any status, any body. Only failures to obtain a
//! response at all are errors. The dispatcher owns every decision about
//! what a response means, so a test transport can be a few lines of canned
//! data.
//!
//! `UreqTransport` is the production implementation. It also plays the part
//! a browser plays for a web client: it keeps the cookie jar, attaching
//! cookies to same-origin requests and storing `Set-Cookie` headers from
//! same-origin responses.

use std::future::Future;

use url::{Origin, Url};

use crate::csrf::CookieJar;
use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

pub trait Transport: Send + Sync + 'static {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send;
}

/// Blocking `ureq` agent driven from tokio's blocking pool.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
    origin: Origin,
    jar: CookieJar,
}

impl UreqTransport {
    /// `origin` is the only origin that receives or sets cookies.
    pub fn new(origin: &Url, jar: CookieJar) -> Self {
        // 4xx/5xx are data for the dispatcher, not transport errors.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self {
            agent,
            origin: origin.origin(),
            jar,
        }
    }

    pub fn jar(&self) -> &CookieJar {
        &self.jar
    }
}

impl std::fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UreqTransport")
            .field("origin", &self.origin)
            .field("jar", &self.jar)
            .finish_non_exhaustive()
    }
}

impl Transport for UreqTransport {
    fn execute(
        &self,
        request: HttpRequest,
    ) -> impl Future<Output = Result<HttpResponse, TransportError>> + Send {
        let transport = self.clone();
        async move {
            tokio::task::spawn_blocking(move || transport.round_trip(request))
                .await
                .map_err(|e| TransportError::new(format!("transport task failed: {e}")))?
        }
    }
}

impl UreqTransport {
    fn is_same_origin(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|url| url.origin() == self.origin)
    }

    fn round_trip(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let same_origin = self.is_same_origin(&request.url);
        let mut headers = request.headers;
        if same_origin {
            if let Some(cookie) = self.jar.header_value() {
                headers.push(("Cookie".to_string(), cookie));
            }
        }

        let url = request.url.as_str();
        let result = match (request.method, request.body) {
            (HttpMethod::Get, _) => with_headers(self.agent.get(url), &headers).call(),
            (HttpMethod::Delete, _) => with_headers(self.agent.delete(url), &headers).call(),
            (HttpMethod::Post, Some(body)) => {
                with_headers(self.agent.post(url), &headers).send(body.as_bytes())
            }
            (HttpMethod::Post, None) => with_headers(self.agent.post(url), &headers).send_empty(),
            (HttpMethod::Put, Some(body)) => {
                with_headers(self.agent.put(url), &headers).send(body.as_bytes())
            }
            (HttpMethod::Put, None) => with_headers(self.agent.put(url), &headers).send_empty(),
            (HttpMethod::Patch, Some(body)) => {
                with_headers(self.agent.patch(url), &headers).send(body.as_bytes())
            }
            (HttpMethod::Patch, None) => with_headers(self.agent.patch(url), &headers).send_empty(),
        };
        let mut response = result.map_err(|e| TransportError::new(e.to_string()))?;

        let status = response.status().as_u16();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?;
                Some((name.as_str().to_string(), value.to_string()))
            })
            .collect();
        if same_origin {
            headers
                .iter()
                .filter(|(name, _)| name.eq_ignore_ascii_case("set-cookie"))
                .for_each(|(_, value)| self.jar.store_set_cookie(value));
        }
        // Bodies are decoded lossily: a malformed body is the dispatcher's to
        // judge once it has seen the status.
        let body = match response.body_mut().read_to_vec() {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) if !(200..300).contains(&status) => {
                tracing::debug!(status, error = %e, "discarding unreadable error body");
                String::new()
            }
            Err(e) => {
                return Err(TransportError::new(format!(
                    "failed to read response body: {e}"
                )))
            }
        };

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::sync::mpsc;

    use super::*;
    use crate::csrf::CookieSource;

    /// Serves one canned response on a loopback port and reports the raw
    /// request head it received.
    fn one_shot_server(response: Vec<u8>) -> (String, mpsc::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut head = Vec::new();
            let mut buf = [0u8; 1024];
            while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                head.extend_from_slice(&buf[..n]);
            }
            stream.write_all(&response).unwrap();
            tx.send(String::from_utf8_lossy(&head).to_ascii_lowercase())
                .unwrap();
        });
        (format!("http://{addr}"), rx)
    }

    fn get(url: String) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: Vec::new(),
            body: None,
        }
    }

    const SETS_COOKIE: &[u8] = b"HTTP/1.1 200 OK\r\nSet-Cookie: csrftoken=fresh; Path=/\r\nContent-Length: 2\r\nConnection: close\r\n\r\n{}";

    #[test]
    fn same_origin_requires_scheme_host_and_port() {
        let base = Url::parse("http://127.0.0.1:3000/").unwrap();
        let transport = UreqTransport::new(&base, CookieJar::new());
        assert!(transport.is_same_origin("http://127.0.0.1:3000/api/recipe/"));
        assert!(!transport.is_same_origin("http://127.0.0.1:4000/api/recipe/"));
        assert!(!transport.is_same_origin("https://127.0.0.1:3000/api/recipe/"));
        assert!(!transport.is_same_origin("http://example.test/"));
    }

    #[tokio::test]
    async fn unreachable_host_is_a_transport_error() {
        let base = Url::parse("http://127.0.0.1:9/").unwrap();
        let transport = UreqTransport::new(&base, CookieJar::new());
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: "http://127.0.0.1:9/api/csrf_token/".to_string(),
            headers: Vec::new(),
            body: None,
        };
        assert!(transport.execute(request).await.is_err());
    }

    #[tokio::test]
    async fn cookies_stay_with_their_origin() {
        let (server, head) = one_shot_server(SETS_COOKIE.to_vec());
        let jar = CookieJar::new();
        jar.set("csrftoken", "secret");
        let elsewhere = Url::parse("http://127.0.0.1:1/").unwrap();
        let transport = UreqTransport::new(&elsewhere, jar.clone());

        let response = transport.execute(get(format!("{server}/collect"))).await.unwrap();

        assert_eq!(response.status, 200);
        assert!(!head.recv().unwrap().contains("cookie:"));
        assert_eq!(jar.cookie("csrftoken").as_deref(), Some("secret"));
    }

    #[tokio::test]
    async fn same_origin_sends_and_stores_cookies() {
        let (server, head) = one_shot_server(SETS_COOKIE.to_vec());
        let jar = CookieJar::new();
        jar.set("csrftoken", "stale");
        let transport = UreqTransport::new(&Url::parse(&server).unwrap(), jar.clone());

        transport.execute(get(format!("{server}/api/csrf_token/"))).await.unwrap();

        assert!(head.recv().unwrap().contains("cookie: csrftoken=stale"));
        assert_eq!(jar.cookie("csrftoken").as_deref(), Some("fresh"));
    }

    #[tokio::test]
    async fn non_utf8_body_is_decoded_lossily() {
        let mut response = b"HTTP/1.1 200 OK\r\nContent-Length: 4\r\nConnection: close\r\n\r\n".to_vec();
        response.extend_from_slice(&[0xff, 0xfe, b'o', b'k']);
        let (server, _head) = one_shot_server(response);
        let transport = UreqTransport::new(&Url::parse(&server).unwrap(), CookieJar::new());

        let response = transport.execute(get(format!("{server}/"))).await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body, "\u{fffd}\u{fffd}ok");
    }
}
