//! Minimal HTTP client for page retrieval with safe logging and retries.
//!
//! - Client-wide default headers (browser-like `User-Agent`, `Accept`, ...)
//! - Per-request timeout and retry overrides
//! - Retries network errors, 429 and 5xx with exponential backoff and
//!   `Retry-After` support
//! - Decodes bodies with the charset named in `Content-Type` (UTF-8 when
//!   absent or unknown), replacing undecodable bytes
//! - Optional *raw* request/response logging via `DOCARCHIVE_HTTP_RAW=1`
//!
//! Example (no_run):
//! ```no_run
//! # async fn demo() -> Result<(), docarchive_http::HttpError> {
//! let client = docarchive_http::HttpClient::new("https://code.example")?;
//! let page = client
//!     .get_text("docs/en/overview", docarchive_http::RequestOpts::default())
//!     .await?;
//! println!("{} bytes of {}", page.body.len(), page.url);
//! # Ok(()) }
//! ```
//!
//! Observability: structured `tracing` events are emitted for request start,
//! response headers, body snippets (truncated), retries and final errors, and
//! (optionally) raw request/response lines (target `http.raw`).

use encoding_rs::{Encoding, UTF_8};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue, RETRY_AFTER};
use reqwest::{Client, Method, StatusCode, Url};
use std::env;
use std::time::Duration;
use thiserror::Error;
use tokio::time::sleep;

// ==============================
// Raw logging toggles
// ==============================

const RAW_ENV: &str = "DOCARCHIVE_HTTP_RAW";
const RAW_MAX_BODY: usize = 64 * 1024; // cap raw body logs (64 KiB)

fn raw_enabled() -> bool {
    matches!(
        env::var(RAW_ENV).as_deref(),
        Ok("1") | Ok("true") | Ok("yes")
    )
}

/// Render a best-effort curl command for repro/debug, with secrets redacted.
fn make_curl(method: &Method, url: &Url, headers: &HeaderMap) -> String {
    let mut parts = vec!["curl".to_string(), format!("-X{}", method)];
    for (key, val) in redact_headers(headers) {
        parts.push(format!("-H '{}: {}'", key, val.replace('\'', r"'\''")));
    }
    parts.push(format!("'{}'", url.as_str()));
    parts.join(" ")
}

/// Redact sensitive headers for logging
fn redact_headers(h: &HeaderMap) -> Vec<(String, String)> {
    h.iter()
        .map(|(k, v)| {
            let key = k.as_str().to_string();
            let mut val = v.to_str().unwrap_or("").to_string();
            if key.eq_ignore_ascii_case("authorization") || key.eq_ignore_ascii_case("cookie") {
                val = "<redacted>".into();
            }
            (key, val)
        })
        .collect()
}

// ==============================
// Errors
// ==============================

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("invalid URL: {0}")]
    Url(String),
    #[error("request build failed: {0}")]
    Build(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("server returned error {status}: {message}, request_id={request_id}")]
    Api {
        status: StatusCode,
        message: String,
        request_id: String,
    },
}

// ==============================
// Request Options & Responses
// ==============================

/// Per-request tuning knobs for the HTTP client.
///
/// ```
/// use docarchive_http::RequestOpts;
/// use std::time::Duration;
///
/// let opts = RequestOpts {
///     timeout: Some(Duration::from_secs(30)),
///     retries: Some(1),
///     allow_absolute: true,
///     ..Default::default()
/// };
///
/// assert_eq!(opts.timeout.unwrap().as_secs(), 30);
/// assert!(opts.allow_absolute);
/// ```
#[derive(Clone, Debug, Default)]
pub struct RequestOpts {
    pub timeout: Option<Duration>,
    pub retries: Option<usize>,
    /// If true and `path` is an absolute URL, use it as-is (ignore base).
    pub allow_absolute: bool,
}

/// A successfully fetched, decoded text body.
#[derive(Clone, Debug)]
pub struct TextResponse {
    /// Final URL after redirects.
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

/// A successfully fetched body, undecoded.
#[derive(Clone, Debug)]
pub struct BytesResponse {
    pub url: Url,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

// ==============================
// Client
// ==============================

#[derive(Clone)]
pub struct HttpClient {
    base: Url,
    inner: Client,
    default_headers: HeaderMap,
    pub default_timeout: Duration,
    pub max_retries: usize,
}

impl HttpClient {
    /// Construct a client anchored to a base URL.
    ///
    /// ```no_run
    /// use docarchive_http::{HttpClient, HttpError};
    /// use std::time::Duration;
    ///
    /// let client = HttpClient::new("https://code.example")?;
    /// assert_eq!(client.default_timeout, Duration::from_secs(30));
    /// assert_eq!(client.max_retries, 0);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn new(base: &str) -> Result<Self, HttpError> {
        let base = Url::parse(base).map_err(|e| HttpError::Url(e.to_string()))?;
        let inner = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HttpError::Build(e.to_string()))?;
        Ok(Self {
            base,
            inner,
            default_headers: HeaderMap::new(),
            default_timeout: Duration::from_secs(30),
            max_retries: 0,
        })
    }

    /// Override the default timeout returned by [`HttpClient::new`].
    pub fn with_timeout(mut self, dur: Duration) -> Self {
        self.default_timeout = dur;
        self
    }

    /// Override the default retry budget returned by [`HttpClient::new`].
    ///
    /// ```no_run
    /// use docarchive_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://code.example")?.with_retries(3);
    /// assert_eq!(client.max_retries, 3);
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Add a header sent with every request.
    ///
    /// ```no_run
    /// use docarchive_http::{HttpClient, HttpError};
    ///
    /// let client = HttpClient::new("https://code.example")?
    ///     .with_header("user-agent", "docarchive/0.1")?
    ///     .with_header("accept-language", "en-US,en;q=0.9")?;
    /// # Ok::<(), HttpError>(())
    /// ```
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self, HttpError> {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| HttpError::Build(format!("invalid header name '{name}': {e}")))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| HttpError::Build(format!("invalid value for header '{name}': {e}")))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// GET a page and decode its body as text.
    pub async fn get_text(&self, path: &str, opts: RequestOpts) -> Result<TextResponse, HttpError> {
        let (url, status, headers, bytes) = self.request_internal(Method::GET, path, opts).await?;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = decode_body(&bytes, content_type.as_deref());
        Ok(TextResponse {
            url,
            status,
            content_type,
            body,
        })
    }

    /// GET a resource and hand back the raw body.
    pub async fn get_bytes(&self, path: &str, opts: RequestOpts) -> Result<BytesResponse, HttpError> {
        let (url, status, headers, body) = self.request_internal(Method::GET, path, opts).await?;
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok(BytesResponse {
            url,
            status,
            content_type,
            body,
        })
    }

    fn resolve(&self, path: &str, allow_absolute: bool) -> Result<Url, HttpError> {
        if allow_absolute {
            if let Ok(abs) = Url::parse(path) {
                return Ok(abs);
            }
        }
        self.base
            .join(path)
            .map_err(|e| HttpError::Url(e.to_string()))
    }

    // ==============================
    // Core request implementation
    // ==============================

    async fn request_internal(
        &self,
        method: Method,
        path: &str,
        opts: RequestOpts,
    ) -> Result<(Url, StatusCode, HeaderMap, Vec<u8>), HttpError> {
        let url = self.resolve(path, opts.allow_absolute)?;

        let mut attempt = 0usize;
        let max_retries = opts.retries.unwrap_or(self.max_retries);

        loop {
            // ----- Build request -----
            let headers = &self.default_headers;

            let timeout = opts.timeout.unwrap_or(self.default_timeout);
            let rb = self
                .inner
                .request(method.clone(), url.clone())
                .timeout(timeout)
                .headers(headers.clone());

            // Lightweight request id without extra deps
            let req_id = format!(
                "r{:x}",
                std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos()
            );

            tracing::debug!(
                req_id=%req_id,
                attempt=attempt + 1,
                max_retries,
                method=%method,
                host_path=%format!("{}{}", url.host_str().unwrap_or("-"), url.path()),
                timeout_ms=timeout.as_millis() as u64,
                "http.request.start"
            );

            if raw_enabled() {
                let curl = make_curl(&method, &url, headers);
                tracing::debug!(target: "http.raw", %req_id, %curl, "request");
            }

            // ----- Send -----
            let t0 = std::time::Instant::now();
            let resp = match rb.send().await {
                Ok(resp) => resp,
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_send"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        message=%message,
                        "http.network_error.send"
                    );
                    return Err(HttpError::Network(message));
                }
            };
            let status = resp.status();
            let final_url = resp.url().clone();
            let headers = resp.headers().clone();
            let bytes = match resp.bytes().await {
                Ok(bytes) => bytes.to_vec(),
                Err(err) => {
                    let message = err.to_string();
                    if attempt < max_retries {
                        attempt += 1;
                        let delay = backoff(attempt);
                        tracing::warn!(
                            req_id=%req_id,
                            attempt,
                            max_retries,
                            backoff_ms=delay.as_millis() as u64,
                            message=%message,
                            "http.retrying.network_body"
                        );
                        sleep(delay).await;
                        continue;
                    }
                    tracing::warn!(
                        req_id=%req_id,
                        attempt,
                        max_retries,
                        message=%message,
                        "http.network_error.body"
                    );
                    return Err(HttpError::Network(message));
                }
            };
            let dur_ms = t0.elapsed().as_millis() as u64;

            let req_hdr_id = headers
                .get("x-request-id")
                .or_else(|| headers.get("x-correlation-id"))
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");

            tracing::debug!(
                req_id=%req_id,
                %status,
                duration_ms=dur_ms,
                body_len=bytes.len(),
                content_type=?headers.get(CONTENT_TYPE),
                x_request_id=%req_hdr_id,
                "http.response.headers"
            );

            if raw_enabled() {
                let hdrs = redact_headers(&headers);
                let truncated = bytes.len() > RAW_MAX_BODY;
                let text = String::from_utf8_lossy(&bytes[..bytes.len().min(RAW_MAX_BODY)]);
                tracing::info!(
                    target:"http.raw",
                    %req_id,
                    status=%status,
                    duration_ms=dur_ms,
                    headers=?hdrs,
                    body=%text,
                    truncated
                );
            }

            let snippet = snip_body(&bytes);
            tracing::trace!(
                req_id=%req_id,
                body_snippet=%snippet,
                "http.response.body_snippet"
            );

            // ----- Success path -----
            if status.is_success() {
                return Ok((final_url, status, headers, bytes));
            }

            // ----- Non-success: maybe retry -----
            let request_id = req_hdr_id.to_string();
            let is_429 = status == StatusCode::TOO_MANY_REQUESTS;
            let is_5xx = status.is_server_error();

            if (is_429 || is_5xx) && attempt < max_retries {
                attempt += 1;
                let delay = if let Some(secs) = retry_after_delay_secs(&headers) {
                    Duration::from_secs(secs)
                } else if is_429 {
                    // default floor for 429 when no Retry-After is present
                    backoff(attempt).max(Duration::from_millis(1100))
                } else {
                    backoff(attempt)
                };
                tracing::warn!(
                    req_id=%req_id,
                    %status,
                    attempt,
                    max_retries,
                    backoff_ms=delay.as_millis() as u64,
                    body_snippet=%snippet,
                    "http.retrying"
                );
                sleep(delay).await;
                continue;
            }

            let message = status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| snippet.clone());
            tracing::warn!(
                req_id=%req_id,
                %status,
                url=%url,
                x_request_id=%request_id,
                body_snippet=%snippet,
                "http.error"
            );
            return Err(HttpError::Api {
                status,
                message,
                request_id,
            });
        }
    }
}

// ==============================
// Helpers
// ==============================

fn backoff(attempt: usize) -> Duration {
    Duration::from_millis(200u64.saturating_mul(1 << (attempt.saturating_sub(1)).min(10)))
}

fn retry_after_delay_secs(h: &HeaderMap) -> Option<u64> {
    h.get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())?
        .trim()
        .parse()
        .ok()
}

fn snip_body(body: &[u8]) -> String {
    let mut snip = String::from_utf8_lossy(&body[..body.len().min(500)]).to_string();
    if body.len() > 500 {
        snip.push_str("...");
    }
    snip
}

/// Extract the charset label from a `Content-Type` value.
///
/// ```
/// use docarchive_http::charset_from_content_type;
///
/// assert_eq!(
///     charset_from_content_type("text/html; charset=ISO-8859-1").as_deref(),
///     Some("iso-8859-1")
/// );
/// assert_eq!(charset_from_content_type("text/html"), None);
/// ```
pub fn charset_from_content_type(content_type: &str) -> Option<String> {
    let lower = content_type.to_ascii_lowercase();
    let (_, rest) = lower.rsplit_once("charset=")?;
    let label = rest.split(';').next()?.trim().trim_matches(['"', '\'']);
    if label.is_empty() {
        None
    } else {
        Some(label.to_string())
    }
}

/// Decode a response body using the charset from `content_type`, defaulting to
/// UTF-8. Undecodable sequences become U+FFFD.
pub fn decode_body(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = content_type
        .and_then(charset_from_content_type)
        .and_then(|label| Encoding::for_label(label.as_bytes()))
        .unwrap_or(UTF_8);
    let (text, _, _) = encoding.decode(bytes);
    text.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_latin1_when_declared() {
        let body = [b'c', b'a', b'f', 0xE9];
        assert_eq!(decode_body(&body, Some("text/html; charset=iso-8859-1")), "café");
    }

    #[test]
    fn unknown_or_missing_charset_falls_back_to_utf8() {
        let body = "naïve".as_bytes();
        assert_eq!(decode_body(body, None), "naïve");
        assert_eq!(decode_body(body, Some("text/html; charset=bogus-9")), "naïve");
    }

    #[test]
    fn invalid_utf8_is_replaced_not_rejected() {
        let body = [b'o', b'k', 0xFF];
        assert_eq!(decode_body(&body, Some("text/html; charset=utf-8")), "ok\u{FFFD}");
    }

    #[test]
    fn charset_parsing_handles_quotes_and_params() {
        assert_eq!(
            charset_from_content_type("text/html; Charset=\"UTF-8\"; foo=bar").as_deref(),
            Some("utf-8")
        );
        assert_eq!(charset_from_content_type("text/html; charset="), None);
    }

    #[test]
    fn backoff_grows_exponentially() {
        assert_eq!(backoff(1), Duration::from_millis(200));
        assert_eq!(backoff(2), Duration::from_millis(400));
        assert_eq!(backoff(3), Duration::from_millis(800));
    }

    #[test]
    fn redacts_sensitive_headers() {
        let mut h = HeaderMap::new();
        h.insert("cookie", HeaderValue::from_static("session=abc"));
        h.insert("user-agent", HeaderValue::from_static("docarchive"));
        let red = redact_headers(&h);
        assert!(red.contains(&("cookie".to_string(), "<redacted>".to_string())));
        assert!(red.contains(&("user-agent".to_string(), "docarchive".to_string())));
    }
}
