//! Transport boundary: the blocking network call the dispatcher delegates to.

use std::collections::BTreeMap;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::header::HeaderMap;

use crate::{HeaderValue, Method, SearchValue, Timeout, TransportError};

/// Performs one blocking request, including any retries it was instructed to do.
pub trait Transport: Send + Sync {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// Retry settings passed to the transport. Absent means "do not retry".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryInstruction {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Fully resolved request as seen by a [`Transport`].
#[derive(Clone, Debug, PartialEq)]
pub struct TransportRequest {
    pub method: Method,
    pub url: String,
    pub search_params: BTreeMap<String, SearchValue>,
    pub headers: BTreeMap<String, HeaderValue>,
    pub body: Option<String>,
    pub json: Option<serde_json::Value>,
    pub timeout: Timeout,
    pub retry: Option<RetryInstruction>,
}

/// Raw response returned by a [`Transport`].
#[derive(Clone, Debug)]
pub struct TransportResponse {
    pub status_code: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TransportResponse {
    /// Reads the body as UTF-8 text.
    ///
    /// Fails with [`TransportError::Status`] when the status code is 300 or
    /// above; invalid UTF-8 sequences are replaced.
    pub fn text(&self) -> Result<String, TransportError> {
        if self.status_code >= 300 {
            return Err(TransportError::Status {
                status_code: self.status_code,
            });
        }
        Ok(String::from_utf8_lossy(&self.body).into_owned())
    }
}

/// Default transport on top of `reqwest::blocking`.
///
/// Retries transient failures, waiting a fixed delay between attempts:
/// - idempotent methods retry on timeouts, connect and request/body errors,
///   and on status 408, 429, 500, 502, 503 and 504;
/// - `POST`, `PATCH` and `CONNECT` retry only when the connection could not
///   be established, so the server never saw the request;
/// - requests reqwest refuses to build are never retried.
#[derive(Clone, Debug, Default)]
pub struct BlockingTransport {
    http: OnceLock<reqwest::blocking::Client>,
}

impl BlockingTransport {
    /// Creates a transport that builds its client on first use.
    pub fn new() -> Self {
        Self::default()
    }

    /// Uses a preconfigured client.
    ///
    /// Its own timeout applies whenever a request has [`Timeout::Disabled`].
    pub fn with_client(http: reqwest::blocking::Client) -> Self {
        Self {
            http: OnceLock::from(http),
        }
    }

    fn client(&self) -> Result<&reqwest::blocking::Client, TransportError> {
        if let Some(http) = self.http.get() {
            return Ok(http);
        }
        // Deadlines are set per request; without one the request may wait forever.
        let http = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        Ok(self.http.get_or_init(|| http))
    }

    fn send_once(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client()?
            .request(reqwest_method(request.method), request.url.as_str());

        if !request.search_params.is_empty() {
            let query: Vec<(&str, String)> = request
                .search_params
                .iter()
                .map(|(name, value)| (name.as_str(), value.to_string()))
                .collect();
            builder = builder.query(&query);
        }

        for (name, value) in &request.headers {
            for line in value.values() {
                builder = builder.header(name.as_str(), line);
            }
        }

        if let Some(json) = &request.json {
            builder = builder.json(json);
        } else if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        if let Some(timeout) = request.timeout.as_duration() {
            builder = builder.timeout(timeout);
        }

        let response = builder.send()?;
        let status_code = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes()?.to_vec();

        Ok(TransportResponse {
            status_code,
            headers,
            body,
        })
    }
}

impl Transport for BlockingTransport {
    fn send(&self, request: &TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut attempt = 0u32;
        loop {
            let outcome = self.send_once(request);
            let Some(retry) = request.retry else {
                return outcome;
            };

            if !should_retry(request.method, &outcome) || attempt >= retry.max_retries {
                return outcome;
            }

            attempt += 1;

            #[cfg(feature = "tracing")]
            tracing::debug!(
                attempt,
                delay_ms = retry.retry_delay.as_millis() as u64,
                url = %request.url,
                "retrying request"
            );

            if !retry.retry_delay.is_zero() {
                std::thread::sleep(retry.retry_delay);
            }
        }
    }
}

fn should_retry(method: Method, outcome: &Result<TransportResponse, TransportError>) -> bool {
    match outcome {
        Ok(response) => is_idempotent(method) && should_retry_status(response.status_code),
        Err(err) => should_retry_transport(method, err),
    }
}

fn is_idempotent(method: Method) -> bool {
    !matches!(method, Method::Post | Method::Patch | Method::Connect)
}

fn should_retry_status(status_code: u16) -> bool {
    matches!(status_code, 408 | 429 | 500 | 502 | 503 | 504)
}

fn should_retry_transport(method: Method, err: &TransportError) -> bool {
    let TransportError::Network(source) = err else {
        return false;
    };
    let Some(err) = source.downcast_ref::<reqwest::Error>() else {
        return false;
    };
    if err.is_builder() {
        return false;
    }
    if !is_idempotent(method) {
        return err.is_connect();
    }
    err.is_timeout() || err.is_connect() || err.is_request() || err.is_body()
}

fn reqwest_method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Head => reqwest::Method::HEAD,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
        Method::Connect => reqwest::Method::CONNECT,
        Method::Options => reqwest::Method::OPTIONS,
        Method::Trace => reqwest::Method::TRACE,
    }
}
