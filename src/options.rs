use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::{HeaderValue, SearchValue};

/// HTTP method of a request.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Hash)]
pub enum Method {
    #[default]
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Connect,
    Options,
    Trace,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
            Self::Connect => "CONNECT",
            Self::Options => "OPTIONS",
            Self::Trace => "TRACE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Retry policy handed to the transport.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Retry {
    /// Maximum number of retries after the initial attempt. `0` disables retrying.
    pub limit: u32,
    /// Fixed delay between attempts, in milliseconds.
    pub delay_ms: u64,
}

impl Retry {
    pub fn new(limit: u32) -> Self {
        Self { limit, delay_ms: 0 }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

impl Default for Retry {
    fn default() -> Self {
        Self {
            limit: 2,
            delay_ms: 0,
        }
    }
}

/// Deadline for getting a response.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    After(Duration),
    /// No deadline at all.
    Disabled,
}

impl Timeout {
    /// Deadline of `millis` milliseconds. `0` means no deadline.
    pub fn from_millis(millis: u64) -> Self {
        if millis == 0 {
            return Self::Disabled;
        }
        Self::After(Duration::from_millis(millis))
    }

    pub fn as_duration(self) -> Option<Duration> {
        match self {
            Self::After(duration) => Some(duration),
            Self::Disabled => None,
        }
    }
}

impl Default for Timeout {
    fn default() -> Self {
        Self::from_millis(10_000)
    }
}

/// How the response body is interpreted.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ResponseType {
    /// UTF-8 text.
    Text,
    /// UTF-8 text parsed as JSON.
    Json,
    /// The body is not read.
    None,
}

/// Per-call or per-instance request options.
///
/// Every field is optional; unset fields fall back to the instance defaults
/// and then to the built-in defaults when the request is resolved.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RequestOptions {
    pub method: Option<Method>,
    /// Base URL the request URL is resolved against.
    pub prefix_url: Option<String>,
    pub retry: Option<Retry>,
    pub timeout: Option<Timeout>,
    /// Defaults to [`ResponseType::Json`] when `json` is set, otherwise
    /// [`ResponseType::Text`].
    pub response_type: Option<ResponseType>,
    pub search_params: Option<BTreeMap<String, SearchValue>>,
    /// JSON payload. Takes precedence over `body` when both are set; `null`
    /// counts as no payload.
    pub json: Option<serde_json::Value>,
    pub headers: Option<BTreeMap<String, HeaderValue>>,
    pub body: Option<String>,
    /// Whether 4xx/5xx responses raise [`crate::HttpError`]. Defaults to `true`.
    pub throw_http_errors: Option<bool>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn prefix_url(mut self, prefix_url: impl Into<String>) -> Self {
        self.prefix_url = Some(prefix_url.into());
        self
    }

    pub fn retry(mut self, retry: Retry) -> Self {
        self.retry = Some(retry);
        self
    }

    pub fn timeout(mut self, timeout: Timeout) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn response_type(mut self, response_type: ResponseType) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Adds one search parameter, keeping the ones already set.
    pub fn search_param(mut self, name: impl Into<String>, value: impl Into<SearchValue>) -> Self {
        self.search_params
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replaces all search parameters.
    pub fn search_params<I, K, V>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<SearchValue>,
    {
        self.search_params = Some(
            params
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn json(mut self, json: serde_json::Value) -> Self {
        self.json = Some(json);
        self
    }

    /// Adds one header, keeping the ones already set.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers
            .get_or_insert_with(BTreeMap::new)
            .insert(name.into(), value.into());
        self
    }

    /// Replaces all headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<HeaderValue>,
    {
        self.headers = Some(
            headers
                .into_iter()
                .map(|(name, value)| (name.into(), value.into()))
                .collect(),
        );
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn throw_http_errors(mut self, throw: bool) -> Self {
        self.throw_http_errors = Some(throw);
        self
    }

    /// Shallow merge: every field set in `overrides` replaces the one in `self`.
    ///
    /// Maps such as `headers` are replaced as a whole, not merged key by key.
    pub fn merge(self, overrides: RequestOptions) -> Self {
        Self {
            method: overrides.method.or(self.method),
            prefix_url: overrides.prefix_url.or(self.prefix_url),
            retry: overrides.retry.or(self.retry),
            timeout: overrides.timeout.or(self.timeout),
            response_type: overrides.response_type.or(self.response_type),
            search_params: overrides.search_params.or(self.search_params),
            json: overrides.json.or(self.json),
            headers: overrides.headers.or(self.headers),
            body: overrides.body.or(self.body),
            throw_http_errors: overrides.throw_http_errors.or(self.throw_http_errors),
        }
    }

    /// Reads default options from environment variables.
    ///
    /// Reads:
    /// - `RETUS_PREFIX_URL` — base URL for relative request URLs
    /// - `RETUS_TIMEOUT_MS` — timeout in milliseconds, `0` disables it
    /// - `RETUS_RETRY_LIMIT` — retry limit
    /// - `RETUS_RETRY_DELAY_MS` — delay between retries
    ///
    /// Unset variables leave the corresponding option unset.
    ///
    /// # Example
    ///
    /// ```no_run
    /// let api = retus::create(retus::RequestOptions::from_env().expect("bad RETUS_* env vars"));
    /// ```
    pub fn from_env() -> std::result::Result<Self, String> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> std::result::Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut options = Self::default();

        if let Some(prefix_url) = lookup("RETUS_PREFIX_URL") {
            if !prefix_url.trim().is_empty() {
                options.prefix_url = Some(prefix_url.trim().to_owned());
            }
        }

        if let Some(timeout) = parse_var::<u64>(&lookup, "RETUS_TIMEOUT_MS")? {
            options.timeout = Some(Timeout::from_millis(timeout));
        }

        let limit = parse_var::<u32>(&lookup, "RETUS_RETRY_LIMIT")?;
        let delay = parse_var::<u64>(&lookup, "RETUS_RETRY_DELAY_MS")?;
        if limit.is_some() || delay.is_some() {
            let defaults = Retry::default();
            options.retry = Some(Retry {
                limit: limit.unwrap_or(defaults.limit),
                delay_ms: delay.unwrap_or(defaults.delay_ms),
            });
        }

        Ok(options)
    }
}

impl From<()> for RequestOptions {
    fn from(_: ()) -> Self {
        Self::default()
    }
}

fn parse_var<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> std::result::Result<Option<T>, String>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|err| format!("{key} must be a non-negative integer, got '{raw}': {err}")),
        _ => Ok(None),
    }
}
