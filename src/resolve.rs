use std::collections::BTreeMap;
use std::time::Duration;

use url::Url;

use crate::{
    transport::{RetryInstruction, TransportRequest},
    Error, HeaderValue, Method, RequestOptions, ResponseType, Result, Retry, SearchValue,
    Timeout,
};

/// Request configuration with every default applied.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ResolvedConfig {
    pub method: Method,
    pub url: String,
    pub retry: Retry,
    pub timeout: Timeout,
    pub response_type: ResponseType,
    pub search_params: BTreeMap<String, SearchValue>,
    pub json: Option<serde_json::Value>,
    pub headers: BTreeMap<String, HeaderValue>,
    pub body: Option<String>,
    pub throw_http_errors: bool,
}

impl ResolvedConfig {
    /// Layers `options` over `defaults` over the built-in defaults.
    pub(crate) fn resolve(
        url: &str,
        defaults: &RequestOptions,
        options: RequestOptions,
    ) -> Result<Self> {
        let mut merged = defaults.clone().merge(options);
        // A null payload counts as no payload at all.
        merged.json = merged.json.filter(|json| !json.is_null());

        let response_type = merged.response_type.unwrap_or(if merged.json.is_some() {
            ResponseType::Json
        } else {
            ResponseType::Text
        });

        let prefix_url = merged.prefix_url.unwrap_or_default();
        let url = compose_url(&prefix_url, url)?;

        Ok(Self {
            method: merged.method.unwrap_or_default(),
            url,
            retry: merged.retry.unwrap_or_default(),
            timeout: merged.timeout.unwrap_or_default(),
            response_type,
            search_params: merged.search_params.unwrap_or_default(),
            json: merged.json,
            headers: merged.headers.unwrap_or_default(),
            body: merged.body,
            throw_http_errors: merged.throw_http_errors.unwrap_or(true),
        })
    }

    /// Retry settings for the transport; `None` when the limit is zero.
    pub(crate) fn retry_instruction(&self) -> Option<RetryInstruction> {
        (self.retry.limit > 0).then(|| RetryInstruction {
            max_retries: self.retry.limit,
            retry_delay: Duration::from_millis(self.retry.delay_ms),
        })
    }

    pub(crate) fn transport_request(&self) -> TransportRequest {
        TransportRequest {
            method: self.method,
            url: self.url.clone(),
            search_params: self.search_params.clone(),
            headers: self.headers.clone(),
            body: self.body.clone(),
            json: self.json.clone(),
            timeout: self.timeout,
            retry: self.retry_instruction(),
        }
    }
}

/// Resolves `url` against `prefix_url`, or returns it verbatim without a prefix.
pub(crate) fn compose_url(prefix_url: &str, url: &str) -> Result<String> {
    if prefix_url.is_empty() {
        return Ok(url.to_owned());
    }

    let base = Url::parse(prefix_url).map_err(|source| Error::InvalidUrl {
        url: prefix_url.to_owned(),
        source,
    })?;
    let joined = base.join(url).map_err(|source| Error::InvalidUrl {
        url: url.to_owned(),
        source,
    })?;
    Ok(joined.into())
}
