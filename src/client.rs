use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::{
    resolve::ResolvedConfig,
    transport::{BlockingTransport, Transport, TransportResponse},
    Body, Error, HttpError, Method, RequestOptions, ResponseData, ResponseType, Result,
};

/// Reusable request bundle closed over a set of default options.
///
/// Instances never change after construction: [`Instance::create`] and
/// [`Instance::extend`] return new instances that share the same transport.
#[derive(Clone)]
pub struct Instance {
    defaults: RequestOptions,
    transport: Arc<dyn Transport>,
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("defaults", &self.defaults)
            .finish_non_exhaustive()
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new(RequestOptions::default())
    }
}

impl Instance {
    /// Creates an instance backed by [`BlockingTransport`].
    pub fn new(defaults: RequestOptions) -> Self {
        Self::with_transport(defaults, Arc::new(BlockingTransport::new()))
    }

    /// Creates an instance that sends requests through `transport`.
    pub fn with_transport(defaults: RequestOptions, transport: Arc<dyn Transport>) -> Self {
        Self {
            defaults,
            transport,
        }
    }

    /// Default options applied to every request of this instance.
    pub fn defaults(&self) -> &RequestOptions {
        &self.defaults
    }

    /// Fetches `url`. The verb comes from `options.method`, `GET` if unset.
    ///
    /// # Example
    ///
    /// ```no_run
    /// let instance = retus::Instance::default();
    /// let response = instance.request("https://example.com", ())?;
    /// println!("{} {:?}", response.status_code, response.body.as_text());
    /// # Ok::<(), retus::Error>(())
    /// ```
    pub fn request(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        let config = ResolvedConfig::resolve(url, &self.defaults, options.into())?;

        #[cfg(feature = "tracing")]
        tracing::debug!(method = %config.method, url = %config.url, "sending request");

        let response = self.transport.send(&config.transport_request())?;
        let body = interpret_body(&config, &response)?;

        Ok(ResponseData {
            status_code: response.status_code,
            headers: response.headers,
            body: body.unwrap_or_default(),
        })
    }

    /// Fetches `url` with `GET`, whatever `options.method` says.
    pub fn get(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        self.request(url, options.into().method(Method::Get))
    }

    /// Fetches `url` with `POST`, whatever `options.method` says.
    pub fn post(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        self.request(url, options.into().method(Method::Post))
    }

    /// Fetches `url` with `PUT`, whatever `options.method` says.
    pub fn put(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        self.request(url, options.into().method(Method::Put))
    }

    /// Fetches `url` with `PATCH`, whatever `options.method` says.
    pub fn patch(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        self.request(url, options.into().method(Method::Patch))
    }

    /// Fetches `url` with `HEAD`, whatever `options.method` says.
    pub fn head(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        self.request(url, options.into().method(Method::Head))
    }

    /// Fetches `url` with `DELETE`, whatever `options.method` says.
    pub fn delete(&self, url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
        self.request(url, options.into().method(Method::Delete))
    }

    /// New instance whose defaults are exactly `defaults`.
    pub fn create(&self, defaults: RequestOptions) -> Instance {
        Self::with_transport(defaults, Arc::clone(&self.transport))
    }

    /// New instance whose defaults are this instance's defaults with
    /// `defaults` merged on top.
    pub fn extend(&self, defaults: RequestOptions) -> Instance {
        Self::with_transport(
            self.defaults.clone().merge(defaults),
            Arc::clone(&self.transport),
        )
    }
}

/// Decodes the body according to the response type and applies the
/// HTTP-error policy. `None` means no body was produced.
fn interpret_body(config: &ResolvedConfig, response: &TransportResponse) -> Result<Option<Body>> {
    match config.response_type {
        ResponseType::Text | ResponseType::Json => {
            let text = match response.text() {
                Ok(text) => text,
                Err(err) => match err.status_code() {
                    Some(_) if !config.throw_http_errors => return Ok(None),
                    Some(status_code) if status_code >= 400 => {
                        return Err(http_error(status_code))
                    }
                    _ => return Err(err.into()),
                },
            };

            if config.response_type == ResponseType::Json {
                Ok(Some(Body::Json(serde_json::from_str(&text)?)))
            } else {
                Ok(Some(Body::Text(text)))
            }
        }
        ResponseType::None => {
            if response.status_code >= 400 && config.throw_http_errors {
                return Err(http_error(response.status_code));
            }
            Ok(None)
        }
    }
}

fn http_error(status_code: u16) -> Error {
    #[cfg(feature = "tracing")]
    tracing::warn!(status_code, "server responded with an error status");

    HttpError::new(status_code).into()
}

fn default_instance() -> &'static Instance {
    static DEFAULT: OnceLock<Instance> = OnceLock::new();
    DEFAULT.get_or_init(Instance::default)
}

/// Fetches `url` with the default instance. See [`Instance::request`].
pub fn request(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().request(url, options)
}

/// `GET` with the default instance.
pub fn get(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().get(url, options)
}

/// `POST` with the default instance.
pub fn post(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().post(url, options)
}

/// `PUT` with the default instance.
pub fn put(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().put(url, options)
}

/// `PATCH` with the default instance.
pub fn patch(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().patch(url, options)
}

/// `HEAD` with the default instance.
pub fn head(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().head(url, options)
}

/// `DELETE` with the default instance.
pub fn delete(url: &str, options: impl Into<RequestOptions>) -> Result<ResponseData> {
    default_instance().delete(url, options)
}

/// New instance whose defaults are exactly `defaults`.
pub fn create(defaults: RequestOptions) -> Instance {
    default_instance().create(defaults)
}

/// New instance extending the built-in defaults with `defaults`.
pub fn extend(defaults: RequestOptions) -> Instance {
    default_instance().extend(defaults)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use reqwest::header::HeaderMap;
    use serde_json::json;

    use super::Instance;
    use crate::{
        transport::{Transport, TransportRequest, TransportResponse},
        Body, Error, Method, RequestOptions, ResponseType, Retry, Timeout, TransportError,
    };

    type Outcome = std::result::Result<TransportResponse, TransportError>;

    struct ScriptedTransport {
        outcomes: Mutex<VecDeque<Outcome>>,
        seen: Mutex<Vec<TransportRequest>>,
    }

    impl ScriptedTransport {
        fn new(outcomes: Vec<Outcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn last_request(&self) -> TransportRequest {
            self.seen
                .lock()
                .expect("seen mutex must not be poisoned")
                .last()
                .cloned()
                .expect("a request must have been sent")
        }
    }

    impl Transport for ScriptedTransport {
        fn send(&self, request: &TransportRequest) -> Outcome {
            self.seen
                .lock()
                .expect("seen mutex must not be poisoned")
                .push(request.clone());
            self.outcomes
                .lock()
                .expect("outcome mutex must not be poisoned")
                .pop_front()
                .unwrap_or_else(|| Ok(reply(200, "")))
        }
    }

    fn reply(status_code: u16, body: &str) -> TransportResponse {
        TransportResponse {
            status_code,
            headers: HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }
    }

    fn instance(transport: &Arc<ScriptedTransport>) -> Instance {
        Instance::with_transport(RequestOptions::new(), transport.clone())
    }

    #[test]
    fn text_body_is_returned_verbatim() {
        let transport = ScriptedTransport::new(vec![Ok(reply(200, "<!doctype html>"))]);

        let response = instance(&transport)
            .request("https://example.com", ())
            .expect("request must succeed");

        assert_eq!(response.status_code, 200);
        assert_eq!(response.body, Body::Text("<!doctype html>".to_owned()));
        assert_eq!(transport.last_request().method, Method::Get);
    }

    #[test]
    fn json_body_is_parsed() {
        let transport = ScriptedTransport::new(vec![Ok(reply(200, r#"{"ok":true,"n":[1,2]}"#))]);

        let response = instance(&transport)
            .get(
                "https://example.com",
                RequestOptions::new().response_type(ResponseType::Json),
            )
            .expect("request must succeed");

        assert_eq!(response.body, Body::Json(json!({"ok": true, "n": [1, 2]})));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let transport = ScriptedTransport::new(vec![Ok(reply(200, "not json"))]);

        let err = instance(&transport)
            .post(
                "https://example.com",
                RequestOptions::new().json(json!({"name": "Kit"})),
            )
            .expect_err("parse must fail");

        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn shorthand_overrides_conflicting_method() {
        let transport = ScriptedTransport::new(vec![]);
        let client = instance(&transport);
        let options = || RequestOptions::new().method(Method::Trace);

        client.get("https://example.com", options()).expect("get");
        assert_eq!(transport.last_request().method, Method::Get);
        client.post("https://example.com", options()).expect("post");
        assert_eq!(transport.last_request().method, Method::Post);
        client.put("https://example.com", options()).expect("put");
        assert_eq!(transport.last_request().method, Method::Put);
        client.patch("https://example.com", options()).expect("patch");
        assert_eq!(transport.last_request().method, Method::Patch);
        client.head("https://example.com", options()).expect("head");
        assert_eq!(transport.last_request().method, Method::Head);
        client.delete("https://example.com", options()).expect("delete");
        assert_eq!(transport.last_request().method, Method::Delete);
    }

    #[test]
    fn request_uses_method_from_options() {
        let transport = ScriptedTransport::new(vec![]);
        instance(&transport)
            .request(
                "https://example.com",
                RequestOptions::new().method(Method::Options),
            )
            .expect("request must succeed");
        assert_eq!(transport.last_request().method, Method::Options);
    }

    #[test]
    fn not_found_raises_http_error_by_default() {
        let transport = ScriptedTransport::new(vec![Ok(reply(404, "missing"))]);

        let err = instance(&transport)
            .get("https://example.com/missing", ())
            .expect_err("404 must fail");

        match err {
            Error::Http(err) => {
                assert_eq!(err.status_code(), 404);
                assert_eq!(err.message(), "Server responded with status code 404.");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[test]
    fn not_found_without_throwing_yields_empty_body() {
        let transport = ScriptedTransport::new(vec![Ok(reply(404, "missing"))]);

        let response = instance(&transport)
            .get(
                "https://example.com/missing",
                RequestOptions::new().throw_http_errors(false),
            )
            .expect("404 must not fail");

        assert_eq!(response.status_code, 404);
        assert_eq!(response.body, Body::Text(String::new()));
    }

    #[test]
    fn suppressed_error_under_json_skips_parsing() {
        let transport = ScriptedTransport::new(vec![Ok(reply(500, "<html>oops</html>"))]);

        let response = instance(&transport)
            .post(
                "https://example.com",
                RequestOptions::new()
                    .json(json!({}))
                    .throw_http_errors(false),
            )
            .expect("500 must not fail");

        assert_eq!(response.status_code, 500);
        assert!(response.body.is_empty());
    }

    #[test]
    fn unreadable_redirect_propagates_transport_error() {
        let transport = ScriptedTransport::new(vec![Ok(reply(304, ""))]);

        let err = instance(&transport)
            .get("https://example.com", ())
            .expect_err("304 body must be unreadable");

        assert!(matches!(
            err,
            Error::Transport(TransportError::Status { status_code: 304 })
        ));
    }

    #[test]
    fn none_response_type_raises_on_server_error() {
        let transport = ScriptedTransport::new(vec![Ok(reply(500, "boom"))]);

        let err = instance(&transport)
            .get(
                "https://example.com",
                RequestOptions::new().response_type(ResponseType::None),
            )
            .expect_err("500 must fail");

        assert_eq!(err.status_code(), Some(500));
    }

    #[test]
    fn none_response_type_without_throwing_yields_empty_body() {
        let transport = ScriptedTransport::new(vec![Ok(reply(500, "boom"))]);

        let response = instance(&transport)
            .get(
                "https://example.com",
                RequestOptions::new()
                    .response_type(ResponseType::None)
                    .throw_http_errors(false),
            )
            .expect("500 must not fail");

        assert_eq!(response.status_code, 500);
        assert_eq!(response.body, Body::default());
    }

    #[test]
    fn none_response_type_never_reads_the_body() {
        let transport = ScriptedTransport::new(vec![Ok(reply(200, "ignored"))]);

        let response = instance(&transport)
            .get(
                "https://example.com",
                RequestOptions::new().response_type(ResponseType::None),
            )
            .expect("request must succeed");

        assert_eq!(response.body, Body::default());
    }

    #[test]
    fn network_failure_is_never_an_http_error() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let transport = ScriptedTransport::new(vec![Err(TransportError::network(refused))]);

        let err = instance(&transport)
            .get(
                "https://example.com",
                RequestOptions::new().throw_http_errors(true),
            )
            .expect_err("must fail");

        assert!(matches!(err, Error::Transport(TransportError::Network(_))));
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn create_uses_exactly_the_given_defaults() {
        let transport = ScriptedTransport::new(vec![]);
        let base = Instance::with_transport(
            RequestOptions::new().header("x-base", "1"),
            transport.clone(),
        );

        let api = base.create(
            RequestOptions::new()
                .prefix_url("https://api.example.com/v2/")
                .method(Method::Post)
                .timeout(Timeout::from_millis(1_000)),
        );
        api.get("users", RequestOptions::new().timeout(Timeout::Disabled))
            .expect("request must succeed");

        let request = transport.last_request();
        assert_eq!(request.method, Method::Get);
        assert_eq!(request.url, "https://api.example.com/v2/users");
        assert_eq!(request.timeout, Timeout::Disabled);
        assert!(request.headers.is_empty());
    }

    #[test]
    fn extend_layers_new_defaults_over_current_ones() {
        let transport = ScriptedTransport::new(vec![]);
        let base = Instance::with_transport(
            RequestOptions::new()
                .prefix_url("https://api.example.com/v2/")
                .retry(Retry::new(5)),
            transport.clone(),
        );

        let extended = base.extend(RequestOptions::new().retry(Retry::disabled()));
        extended.get("/health", ()).expect("request must succeed");

        let request = transport.last_request();
        assert_eq!(request.url, "https://api.example.com/health");
        assert_eq!(request.retry, None);
        assert_eq!(base.defaults().retry, Some(Retry::new(5)));
    }

    #[test]
    fn extend_matches_create_with_merged_defaults() {
        let transport = ScriptedTransport::new(vec![]);
        let d = RequestOptions::new()
            .prefix_url("https://a.example/")
            .header("x-a", "1");
        let a = RequestOptions::new().throw_http_errors(false);
        let base = Instance::with_transport(d.clone(), transport.clone());

        assert_eq!(
            base.extend(a.clone()).defaults(),
            base.create(d.merge(a)).defaults()
        );
    }

    #[test]
    fn invalid_prefix_fails_before_sending() {
        let transport = ScriptedTransport::new(vec![]);
        let api = instance(&transport).create(RequestOptions::new().prefix_url("not a base"));

        let err = api.get("users", ()).expect_err("must fail");

        assert!(matches!(err, Error::InvalidUrl { .. }));
        assert!(transport
            .seen
            .lock()
            .expect("seen mutex must not be poisoned")
            .is_empty());
    }

    #[test]
    fn debug_lists_defaults() {
        let debug = format!("{:?}", Instance::default());
        assert!(debug.contains("defaults"));
    }
}
