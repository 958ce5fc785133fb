/// Boxed error raised below the transport boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type returned by this crate.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered with a 4xx/5xx status and `throw_http_errors` is on.
    #[error(transparent)]
    Http(#[from] HttpError),
    /// Failure raised by the transport, passed through unchanged.
    #[error(transparent)]
    Transport(#[from] TransportError),
    /// The response body is not valid JSON (or not the requested shape).
    #[error("invalid JSON response body: {0}")]
    Parse(#[from] serde_json::Error),
    /// The request URL could not be composed with the prefix URL.
    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl Error {
    /// Status code carried by an [`HttpError`], if this is one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http(err) => Some(err.status_code()),
            _ => None,
        }
    }
}

/// Synthetic error for a response with status code 400 or above.
#[derive(Clone, Debug, Eq, PartialEq, thiserror::Error)]
#[error("{message}")]
pub struct HttpError {
    message: String,
    status_code: u16,
}

impl HttpError {
    pub fn new(status_code: u16) -> Self {
        Self {
            message: format!("Server responded with status code {status_code}."),
            status_code,
        }
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Failure reported by a [`crate::Transport`].
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The request never produced a response: DNS, connect, TLS, timeout...
    #[error("transport error: {0}")]
    Network(#[source] BoxError),
    /// A response arrived, but its status does not allow reading the body.
    #[error("response body unavailable, status code {status_code}")]
    Status { status_code: u16 },
}

impl TransportError {
    pub fn network(err: impl Into<BoxError>) -> Self {
        Self::Network(err.into())
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status_code } => Some(*status_code),
            Self::Network(_) => None,
        }
    }

    /// Returns `true` if the request hit its deadline.
    pub fn is_timeout(&self) -> bool {
        self.reqwest_error().is_some_and(reqwest::Error::is_timeout)
    }

    /// Returns `true` if the host could not be reached.
    pub fn is_connect(&self) -> bool {
        self.reqwest_error().is_some_and(reqwest::Error::is_connect)
    }

    fn reqwest_error(&self) -> Option<&reqwest::Error> {
        match self {
            Self::Network(err) => err.downcast_ref::<reqwest::Error>(),
            Self::Status { .. } => None,
        }
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(Box::new(err))
    }
}
