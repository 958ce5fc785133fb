use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

use crate::Result;

/// Interpreted response body.
#[derive(Clone, Debug, PartialEq)]
pub enum Body {
    Text(String),
    Json(serde_json::Value),
}

impl Body {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Json(_) => None,
        }
    }

    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Text(_) => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Text(text) if text.is_empty())
    }
}

impl Default for Body {
    fn default() -> Self {
        Self::Text(String::new())
    }
}

/// Normalized result of a request.
#[derive(Clone, Debug)]
pub struct ResponseData {
    pub status_code: u16,
    /// Response headers exactly as the transport returned them.
    pub headers: HeaderMap,
    pub body: Body,
}

impl ResponseData {
    /// Deserializes the body into `T`.
    ///
    /// A JSON body is converted directly; a text body is parsed as JSON first.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let value = match &self.body {
            Body::Json(value) => T::deserialize(value)?,
            Body::Text(text) => serde_json::from_str(text)?,
        };
        Ok(value)
    }
}
