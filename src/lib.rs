//! `retus` issues blocking HTTP requests and returns a normalized result.
//!
//! Every call resolves its options against instance and built-in defaults,
//! sends one request (retries included) through a [`Transport`] and decodes
//! the body:
//! - [`request`], [`get`], [`post`], [`put`], [`patch`], [`head`], [`delete`]
//! - [`create`] and [`extend`] for instances with their own defaults
//!
//! ```no_run
//! use retus::{RequestOptions, ResponseType};
//!
//! let response = retus::get(
//!     "https://httpbin.org/json",
//!     RequestOptions::new().response_type(ResponseType::Json),
//! )?;
//! println!("{}: {:?}", response.status_code, response.body);
//! # Ok::<(), retus::Error>(())
//! ```

mod client;
mod error;
mod options;
mod resolve;
pub mod transport;
mod types;
mod value;

pub use client::{create, delete, extend, get, head, patch, post, put, request, Instance};
pub use error::{BoxError, Error, HttpError, TransportError};
pub use options::{Method, RequestOptions, ResponseType, Retry, Timeout};
pub use transport::{BlockingTransport, Transport};
pub use types::{Body, ResponseData};
pub use value::{HeaderValue, SearchValue};

pub type Result<T> = std::result::Result<T, Error>;
