//! spacs - a session-scoped async HTTP client.
//!
//! Standardizes how requests are built, how bodies are encoded for each
//! content type, how failed statuses are classified and logged, and how
//! successful responses are decoded into JSON values or typed models.
//!
//! ```no_run
//! use spacs::{Client, Request};
//!
//! # async fn run() -> Result<(), spacs::Error> {
//! let client = Client::builder()
//!     .base_url("https://api.example.com")
//!     .path_prefix("v1")
//!     .build();
//!
//! let outcome = client.get(&Request::new("status")).await?;
//! println!("{:?}", outcome.success());
//!
//! spacs::Client::close_all().await;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod conf;
pub mod content;
pub mod error;
pub mod http;
pub mod request;
pub mod response;

pub use client::{Client, ClientBuilder, CloseOnError, ErrorHandler};
pub use content::{Content, Fields, Model, Value};
pub use error::{Error, RequestError};
pub use request::{ContentType, Method, PreparedRequest, Request};
pub use response::{Outcome, Response};
