//! Asynchronous client core for a device cloud API.
//!
//! # Overview
//! Every public operation (device listing, variable reads, function calls,
//! token management) becomes an [`Operation`], is built into an
//! [`HttpRequest`] by [`build_request`], and is executed by the
//! [`Dispatcher`], which delivers exactly one [`Outcome`].
//!
//! # Design
//! - Building and classification are pure; only the dispatcher does I/O.
//! - The dispatcher enforces a deadline with `tokio::time::timeout` and
//!   reports connection resets as timeouts.
//! - Credentials belong to one [`Client`]; nothing is process-global.
//! - No caching, no retries: a failed call is reported once.

pub mod builder;
pub mod client;
pub mod config;
pub mod credentials;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod operation;
pub mod response;
pub mod tokens;

pub use builder::build_request;
pub use client::Client;
pub use config::ClientConfig;
pub use credentials::Credentials;
pub use devices::FunctionArg;
pub use dispatch::{Dispatcher, PendingCall};
pub use error::{Error, Outcome};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use operation::{AuthMode, Body, Operation};
pub use response::classify;
