//! A minimal asynchronous HTTP/1.0 request-serving layer for API backends
//!
//! This crate serves exactly one request per TCP connection over plain
//! HTTP/1.0, built on top of tokio. Requests are routed by path prefix to
//! handlers registered under string identifiers, after passing through a
//! small fixed pipeline: reverse-proxy trust recovery, CORS negotiation and
//! SSL redirect policy.
//!
//! # Features
//!
//! - Incremental HTTP/1.0 request head parsing with a hard size cap
//! - Prefix route table resolved in registration order
//! - Bounded accept wait with cooperative graceful shutdown
//! - Real client address and scheme recovery behind trusted proxies
//! - Permissive CORS mode answering preflights without dispatch
//! - JSON handlers mapping async functions onto request/response bodies
//!
//! # Example
//!
//! ```no_run
//! use micro_api::{HttpApp, HttpOptions, JsonHandler};
//! use serde_json::json;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() {
//!     let app = HttpApp::builder()
//!         .options(HttpOptions::default())
//!         .service(
//!             "/api",
//!             JsonHandler::new(|action, _payload| async move {
//!                 Ok(Some(json!({ "action": action })))
//!             }),
//!         )
//!         .build();
//!
//!     let shutdown = CancellationToken::new();
//!     if let Err(e) = app.start_server(8080, shutdown).await {
//!         eprintln!("server failed: {e}");
//!     }
//! }
//! ```

pub mod codec;
pub mod config;
pub mod handler;
pub mod pipeline;
pub mod protocol;
pub mod router;
pub mod server;

mod utils;

pub use config::{CorsMode, DEFAULT_MAX_REQUEST_BODY, HttpOptions, SslRedirectMode};
pub use handler::json::JsonHandler;
pub use handler::{Handler, HandlerRegistry};
pub use pipeline::{HttpApp, HttpAppBuilder};
pub use protocol::{
    BodyInput, CookieOptions, CookieStore, HeaderStore, HttpError, Output, ParseError, Request, RequestTag,
    SendError,
};
pub use router::{RouteEntry, Router};
pub use server::{ApiServer, ServerError};
