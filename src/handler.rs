//! Request handler seam.
//!
//! Handlers are resolved from routes by string identifier through a
//! [`HandlerRegistry`] populated at startup, avoiding any runtime
//! reflection. A handler owns the whole response: it writes status,
//! headers and body through the request's [`Output`].

pub mod json;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::protocol::{HttpError, Output, Request};

/// A resolved route's request handler.
///
/// Implementations must be cheap to share: one instance serves every
/// request routed to it for the process lifetime.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, request: &mut Request, output: &mut Output) -> Result<(), HttpError>;
}

/// Maps handler identifiers to handler instances.
///
/// Populated once at startup from configuration; immutable afterwards, so
/// concurrent lookups need no synchronization.
#[derive(Default, Clone)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn Handler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn register<S, H>(&mut self, id: S, handler: H)
    where
        S: Into<String>,
        H: Handler + 'static,
    {
        self.handlers.insert(id.into(), Arc::new(handler));
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Handler>> {
        self.handlers.get(id)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry").field("ids", &self.handlers.keys().collect::<Vec<_>>()).finish()
    }
}
