//! JSON request/response handler.
//!
//! Wraps an async function into a [`Handler`] speaking JSON on both sides:
//! the request body (absent for GET) is deserialized into a
//! [`serde_json::Value`], the function's result is serialized back. A `None`
//! result maps to `204 No Content` with no body, mirroring void service
//! methods.

use async_trait::async_trait;
use serde_json::Value;

use crate::config::DEFAULT_MAX_REQUEST_BODY;
use crate::handler::Handler;
use crate::protocol::{HttpError, Output, Request, RequestTag};

/// A [`Handler`] delegating to an async `(action, payload)` function.
pub struct JsonHandler<F> {
    f: F,
    max_body: usize,
}

impl<F, Fut> JsonHandler<F>
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>, HttpError>> + Send,
{
    pub fn new(f: F) -> Self {
        Self { f, max_body: DEFAULT_MAX_REQUEST_BODY }
    }

    /// Overrides the request body cap, normally aligned with the
    /// application's `max_request_body` option.
    pub fn with_max_body(mut self, max_body: usize) -> Self {
        self.max_body = max_body;
        self
    }
}

#[async_trait]
impl<F, Fut> Handler for JsonHandler<F>
where
    F: Fn(String, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<Value>, HttpError>> + Send,
{
    async fn handle(&self, request: &mut Request, output: &mut Output) -> Result<(), HttpError> {
        // an earlier stage already produced the response
        if request.has_tag(RequestTag::DirectResponse) {
            return Ok(());
        }

        let payload = if request.method == "get" {
            None
        } else {
            let body = request.input.read_limited(self.max_body).await?;
            if body.is_empty() {
                None
            } else {
                let value = serde_json::from_slice(&body)
                    .map_err(|e| HttpError::application_with_status(format!("invalid json payload: {e}"), 400))?;
                Some(value)
            }
        };

        match (self.f)(request.action.clone(), payload).await? {
            None => {
                output.set_status(204)?;
                Ok(())
            }
            Some(value) => {
                output.header("Content-Type: application/json")?;
                let data = serde_json::to_vec(&value).map_err(|e| HttpError::application(e))?;
                output.write(&data).await?;
                Ok(())
            }
        }
    }
}

impl<F> std::fmt::Debug for JsonHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonHandler").field("max_body", &self.max_body).finish_non_exhaustive()
    }
}
