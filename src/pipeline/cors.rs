//! CORS negotiation.
//!
//! In `allow` mode every cross-origin request is accepted without
//! credentials. Preflight `OPTIONS` exchanges are answered here and never
//! reach a handler; other methods just get the allow-origin echo attached
//! and continue down the pipeline.

use crate::config::{CorsMode, HttpOptions};
use crate::protocol::{Output, Request, SendError};

const ALLOWED_METHODS: &str = "GET, HEAD, POST, PUT, PATCH, DELETE";
const MAX_AGE_SECONDS: u32 = 86_400;

/// Applies CORS rules. Returns `true` when the request has been fully
/// handled (preflight) and the pipeline must stop.
pub fn handle(options: &HttpOptions, request: &Request, output: &mut Output) -> Result<bool, SendError> {
    if options.cors_mode != CorsMode::Allow {
        return Ok(false);
    }

    let Some(origin) = request.headers.get("origin") else {
        return Ok(false);
    };

    if request.method == "options" {
        output.header("Vary: Origin")?;
        output.header(format!("Access-Control-Allow-Origin: {origin}"))?;
        output.header(format!("Access-Control-Allow-Methods: {ALLOWED_METHODS}"))?;
        if let Some(want_headers) = request.headers.get("access-control-request-headers") {
            output.header(format!("Access-Control-Allow-Headers: {want_headers}"))?;
        }
        output.header(format!("Access-Control-Max-Age: {MAX_AGE_SECONDS}"))?;
        return Ok(true);
    }

    output.header(format!("Access-Control-Allow-Origin: {origin}"))?;
    Ok(false)
}
