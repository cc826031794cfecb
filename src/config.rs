//! Serving options.
//!
//! [`HttpOptions`] is the deploy-time configuration of the request pipeline.
//! It deserializes from camelCase JSON, with every field optional, so a
//! deployment only states what it changes from the defaults.

use serde::{Deserialize, Serialize};

/// Default cap on request body size in bytes.
pub const DEFAULT_MAX_REQUEST_BODY: usize = 1_048_576;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpOptions {
    /// Largest request body accepted, in bytes.
    pub max_request_body: usize,
    /// Cross-origin request policy.
    pub cors_mode: CorsMode,
    /// Proxy header carrying the real client address, e.g. `X-Real-Ip`.
    /// Only set this when every request passes a proxy that overwrites it.
    pub real_ip_header: Option<String>,
    /// Proxy header carrying the original scheme, e.g. `X-Forwarded-Proto`.
    pub real_scheme_header: Option<String>,
    /// Plain-http to https redirect policy.
    pub ssl_redirect: SslRedirectMode,
}

impl Default for HttpOptions {
    fn default() -> Self {
        Self {
            max_request_body: DEFAULT_MAX_REQUEST_BODY,
            cors_mode: CorsMode::default(),
            real_ip_header: None,
            real_scheme_header: None,
            ssl_redirect: SslRedirectMode::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorsMode {
    /// Cross-origin requests get no CORS headers.
    #[default]
    None,
    /// Any origin is allowed, without credentials.
    Allow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SslRedirectMode {
    /// Plain-http requests are served as-is.
    #[default]
    None,
    /// Safe plain-http requests are redirected to https.
    Auto,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_defaults() {
        let options: HttpOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options, HttpOptions::default());
        assert_eq!(options.max_request_body, DEFAULT_MAX_REQUEST_BODY);
        assert_eq!(options.cors_mode, CorsMode::None);
        assert_eq!(options.ssl_redirect, SslRedirectMode::None);
    }

    #[test]
    fn camel_case_fields_deserialize() {
        let options: HttpOptions = serde_json::from_str(
            r#"{
                "maxRequestBody": 65536,
                "corsMode": "allow",
                "realIpHeader": "X-Real-Ip",
                "realSchemeHeader": "X-Forwarded-Proto",
                "sslRedirect": "auto"
            }"#,
        )
        .unwrap();

        assert_eq!(options.max_request_body, 65536);
        assert_eq!(options.cors_mode, CorsMode::Allow);
        assert_eq!(options.real_ip_header.as_deref(), Some("X-Real-Ip"));
        assert_eq!(options.real_scheme_header.as_deref(), Some("X-Forwarded-Proto"));
        assert_eq!(options.ssl_redirect, SslRedirectMode::Auto);
    }

    #[test]
    fn unknown_mode_token_is_rejected() {
        let result = serde_json::from_str::<HttpOptions>(r#"{"corsMode": "sometimes"}"#);
        assert!(result.is_err());
    }
}
