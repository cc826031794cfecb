//! The per-request data model.
//!
//! A [`Request`] is created for each accepted connection, populated by the
//! request decoder, enriched by the pipeline (trust tags, resolved route)
//! and discarded when the connection closes. There is no cross-request
//! sharing.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::protocol::{CookieStore, HeaderStore, HttpError};
use crate::router::RouteEntry;

/// Typed side channel for cross-stage signaling within a single request.
///
/// Tags are written by pipeline stages and read-only to handlers; they
/// replace ad hoc stringly-typed globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestTag {
    /// Socket peer address before real-IP recovery replaced it.
    OriginalAddress,
    /// Request scheme before proxied-scheme recovery replaced it.
    OriginalScheme,
    /// Set when an earlier stage produced the response directly; handlers
    /// honoring it skip their own processing.
    DirectResponse,
}

/// One inbound HTTP exchange.
#[derive(Debug)]
pub struct Request {
    /// `http` or `https`. Plain-TCP requests start as `http`; the trust
    /// pipeline may override this from a proxy header.
    pub scheme: String,
    /// Lowercased method token.
    pub method: String,
    /// Value of the mandatory `Host` header.
    pub host: String,
    /// Raw request URI as received.
    pub uri: String,
    /// URI path, without the query string.
    pub path: String,
    /// Query string, without the leading `?`. Empty if absent.
    pub query: String,
    /// Peer address, or the client address recovered from a trusted proxy
    /// header. When substituted, the original is preserved under
    /// [`RequestTag::OriginalAddress`].
    pub remote_address: String,
    pub headers: HeaderStore,
    pub cookies: CookieStore,
    /// Remaining request bytes: whatever the head decoder over-read plus
    /// the still-open read half of the connection.
    pub input: BodyInput,
    /// Resolved route; set exactly once by the pipeline.
    pub route: Option<RouteEntry>,
    /// Path remainder after the matched route's prefix.
    pub action: String,
    pub(crate) tags: HashMap<RequestTag, String>,
}

impl Request {
    pub fn set_tag<V: Into<String>>(&mut self, tag: RequestTag, value: V) {
        self.tags.insert(tag, value.into());
    }

    pub fn tag(&self, tag: RequestTag) -> Option<&str> {
        self.tags.get(&tag).map(String::as_str)
    }

    pub fn has_tag(&self, tag: RequestTag) -> bool {
        self.tags.contains_key(&tag)
    }

    /// Records the resolved route and its action suffix.
    ///
    /// A route is resolved at most once per request.
    pub fn assign_route(&mut self, route: RouteEntry, action: String) {
        debug_assert!(self.route.is_none(), "route already assigned");
        self.route = Some(route);
        self.action = action;
    }
}

/// The request body input stream.
///
/// Combines bytes the head decoder buffered past the blank line with the
/// open read half of the connection.
pub struct BodyInput {
    buffered: BytesMut,
    reader: Box<dyn AsyncRead + Send + Unpin>,
}

impl BodyInput {
    pub fn new<R>(buffered: BytesMut, reader: R) -> Self
    where
        R: AsyncRead + Send + Unpin + 'static,
    {
        Self { buffered, reader: Box::new(reader) }
    }

    /// An input with no bytes behind it. Useful for embedded invocations
    /// and tests.
    pub fn empty() -> Self {
        Self::new(BytesMut::new(), tokio::io::empty())
    }

    /// Reads the whole body, up to `max` bytes.
    ///
    /// After `max` bytes a single extra byte is probed; any remaining input
    /// fails with [`HttpError::PayloadTooLarge`].
    pub async fn read_limited(&mut self, max: usize) -> Result<Bytes, HttpError> {
        let mut body = BytesMut::with_capacity(self.buffered.len().min(max));

        if !self.buffered.is_empty() {
            let take = self.buffered.len().min(max);
            body.extend_from_slice(&self.buffered.split_to(take));
        }

        while body.len() < max {
            let remaining = (max - body.len()) as u64;
            let n = (&mut self.reader).take(remaining).read_buf(&mut body).await?;
            if n == 0 {
                return Ok(body.freeze());
            }
        }

        if !self.buffered.is_empty() {
            return Err(HttpError::PayloadTooLarge);
        }
        let mut probe = [0u8; 1];
        if self.reader.read(&mut probe).await? > 0 {
            return Err(HttpError::PayloadTooLarge);
        }

        Ok(body.freeze())
    }
}

impl std::fmt::Debug for BodyInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyInput").field("buffered", &self.buffered.len()).finish_non_exhaustive()
    }
}

/// A request populated with defaults, for embedded invocations and tests.
///
/// Wire-derived fields (`host`, `remote_address`, headers) start empty.
impl Default for Request {
    fn default() -> Self {
        Self {
            scheme: "http".to_owned(),
            method: "get".to_owned(),
            host: String::new(),
            uri: "/".to_owned(),
            path: "/".to_owned(),
            query: String::new(),
            remote_address: String::new(),
            headers: HeaderStore::new(),
            cookies: CookieStore::new(),
            input: BodyInput::empty(),
            route: None,
            action: String::new(),
            tags: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip() {
        let mut request = Request::default();
        assert!(!request.has_tag(RequestTag::OriginalAddress));

        request.set_tag(RequestTag::OriginalAddress, "10.0.0.1");
        assert!(request.has_tag(RequestTag::OriginalAddress));
        assert_eq!(request.tag(RequestTag::OriginalAddress), Some("10.0.0.1"));
        assert_eq!(request.tag(RequestTag::OriginalScheme), None);
    }

    #[tokio::test]
    async fn read_limited_within_cap() {
        let mut input = BodyInput::new(BytesMut::from(&b"hello "[..]), &b"world"[..]);
        let body = input.read_limited(64).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn read_limited_rejects_oversized_stream() {
        let mut input = BodyInput::new(BytesMut::new(), &b"0123456789"[..]);
        let err = input.read_limited(4).await.unwrap_err();
        assert!(matches!(err, HttpError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn read_limited_rejects_oversized_buffer() {
        let mut input = BodyInput::new(BytesMut::from(&b"0123456789"[..]), tokio::io::empty());
        let err = input.read_limited(4).await.unwrap_err();
        assert!(matches!(err, HttpError::PayloadTooLarge));
    }

    #[tokio::test]
    async fn read_limited_exact_cap_is_ok() {
        let mut input = BodyInput::new(BytesMut::new(), &b"1234"[..]);
        let body = input.read_limited(4).await.unwrap();
        assert_eq!(&body[..], b"1234");
    }
}
