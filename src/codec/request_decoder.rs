//! HTTP/1.0 request head decoder.
//!
//! Parses one request head — request line, header lines, terminating blank
//! line — from a raw byte stream. The decoder is line-oriented and keeps
//! partial state between reads, so it composes with any buffered feed loop.
//!
//! Accepted grammar, kept deliberately small:
//!
//! - request line: `METHOD SP URI SP VERSION`, optional trailing whitespace
//! - header line: `token: value` where token is `[-_.a-zA-Z0-9]+` and the
//!   separator is a colon followed by exactly one space
//! - a line starting with whitespace continues the previous header (folded
//!   header); the trimmed text is appended verbatim
//! - `\r\n` and bare `\n` line endings are both accepted
//!
//! Anything else fails with [`ParseError::Malformed`]. The `Host` header is
//! mandatory. Body bytes are never consumed here; whatever remains in the
//! buffer after the blank line belongs to the body.

use bytes::BytesMut;
use tokio_util::codec::Decoder;
use tracing::trace;

use crate::protocol::{BodyInput, CookieStore, HeaderStore, ParseError, Request};
use crate::utils::ensure;

/// Maximum size in bytes allowed for the entire head section.
const MAX_HEAD_BYTES: usize = 8 * 1024;

/// The decoded request head, before connection-level fields are attached.
#[derive(Debug)]
pub struct RequestHead {
    /// Lowercased method token.
    pub method: String,
    /// Raw request URI.
    pub uri: String,
    /// URI path, split off before the first `?`.
    pub path: String,
    /// Query string after the first `?`, empty if absent.
    pub query: String,
    /// Non-empty `Host` header value.
    pub host: String,
    pub headers: HeaderStore,
    pub cookies: CookieStore,
}

impl RequestHead {
    /// Attaches the connection-level fields, producing a full [`Request`].
    pub fn into_request(self, remote_address: String, input: BodyInput) -> Request {
        Request {
            scheme: "http".to_owned(),
            method: self.method,
            host: self.host,
            uri: self.uri,
            path: self.path,
            query: self.query,
            remote_address,
            headers: self.headers,
            cookies: self.cookies,
            input,
            ..Default::default()
        }
    }
}

/// Decoder for one HTTP/1.0 request head.
///
/// # State machine
///
/// - [`State::RequestLine`]: waiting for the first line
/// - [`State::Headers`]: collecting header lines until the blank line
pub struct RequestDecoder {
    state: State,
    head_bytes: usize,
}

enum State {
    RequestLine,
    Headers(PartialHead),
}

struct PartialHead {
    method: String,
    uri: String,
    path: String,
    query: String,
    headers: HeaderStore,
    last_header: Option<String>,
}

impl RequestDecoder {
    pub fn new() -> Self {
        Default::default()
    }
}

impl Default for RequestDecoder {
    fn default() -> Self {
        Self { state: State::RequestLine, head_bytes: 0 }
    }
}

impl Decoder for RequestDecoder {
    type Item = RequestHead;
    type Error = ParseError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        while let Some(line) = take_line(src)? {
            self.head_bytes += line.len() + 1;
            ensure!(self.head_bytes <= MAX_HEAD_BYTES, ParseError::head_too_large(MAX_HEAD_BYTES));

            match &mut self.state {
                State::RequestLine => {
                    let partial = parse_request_line(&line)?;
                    trace!(method = %partial.method, uri = %partial.uri, "parsed request line");
                    self.state = State::Headers(partial);
                }
                State::Headers(partial) => {
                    if line.is_empty() {
                        let State::Headers(partial) = std::mem::take(&mut self.state) else {
                            unreachable!("state checked above");
                        };
                        self.head_bytes = 0;
                        return Ok(Some(partial.finish()?));
                    }
                    partial.feed_header(&line)?;
                }
            }
        }

        Ok(None)
    }

    /// End-of-stream handling.
    ///
    /// A stream that never produced a complete request line is malformed;
    /// one that ended mid-head is incomplete. A trailing request line
    /// without a newline is still parsed first, so its own malformations
    /// are reported as such.
    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if let Some(head) = self.decode(src)? {
            return Ok(Some(head));
        }

        match &self.state {
            State::RequestLine => {
                ensure!(!src.is_empty(), ParseError::malformed("malformed first line"));
                let trailing = src.split_to(src.len());
                let line = as_line_str(&trailing)?;
                let partial = parse_request_line(line)?;
                self.state = State::Headers(partial);
                Err(ParseError::Incomplete)
            }
            State::Headers(_) => Err(ParseError::Incomplete),
        }
    }
}

impl Default for State {
    fn default() -> Self {
        Self::RequestLine
    }
}

impl PartialHead {
    fn feed_header(&mut self, line: &str) -> Result<(), ParseError> {
        if line.starts_with([' ', '\t']) {
            // folded continuation of the previous header
            let Some(last) = &self.last_header else {
                return Err(ParseError::malformed("malformed headers"));
            };
            self.headers.append(last, line.trim());
            return Ok(());
        }

        let Some((name, rest)) = line.split_once(':') else {
            return Err(ParseError::malformed("malformed headers"));
        };
        ensure!(
            !name.is_empty() && name.bytes().all(is_header_name_byte),
            ParseError::malformed("malformed headers")
        );
        let Some(value) = rest.strip_prefix(' ') else {
            return Err(ParseError::malformed("malformed headers"));
        };

        let name = name.to_ascii_lowercase();
        self.headers.insert(&name, value.trim());
        self.last_header = Some(name);
        Ok(())
    }

    fn finish(self) -> Result<RequestHead, ParseError> {
        let host = self.headers.get("host").unwrap_or_default();
        ensure!(!host.is_empty(), ParseError::MissingHost);
        let host = host.to_owned();

        let cookies = self.headers.get("cookie").map(CookieStore::parse).unwrap_or_default();

        Ok(RequestHead {
            method: self.method,
            uri: self.uri,
            path: self.path,
            query: self.query,
            host,
            headers: self.headers,
            cookies,
        })
    }
}

fn is_header_name_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.')
}

/// Consumes one line from the buffer, or `None` if no full line arrived yet.
/// The returned line has its `\r\n` or `\n` ending stripped.
fn take_line(src: &mut BytesMut) -> Result<Option<String>, ParseError> {
    let Some(newline) = src.iter().position(|b| *b == b'\n') else {
        return Ok(None);
    };
    let raw = src.split_to(newline + 1);
    let mut line = &raw[..raw.len() - 1];
    if line.ends_with(b"\r") {
        line = &line[..line.len() - 1];
    }
    Ok(Some(as_line_str(line)?.to_owned()))
}

fn as_line_str(raw: &[u8]) -> Result<&str, ParseError> {
    std::str::from_utf8(raw).map_err(|_| ParseError::malformed("request is not valid utf-8"))
}

/// Parses `METHOD SP URI SP VERSION`, tolerating trailing whitespace.
/// The method is lowercased; the URI is split into path and query on the
/// first `?`. The version token is required but otherwise ignored.
fn parse_request_line(line: &str) -> Result<PartialHead, ParseError> {
    let mut tokens = line.split_whitespace();
    let (Some(method), Some(uri), Some(_version), None) =
        (tokens.next(), tokens.next(), tokens.next(), tokens.next())
    else {
        return Err(ParseError::malformed("malformed first line"));
    };

    let (path, query) = match uri.split_once('?') {
        Some((path, query)) => (path, query),
        None => (uri, ""),
    };

    Ok(PartialHead {
        method: method.to_ascii_lowercase(),
        uri: uri.to_owned(),
        path: path.to_owned(),
        query: query.to_owned(),
        headers: HeaderStore::new(),
        last_header: None,
    })
}
