//! Response writing with deferred header flushing.
//!
//! [`Output`] buffers the status code and header lines until the first body
//! write (or the explicit empty finalizing write). At that point the status
//! line and header block are emitted exactly once; afterwards status and
//! headers are immutable and any mutation attempt fails with
//! [`SendError::HeadersAlreadySent`].

use bytes::{BufMut, BytesMut};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::protocol::SendError;

/// Maps a status code to its canonical reason phrase.
///
/// Unmapped codes render as `Unknown`.
pub fn reason_phrase(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "Switching Protocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Moved Temporarily",
        303 => "See Other",
        304 => "Not Modified",
        305 => "Use Proxy",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Time-out",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Request Entity Too Large",
        414 => "Request-URI Too Large",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        423 => "Locked",
        424 => "Failed Dependency",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Time-out",
        505 => "HTTP Version not supported",
        _ => "Unknown",
    }
}

/// Options accepted by [`Output::cookie`].
#[derive(Debug, Clone, Default)]
pub struct CookieOptions {
    /// Cookie path. Defaults to `/` when unset.
    pub path: Option<String>,
    pub domain: Option<String>,
    /// Emitted as a bare `Secure` flag when true.
    pub secure: bool,
    /// Emitted as a bare `HttpOnly` flag when true.
    pub http_only: bool,
    /// Any further attributes, emitted as `key=value`.
    pub extra: Vec<(String, String)>,
}

/// Buffered response sink over the write half of a connection.
pub struct Output {
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    status: u16,
    headers: Vec<String>,
    headers_sent: bool,
}

impl Output {
    pub fn new<W>(writer: W) -> Self
    where
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self { writer: Box::new(writer), status: 200, headers: Vec::new(), headers_sent: false }
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn headers_sent(&self) -> bool {
        self.headers_sent
    }

    pub fn set_status(&mut self, status: u16) -> Result<(), SendError> {
        if self.headers_sent {
            return Err(SendError::HeadersAlreadySent);
        }
        self.status = status;
        Ok(())
    }

    /// Registers a raw header line, e.g. `Content-Type: application/json`.
    /// Lines are emitted in registration order.
    pub fn header<S: Into<String>>(&mut self, line: S) -> Result<(), SendError> {
        if self.headers_sent {
            return Err(SendError::HeadersAlreadySent);
        }
        self.headers.push(line.into());
        Ok(())
    }

    /// Registers a `Set-Cookie` header.
    ///
    /// * `ttl_seconds = None` produces a session cookie.
    /// * `ttl_seconds <= 0` deletes the cookie (zero max-age, expiry in the
    ///   past).
    /// * `ttl_seconds > 0` sets `Max-Age` accordingly.
    pub fn cookie(
        &mut self,
        name: &str,
        value: &str,
        ttl_seconds: Option<i64>,
        options: &CookieOptions,
    ) -> Result<(), SendError> {
        let mut line = format!("Set-Cookie: {name}={value}");

        match ttl_seconds {
            None => {}
            Some(ttl) if ttl <= 0 => {
                line.push_str("; Max-Age=0; Expires=Thu, 01 Jan 1970 00:00:00 GMT");
            }
            Some(ttl) => {
                line.push_str(&format!("; Max-Age={ttl}"));
            }
        }

        let path = options.path.as_deref().unwrap_or("/");
        line.push_str(&format!("; Path={path}"));
        if let Some(domain) = &options.domain {
            line.push_str(&format!("; Domain={domain}"));
        }
        for (key, extra_value) in &options.extra {
            line.push_str(&format!("; {key}={extra_value}"));
        }
        if options.secure {
            line.push_str("; Secure");
        }
        if options.http_only {
            line.push_str("; HttpOnly");
        }

        self.header(line)
    }

    /// Writes body bytes, emitting the status line and header block first
    /// if they have not been sent yet.
    ///
    /// An empty write still finalizes the head, which is how bodyless
    /// responses get their headers onto the wire.
    pub async fn write(&mut self, content: &[u8]) -> Result<(), SendError> {
        if !self.headers_sent {
            self.headers_sent = true;
            let mut head = BytesMut::with_capacity(256);
            head.put_slice(format!("HTTP/1.0 {} {}\r\n", self.status, reason_phrase(self.status)).as_bytes());
            for header in &self.headers {
                head.put_slice(header.as_bytes());
                head.put_slice(b"\r\n");
            }
            head.put_slice(b"\r\n");
            self.writer.write_all(&head).await?;
        }
        if !content.is_empty() {
            self.writer.write_all(content).await?;
        }
        Ok(())
    }

    /// Discards any staged response state and coerces the output to a bare
    /// 500, so a failed handler never leaks a partial header set.
    ///
    /// No-op once headers are on the wire.
    pub fn coerce_failure(&mut self) {
        if !self.headers_sent {
            self.status = 500;
            self.headers.clear();
        }
    }

    /// Finalizes the response: forces the head onto the wire even when no
    /// body was written, flushes and shuts the connection down.
    pub async fn finish(&mut self) -> Result<(), SendError> {
        self.write(b"").await?;
        self.writer.flush().await?;
        self.writer.shutdown().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Output {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Output")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("headers_sent", &self.headers_sent)
            .finish_non_exhaustive()
    }
}
