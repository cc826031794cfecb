//! TCP accept and head-parse layer.
//!
//! One connection carries exactly one request. [`ApiServer::accept`] waits a
//! bounded time for a connection, reads and parses the request head and hands
//! back a [`Request`]/[`Output`] pair; unparsable heads are answered with a
//! raw `400` and never reach the pipeline. The bounded wait is what lets the
//! serving loop observe its shutdown signal between connections.

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_util::codec::Decoder;
use tracing::{debug, error, warn};

use crate::codec::{RequestDecoder, RequestHead};
use crate::protocol::{BodyInput, Output, ParseError, Request};

const ACCEPT_TIMEOUT: Duration = Duration::from_secs(5);

const BAD_REQUEST_RESPONSE: &[u8] = b"HTTP/1.0 400 Bad Request\r\nContent-Length: 0\r\n\r\n";

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to create listening socket on port {port}: {source}")]
    ListenFailed {
        port: u16,
        #[source]
        source: io::Error,
    },
}

/// A listening socket serving one connection at a time.
#[derive(Debug)]
pub struct ApiServer {
    listener: TcpListener,
}

impl ApiServer {
    /// Binds `0.0.0.0:port`. Port 0 selects an ephemeral port.
    pub async fn bind(port: u16) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(("0.0.0.0", port))
            .await
            .map_err(|source| ServerError::ListenFailed { port, source })?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Waits up to the accept timeout for a connection and parses its
    /// request head.
    ///
    /// Returns `None` when the wait elapsed, the accept failed, or the head
    /// was unparsable (the client then got the raw `400` response). The
    /// caller is expected to simply try again.
    pub async fn accept(&self) -> Option<(Request, Output)> {
        let (stream, peer) = match timeout(ACCEPT_TIMEOUT, self.listener.accept()).await {
            Err(_elapsed) => return None,
            Ok(Err(e)) => {
                warn!(cause = %e, "failed to accept connection");
                return None;
            }
            Ok(Ok(accepted)) => accepted,
        };
        debug!(%peer, "received request");

        let (read_half, mut write_half) = stream.into_split();
        match read_head(read_half).await {
            Ok((head, leftover, read_half)) => {
                let input = BodyInput::new(leftover, read_half);
                let request = head.into_request(peer.ip().to_string(), input);
                Some((request, Output::new(write_half)))
            }
            Err(e) => {
                error!(cause = %e, "error reading client request");
                if let Err(e) = write_half.write_all(BAD_REQUEST_RESPONSE).await {
                    debug!(cause = %e, "failed to send error response");
                }
                let _ = write_half.shutdown().await;
                None
            }
        }
    }
}

/// Reads from the socket until the decoder produces a complete head.
///
/// Bytes read past the blank line stay in the buffer and are returned so the
/// body reader starts exactly where the head ended.
async fn read_head(mut reader: OwnedReadHalf) -> Result<(RequestHead, BytesMut, OwnedReadHalf), ParseError> {
    let mut decoder = RequestDecoder::new();
    let mut buffer = BytesMut::with_capacity(8 * 1024);

    loop {
        if let Some(head) = decoder.decode(&mut buffer)? {
            return Ok((head, buffer, reader));
        }
        if reader.read_buf(&mut buffer).await? == 0 {
            return match decoder.decode_eof(&mut buffer)? {
                Some(head) => Ok((head, buffer, reader)),
                None => Err(ParseError::Incomplete),
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpStream;

    async fn server() -> (ApiServer, SocketAddr) {
        let server = ApiServer::bind(0).await.unwrap();
        let addr = server.local_addr().unwrap();
        (server, addr)
    }

    #[tokio::test]
    async fn accept_parses_head_and_leaves_body_readable() {
        let (server, addr) = server().await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"POST /api/things HTTP/1.0\r\nHost: example.com\r\nContent-Length: 5\r\n\r\nhello")
                .await
                .unwrap();
            // one request per connection; signal end of body with FIN
            stream.shutdown().await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            String::from_utf8(reply).unwrap()
        });

        let (mut request, mut output) = server.accept().await.unwrap();
        assert_eq!(request.method, "post");
        assert_eq!(request.path, "/api/things");
        assert_eq!(request.host, "example.com");

        let body = request.input.read_limited(1024).await.unwrap();
        assert_eq!(&body[..], b"hello");

        output.write(b"ok").await.unwrap();
        output.finish().await.unwrap();
        drop(output);

        let reply = client.await.unwrap();
        assert!(reply.starts_with("HTTP/1.0 200 OK\r\n"));
        assert!(reply.ends_with("ok"));
    }

    #[tokio::test]
    async fn malformed_head_gets_raw_400() {
        let (server, addr) = server().await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"GARBAGE\r\n\r\n").await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            String::from_utf8(reply).unwrap()
        });

        assert!(server.accept().await.is_none());

        let reply = client.await.unwrap();
        assert_eq!(reply, "HTTP/1.0 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
    }

    #[tokio::test]
    async fn missing_host_gets_raw_400() {
        let (server, addr) = server().await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            String::from_utf8(reply).unwrap()
        });

        assert!(server.accept().await.is_none());

        let reply = client.await.unwrap();
        assert!(reply.starts_with("HTTP/1.0 400 Bad Request\r\n"));
    }

    #[tokio::test]
    async fn truncated_head_gets_raw_400() {
        let (server, addr) = server().await;

        let client = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream.write_all(b"GET / HTTP/1.0\r\nHost: example.com\r\n").await.unwrap();
            // close without ever sending the blank line
            stream.shutdown().await.unwrap();
            let mut reply = Vec::new();
            stream.read_to_end(&mut reply).await.unwrap();
            String::from_utf8(reply).unwrap()
        });

        assert!(server.accept().await.is_none());

        let reply = client.await.unwrap();
        assert!(reply.starts_with("HTTP/1.0 400 Bad Request\r\n"));
    }

    #[tokio::test(start_paused = true)]
    async fn accept_times_out_without_a_connection() {
        let (server, _addr) = server().await;
        assert!(server.accept().await.is_none());
    }
}
