// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Byte transport: DNS resolution, TCP connect, and the CONNECT tunnel.
//!
//! Every suspension point here is wrapped in [`tokio::time::timeout`] against
//! the caller's configured deadline — the async-runtime-native stand-in for a
//! hand-rolled non-blocking-socket readiness wait.

use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::{TcpSocket, TcpStream};
use tokio_rustls::client::TlsStream;

use crate::error::Outcome;
use crate::response::{self, ParsedHeaders};

/// A connected transport: plain TCP, or TCP promoted to TLS after handshake.
/// Once promoted the rest of the engine reads and writes through this enum
/// without caring which one it holds.
pub enum Connection {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl Connection {
    pub fn into_plain(self) -> Option<TcpStream> {
        match self {
            Connection::Plain(s) => Some(s),
            Connection::Tls(_) => None,
        }
    }
}

impl AsyncRead for Connection {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_read(cx, buf),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Connection {
    fn poll_write(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_write(cx, buf),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_flush(cx),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut *self {
            Connection::Plain(s) => Pin::new(s).poll_shutdown(cx),
            Connection::Tls(s) => Pin::new(s.as_mut()).poll_shutdown(cx),
        }
    }
}

/// Resolve `host:port` and connect, gated by `timeout` end to end.
pub async fn dial(host: &str, port: &str, timeout: Duration) -> Result<TcpStream, Outcome> {
    let addr = resolve(host, port, timeout).await?;
    connect_addr(addr, timeout).await
}

async fn resolve(host: &str, port: &str, timeout: Duration) -> Result<SocketAddr, Outcome> {
    let query = format!("{host}:{port}");
    match tokio::time::timeout(timeout, tokio::net::lookup_host(query)).await {
        Err(_) => Err(Outcome::Timeout),
        Ok(Err(_)) => Err(Outcome::GetaddrErr),
        Ok(Ok(mut candidates)) => candidates.next().ok_or(Outcome::GetaddrErr),
    }
}

async fn connect_addr(addr: SocketAddr, timeout: Duration) -> Result<TcpStream, Outcome> {
    let domain = Domain::for_address(addr);
    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(|_| Outcome::SockErr)?;
    // receive-buffer size is a hint, not a contract; a failure to set it is
    // ignored rather than treated as fatal.
    let _ = socket.set_recv_buffer_size(256 * 1024);
    socket.set_nonblocking(true).map_err(|_| Outcome::SockErr)?;

    let std_stream: std::net::TcpStream = socket.into();
    let tokio_socket = TcpSocket::from_std_stream(std_stream);

    match tokio::time::timeout(timeout, tokio_socket.connect(addr)).await {
        Err(_) => Err(Outcome::Timeout),
        Ok(Err(_)) => Err(Outcome::ConnectRefused),
        Ok(Ok(stream)) => Ok(stream),
    }
}

/// Write `buf` to `conn`, mapping a plain-socket failure to the unclassified
/// [`Outcome::Err`] (the closed enum has no dedicated plain write-error
/// variant) and a TLS-session failure to [`Outcome::TlsWriteErr`].
pub async fn write_all(conn: &mut Connection, buf: &[u8], timeout: Duration) -> Result<(), Outcome> {
    let fut = async {
        match conn {
            Connection::Plain(s) => s.write_all(buf).await.map_err(|_| Outcome::Err),
            Connection::Tls(s) => s.write_all(buf).await.map_err(|_| Outcome::TlsWriteErr),
        }
    };
    match tokio::time::timeout(timeout, fut).await {
        Err(_) => Err(Outcome::Timeout),
        Ok(result) => result,
    }
}

/// Read into `buf`, returning the number of bytes read (`0` on EOF).
pub async fn read(conn: &mut Connection, buf: &mut [u8], timeout: Duration) -> Result<usize, Outcome> {
    let fut = async {
        match conn {
            Connection::Plain(s) => s.read(buf).await.map_err(|_| Outcome::ReadErr),
            Connection::Tls(s) => s.read(buf).await.map_err(|_| Outcome::TlsReadErr),
        }
    };
    match tokio::time::timeout(timeout, fut).await {
        Err(_) => Err(Outcome::Timeout),
        Ok(result) => result,
    }
}

/// Read and accumulate into `buf` until a full header block (status line +
/// headers + terminating blank line) is available, then parse it.
pub async fn read_header_block(
    conn: &mut Connection,
    buf: &mut Vec<u8>,
    timeout: Duration,
) -> Result<ParsedHeaders, Outcome> {
    let mut scratch = [0u8; 4096];
    loop {
        if let Some(parsed) = response::try_parse(buf) {
            return Ok(parsed);
        }
        let n = read(conn, &mut scratch, timeout).await?;
        if n == 0 {
            return Err(Outcome::ConnectionClosed);
        }
        buf.extend_from_slice(&scratch[..n]);
    }
}

/// Send an HTTP CONNECT request for `host:port` and dispatch the response
/// through the same status table the main response uses (spec.md §4.6 step 1:
/// "others per §4.7") — in particular a `407` here retries the whole attempt
/// exactly like a `407` on the main response does, rather than collapsing to
/// `StatusUnknown`. `proxy_auth`, if given, is the already-encoded
/// `base64(user:pass)` value for `Proxy-Authorization`.
pub async fn http_connect(
    conn: &mut Connection,
    host: &str,
    port: &str,
    proxy_auth: Option<&str>,
    timeout: Duration,
) -> Result<(), Outcome> {
    let mut request =
        format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\nProxy-Connection: close\r\n");
    if let Some(auth) = proxy_auth {
        request.push_str(&format!("Proxy-Authorization: Basic {auth}\r\n"));
    }
    request.push_str("\r\n");

    write_all(conn, request.as_bytes(), timeout).await?;

    let mut buf = Vec::with_capacity(4096);
    let headers = read_header_block(conn, &mut buf, timeout).await?;
    // the CONNECT request itself always goes to a proxy, so the 407-retry
    // branch of the shared table is always in play here.
    response::status_to_outcome(headers.status, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn connect_tunnel_200_succeeds() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
                .await
                .unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::Plain(stream);
        let result = http_connect(&mut conn, "origin.example", "443", None, Duration::from_secs(5)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn connect_tunnel_407_surfaces_as_retry_not_status_unknown() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            socket
                .write_all(b"HTTP/1.1 407 Proxy Authentication Required\r\n\r\n")
                .await
                .unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut conn = Connection::Plain(stream);
        let result = http_connect(&mut conn, "origin.example", "443", None, Duration::from_secs(5)).await;
        assert_eq!(result, Err(Outcome::Retry));
    }
}
