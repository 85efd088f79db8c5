// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The request engine: connect, optional CONNECT tunnel, optional TLS
//! handshake, request/response framing, body delivery, and the retry loop.

use std::time::Duration;

use crate::decode::DecodeStatus;
use crate::error::Outcome;
use crate::response;
use crate::sink::{Sink, SinkControl, VecSink};
use crate::tls::{self, Fingerprint};
use crate::transport::{self, Connection};
use crate::url::Endpoint;
use crate::util;

/// HTTP method this client can issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A reusable client configuration. Set the target (and optionally a proxy,
/// method, body, extra headers, timeout and pinned fingerprint), then call
/// [`Client::fetch`] or [`Client::fetch_buf`] as many times as needed.
///
/// `fetch`/`fetch_buf` take `&mut self`: the compiler enforces the
/// single-call-in-flight contract a caller must otherwise remember by hand.
#[derive(Debug, Clone)]
pub struct Client {
    target: Option<Endpoint>,
    proxy: Option<Endpoint>,
    method: Method,
    post_data: Option<Vec<u8>>,
    extra_headers: Option<String>,
    timeout: Duration,
    fingerprint: Fingerprint,
}

impl Default for Client {
    fn default() -> Self {
        Client {
            target: None,
            proxy: None,
            method: Method::Get,
            post_data: None,
            extra_headers: None,
            timeout: Duration::from_millis(30_000),
            fingerprint: [0u8; 20],
        }
    }
}

impl Client {
    pub fn new() -> Client {
        Client::default()
    }

    /// Parse and install `url` as the target endpoint. Returns `false` (and
    /// leaves the previous target untouched) if it isn't `http://`/`https://`.
    pub fn set_url(&mut self, url: &str) -> bool {
        match Endpoint::parse(url) {
            Some(ep) => {
                self.target = Some(ep);
                true
            }
            None => false,
        }
    }

    /// Parse and install `url` as the proxy endpoint.
    pub fn set_proxy(&mut self, url: &str) -> bool {
        match Endpoint::parse(url) {
            Some(ep) => {
                self.proxy = Some(ep);
                true
            }
            None => false,
        }
    }

    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    pub fn set_post_data(&mut self, data: Vec<u8>) {
        self.post_data = Some(data);
    }

    /// `raw` must already be CRLF-terminated per header — it is written
    /// verbatim just before the blank line ending the header block.
    pub fn set_extra_headers(&mut self, raw: String) {
        self.extra_headers = Some(raw);
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) {
        self.fingerprint = fingerprint;
    }

    /// Run the call, delivering the decoded body to `sink` in wire order.
    /// Retries internally (up to three attempts total) on a 407-via-proxy
    /// response; every other non-OK outcome is returned immediately.
    pub async fn fetch(&mut self, sink: &mut dyn Sink) -> Outcome {
        let mut attempts_left = 3;
        let mut outcome = Outcome::Err;
        while attempts_left > 0 {
            outcome = self.attempt(sink).await;
            attempts_left -= 1;
            if outcome == Outcome::Ok || outcome.is_terminal_failure() {
                break;
            }
        }
        outcome
    }

    /// Convenience wrapper that accumulates the whole body into memory.
    pub async fn fetch_buf(&mut self) -> (Outcome, Vec<u8>) {
        let mut sink = VecSink::new();
        let outcome = self.fetch(&mut sink).await;
        (outcome, sink.into_inner())
    }

    async fn attempt(&self, sink: &mut dyn Sink) -> Outcome {
        match self.attempt_inner(sink).await {
            Ok(()) => Outcome::Ok,
            Err(e) => e,
        }
    }

    async fn attempt_inner(&self, sink: &mut dyn Sink) -> Result<(), Outcome> {
        let target = self.target.as_ref().ok_or(Outcome::Err)?;
        let proxy = self.proxy.as_ref();

        let (dial_host, dial_port) = match proxy {
            Some(p) => (p.host.as_str(), p.effective_port()),
            None => (target.host.as_str(), target.effective_port()),
        };

        log::debug!("connecting to {dial_host}:{dial_port}");
        let stream = transport::dial(dial_host, dial_port, self.timeout).await?;
        let conn = Connection::Plain(stream);

        let (conn, result) = self.run_connection(conn, target, proxy, sink).await;

        // best-effort graceful close: covers every post-connect exit path —
        // a failed CONNECT tunnel or TLS handshake, a bad status, a decode
        // error, a mid-body timeout — not just a clean end of the body loop.
        // `None` only when the TLS handshake itself consumed and dropped the
        // stream on failure, in which case there is nothing left to close.
        // The socket/TLS session is released regardless via `Drop` once it
        // goes out of scope.
        if let Some(mut conn) = conn {
            let _ = tokio::io::AsyncWriteExt::shutdown(&mut conn).await;
        }

        result
    }

    /// Runs the optional CONNECT tunnel, the optional TLS handshake, and the
    /// request/response/body exchange. Always hands the connection back
    /// alongside the result so the caller can attempt a graceful close on
    /// every exit path, not just a successful one.
    async fn run_connection(
        &self,
        mut conn: Connection,
        target: &Endpoint,
        proxy: Option<&Endpoint>,
        sink: &mut dyn Sink,
    ) -> (Option<Connection>, Result<(), Outcome>) {
        if proxy.is_some() && target.tls {
            log::debug!(
                "opening CONNECT tunnel to {}:{}",
                target.host,
                target.effective_port()
            );
            let proxy_auth = proxy.and_then(|p| {
                p.user
                    .as_ref()
                    .map(|user| util::basic_auth(user, p.password.as_deref()))
            });
            if let Err(e) = transport::http_connect(
                &mut conn,
                &target.host,
                target.effective_port(),
                proxy_auth.as_deref(),
                self.timeout,
            )
            .await
            {
                log::warn!("CONNECT tunnel failed: {e}");
                return (Some(conn), Err(e));
            }
        }

        if target.tls {
            let plain = conn
                .into_plain()
                .expect("connection is still plain before the TLS handshake");
            log::debug!("performing TLS handshake with {}", target.host);
            conn = match tokio::time::timeout(
                self.timeout,
                tls::handshake(plain, &target.host, self.fingerprint),
            )
            .await
            {
                // the handshake future consumes the plain stream; on failure
                // it is already gone, so there is nothing left to shut down.
                Err(_) => return (None, Err(Outcome::Timeout)),
                Ok(Err(e)) => {
                    log::warn!("TLS handshake failed: {e}");
                    return (None, Err(e));
                }
                Ok(Ok(s)) => Connection::Tls(Box::new(s)),
            };
        }

        let request = self.format_request(target, proxy);
        if let Err(e) = transport::write_all(&mut conn, &request, self.timeout).await {
            return (Some(conn), Err(e));
        }
        log::debug!("sent {} request for {}", self.method.as_str(), target.host);

        let mut header_buf = Vec::with_capacity(4096);
        let parsed = match transport::read_header_block(&mut conn, &mut header_buf, self.timeout).await {
            Ok(p) => p,
            Err(e) => return (Some(conn), Err(e)),
        };

        if let Err(e) = response::status_to_outcome(parsed.status, proxy.is_some()) {
            match e {
                Outcome::Retry => log::warn!("proxy requested re-authentication (407)"),
                Outcome::StatusUnknown => {
                    log::warn!("unrecognized response status {}", parsed.status)
                }
                _ => {}
            }
            return (Some(conn), Err(e));
        }

        let mut decoder = parsed.decoder();
        let mut delivered = 0u64;
        let mut status = decoder.feed(&parsed.body_start, sink, &mut delivered);

        let mut io_buf = [0u8; 16 * 1024];
        let body_result: Result<(), Outcome> = loop {
            match status {
                DecodeStatus::Err => break Err(Outcome::DecodingErr),
                DecodeStatus::Aborted => break Err(Outcome::CbAbort),
                DecodeStatus::Done => break Ok(()),
                DecodeStatus::Continue => {
                    if let Some(total) = parsed.content_length {
                        if delivered >= total {
                            break Ok(());
                        }
                    }
                    match transport::read(&mut conn, &mut io_buf, self.timeout).await {
                        Ok(0) => break Ok(()),
                        Ok(n) => status = decoder.feed(&io_buf[..n], sink, &mut delivered),
                        Err(e) => break Err(e),
                    }
                }
            }
        };

        let result = body_result.and_then(|()| {
            if let Some(total) = parsed.content_length {
                if delivered < total {
                    return Err(Outcome::PartialFile);
                }
            }
            Ok(())
        });

        (Some(conn), result)
    }

    fn format_request(&self, target: &Endpoint, proxy: Option<&Endpoint>) -> Vec<u8> {
        let path = target.request_path();
        let mut request = if proxy.is_some() && !target.tls {
            format!(
                "{} http://{}:{}/{path} HTTP/1.1\r\n",
                self.method.as_str(),
                target.host,
                target.effective_port(),
            )
        } else {
            format!("{} /{path} HTTP/1.1\r\n", self.method.as_str())
        };

        request.push_str(&format!("Host: {}\r\n", target.host));
        request.push_str(&format!("User-Agent: pinfetch/{}\r\n", env!("CARGO_PKG_VERSION")));
        request.push_str("Connection: Close\r\n");

        if self.method == Method::Post {
            if let Some(body) = &self.post_data {
                request.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
        }

        if let Some(user) = &target.user {
            request.push_str(&format!(
                "Authorization: Basic {}\r\n",
                util::basic_auth(user, target.password.as_deref())
            ));
        }

        // proxy credentials would otherwise leak to the origin through a
        // CONNECT-tunnelled TLS session, so they're only ever sent in the clear.
        if !target.tls {
            if let Some(user) = proxy.and_then(|p| p.user.as_ref()) {
                let password = proxy.and_then(|p| p.password.as_deref());
                request.push_str(&format!(
                    "Proxy-Authorization: Basic {}\r\n",
                    util::basic_auth(user, password)
                ));
            }
        }

        if let Some(extra) = &self.extra_headers {
            request.push_str(extra);
        }
        request.push_str("\r\n");

        let mut bytes = request.into_bytes();
        if self.method == Method::Post {
            if let Some(body) = &self.post_data {
                bytes.extend_from_slice(body);
            }
        }
        bytes
    }
}
