// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A small, embeddable HTTP/1.1 client for talking to one specific remote API
//! from constrained environments.
//!
//! It supports optional TLS with SHA-1 certificate-fingerprint pinning (no
//! chain or hostname validation — the pin is the policy), an HTTP CONNECT
//! tunnel through a proxy, identity and chunked body decoding streamed to a
//! caller-supplied [`Sink`], and a bounded retry loop around proxy
//! re-authentication. It does not do HTTP/2, persistent connections, redirect
//! following, caching, cookies, or content decompression — every call opens a
//! fresh socket and closes it on completion.
//!
//! ```no_run
//! use pinfetch::{Client, Outcome};
//!
//! # async fn run() {
//! let mut client = Client::new();
//! client.set_url("https://example.com/status");
//! client.set_fingerprint([0u8; 20]);
//! let (outcome, body) = client.fetch_buf().await;
//! assert_eq!(outcome, Outcome::Ok);
//! # let _ = body;
//! # }
//! ```

pub mod client;
pub mod decode;
pub mod error;
pub mod response;
pub mod sink;
pub mod tls;
pub mod transport;
pub mod url;
pub mod util;

pub use client::{Client, Method};
pub use error::Outcome;
pub use sink::{Sink, SinkControl, VecSink};
pub use tls::Fingerprint;
pub use url::Endpoint;
