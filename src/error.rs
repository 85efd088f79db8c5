// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Closed outcome enumeration for a fetch attempt.
//!
//! Every fallible step in the request engine maps to exactly one of these
//! variants; there is no wrapped "other" error. [`Outcome::Ok`] and
//! [`Outcome::Retry`] are the only two variants that do not end the call —
//! everything else is fatal for the attempt that produced it.

use thiserror::Error;

/// Result of a single [`crate::Client::fetch`] call (or one attempt inside it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum Outcome {
    /// The call completed and the sink received the full body.
    #[error("ok")]
    Ok,
    /// Unclassified fault not covered by a more specific variant.
    #[error("unclassified error")]
    Err,
    /// Response status code was outside the recognized set.
    #[error("unrecognized response status")]
    StatusUnknown,
    /// Server responded `404 Not Found`.
    #[error("not found")]
    NotFound,
    /// Server responded `403 Forbidden`.
    #[error("forbidden")]
    Forbidden,
    /// Server responded `400 Bad Request`.
    #[error("bad request")]
    BadRequest,
    /// `connect()` completed but the peer refused the connection.
    #[error("connection refused")]
    ConnectRefused,
    /// Internal signal: reinitialize and run another attempt. Never returned
    /// to a caller unless the retry budget is exhausted.
    #[error("retry")]
    Retry,
    /// Socket creation failed.
    #[error("socket error")]
    SockErr,
    /// DNS resolution failed or returned no candidates.
    #[error("address resolution failed")]
    GetaddrErr,
    /// The sink callback requested [`crate::sink::SinkControl::Abort`].
    #[error("callback aborted transfer")]
    CbAbort,
    /// The body ended (EOF) before `Content-Length` bytes were delivered.
    #[error("partial file")]
    PartialFile,
    /// A readiness/read/write/handshake step exceeded the configured timeout.
    #[error("timed out")]
    Timeout,
    /// A transport read failed.
    #[error("read error")]
    ReadErr,
    /// The peer closed the connection while headers were still being read.
    #[error("connection closed")]
    ConnectionClosed,
    /// The chunked-encoding state machine saw an invalid byte.
    #[error("chunked decoding error")]
    DecodingErr,
    /// Writing to the TLS session failed.
    #[error("TLS write error")]
    TlsWriteErr,
    /// Reading from the TLS session failed.
    #[error("TLS read error")]
    TlsReadErr,
    /// The TLS handshake itself failed.
    #[error("TLS handshake error")]
    TlsHandshakeErr,
    /// The peer certificate's SHA-1 fingerprint did not match the pinned value.
    #[error("TLS certificate fingerprint mismatch")]
    TlsFingerprintMismatch,
}

impl Outcome {
    /// True for every outcome except [`Outcome::Ok`] and [`Outcome::Retry`] —
    /// the two outcomes [`crate::Client::fetch`]'s retry loop treats
    /// specially (`Ok` ends the call successfully, `Retry` re-runs the
    /// attempt). Everything else stops the retry loop immediately.
    pub fn is_terminal_failure(self) -> bool {
        !matches!(self, Outcome::Ok | Outcome::Retry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ok_and_retry_are_non_terminal() {
        assert!(!Outcome::Ok.is_terminal_failure());
        assert!(!Outcome::Retry.is_terminal_failure());
        assert!(Outcome::NotFound.is_terminal_failure());
        assert!(Outcome::Timeout.is_terminal_failure());
        assert!(Outcome::TlsFingerprintMismatch.is_terminal_failure());
    }
}
