// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Identity and chunked transfer-encoding decoders.
//!
//! Both feed decoded payload bytes to a [`crate::sink::Sink`] and report one of
//! [`DecodeStatus`]; the engine in [`crate::client`] owns content-length
//! bookkeeping and stops reading once enough bytes have arrived (identity) or
//! the decoder reports [`DecodeStatus::Done`] (chunked).

use crate::sink::{Sink, SinkControl};

/// Outcome of feeding one buffer through a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStatus {
    /// Keep reading.
    Continue,
    /// Body is complete (chunked only — identity completion is judged by the
    /// engine against `Content-Length`).
    Done,
    /// The sink requested abort.
    Aborted,
    /// Protocol violation (chunked only).
    Err,
}

/// Selects which wire encoding a response body uses.
pub enum Decoder {
    Identity,
    Chunked(ChunkedState),
}

impl Decoder {
    pub fn new() -> Decoder {
        Decoder::Identity
    }

    pub fn feed(&mut self, buf: &[u8], sink: &mut dyn Sink, delivered: &mut u64) -> DecodeStatus {
        match self {
            Decoder::Identity => feed_identity(buf, sink, delivered),
            Decoder::Chunked(state) => feed_chunked(state, buf, sink, delivered),
        }
    }
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::new()
    }
}

fn feed_identity(buf: &[u8], sink: &mut dyn Sink, delivered: &mut u64) -> DecodeStatus {
    if buf.is_empty() {
        return DecodeStatus::Continue;
    }
    *delivered += buf.len() as u64;
    match sink.write(buf) {
        SinkControl::Continue => DecodeStatus::Continue,
        SinkControl::Abort => DecodeStatus::Aborted,
    }
}

/// Chunked-encoding sub-state: reading a hex size line, or streaming the
/// `remaining` bytes of the current chunk's payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkedState {
    ChunkSize { acc: u64 },
    Data { remaining: u64 },
    /// Between a chunk's payload and its trailing CRLF — consume bytes until `\n`.
    ChunkTrailer,
}

impl ChunkedState {
    pub fn new() -> ChunkedState {
        ChunkedState::ChunkSize { acc: 0 }
    }
}

impl Default for ChunkedState {
    fn default() -> Self {
        ChunkedState::new()
    }
}

fn feed_chunked(
    state: &mut ChunkedState,
    buf: &[u8],
    sink: &mut dyn Sink,
    delivered: &mut u64,
) -> DecodeStatus {
    let mut pos = 0usize;
    while pos < buf.len() {
        match state {
            ChunkedState::ChunkSize { acc } => {
                let b = buf[pos];
                match b {
                    b'0'..=b'9' => {
                        *acc = (*acc << 4) | (b - b'0') as u64;
                        pos += 1;
                    }
                    b'a'..=b'f' => {
                        *acc = (*acc << 4) | (b - b'a' + 10) as u64;
                        pos += 1;
                    }
                    b'\r' => {
                        pos += 1;
                    }
                    b'\n' => {
                        let size = *acc;
                        pos += 1;
                        if size == 0 {
                            return DecodeStatus::Done;
                        }
                        *state = ChunkedState::Data { remaining: size };
                    }
                    _ => return DecodeStatus::Err,
                }
            }
            ChunkedState::Data { remaining } => {
                if *remaining > 0 {
                    let avail = (buf.len() - pos) as u64;
                    let take = avail.min(*remaining) as usize;
                    if feed_identity(&buf[pos..pos + take], sink, delivered) == DecodeStatus::Aborted
                    {
                        return DecodeStatus::Aborted;
                    }
                    pos += take;
                    *remaining -= take as u64;
                } else {
                    *state = ChunkedState::ChunkTrailer;
                }
            }
            ChunkedState::ChunkTrailer => {
                let b = buf[pos];
                pos += 1;
                if b == b'\n' {
                    *state = ChunkedState::ChunkSize { acc: 0 };
                }
            }
        }
    }
    DecodeStatus::Continue
}
