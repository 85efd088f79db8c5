// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The byte sink a caller supplies to receive a decoded response body.
//!
//! Rust's closures and trait objects subsume the classic `(fn pointer, opaque
//! context)` callback pair — a [`Sink`] implementation simply owns whatever
//! state it needs.

/// What a [`Sink`] wants the engine to do after it has seen a chunk of data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkControl {
    Continue,
    Abort,
}

/// Receives decoded response-body bytes, in wire order, never re-entrantly.
pub trait Sink {
    fn write(&mut self, data: &[u8]) -> SinkControl;
}

impl<F> Sink for F
where
    F: FnMut(&[u8]) -> SinkControl,
{
    fn write(&mut self, data: &[u8]) -> SinkControl {
        (self)(data)
    }
}

/// Accumulates the whole body into memory — backs [`crate::Client::fetch_buf`].
#[derive(Debug, Default)]
pub struct VecSink(Vec<u8>);

impl VecSink {
    pub fn new() -> VecSink {
        VecSink(Vec::new())
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl Sink for VecSink {
    fn write(&mut self, data: &[u8]) -> SinkControl {
        self.0.extend_from_slice(data);
        SinkControl::Continue
    }
}
