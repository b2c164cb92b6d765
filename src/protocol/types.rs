//! Wire Format Types
//!
//! This module defines the framing used on the wire. Every message is a
//! frame: a 4-byte big-endian length followed by that many payload bytes.
//! The length excludes the header itself.
//!
//! ## Wire Layout
//!
//! ```text
//! request  := u32 frame_len | u32 n_args | (u32 arg_len | arg_bytes){n_args}
//! response := u32 frame_len | resp_bytes
//! ```
//!
//! All multi-byte integers are big-endian; conversion to and from host
//! order is explicit (`to_be_bytes`/`from_be_bytes`) at every boundary.
//!
//! ## Examples
//!
//! `get x` on the wire (17 bytes):
//!
//! ```text
//! 00 00 00 0d | 00 00 00 02 | 00 00 00 03 "get" | 00 00 00 01 "x"
//! ```

use bytes::Bytes;

/// Size of the outer frame header in bytes.
pub const HEADER_LEN: usize = 4;

/// Default cap on the total size of one request, header included.
pub const DEFAULT_MAX_MSG: usize = 1 << 20;

/// Smallest accepted argument count.
pub const MIN_ARGS: u32 = 2;

/// Largest accepted argument count.
pub const MAX_ARGS: u32 = 3;

/// A parsed request: an ordered sequence of 2 or 3 byte-string arguments,
/// the first of which is the verb.
///
/// Requests are transient — they are produced by the parser, handed to the
/// dispatcher, and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// The argument list, verb first.
    pub args: Vec<Bytes>,
}

impl Request {
    /// Creates a request from an argument list.
    pub fn new(args: Vec<Bytes>) -> Self {
        Self { args }
    }

    /// Total bytes this request occupies on the wire, header included.
    pub fn wire_len(&self) -> usize {
        HEADER_LEN + 4 + self.args.iter().map(|a| 4 + a.len()).sum::<usize>()
    }

    /// Encodes the request into a fresh buffer.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.wire_len());
        self.encode_into(&mut out);
        out
    }

    /// Encodes the request onto the end of an existing buffer.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        let frame_len = (self.wire_len() - HEADER_LEN) as u32;
        out.extend_from_slice(&frame_len.to_be_bytes());
        out.extend_from_slice(&(self.args.len() as u32).to_be_bytes());
        for arg in &self.args {
            out.extend_from_slice(&(arg.len() as u32).to_be_bytes());
            out.extend_from_slice(arg);
        }
    }
}

/// Wraps a response body in the outer frame header.
pub fn encode_response(body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + body.len());
    encode_response_into(body, &mut out);
    out
}

/// Encodes a framed response onto the end of an existing buffer.
pub fn encode_response_into(body: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(&(body.len() as u32).to_be_bytes());
    out.extend_from_slice(body);
}
