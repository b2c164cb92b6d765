//! Incremental Request Parser
//!
//! The parser consumes at most one request per call from a byte buffer
//! that may hold anything from a lone partial header to a long pipelined
//! run of complete requests. TCP gives no message boundaries, so the
//! caller appends whatever the socket produced and retries.
//!
//! ## Parser Contract
//!
//! - `Ok(Some((request, consumed)))` — one complete request; `consumed`
//!   bytes belong to it, header included.
//! - `Ok(None)` — some required field is not fully present yet; read more.
//! - `Err(ParseError)` — the stream is unrecoverable for this connection:
//!   the argument count is out of range, the request exceeds the size cap,
//!   or the declared frame length disagrees with the argument structure.
//!
//! The caller decides what a fatal error means; [`ParseError::response_body`]
//! supplies the final frame sent to the peer before teardown.
//!
//! Oversize is detected as soon as the header is readable, before the
//! payload arrives, so a hostile peer cannot make the server buffer an
//! arbitrarily large frame.

use bytes::Bytes;
use thiserror::Error;

use crate::protocol::types::{Request, HEADER_LEN, MAX_ARGS, MIN_ARGS};

/// Fatal framing violations. Any of these ends the connection.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// The argument count is outside the accepted range.
    #[error("invalid argument count: {0}")]
    BadArgCount(u32),

    /// The request is larger than the configured cap.
    #[error("request too large: {size} bytes (max: {max})")]
    Oversized { size: usize, max: usize },

    /// The declared frame length does not match the argument structure.
    #[error("frame length {declared} disagrees with argument layout")]
    FrameMismatch { declared: usize },
}

impl ParseError {
    /// The response body sent to the peer before the connection is closed.
    pub fn response_body(&self) -> &'static [u8] {
        match self {
            ParseError::BadArgCount(_) => b"invalid command\n",
            ParseError::Oversized { .. } => b"oversized request\n",
            ParseError::FrameMismatch { .. } => b"malformed request\n",
        }
    }
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;

/// A request parser bound to a maximum message size.
#[derive(Debug, Clone)]
pub struct RequestParser {
    max_msg: usize,
}

impl RequestParser {
    /// Creates a parser that rejects requests larger than `max_msg` bytes
    /// (header included).
    pub fn new(max_msg: usize) -> Self {
        Self { max_msg }
    }

    /// The configured size cap.
    pub fn max_msg(&self) -> usize {
        self.max_msg
    }

    /// Attempts to consume exactly one request from the front of `buf`.
    pub fn parse(&self, buf: &[u8]) -> ParseResult<Option<(Request, usize)>> {
        if buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let frame_len = read_u32(buf) as usize;
        let total = HEADER_LEN + frame_len;
        if total > self.max_msg {
            return Err(ParseError::Oversized {
                size: total,
                max: self.max_msg,
            });
        }
        // The payload must at least hold the argument count.
        if frame_len < 4 {
            return Err(ParseError::FrameMismatch {
                declared: frame_len,
            });
        }
        if buf.len() < total {
            return Ok(None);
        }

        let payload = &buf[HEADER_LEN..total];
        let n_args = read_u32(payload);
        if !(MIN_ARGS..=MAX_ARGS).contains(&n_args) {
            return Err(ParseError::BadArgCount(n_args));
        }

        let mut off = 4;
        let mut args = Vec::with_capacity(n_args as usize);
        for _ in 0..n_args {
            if payload.len() - off < 4 {
                return Err(ParseError::FrameMismatch {
                    declared: frame_len,
                });
            }
            let arg_len = read_u32(&payload[off..]) as usize;
            off += 4;
            if payload.len() - off < arg_len {
                return Err(ParseError::FrameMismatch {
                    declared: frame_len,
                });
            }
            args.push(Bytes::copy_from_slice(&payload[off..off + arg_len]));
            off += arg_len;
        }
        if off != payload.len() {
            return Err(ParseError::FrameMismatch {
                declared: frame_len,
            });
        }

        Ok(Some((Request::new(args), total)))
    }
}

#[inline]
fn read_u32(buf: &[u8]) -> u32 {
    u32::from_be_bytes([buf[0], buf[1], buf[2], buf[3]])
}
