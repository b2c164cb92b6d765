//! Connection State Machine
//!
//! One `Connection` per accepted socket. It owns the receive and send
//! buffers, drives the incremental parser over the receive buffer, stages
//! framed responses into the send buffer, and reports to the event loop
//! whether the connection survives the event.
//!
//! ## Buffering
//!
//! Both buffers have fixed capacity `4 + max_msg`, enough for any legal
//! frame. Unparsed input lives at `0..rx_len`; staged output waits at
//! `sent..tx_len`. After a partial parse the receive buffer is compacted
//! so the next frame always starts at offset 0.
//!
//! ```text
//!        on accept
//!   ──────────────────► readable
//! readable ── send-pending ──► read+writable
//! read+writable ── send drained ──► readable
//! any        ── EOF / fatal ──► closing → destroyed
//! ```
//!
//! ## Edge-Triggered Contract
//!
//! The poller only reports transitions to ready, so both drains pump
//! until the kernel returns `WouldBlock`. `Interrupted` reads and writes
//! are retried on the spot; a zero-byte read is orderly EOF.
//!
//! ## Back-Pressure
//!
//! A response that does not fit the free send-buffer space is parked
//! whole in `pending` and parsing stops: the peer is pipelining faster
//! than it drains responses, and the unread requests stay in the receive
//! buffer (and the kernel) until the send side frees up. Once the send
//! drain makes room the parked frame is staged and parsing resumes.
//! Responses are never truncated or dropped.

use std::io::{self, Read, Write};
use std::net::SocketAddr;

use mio::net::TcpStream;
use tracing::{trace, warn};

use crate::commands::CommandHandler;
use crate::protocol::types::{encode_response, HEADER_LEN};
use crate::protocol::{ParseError, RequestParser};

/// Why a connection ended.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O failure on the socket.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The peer violated the framing; a final error frame was attempted.
    #[error("protocol error: {0}")]
    Protocol(#[from] ParseError),

    /// The peer closed the connection.
    #[error("peer closed the connection")]
    Disconnected,
}

/// Per-socket state: buffers, parser, and the closing flag.
pub struct Connection {
    stream: TcpStream,
    addr: SocketAddr,
    parser: RequestParser,
    rx: Vec<u8>,
    rx_len: usize,
    tx: Vec<u8>,
    tx_len: usize,
    sent: usize,
    pending: Option<Vec<u8>>,
    closing: bool,
}

impl Connection {
    /// Wraps an accepted non-blocking stream.
    pub fn new(stream: TcpStream, addr: SocketAddr, max_msg: usize) -> Self {
        let capacity = HEADER_LEN + max_msg;
        Self {
            stream,
            addr,
            parser: RequestParser::new(max_msg),
            rx: vec![0; capacity],
            rx_len: 0,
            tx: vec![0; capacity],
            tx_len: 0,
            sent: 0,
            pending: None,
            closing: false,
        }
    }

    /// The peer's address, for logging.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// The underlying stream, for poller (de)registration.
    pub fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// True while staged or parked output remains; the event loop arms
    /// write interest from this.
    pub fn wants_write(&self) -> bool {
        self.sent < self.tx_len || self.pending.is_some()
    }

    /// Handles read-readiness: drain the socket, parse, dispatch, reply.
    pub fn on_readable(&mut self, commands: &mut CommandHandler) -> Result<(), ConnectionError> {
        if self.closing {
            return Ok(());
        }
        self.drive(commands)
    }

    /// Handles write-readiness: drain the send buffer, then resume any
    /// parsing that back-pressure suspended.
    pub fn on_writable(&mut self, commands: &mut CommandHandler) -> Result<(), ConnectionError> {
        if self.closing {
            return Ok(());
        }
        self.flush()?;
        self.drive(commands)
    }

    /// Alternates the parse/read pump and the send drain until no more
    /// progress is possible without the kernel.
    fn drive(&mut self, commands: &mut CommandHandler) -> Result<(), ConnectionError> {
        loop {
            self.pump(commands)?;
            self.flush()?;
            if self.pending.is_none() {
                return Ok(());
            }
            if self.sent < self.tx_len {
                // Kernel send queue is full; wait for write-readiness.
                return Ok(());
            }
            // The drain freed the whole buffer: stage the parked frame
            // and keep parsing.
        }
    }

    /// Reads until `WouldBlock`, parsing and dispatching after every
    /// chunk. Stops early when back-pressure parks a response.
    fn pump(&mut self, commands: &mut CommandHandler) -> Result<(), ConnectionError> {
        loop {
            self.advance(commands)?;
            if self.pending.is_some() {
                return Ok(());
            }
            if self.rx_len == self.rx.len() {
                // A full buffer with no complete frame cannot be produced
                // by a request inside the size cap.
                return Err(ParseError::Oversized {
                    size: self.rx_len,
                    max: self.parser.max_msg(),
                }
                .into());
            }
            match self.stream.read(&mut self.rx[self.rx_len..]) {
                Ok(0) => return Err(ConnectionError::Disconnected),
                Ok(n) => {
                    trace!(client = %self.addr, bytes = n, "read");
                    self.rx_len += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Parses as many complete requests as the receive buffer holds,
    /// staging one response per request, then compacts the buffer.
    fn advance(&mut self, commands: &mut CommandHandler) -> Result<(), ConnectionError> {
        if let Some(frame) = self.pending.take() {
            if !self.stage(&frame) {
                self.pending = Some(frame);
                return Ok(());
            }
            trace!(client = %self.addr, "parked response staged");
        }

        let mut consumed = 0;
        let result = loop {
            match self.parser.parse(&self.rx[consumed..self.rx_len]) {
                Ok(Some((request, used))) => {
                    consumed += used;
                    let body = commands.execute(&request);
                    let frame = encode_response(&body);
                    if !self.stage(&frame) {
                        trace!(client = %self.addr, "send buffer full, parking response");
                        self.pending = Some(frame);
                        break Ok(());
                    }
                }
                Ok(None) => break Ok(()),
                Err(e) => {
                    warn!(client = %self.addr, error = %e, "protocol violation");
                    let frame = encode_response(e.response_body());
                    let _ = self.stage(&frame);
                    self.closing = true;
                    let _ = self.flush();
                    break Err(e.into());
                }
            }
        };

        if consumed > 0 {
            self.rx.copy_within(consumed..self.rx_len, 0);
            self.rx_len -= consumed;
        }
        result
    }

    /// Copies a frame into the free tail of the send buffer. Returns
    /// false when it does not fit.
    fn stage(&mut self, frame: &[u8]) -> bool {
        if self.tx.len() - self.tx_len < frame.len() {
            return false;
        }
        self.tx[self.tx_len..self.tx_len + frame.len()].copy_from_slice(frame);
        self.tx_len += frame.len();
        true
    }

    /// Writes staged bytes until drained or the kernel pushes back.
    fn flush(&mut self) -> Result<(), ConnectionError> {
        while self.sent < self.tx_len {
            match self.stream.write(&self.tx[self.sent..self.tx_len]) {
                Ok(0) => return Err(ConnectionError::Disconnected),
                Ok(n) => {
                    trace!(client = %self.addr, bytes = n, "wrote");
                    self.sent += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.sent = 0;
        self.tx_len = 0;
        Ok(())
    }

    #[cfg(test)]
    fn buffer_invariants_hold(&self) -> bool {
        self.sent <= self.tx_len && self.tx_len <= self.tx.len() && self.rx_len <= self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::types::DEFAULT_MAX_MSG;
    use crate::protocol::Request;
    use crate::storage::Store;
    use bytes::Bytes;
    use std::net::{TcpListener, TcpStream as StdStream};
    use std::time::Duration;

    fn socket_pair() -> (Connection, StdStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = StdStream::connect(addr).unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        let (server_side, peer) = listener.accept().unwrap();
        server_side.set_nonblocking(true).unwrap();
        let stream = TcpStream::from_std(server_side);
        (Connection::new(stream, peer, DEFAULT_MAX_MSG), client)
    }

    fn encode(args: &[&[u8]]) -> Vec<u8> {
        Request::new(args.iter().map(|a| Bytes::copy_from_slice(a)).collect()).encode()
    }

    fn read_frame(client: &mut StdStream) -> Vec<u8> {
        let mut header = [0u8; 4];
        client.read_exact(&mut header).unwrap();
        let len = u32::from_be_bytes(header) as usize;
        let mut body = vec![0u8; len];
        client.read_exact(&mut body).unwrap();
        body
    }

    // Loopback delivery is asynchronous, so poke the connection until the
    // expected number of requests has been processed.
    fn pump_until(
        conn: &mut Connection,
        commands: &mut CommandHandler,
        done: impl Fn(&CommandHandler) -> bool,
    ) {
        for _ in 0..200 {
            conn.on_readable(commands).unwrap();
            assert!(conn.buffer_invariants_hold());
            if done(commands) {
                return;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        panic!("connection made no progress");
    }

    #[test]
    fn request_is_parsed_dispatched_and_answered() {
        let (mut conn, mut client) = socket_pair();
        let mut commands = CommandHandler::new(Store::new());

        client.write_all(&encode(&[b"set", b"x", b"1"])).unwrap();
        pump_until(&mut conn, &mut commands, |c| c.store().stats().set_count == 1);

        assert_eq!(read_frame(&mut client), b"set x to 1\n");
        assert!(!conn.wants_write());
    }

    #[test]
    fn pipelined_requests_answer_in_order() {
        let (mut conn, mut client) = socket_pair();
        let mut commands = CommandHandler::new(Store::new());

        let mut wire = encode(&[b"set", b"a", b"1"]);
        wire.extend_from_slice(&encode(&[b"set", b"b", b"2"]));
        wire.extend_from_slice(&encode(&[b"get", b"a"]));
        client.write_all(&wire).unwrap();

        pump_until(&mut conn, &mut commands, |c| c.store().stats().get_count == 1);

        assert_eq!(read_frame(&mut client), b"set a to 1\n");
        assert_eq!(read_frame(&mut client), b"set b to 2\n");
        assert_eq!(read_frame(&mut client), b"get a = 1\n");
    }

    #[test]
    fn eof_is_reported_as_disconnected() {
        let (mut conn, client) = socket_pair();
        let mut commands = CommandHandler::new(Store::new());
        drop(client);

        let mut last = Ok(());
        for _ in 0..200 {
            last = conn.on_readable(&mut commands);
            if last.is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(last, Err(ConnectionError::Disconnected)));
    }

    #[test]
    fn illegal_argument_count_gets_a_final_error_frame() {
        let (mut conn, mut client) = socket_pair();
        let mut commands = CommandHandler::new(Store::new());

        // n_args = 4 is outside the accepted range.
        let args: &[&[u8]] = &[b"set", b"k", b"v", b"extra"];
        let frame_len = 4 + args.iter().map(|a| 4 + a.len()).sum::<usize>();
        let mut wire = Vec::new();
        wire.extend_from_slice(&(frame_len as u32).to_be_bytes());
        wire.extend_from_slice(&4u32.to_be_bytes());
        for a in args {
            wire.extend_from_slice(&(a.len() as u32).to_be_bytes());
            wire.extend_from_slice(a);
        }
        client.write_all(&wire).unwrap();

        let mut last = Ok(());
        for _ in 0..200 {
            last = conn.on_readable(&mut commands);
            if last.is_err() {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        assert!(matches!(last, Err(ConnectionError::Protocol(_))));
        assert_eq!(read_frame(&mut client), b"invalid command\n");
    }
}
