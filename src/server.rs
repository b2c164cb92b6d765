//! Event Loop
//!
//! A single-threaded cooperative loop over an edge-triggered readiness
//! poller. One process, one thread, no coroutines: the only concurrency
//! is between the process and the kernel.
//!
//! ## Per Tick
//!
//! Wait indefinitely for events, then for each one:
//!
//! - listener token: accept until `WouldBlock`, registering each new
//!   non-blocking stream for read-readiness;
//! - error or hang-up flags: destroy the connection;
//! - otherwise run the connection's read and/or send drains and re-arm
//!   its interest set (read-only, or read+write while output is queued).
//!
//! ## Shutdown
//!
//! Two paths converge on the same teardown: a process-wide flag flipped
//! by a signal handler (the poll call returns `Interrupted` and the loop
//! re-checks), and a per-server [`ShutdownHandle`] that sets a flag and
//! wakes the poller — the embedding used by tests. Teardown deregisters
//! and drops every live connection, then returns.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use tracing::{debug, error, info, warn};

use crate::commands::CommandHandler;
use crate::connection::{Connection, ConnectionError};
use crate::storage::Store;

const LISTENER: Token = Token(0);
const WAKER: Token = Token(1);
const FIRST_CONNECTION: usize = 2;

/// Events processed per poll call.
const EVENT_CAPACITY: usize = 128;

/// Process-wide stop flag, for signal handlers.
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

/// Asks every running server loop to stop at its next tick. The only
/// work done here is an atomic store, so this is safe to call from a
/// signal handler.
pub fn request_shutdown() {
    SHUTDOWN.store(true, Ordering::Relaxed);
}

/// Stops one server from another thread: sets its flag and wakes the
/// poller out of its indefinite wait.
#[derive(Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl ShutdownHandle {
    /// Requests shutdown and wakes the loop.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "failed to wake server for shutdown");
        }
    }
}

/// The key-value server: listener, poller, and the live connections.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    connections: HashMap<Token, Connection>,
    commands: CommandHandler,
    max_msg: usize,
    next_token: usize,
    stop: Arc<AtomicBool>,
    waker: Arc<Waker>,
}

impl Server {
    /// Binds the listener and sets up the poller. `SO_REUSEADDR` is set
    /// by the bind; the listener and every accepted stream are
    /// non-blocking.
    pub fn bind(addr: SocketAddr, max_msg: usize) -> io::Result<Self> {
        let poll = Poll::new()?;
        let mut listener = TcpListener::bind(addr)?;
        let local_addr = listener.local_addr()?;
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        Ok(Self {
            poll,
            listener,
            local_addr,
            connections: HashMap::new(),
            commands: CommandHandler::new(Store::new()),
            max_msg,
            next_token: FIRST_CONNECTION,
            stop: Arc::new(AtomicBool::new(false)),
            waker,
        })
    }

    /// The bound address; useful when binding port 0.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// A handle that can stop this server from another thread.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: Arc::clone(&self.stop),
            waker: Arc::clone(&self.waker),
        }
    }

    /// Runs the loop until shutdown is requested or the readiness
    /// primitive fails. Returns after all connections are torn down.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENT_CAPACITY);
        info!(addr = %self.local_addr, max_msg = self.max_msg, "server listening");

        'ticks: while !self.should_stop() {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                error!(error = %e, "poll failed, stopping");
                break;
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => {
                        if event.is_error() {
                            error!("listener error, stopping");
                            break 'ticks;
                        }
                        self.accept_ready();
                    }
                    WAKER => {}
                    token => {
                        if event.is_error() || event.is_read_closed() {
                            self.destroy(token);
                            continue;
                        }
                        let Some(conn) = self.connections.get_mut(&token) else {
                            continue;
                        };
                        let mut result = Ok(());
                        if event.is_readable() {
                            result = conn.on_readable(&mut self.commands);
                        }
                        if result.is_ok() && event.is_writable() {
                            result = conn.on_writable(&mut self.commands);
                        }
                        match result {
                            Ok(()) => {
                                if let Err(e) = self.rearm(token) {
                                    warn!(error = %e, "reregister failed");
                                    self.destroy(token);
                                }
                            }
                            Err(ConnectionError::Disconnected) => self.destroy(token),
                            Err(e) => {
                                debug!(error = %e, "closing connection");
                                self.destroy(token);
                            }
                        }
                    }
                }
            }
        }

        self.close_all();
        info!("server stopped");
        Ok(())
    }

    fn should_stop(&self) -> bool {
        SHUTDOWN.load(Ordering::Relaxed) || self.stop.load(Ordering::Relaxed)
    }

    /// Drains the accept backlog.
    fn accept_ready(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((mut stream, addr)) => {
                    let token = Token(self.next_token);
                    self.next_token += 1;
                    if let Err(e) =
                        self.poll
                            .registry()
                            .register(&mut stream, token, Interest::READABLE)
                    {
                        warn!(client = %addr, error = %e, "register failed");
                        continue;
                    }
                    info!(client = %addr, "client connected");
                    self.connections
                        .insert(token, Connection::new(stream, addr, self.max_msg));
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    return;
                }
            }
        }
    }

    /// Re-arms a connection's interest set after its drains ran:
    /// read+write while output is queued, read-only otherwise.
    fn rearm(&mut self, token: Token) -> io::Result<()> {
        let Some(conn) = self.connections.get_mut(&token) else {
            return Ok(());
        };
        let interest = if conn.wants_write() {
            Interest::READABLE | Interest::WRITABLE
        } else {
            Interest::READABLE
        };
        self.poll
            .registry()
            .reregister(conn.stream_mut(), token, interest)
    }

    /// Deregisters and drops one connection; dropping closes the fd.
    fn destroy(&mut self, token: Token) {
        if let Some(mut conn) = self.connections.remove(&token) {
            let _ = self.poll.registry().deregister(conn.stream_mut());
            info!(client = %conn.addr(), "client disconnected");
        }
    }

    fn close_all(&mut self) {
        let tokens: Vec<Token> = self.connections.keys().copied().collect();
        for token in tokens {
            self.destroy(token);
        }
    }
}
