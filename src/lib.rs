//! # framekv - A Single-Threaded In-Memory Key-Value Server
//!
//! framekv is an in-memory key-value server speaking a length-prefixed
//! binary protocol over TCP. It runs one process, one thread: a
//! cooperative event loop over edge-triggered readiness notification
//! drives every connection, and the store grows through incremental
//! rehashing so no single command ever pays for a full table resize.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            framekv                              │
//! │                                                                 │
//! │  ┌─────────────┐    ┌──────────────┐    ┌──────────────┐        │
//! │  │ Event Loop  │───►│  Connection  │───►│   Command    │        │
//! │  │ (mio Poll)  │    │  rx/tx bufs  │    │  Dispatcher  │        │
//! │  └─────────────┘    └──────┬───────┘    └──────┬───────┘        │
//! │                            │                   │                │
//! │                            ▼                   ▼                │
//! │                     ┌─────────────┐    ┌─────────────────────┐  │
//! │                     │  Framing    │    │        Store        │  │
//! │                     │  Codec      │    │  ┌───────┐ ┌──────┐ │  │
//! │                     │             │    │  │primary│ │second│ │  │
//! │                     └─────────────┘    │  └───────┘ └──────┘ │  │
//! │                                        │   incremental rehash│  │
//! │                                        └─────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Data flows kernel → event loop → connection read drain → parser →
//! dispatcher → store, and back out through the send drain. Within one
//! connection, responses always leave in request order, so clients may
//! pipeline freely.
//!
//! ## Wire Protocol
//!
//! Big-endian length-prefixed frames:
//!
//! ```text
//! request  := u32 frame_len | u32 n_args | (u32 arg_len | arg_bytes){n_args}
//! response := u32 frame_len | resp_bytes
//! ```
//!
//! `frame_len` excludes its own 4 header bytes; `n_args` must be 2 or 3.
//! Three commands exist: `set k v`, `get k`, `del k`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use framekv::protocol::types::DEFAULT_MAX_MSG;
//! use framekv::server::Server;
//!
//! fn main() -> std::io::Result<()> {
//!     let addr = "0.0.0.0:3333".parse().unwrap();
//!     let mut server = Server::bind(addr, DEFAULT_MAX_MSG)?;
//!     server.run()
//! }
//! ```
//!
//! ## Module Overview
//!
//! - [`protocol`]: framing codec — wire types, encoders, incremental parser
//! - [`storage`]: two-table hash map with incremental rehash, and the store
//! - [`commands`]: verb dispatch and response formatting
//! - [`connection`]: per-socket buffers and the parse/flush state machine
//! - [`server`]: the event loop, accept/close, shutdown
//!
//! ## Design Highlights
//!
//! ### Bounded Work Per Operation
//!
//! When the store crosses its load factor the old table is drained into a
//! double-sized one at most 128 entries per command. Lookups consult both
//! tables during the migration, so every key stays reachable and no
//! command stalls the loop.
//!
//! ### Edge-Triggered Discipline
//!
//! Readiness arrives only on transitions, so every handler pumps its
//! socket until the kernel reports `WouldBlock`. Responses that outrun
//! the send buffer apply back-pressure: parsing pauses until the drain
//! catches up, and nothing is dropped.

pub mod commands;
pub mod connection;
pub mod protocol;
pub mod server;
pub mod storage;

// Re-export commonly used types for convenience
pub use commands::CommandHandler;
pub use connection::{Connection, ConnectionError};
pub use protocol::{ParseError, Request, RequestParser};
pub use server::{Server, ShutdownHandle};
pub use storage::Store;

/// The default port the server listens on
pub const DEFAULT_PORT: u16 = 3333;

/// The default host the server binds to
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Version of framekv
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
