//! Connection Module
//!
//! Per-socket state for the event loop. Each accepted client gets one
//! [`Connection`] holding its receive/send buffers and its slice of the
//! protocol state machine; the event loop calls into it on readiness and
//! destroys it on EOF, protocol violation, or I/O failure.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Event Loop                            │
//! └──────┬───────────────────────────────────────────┬──────────┘
//!        │ read-readiness                            │ write-readiness
//!        ▼                                           ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Connection                            │
//! │                                                             │
//! │  read ──► rx buffer ──► parser ──► dispatcher ──► tx buffer │
//! │                                                      │      │
//! │                                            write ◀───┘      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod handler;

// Re-export commonly used types
pub use handler::{Connection, ConnectionError};
