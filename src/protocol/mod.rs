//! Wire Protocol Implementation
//!
//! Length-prefixed binary framing for requests and responses.
//!
//! ## Overview
//!
//! Every message on the wire is a frame: a 4-byte big-endian length
//! followed by that many payload bytes. A request payload carries an
//! argument count and 2 or 3 length-prefixed byte strings; a response
//! payload is a single byte string.
//!
//! ## Modules
//!
//! - `types`: wire constants, the `Request` value, frame encoders
//! - `parser`: incremental parser with a need-more / consumed / fatal
//!   contract
//!
//! ## Example
//!
//! ```
//! use framekv::protocol::{Request, RequestParser};
//! use framekv::protocol::types::DEFAULT_MAX_MSG;
//! use bytes::Bytes;
//!
//! let wire = Request::new(vec![Bytes::from("get"), Bytes::from("x")]).encode();
//! let parser = RequestParser::new(DEFAULT_MAX_MSG);
//! let (request, consumed) = parser.parse(&wire).unwrap().unwrap();
//! assert_eq!(consumed, wire.len());
//! assert_eq!(request.args[0], Bytes::from("get"));
//! ```

pub mod parser;
pub mod types;

// Re-export commonly used types for convenience
pub use parser::{ParseError, ParseResult, RequestParser};
pub use types::{encode_response, encode_response_into, Request};
