//! Command Handler
//!
//! Maps parsed requests onto store operations and formats the response
//! bodies. The handler owns the store; the event loop owns the handler.
//!
//! ## Commands
//!
//! | Verb  | Arity | Success                | Miss                  |
//! |-------|-------|------------------------|-----------------------|
//! | `set` | 3     | `set <k> to <v>\n`     | —                     |
//! | `get` | 2     | `get <k> = <v>\n`      | `key not found\n`     |
//! | `del` | 2     | `key <k> deleted\n`    | `key <k> not found\n` |
//!
//! Wrong arity and unknown verbs produce ordinary error responses; the
//! connection stays open. Verbs are matched byte-for-byte, lower-case.

use bytes::{Bytes, BytesMut};

use crate::protocol::Request;
use crate::storage::Store;

/// Executes commands against the store and renders response bodies.
pub struct CommandHandler {
    store: Store,
}

impl CommandHandler {
    /// Creates a handler around a store.
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Read access to the store, for statistics and tests.
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Executes one request and returns the response body. The caller
    /// frames it for the wire.
    pub fn execute(&mut self, request: &Request) -> Bytes {
        let args = &request.args;
        let Some(verb) = args.first() else {
            return Bytes::from_static(b"unknown command\n");
        };
        match &verb[..] {
            b"set" => {
                if args.len() != 3 {
                    return Bytes::from_static(
                        b"invalid number of arguments, set requires two arguments\n",
                    );
                }
                self.cmd_set(&args[1], &args[2])
            }
            b"get" => {
                if args.len() != 2 {
                    return Bytes::from_static(b"invalid number of arguments\n");
                }
                self.cmd_get(&args[1])
            }
            b"del" => {
                if args.len() != 2 {
                    return Bytes::from_static(
                        b"invalid number of arguments, del requires one argument\n",
                    );
                }
                self.cmd_del(&args[1])
            }
            _ => Bytes::from_static(b"unknown command\n"),
        }
    }

    /// set: upsert, then echo the stored pair.
    fn cmd_set(&mut self, key: &Bytes, value: &Bytes) -> Bytes {
        self.store.set(key.clone(), value.clone());
        let mut body = BytesMut::with_capacity(key.len() + value.len() + 10);
        body.extend_from_slice(b"set ");
        body.extend_from_slice(key);
        body.extend_from_slice(b" to ");
        body.extend_from_slice(value);
        body.extend_from_slice(b"\n");
        body.freeze()
    }

    /// get: lookup.
    fn cmd_get(&mut self, key: &Bytes) -> Bytes {
        match self.store.get(key) {
            Some(value) => {
                let mut body = BytesMut::with_capacity(key.len() + value.len() + 9);
                body.extend_from_slice(b"get ");
                body.extend_from_slice(key);
                body.extend_from_slice(b" = ");
                body.extend_from_slice(&value);
                body.extend_from_slice(b"\n");
                body.freeze()
            }
            None => Bytes::from_static(b"key not found\n"),
        }
    }

    /// del: detach and drop the entry.
    fn cmd_del(&mut self, key: &Bytes) -> Bytes {
        let found = self.store.remove(key).is_some();
        let mut body = BytesMut::with_capacity(key.len() + 15);
        body.extend_from_slice(b"key ");
        body.extend_from_slice(key);
        if found {
            body.extend_from_slice(b" deleted\n");
        } else {
            body.extend_from_slice(b" not found\n");
        }
        body.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> CommandHandler {
        CommandHandler::new(Store::new())
    }

    fn request(args: &[&[u8]]) -> Request {
        Request::new(args.iter().map(|a| Bytes::copy_from_slice(a)).collect())
    }

    #[test]
    fn get_on_missing_key() {
        let mut handler = handler();
        let body = handler.execute(&request(&[b"get", b"x"]));
        assert_eq!(body, Bytes::from_static(b"key not found\n"));
    }

    #[test]
    fn set_then_get() {
        let mut handler = handler();
        let body = handler.execute(&request(&[b"set", b"x", b"1"]));
        assert_eq!(body, Bytes::from_static(b"set x to 1\n"));
        let body = handler.execute(&request(&[b"get", b"x"]));
        assert_eq!(body, Bytes::from_static(b"get x = 1\n"));
    }

    #[test]
    fn set_overwrites() {
        let mut handler = handler();
        handler.execute(&request(&[b"set", b"x", b"1"]));
        handler.execute(&request(&[b"set", b"x", b"2"]));
        let body = handler.execute(&request(&[b"get", b"x"]));
        assert_eq!(body, Bytes::from_static(b"get x = 2\n"));
        assert_eq!(handler.store().len(), 1);
    }

    #[test]
    fn del_then_get() {
        let mut handler = handler();
        handler.execute(&request(&[b"set", b"x", b"1"]));
        let body = handler.execute(&request(&[b"del", b"x"]));
        assert_eq!(body, Bytes::from_static(b"key x deleted\n"));
        let body = handler.execute(&request(&[b"get", b"x"]));
        assert_eq!(body, Bytes::from_static(b"key not found\n"));
    }

    #[test]
    fn del_on_missing_key() {
        let mut handler = handler();
        let body = handler.execute(&request(&[b"del", b"ghost"]));
        assert_eq!(body, Bytes::from_static(b"key ghost not found\n"));
    }

    #[test]
    fn arity_errors_are_recoverable() {
        let mut handler = handler();
        let body = handler.execute(&request(&[b"set", b"x"]));
        assert_eq!(
            body,
            Bytes::from_static(b"invalid number of arguments, set requires two arguments\n")
        );
        let body = handler.execute(&request(&[b"get", b"x", b"y"]));
        assert_eq!(body, Bytes::from_static(b"invalid number of arguments\n"));
        let body = handler.execute(&request(&[b"del", b"x", b"y"]));
        assert_eq!(
            body,
            Bytes::from_static(b"invalid number of arguments, del requires one argument\n")
        );
        // The handler still works afterwards.
        let body = handler.execute(&request(&[b"set", b"x", b"1"]));
        assert_eq!(body, Bytes::from_static(b"set x to 1\n"));
    }

    #[test]
    fn unknown_verb() {
        let mut handler = handler();
        let body = handler.execute(&request(&[b"incr", b"x"]));
        assert_eq!(body, Bytes::from_static(b"unknown command\n"));
        // Verbs are case-sensitive.
        let body = handler.execute(&request(&[b"GET", b"x"]));
        assert_eq!(body, Bytes::from_static(b"unknown command\n"));
    }

    #[test]
    fn binary_keys_render_verbatim() {
        let mut handler = handler();
        let body = handler.execute(&request(&[b"set", b"k\x00ey", b"\xffv"]));
        assert_eq!(body, Bytes::from_static(b"set k\x00ey to \xffv\n"));
    }
}
