//! framekv command-line client
//!
//! Takes command tokens as arguments, sends exactly one framed request,
//! and prints the response body:
//!
//! ```text
//! $ framekv-cli set name frame
//! set name to frame
//! $ framekv-cli get name
//! get name = frame
//! ```
//!
//! The client side is a short-lived blocking program; only the server
//! needs the readiness machinery.

use std::io::{Read, Write};
use std::net::TcpStream;

use anyhow::{bail, Context};
use bytes::Bytes;
use framekv::protocol::Request;

const SERVER_ADDR: &str = "127.0.0.1:3333";

fn main() -> anyhow::Result<()> {
    let tokens: Vec<Bytes> = std::env::args()
        .skip(1)
        .map(|arg| Bytes::from(arg.into_bytes()))
        .collect();
    if tokens.is_empty() {
        bail!("usage: framekv-cli <command> [arguments...]");
    }

    let mut stream = TcpStream::connect(SERVER_ADDR)
        .with_context(|| format!("failed to connect to {SERVER_ADDR}"))?;

    let request = Request::new(tokens).encode();
    stream
        .write_all(&request)
        .context("failed to send request")?;

    let mut header = [0u8; 4];
    stream
        .read_exact(&mut header)
        .context("failed to read response header")?;
    let body_len = u32::from_be_bytes(header) as usize;

    let mut body = vec![0u8; body_len];
    stream
        .read_exact(&mut body)
        .context("failed to read response body")?;

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&body)?;
    Ok(())
}
