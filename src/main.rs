//! framekv server binary
//!
//! Parses the command line, wires up logging and signal handling, binds
//! the listener, and hands control to the event loop.

use std::net::SocketAddr;

use framekv::protocol::types::DEFAULT_MAX_MSG;
use framekv::server::{self, Server};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Server configuration
struct Config {
    /// Host to bind to
    host: String,
    /// Port to listen on
    port: u16,
    /// Cap on the total size of one request, header included
    max_msg: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: framekv::DEFAULT_HOST.to_string(),
            port: framekv::DEFAULT_PORT,
            max_msg: DEFAULT_MAX_MSG,
        }
    }
}

impl Config {
    /// Parse configuration from command-line arguments
    fn from_args() -> Self {
        let mut config = Config::default();
        let args: Vec<String> = std::env::args().collect();

        let mut i = 1;
        while i < args.len() {
            match args[i].as_str() {
                "--host" | "-h" => {
                    if i + 1 < args.len() {
                        config.host = args[i + 1].clone();
                        i += 2;
                    } else {
                        eprintln!("Error: --host requires a value");
                        std::process::exit(1);
                    }
                }
                "--port" | "-p" => {
                    if i + 1 < args.len() {
                        config.port = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid port number");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --port requires a value");
                        std::process::exit(1);
                    }
                }
                "--max-msg" => {
                    if i + 1 < args.len() {
                        config.max_msg = args[i + 1].parse().unwrap_or_else(|_| {
                            eprintln!("Error: invalid max message size");
                            std::process::exit(1);
                        });
                        i += 2;
                    } else {
                        eprintln!("Error: --max-msg requires a value");
                        std::process::exit(1);
                    }
                }
                "--help" => {
                    print_help();
                    std::process::exit(0);
                }
                "--version" | "-v" => {
                    println!("framekv version {}", framekv::VERSION);
                    std::process::exit(0);
                }
                _ => {
                    eprintln!("Unknown argument: {}", args[i]);
                    print_help();
                    std::process::exit(1);
                }
            }
        }

        config
    }

    /// Returns the bind address as a string
    fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn print_help() {
    println!(
        r#"
framekv - A Single-Threaded In-Memory Key-Value Server

USAGE:
    framekv [OPTIONS]

OPTIONS:
    -h, --host <HOST>       Host to bind to (default: 0.0.0.0)
    -p, --port <PORT>       Port to listen on (default: 3333)
        --max-msg <BYTES>   Request size cap, header included (default: 1048576)
    -v, --version           Print version information
        --help              Print this help message

EXAMPLES:
    framekv                        # Listen on 0.0.0.0:3333
    framekv --port 4444            # Listen on port 4444
    framekv --max-msg 1024         # Reject requests over 1 KiB

CONNECTING:
    Use framekv-cli to send one command per invocation:
    $ framekv-cli set name frame
    set name to frame
    $ framekv-cli get name
    get name = frame
"#
    );
}

extern "C" fn handle_signal(_sig: libc::c_int) {
    server::request_shutdown();
}

fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_signal as *const () as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_signal as *const () as libc::sighandler_t);
    }
}

fn main() -> anyhow::Result<()> {
    let config = Config::from_args();

    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    install_signal_handlers();

    let addr: SocketAddr = config.bind_address().parse()?;
    let mut server = Server::bind(addr, config.max_msg)?;
    info!(version = framekv::VERSION, addr = %server.local_addr(), "framekv starting");

    server.run()?;

    info!("shutdown complete");
    Ok(())
}
