//! Simple signaling relay server example
//!
//! Run with: cargo run --example relay_server [BIND_ADDR]
//!
//! Examples:
//!   cargo run --example relay_server                    # binds to 0.0.0.0:3000
//!   cargo run --example relay_server localhost          # binds to 127.0.0.1:3000
//!   cargo run --example relay_server 127.0.0.1:3001     # binds to 127.0.0.1:3001
//!
//! ## Signaling
//!
//! Connect a WebSocket to ws://localhost:3000/ws and speak JSON:
//!
//!   {"type": "start-stream", "title": "Demo", "streamer": "Alice"}
//!   {"type": "join-stream", "streamId": "stream_…"}
//!   {"type": "offer", "streamId": "stream_…", "offer": {…}}
//!
//! ## Discovery
//!
//!   curl http://localhost:3000/api/streams
//!   curl http://localhost:3000/health

use std::net::SocketAddr;

use signal_rs::{ServerConfig, SignalingServer};

/// Parse bind address from command line argument.
///
/// Accepts formats:
/// - "localhost" -> 127.0.0.1:3000
/// - "localhost:3001" -> 127.0.0.1:3001
/// - "127.0.0.1" -> 127.0.0.1:3000
/// - "0.0.0.0:3000" -> 0.0.0.0:3000
fn parse_bind_addr(arg: &str) -> Result<SocketAddr, String> {
    const DEFAULT_PORT: u16 = 3000;

    // Replace "localhost" with "127.0.0.1"
    let normalized = arg.replace("localhost", "127.0.0.1");

    // Try parsing as SocketAddr first (includes port)
    if let Ok(addr) = normalized.parse::<SocketAddr>() {
        return Ok(addr);
    }

    // Try parsing as IP address without port
    if let Ok(ip) = normalized.parse::<std::net::IpAddr>() {
        return Ok(SocketAddr::new(ip, DEFAULT_PORT));
    }

    Err(format!(
        "Invalid bind address: '{}'. Expected format: IP:PORT or IP or 'localhost'",
        arg
    ))
}

fn print_usage() {
    eprintln!("Usage: relay_server [BIND_ADDR]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  BIND_ADDR    Address to bind to (default: 0.0.0.0:3000)");
    eprintln!();
    eprintln!("Examples:");
    eprintln!("  relay_server                     # binds to 0.0.0.0:3000");
    eprintln!("  relay_server localhost           # binds to 127.0.0.1:3000");
    eprintln!("  relay_server localhost:3001      # binds to 127.0.0.1:3001");
    eprintln!("  relay_server 0.0.0.0:8080        # binds to 0.0.0.0:8080");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_usage();
        return Ok(());
    }

    let bind_addr = match args.get(1) {
        Some(addr_str) => match parse_bind_addr(addr_str) {
            Ok(addr) => addr,
            Err(e) => {
                eprintln!("Error: {}", e);
                eprintln!();
                print_usage();
                std::process::exit(1);
            }
        },
        None => "0.0.0.0:3000".parse().unwrap(),
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("signal_rs=debug".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = ServerConfig {
        bind_addr,
        ..ServerConfig::default()
    };

    println!("Starting signaling server on {}", config.bind_addr);
    println!();
    println!("=== Signaling ===");
    println!("WebSocket: ws://localhost:{}/ws", config.bind_addr.port());
    println!();
    println!("=== Discovery ===");
    println!("curl http://localhost:{}/api/streams", config.bind_addr.port());
    println!("curl http://localhost:{}/health", config.bind_addr.port());
    println!();

    let server = SignalingServer::new(config);

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                eprintln!("Server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            println!("\nShutting down...");
        }
    }

    Ok(())
}
