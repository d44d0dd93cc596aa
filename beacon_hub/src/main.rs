// CLI entry point for the Beacon presence hub.
//
// Starts a standalone hub that location-sharing clients connect to. The hub
// validates and rebroadcasts fixes — it never renders a map. See `server.rs`
// for the networking architecture and `hub.rs` for the coordinator state.
//
// Usage:
//   hub [OPTIONS]
//     --port <PORT>    Listen port (default: 3000)

use beacon_hub::server::{HubConfig, start_hub};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = parse_args();

    let (_handle, addr) = match start_hub(config) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to start hub: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "hub listening");

    // The hub threads run until the process exits; SIGINT/SIGTERM kill the
    // process, which is adequate teardown for a stateless broadcast hub.
    // `HubHandle::stop` exists for embedders and tests.
    loop {
        std::thread::park();
    }
}

/// Parse command-line arguments into a `HubConfig`. Uses simple
/// `std::env::args()` matching — no clap dependency.
fn parse_args() -> HubConfig {
    let mut config = HubConfig::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                i += 1;
                config.port = args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--port requires a valid port number");
                    std::process::exit(1);
                });
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    config
}

fn print_usage() {
    println!("Usage: hub [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port <PORT>    Listen port (default: 3000)");
    println!("  --help, -h       Show this help");
}
