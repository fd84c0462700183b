use color_eyre::eyre::{Result, WrapErr};
use tracing::info;
use tracing_subscriber::EnvFilter;
use wsecho::{EchoServerTrait, ServerConfig, WsEchoServer};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling
    color_eyre::install()?;

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wsecho=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    // Optional positional arguments: [port] [static_dir]
    let args: Vec<String> = std::env::args().collect();
    let mut config = ServerConfig::default();

    if let Some(port) = args.get(1) {
        match port.parse::<u16>() {
            Ok(port) => config.bind_addr.set_port(port),
            Err(_) => {
                eprintln!("Usage: {} [port] [static_dir]", args[0]);
                eprintln!("  port:       TCP port to listen on (default: 8080)");
                eprintln!("  static_dir: Directory served under / (default: static)");
                eprintln!();
                eprintln!("Routes:");
                eprintln!("  /ws          WebSocket echo");
                eprintln!("  /_ah/health  Liveness check, answers \"ok\"");
                eprintln!("  /            Static files");
                std::process::exit(1);
            }
        }
    }
    if let Some(static_dir) = args.get(2) {
        config.static_dir = static_dir.into();
    }

    info!(
        address = %config.bind_addr,
        static_dir = %config.static_dir.display(),
        "Listening on port {}",
        config.bind_addr.port()
    );

    let server = WsEchoServer::new(config);
    server
        .run()
        .await
        .wrap_err("Failed to run WebSocket echo server")?;

    Ok(())
}
