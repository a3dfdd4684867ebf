use clap::Parser;
use imgproxy::config::Config;
use imgproxy::image_optimizer::RasterCodec;
use imgproxy::path_validator::ValidatorRegistry;
use imgproxy::pipeline::ImageProxy;
use imgproxy::proxy::ImageProxyService;
use imgproxy::rate_limit::RateLimitGate;
use imgproxy::storage::BackendRegistry;
use pingora_core::server::configuration::Opt;
use pingora_core::server::Server;
use std::path::PathBuf;
use std::sync::Arc;

/// Imgproxy - image transformation proxy built with Cloudflare's Pingora
#[derive(Parser, Debug)]
#[command(name = "imgproxy")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Daemon mode
    #[arg(short = 'd', long)]
    daemon: bool,

    /// Test configuration and exit
    #[arg(long)]
    test: bool,

    /// Upgrade workers gracefully
    #[arg(long)]
    upgrade: bool,
}

fn exit_with(message: impl std::fmt::Display) -> ! {
    eprintln!("{}", message);
    std::process::exit(1);
}

fn main() {
    // Parse command-line arguments
    let args = Args::parse();

    let config = Config::from_file(&args.config)
        .unwrap_or_else(|e| exit_with(format!("Failed to load configuration: {}", e)));

    // Initialize logging subsystem
    if let Err(e) = imgproxy::logging::init_subscriber(&config.logging) {
        exit_with(format!("Failed to initialize logging subsystem: {}", e));
    }

    if let Err(e) = config.validate() {
        tracing::error!(error = %e, "Invalid configuration");
        exit_with(format!("Invalid configuration: {}", e));
    }

    tracing::info!(
        config_file = %args.config.display(),
        server_address = %config.server.address,
        server_port = config.server.port,
        environment = %config.server.environment,
        backends = config.backends.len(),
        sources = config.sources.len(),
        rate_limit_active = config.rate_limit_active(),
        "Configuration loaded successfully"
    );

    // Named validators are registered here by embedding programs
    let validators = ValidatorRegistry::new();

    // Storage clients and the Redis connection manager spawn background tasks,
    // so this runtime lives as long as the server
    let runtime = tokio::runtime::Runtime::new()
        .unwrap_or_else(|e| exit_with(format!("Failed to start runtime: {}", e)));

    let backends = runtime
        .block_on(BackendRegistry::from_config(&config.backends))
        .unwrap_or_else(|e| exit_with(format!("Failed to initialize backends: {}", e)));

    let gate = if config.rate_limit_active() {
        let gate = runtime
            .block_on(RateLimitGate::from_config(&config.rate_limit))
            .unwrap_or_else(|e| exit_with(format!("Failed to initialize rate limiting: {}", e)));
        tracing::info!(?gate, on_limit = ?config.rate_limit.on_limit, "Rate limiting enabled");
        Some(gate)
    } else {
        None
    };

    let image_proxy = ImageProxy::from_config(
        &config,
        &validators,
        Arc::new(backends),
        Arc::new(RasterCodec::new()),
        gate,
    )
    .unwrap_or_else(|e| exit_with(format!("Failed to build image proxy: {}", e)));

    if args.test {
        tracing::info!(proxy = ?image_proxy, "Configuration test passed");
        return;
    }

    // Build Pingora server options
    let opt = Opt {
        daemon: args.daemon,
        upgrade: args.upgrade,
        ..Default::default()
    };

    // Create Pingora server
    let mut server = Server::new(Some(opt))
        .unwrap_or_else(|e| exit_with(format!("Failed to create Pingora server: {}", e)));
    server.bootstrap();

    let service = ImageProxyService::new(
        Arc::new(image_proxy),
        config.server.to_security_limits(),
    );

    // Create HTTP proxy service
    let mut proxy_service = pingora_proxy::http_proxy_service(&server.configuration, service);

    // Add TCP listener for HTTP
    let listen_addr = config.server.listen_addr();
    proxy_service.add_tcp(&listen_addr);

    tracing::info!(
        address = %listen_addr,
        "Starting image proxy"
    );

    // Register service with server
    server.add_service(proxy_service);

    // Run server forever (blocks until shutdown)
    server.run_forever();
}
