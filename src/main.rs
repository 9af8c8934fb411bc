use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use futures::{stream::FuturesUnordered, StreamExt};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use framecast::config::{self, AppConfig};
use framecast::state::AppState;
use framecast::stream::{spawn_producer, BroadcastHub};
use framecast::utils::{bind_tcp_listener, resolve_bind_addresses};
use framecast::video::{create_encoder, EncoderConfig, TestPattern};
use framecast::web;

/// Log level for the application
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Verbose,
    Debug,
    Trace,
}

/// framecast command line arguments
#[derive(Parser, Debug)]
#[command(name = "framecast")]
#[command(version, about = "Live MJPEG frame broadcaster", long_about = None)]
struct CliArgs {
    /// JSON configuration file
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Listen address (overrides config file)
    #[arg(short = 'a', long, value_name = "ADDRESS")]
    address: Option<String>,

    /// HTTP port (overrides config file)
    #[arg(short = 'p', long, value_name = "PORT")]
    http_port: Option<u16>,

    /// Producer frame rate
    #[arg(long, value_name = "FPS")]
    fps: Option<u32>,

    /// Producer frame width
    #[arg(long, value_name = "PIXELS")]
    width: Option<u32>,

    /// Producer frame height
    #[arg(long, value_name = "PIXELS")]
    height: Option<u32>,

    /// JPEG quality (1-100)
    #[arg(long, value_name = "QUALITY")]
    quality: Option<u8>,

    /// Do not run the built-in test pattern producer
    #[arg(long)]
    no_producer: bool,

    /// Log level (error, warn, info, verbose, debug, trace)
    #[arg(short = 'l', long, value_name = "LEVEL", default_value = "info")]
    log_level: LogLevel,

    /// Increase verbosity (-v for verbose, -vv for debug, -vvv for trace)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();

    init_logging(args.log_level, args.verbose);

    tracing::info!("Starting framecast v{}", env!("CARGO_PKG_VERSION"));

    let mut config = config::load_config(args.config.as_deref()).await?;
    apply_cli_overrides(&mut config, &args);
    config.validate()?;

    let bind_ips = resolve_bind_addresses(config.web.listen_addresses())?;
    let bind_port = config.web.http_port;
    for ip in &bind_ips {
        tracing::info!("Server will listen on: http://{}", SocketAddr::new(*ip, bind_port));
    }

    // Shared encoder behind the hub; every viewer gets the same bytes
    let encoder = create_encoder(
        config.stream.encoder,
        EncoderConfig::jpeg(config.stream.jpeg_quality),
    )?;
    tracing::info!(
        "Using {} encoder (quality {})",
        encoder.name(),
        config.stream.jpeg_quality
    );
    let hub = Arc::new(BroadcastHub::with_capacity(
        encoder,
        config.stream.queue_capacity,
    ));

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let state = AppState::new(config.clone(), hub.clone(), shutdown_tx);

    let producer = if config.producer.enabled {
        let source = TestPattern::new(config.producer.resolution());
        Some(spawn_producer(
            hub,
            Box::new(source),
            config.producer.fps,
            state.shutdown_signal(),
        ))
    } else {
        tracing::info!("Test pattern producer disabled");
        None
    };

    let app = web::create_router(state.clone());
    let listeners = bind_tcp_listeners(&bind_ips, bind_port)?;

    let mut servers = FuturesUnordered::new();
    for listener in listeners {
        let local_addr = listener.local_addr()?;
        tracing::info!("Starting HTTP server on {}", local_addr);

        let listener = tokio::net::TcpListener::from_std(listener)?;
        let server = axum::serve(listener, app.clone());
        servers.push(async move { server.await });
    }

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::error!("Failed to listen for CTRL+C: {}", e);
            }
            tracing::info!("Shutdown signal received");
        }
        result = servers.next() => {
            if let Some(Err(e)) = result {
                tracing::error!("HTTP server error: {}", e);
            }
        }
    }

    state.shutdown();

    if let Some(handle) = producer {
        match handle.await {
            Ok(stats) => tracing::info!(
                "Producer stopped: {} frames rendered, {} idle ticks, {} encode failures",
                stats.frames_rendered,
                stats.ticks_idle,
                stats.encode_failures
            ),
            Err(e) => tracing::warn!("Producer task failed: {}", e),
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Apply CLI argument overrides (only if explicitly specified)
fn apply_cli_overrides(config: &mut AppConfig, args: &CliArgs) {
    if let Some(addr) = &args.address {
        config.web.bind_address = addr.clone();
        config.web.bind_addresses = vec![addr.clone()];
    }
    if let Some(port) = args.http_port {
        config.web.http_port = port;
    }
    if let Some(fps) = args.fps {
        config.producer.fps = fps;
    }
    if let Some(width) = args.width {
        config.producer.width = width;
    }
    if let Some(height) = args.height {
        config.producer.height = height;
    }
    if let Some(quality) = args.quality {
        config.stream.jpeg_quality = quality;
    }
    if args.no_producer {
        config.producer.enabled = false;
    }
}

/// Initialize logging with tracing
fn init_logging(level: LogLevel, verbose_count: u8) {
    // Verbose count overrides log level
    let effective_level = match verbose_count {
        0 => level,
        1 => LogLevel::Verbose,
        2 => LogLevel::Debug,
        _ => LogLevel::Trace,
    };

    let filter = match effective_level {
        LogLevel::Error => "framecast=error,tower_http=error",
        LogLevel::Warn => "framecast=warn,tower_http=warn",
        LogLevel::Info => "framecast=info,tower_http=info",
        LogLevel::Verbose => "framecast=debug,tower_http=info",
        LogLevel::Debug => "framecast=debug,tower_http=debug",
        LogLevel::Trace => "framecast=trace,tower_http=debug",
    };

    // Environment variable takes highest priority
    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into());

    if let Err(err) = tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init()
    {
        eprintln!("failed to initialize tracing: {}", err);
    }
}

fn bind_tcp_listeners(addrs: &[IpAddr], port: u16) -> anyhow::Result<Vec<std::net::TcpListener>> {
    let mut listeners = Vec::new();
    for ip in addrs {
        let addr = SocketAddr::new(*ip, port);
        match bind_tcp_listener(addr) {
            Ok(listener) => listeners.push(listener),
            Err(err) => {
                tracing::warn!("Failed to bind {}: {}", addr, err);
            }
        }
    }

    if listeners.is_empty() {
        anyhow::bail!("Failed to bind any addresses on port {}", port);
    }

    Ok(listeners)
}
