use clap::Parser;
use cookie_cart::{
    limits::{ConnLimits, ServerLimits},
    CartService, Server, ServiceConfig,
};
use std::{path::PathBuf, time::Duration};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "cookie_cart")]
#[command(about = "Shopping-cart HTTP service keeping all cart state in cookies", long_about = None)]
struct Cli {
    /// Address to listen on
    #[arg(short, long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Directory that /getfile and /putfile names resolve against
    #[arg(short, long, default_value = ".")]
    root: PathBuf,

    /// File every checkout is appended to
    #[arg(short, long, default_value = "CHECKOUT.txt")]
    log: PathBuf,

    /// Connections served at once
    #[arg(short, long, default_value_t = 100)]
    workers: usize,

    /// Seconds to wait for request bytes before dropping a connection
    #[arg(long, default_value_t = 10)]
    read_timeout: u64,

    /// Largest file /getfile will send, in bytes
    #[arg(long, default_value_t = 8 * 1024 * 1024)]
    max_file_size: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cookie_cart=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    tracing::info!(
        root = %cli.root.display(),
        checkout_log = %cli.log.display(),
        workers = cli.workers,
        "configuration loaded"
    );

    let listener = match TcpListener::bind(&cli.bind).await {
        Ok(listener) => listener,
        Err(err) => {
            tracing::error!(bind = %cli.bind, %err, "bind failed");
            return Err(err.into());
        }
    };

    Server::builder()
        .listener(listener)
        .handler(CartService::new(ServiceConfig {
            files_root: cli.root,
            checkout_log: cli.log,
            max_file_size: cli.max_file_size,
            ..ServiceConfig::default()
        }))
        .server_limits(ServerLimits {
            max_connections: cli.workers,
            ..ServerLimits::default()
        })
        .connection_limits(ConnLimits {
            socket_read_timeout: Duration::from_secs(cli.read_timeout),
            ..ConnLimits::default()
        })
        .build()
        .launch()
        .await;

    Ok(())
}
