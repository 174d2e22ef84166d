//! filewire Server Binary
//!
//! Starts the TCP file server. With the hidden `--worker` flag it instead
//! runs as one process of an isolated worker pool.

use clap::Parser;
use filewire::config::{Config, PoolStrategy, Timeouts};
use filewire::network::Server;
use tracing_subscriber::{fmt, EnvFilter};

/// filewire Server
#[derive(Parser, Debug)]
#[command(name = "filewire-server")]
#[command(about = "TCP file server with thread or process worker pools")]
#[command(version)]
struct Args {
    /// Service directory
    #[arg(short, long, default_value = "./files")]
    dir: String,

    /// Listen address (host:port)
    #[arg(short, long, default_value = "0.0.0.0:7771")]
    listen: String,

    /// Number of pool workers
    #[arg(short, long, default_value = "5")]
    workers: usize,

    /// Pool strategy: thread or process
    #[arg(short, long, default_value = "thread")]
    pool: PoolStrategy,

    /// Accept backlog
    #[arg(long, default_value = "50")]
    backlog: i32,

    /// Connection read timeout in milliseconds (0 disables)
    #[arg(long, default_value = "300000")]
    read_timeout_ms: u64,

    /// Connection write timeout in milliseconds (0 disables)
    #[arg(long, default_value = "300000")]
    write_timeout_ms: u64,

    /// Run as a pool worker process (internal)
    #[arg(long, hide = true)]
    worker: bool,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,filewire=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    let config = Config::builder()
        .service_dir(&args.dir)
        .listen_addr(&args.listen)
        .workers(args.workers)
        .pool_strategy(args.pool)
        .accept_backlog(args.backlog)
        .read_timeout_ms(args.read_timeout_ms)
        .write_timeout_ms(args.write_timeout_ms)
        .build();

    if args.worker {
        run_worker(config.timeouts(), &args.dir);
        return;
    }

    tracing::info!("filewire server v{}", filewire::VERSION);
    tracing::info!("Service directory: {}", args.dir);
    tracing::info!("Listen address: {}", args.listen);

    let mut server = Server::new(config);

    // Ctrl+C stops the accept loop; in-flight connections still finish
    let shutdown = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        tracing::info!("Received Ctrl+C, initiating shutdown...");
        shutdown.shutdown();
    }) {
        tracing::warn!("Could not install Ctrl+C handler: {}", e);
    }

    if let Err(e) = server.run() {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(unix)]
fn run_worker(timeouts: Timeouts, dir: &str) {
    // The parent closes our channel to stop us; ignore the terminal's SIGINT
    let _ = ctrlc::set_handler(|| {});

    let service = match filewire::FileService::open(dir) {
        Ok(service) => service,
        Err(e) => {
            tracing::error!("Worker could not open {}: {}", dir, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = filewire::network::run_worker_from_stdin(service, timeouts) {
        tracing::error!("Worker failed: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(unix))]
fn run_worker(_timeouts: Timeouts, _dir: &str) {
    tracing::error!("Worker processes are only supported on unix");
    std::process::exit(1);
}
