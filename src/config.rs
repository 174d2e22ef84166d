//! Configuration for filewire
//!
//! Centralized configuration with sensible defaults for both the server
//! ([`Config`]) and the client transport ([`ClientConfig`]).

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Main configuration for a filewire server
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Flat directory served by LIST/GET/UPLOAD
    pub service_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,

    /// Pending-connection backlog passed to listen(2)
    pub accept_backlog: i32,

    /// How long the accept loop sleeps between polls of the stop flag (milliseconds)
    pub accept_poll_interval_ms: u64,

    /// Connection idle-read timeout (milliseconds), sized for large transfers
    pub read_timeout_ms: u64,

    /// Connection write timeout (milliseconds)
    pub write_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Worker Pool Configuration
    // -------------------------------------------------------------------------
    /// Number of pool workers (threads or processes)
    pub workers: usize,

    /// Concurrency model for the pool
    pub pool_strategy: PoolStrategy,

    /// Accepted connections waiting for a free worker before accept blocks
    pub queue_capacity: usize,

    /// Executable launched for process workers; defaults to the running binary
    pub worker_program: Option<PathBuf>,
}

/// Worker pool concurrency model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolStrategy {
    /// Threads sharing one file service
    Thread,

    /// Child processes, each with its own file service (unix only)
    Process,
}

impl FromStr for PoolStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "thread" => Ok(PoolStrategy::Thread),
            "process" => Ok(PoolStrategy::Process),
            other => Err(format!("unknown pool strategy '{other}' (expected thread|process)")),
        }
    }
}

impl fmt::Display for PoolStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PoolStrategy::Thread => f.write_str("thread"),
            PoolStrategy::Process => f.write_str("process"),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            service_dir: PathBuf::from("./files"),
            listen_addr: "0.0.0.0:7771".to_string(),
            accept_backlog: 50,
            accept_poll_interval_ms: 100,
            read_timeout_ms: 300_000, // 5 minutes
            write_timeout_ms: 300_000,
            workers: 5,
            pool_strategy: PoolStrategy::Thread,
            queue_capacity: 64,
            worker_program: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Connection timeouts as durations (`None` when disabled with 0)
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            read: millis(self.read_timeout_ms),
            write: millis(self.write_timeout_ms),
        }
    }
}

/// Per-connection socket timeouts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub read: Option<Duration>,
    pub write: Option<Duration>,
}

fn millis(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the served directory
    pub fn service_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.service_dir = path.into();
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    /// Set the accept backlog
    pub fn accept_backlog(mut self, backlog: i32) -> Self {
        self.config.accept_backlog = backlog;
        self
    }

    /// Set the accept poll interval (in milliseconds)
    pub fn accept_poll_interval_ms(mut self, ms: u64) -> Self {
        self.config.accept_poll_interval_ms = ms;
        self
    }

    /// Set the read timeout (in milliseconds, 0 disables)
    pub fn read_timeout_ms(mut self, ms: u64) -> Self {
        self.config.read_timeout_ms = ms;
        self
    }

    /// Set the write timeout (in milliseconds, 0 disables)
    pub fn write_timeout_ms(mut self, ms: u64) -> Self {
        self.config.write_timeout_ms = ms;
        self
    }

    /// Set the number of pool workers
    pub fn workers(mut self, count: usize) -> Self {
        self.config.workers = count;
        self
    }

    /// Set the pool strategy
    pub fn pool_strategy(mut self, strategy: PoolStrategy) -> Self {
        self.config.pool_strategy = strategy;
        self
    }

    /// Set the pool queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = capacity;
        self
    }

    /// Set the executable used for process workers
    pub fn worker_program(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.worker_program = Some(path.into());
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

// =============================================================================
// Client Configuration
// =============================================================================

/// Configuration for the client transport
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server address (host:port)
    pub server_addr: String,

    /// TCP connect timeout (milliseconds, 0 disables)
    pub connect_timeout_ms: u64,

    /// Socket timeout for LIST (milliseconds, 0 disables)
    pub list_timeout_ms: u64,

    /// Socket timeout for GET, and the floor for UPLOAD (milliseconds, 0 disables)
    pub transfer_timeout_ms: u64,

    /// Extra UPLOAD allowance per MiB of source file (milliseconds)
    pub upload_ms_per_mib: u64,

    /// Local directory uploads are read from
    pub upload_dir: PathBuf,

    /// Local directory downloads are written to (created if absent)
    pub download_dir: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:7771".to_string(),
            connect_timeout_ms: 10_000,
            list_timeout_ms: 30_000,
            transfer_timeout_ms: 300_000,
            upload_ms_per_mib: 30_000,
            upload_dir: PathBuf::from("./files"),
            download_dir: PathBuf::from("./downloaded_files"),
        }
    }
}

impl ClientConfig {
    /// Create a new client config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    /// Timeout for uploading `size` bytes: the transfer timeout, or the
    /// per-MiB allowance when that is larger
    ///
    /// Zero (no timeout) when the transfer timeout is disabled.
    pub fn upload_timeout(&self, size: u64) -> Duration {
        if self.transfer_timeout_ms == 0 {
            return Duration::ZERO;
        }
        let per_size = (size / (1024 * 1024)).saturating_mul(self.upload_ms_per_mib);
        Duration::from_millis(self.transfer_timeout_ms.max(per_size))
    }

    /// TCP connect timeout (`None` when disabled with 0)
    pub fn connect_timeout(&self) -> Option<Duration> {
        millis(self.connect_timeout_ms)
    }
}

/// Builder for ClientConfig
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Set the server address
    pub fn server_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server_addr = addr.into();
        self
    }

    /// Set the connect timeout (in milliseconds)
    pub fn connect_timeout_ms(mut self, ms: u64) -> Self {
        self.config.connect_timeout_ms = ms;
        self
    }

    /// Set the LIST timeout (in milliseconds)
    pub fn list_timeout_ms(mut self, ms: u64) -> Self {
        self.config.list_timeout_ms = ms;
        self
    }

    /// Set the GET/UPLOAD timeout (in milliseconds)
    pub fn transfer_timeout_ms(mut self, ms: u64) -> Self {
        self.config.transfer_timeout_ms = ms;
        self
    }

    /// Set the per-MiB UPLOAD allowance (in milliseconds)
    pub fn upload_ms_per_mib(mut self, ms: u64) -> Self {
        self.config.upload_ms_per_mib = ms;
        self
    }

    /// Set the local upload source directory
    pub fn upload_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.upload_dir = path.into();
        self
    }

    /// Set the local download directory
    pub fn download_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.download_dir = path.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}
