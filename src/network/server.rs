//! TCP Server
//!
//! Accepts connections and hands each one to the worker pool.

use std::net::{SocketAddr, TcpListener, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use crate::config::Config;
use crate::error::{FilewireError, Result};
use crate::storage::FileService;

use super::pool::WorkerPool;

/// Cooperative stop flag shared with the accept loop
#[derive(Debug, Clone, Default)]
pub struct ShutdownHandle(Arc<AtomicBool>);

impl ShutdownHandle {
    /// Ask the server to stop accepting and drain its pool
    pub fn shutdown(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_shutdown(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// TCP server for filewire
pub struct Server {
    config: Config,
    listener: Option<TcpListener>,
    shutdown: ShutdownHandle,
}

impl Server {
    /// Create a new server with the given config
    pub fn new(config: Config) -> Self {
        Self {
            config,
            listener: None,
            shutdown: ShutdownHandle::default(),
        }
    }

    /// Bind the listening socket; a no-op if already bound
    ///
    /// Returns the bound address, which differs from the configured one
    /// when port 0 was requested.
    pub fn bind(&mut self) -> Result<SocketAddr> {
        if let Some(listener) = &self.listener {
            return Ok(listener.local_addr()?);
        }

        let addr = resolve(&self.config.listen_addr)?;
        let listener = bind_listener(addr, self.config.accept_backlog)?;
        let local = listener.local_addr()?;

        tracing::info!("Listening on {} (backlog {})", local, self.config.accept_backlog);
        self.listener = Some(listener);
        Ok(local)
    }

    /// The bound address, if bound
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// Handle that stops `run` from another thread
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Signal the server to shutdown gracefully
    pub fn shutdown(&self) {
        self.shutdown.shutdown();
    }

    /// Start the server (blocking)
    ///
    /// Returns after a shutdown request once every in-flight connection has
    /// been served. Bind and pool startup failures are returned as errors.
    pub fn run(&mut self) -> Result<()> {
        self.bind()?;
        let service = Arc::new(FileService::open(&self.config.service_dir)?);
        let pool = WorkerPool::from_config(&self.config, Arc::clone(&service))?;

        tracing::info!(
            "Serving {} with {} {} workers",
            service.root().display(),
            pool.worker_count(),
            pool.strategy()
        );

        let result = match &self.listener {
            Some(listener) => self.accept_loop(listener, &pool),
            None => Err(FilewireError::Config("listener not bound".to_string())),
        };

        tracing::info!("Stopping: waiting for in-flight connections");
        pool.shutdown();
        self.listener = None;
        tracing::info!("Server stopped");

        result
    }

    fn accept_loop(&self, listener: &TcpListener, pool: &WorkerPool) -> Result<()> {
        let poll_interval = Duration::from_millis(self.config.accept_poll_interval_ms.max(1));

        while !self.shutdown.is_shutdown() {
            match listener.accept() {
                Ok((stream, addr)) => {
                    tracing::debug!("Connection from {}", addr);

                    // BSD-derived systems hand out sockets that inherit O_NONBLOCK
                    if let Err(e) = stream.set_nonblocking(false) {
                        tracing::warn!("Dropping {}: {}", addr, e);
                        continue;
                    }
                    pool.submit(stream)?;

                    let queued = pool.queued();
                    if queued > 0 {
                        tracing::trace!("{} connections waiting for a worker", queued);
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(poll_interval);
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
                Err(e) => {
                    // e.g. out of descriptors; back off instead of spinning
                    tracing::error!("Failed to accept connection: {}", e);
                    thread::sleep(poll_interval);
                }
            }
        }

        Ok(())
    }
}

fn resolve(listen_addr: &str) -> Result<SocketAddr> {
    listen_addr
        .to_socket_addrs()
        .map_err(|e| FilewireError::Config(format!("invalid listen address {listen_addr}: {e}")))?
        .next()
        .ok_or_else(|| FilewireError::Config(format!("listen address {listen_addr} resolved to nothing")))
}

/// Non-blocking listener with SO_REUSEADDR and an explicit backlog
fn bind_listener(addr: SocketAddr, backlog: i32) -> std::io::Result<TcpListener> {
    let socket = Socket::new(
        match addr {
            SocketAddr::V4(_) => Domain::IPV4,
            SocketAddr::V6(_) => Domain::IPV6,
        },
        Type::STREAM,
        Some(Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;
    socket.set_nonblocking(true)?;

    Ok(socket.into())
}
