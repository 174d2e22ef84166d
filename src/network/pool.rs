//! Worker Pool
//!
//! Fixed number of workers fed from one bounded queue of accepted
//! connections.
//!
//! ## Strategies
//! - **Thread**: each worker is a thread serving connections itself; all of
//!   them share one [`FileService`]
//! - **Process** (unix): each worker is a thread supervising one child
//!   process; the accepted socket is handed to the child, which has its own
//!   `FileService` and shares nothing with its siblings but the filesystem
//!
//! `submit` returns immediately while the queue has room and blocks the
//! acceptor once it is full; pending connections then wait in the kernel's
//! accept backlog.

use std::net::TcpStream;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};

use crate::config::{Config, PoolStrategy, Timeouts};
use crate::error::{FilewireError, Result};
use crate::storage::FileService;

use super::connection::Connection;

/// Bounded pool of connection workers
pub struct WorkerPool {
    /// Queue feeding the workers; `None` once shut down
    sender: Option<Sender<TcpStream>>,

    /// Worker threads (servers or process supervisors)
    workers: Vec<JoinHandle<()>>,

    strategy: PoolStrategy,
}

impl WorkerPool {
    /// Build the pool described by the config
    pub fn from_config(config: &Config, service: Arc<FileService>) -> Result<Self> {
        match config.pool_strategy {
            PoolStrategy::Thread => Self::threads(
                config.workers,
                config.queue_capacity,
                service,
                config.timeouts(),
            ),
            #[cfg(unix)]
            PoolStrategy::Process => {
                let spawner = super::worker::WorkerSpawner::from_config(config)?;
                Self::processes(config.workers, config.queue_capacity, spawner)
            }
            #[cfg(not(unix))]
            PoolStrategy::Process => Err(FilewireError::Config(
                "process pool requires a unix platform".to_string(),
            )),
        }
    }

    /// Pool of threads sharing one file service
    pub fn threads(
        workers: usize,
        queue_capacity: usize,
        service: Arc<FileService>,
        timeouts: Timeouts,
    ) -> Result<Self> {
        check_workers(workers)?;
        let (sender, receiver) = channel::bounded(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let receiver: Receiver<TcpStream> = receiver.clone();
            let service = Arc::clone(&service);
            let handle = thread::Builder::new()
                .name(format!("filewire-worker-{id}"))
                .spawn(move || {
                    for stream in receiver.iter() {
                        serve_connection(stream, &service, timeouts);
                    }
                    tracing::trace!("Worker {} exiting", id);
                })?;
            handles.push(handle);
        }

        tracing::info!("Started thread pool with {} workers", workers);
        Ok(Self {
            sender: Some(sender),
            workers: handles,
            strategy: PoolStrategy::Thread,
        })
    }

    /// Pool of isolated worker processes
    #[cfg(unix)]
    pub fn processes(
        workers: usize,
        queue_capacity: usize,
        spawner: super::worker::WorkerSpawner,
    ) -> Result<Self> {
        check_workers(workers)?;
        let (sender, receiver) = channel::bounded(queue_capacity);
        let spawner = Arc::new(spawner);

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            // Spawn up front so a bad worker program fails startup
            let process = spawner.spawn(id)?;
            let receiver: Receiver<TcpStream> = receiver.clone();
            let spawner = Arc::clone(&spawner);
            let handle = thread::Builder::new()
                .name(format!("filewire-supervisor-{id}"))
                .spawn(move || super::worker::supervise(id, process, receiver, &spawner))?;
            handles.push(handle);
        }

        tracing::info!("Started process pool with {} workers", workers);
        Ok(Self {
            sender: Some(sender),
            workers: handles,
            strategy: PoolStrategy::Process,
        })
    }

    /// Queue a connection for the next free worker
    ///
    /// Blocks while the queue is full.
    pub fn submit(&self, stream: TcpStream) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| FilewireError::Config("worker pool is shut down".to_string()))?;

        sender
            .send(stream)
            .map_err(|_| FilewireError::Config("all pool workers have exited".to_string()))
    }

    /// Connections waiting for a worker
    pub fn queued(&self) -> usize {
        self.sender.as_ref().map_or(0, |s| s.len())
    }

    pub fn strategy(&self) -> PoolStrategy {
        self.strategy
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Stop taking work, let workers drain the queue, and wait for them
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        // Closing the channel ends each worker's loop once the queue is empty
        if self.sender.take().is_none() {
            return;
        }

        for handle in self.workers.drain(..) {
            if handle.join().is_err() {
                tracing::error!("Pool worker panicked during shutdown");
            }
        }
        tracing::info!("{} pool stopped", self.strategy);
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn check_workers(workers: usize) -> Result<()> {
    if workers == 0 {
        return Err(FilewireError::Config("worker count must be at least 1".to_string()));
    }
    Ok(())
}

/// Serve one accepted connection in the current thread
///
/// Never panics or returns an error: a failing connection only affects itself.
pub fn serve_connection(stream: TcpStream, service: &FileService, timeouts: Timeouts) {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        match Connection::accept(stream, service, timeouts) {
            Ok(connection) => {
                // Failures are logged by the handler
                let _ = connection.serve();
            }
            Err(e) => tracing::warn!("Could not configure accepted socket: {}", e),
        }
    }));

    if result.is_err() {
        tracing::error!("Connection handler panicked; worker continues");
    }
}
