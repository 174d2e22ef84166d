//! Network Module
//!
//! TCP server and connection handling.
//!
//! ## Architecture
//! - Single acceptor thread polling a non-blocking listener
//! - Bounded worker pool (threads, or supervised processes on unix)
//! - One request and one response per connection

mod connection;
mod pool;
mod server;
#[cfg(unix)]
mod worker;

pub use connection::{Connection, ConnectionState};
pub use pool::{serve_connection, WorkerPool};
pub use server::{Server, ShutdownHandle};
#[cfg(unix)]
pub use worker::{run_worker, run_worker_from_stdin, WorkerProcess, WorkerSpawner, WORKER_FLAG};
