//! # filewire
//!
//! A small file server and client speaking a length-prefixed TCP protocol:
//! - Exact-length framing over a byte stream
//! - Text commands (`LIST`, `GET`, `UPLOAD`) with JSON responses
//! - One flat service directory on the server
//! - Thread or isolated-process worker pools
//! - A client with one uniform result shape for every failure
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client                                │
//! │            (one connection per operation)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │  [len][command]  /  [len][json]
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Listener (accept loop)                       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ bounded queue
//!          ┌────────────┴────────────┐
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │ Thread pool │          │Process pool │
//!   │ (shared fs) │          │ (isolated)  │
//!   └──────┬──────┘          └──────┬──────┘
//!          └────────────┬───────────┘
//!                       ▼
//!           Connection ─▶ Command dispatch
//!                       │
//!                       ▼
//!               ┌─────────────┐
//!               │ FileService │
//!               │ (flat dir)  │
//!               └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod protocol;
pub mod storage;
pub mod network;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{CommandError, FilewireError, ProtocolError, Result, TransportError};
pub use config::{ClientConfig, Config, PoolStrategy};
pub use client::{Client, Transfer};
pub use network::Server;
pub use protocol::Response;
pub use storage::FileService;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of filewire
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
