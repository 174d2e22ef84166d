//! Error types for filewire
//!
//! One enum per layer so the failure kind survives across layer boundaries:
//! - [`TransportError`]: socket, timeout and connect failures
//! - [`ProtocolError`]: malformed or truncated frame content
//! - [`CommandError`]: a well-formed frame carrying a command that cannot be served
//!
//! [`FilewireError`] wraps them for APIs that span layers.

use std::io;

use thiserror::Error;

/// Result type alias using FilewireError
pub type Result<T> = std::result::Result<T, FilewireError>;

/// Unified error type for filewire operations
#[derive(Debug, Error)]
pub enum FilewireError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    // -------------------------------------------------------------------------
    // Layered Errors
    // -------------------------------------------------------------------------
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Command(#[from] CommandError),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<FrameError> for FilewireError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Transport(e) => FilewireError::Transport(e),
            FrameError::Protocol(e) => FilewireError::Protocol(e),
        }
    }
}

/// Connection, timeout and partial-I/O failures
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection timeout")]
    TimedOut,

    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Socket error: {0}")]
    Io(#[from] io::Error),
}

impl TransportError {
    /// Classify an I/O error, folding read/write timeouts into `TimedOut`
    ///
    /// Unix reports socket timeouts as `WouldBlock`, Windows as `TimedOut`.
    pub fn from_io(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => TransportError::TimedOut,
            _ => TransportError::Io(err),
        }
    }

    /// True when the peer went away (reset, abort, broken pipe)
    pub fn is_disconnect(&self) -> bool {
        match self {
            TransportError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::ConnectionReset
                    | io::ErrorKind::ConnectionAborted
                    | io::ErrorKind::BrokenPipe
            ),
            _ => false,
        }
    }
}

/// Which part of a frame was being read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FramePart {
    Length,
    Payload,
}

impl std::fmt::Display for FramePart {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FramePart::Length => f.write_str("length"),
            FramePart::Payload => f.write_str("payload"),
        }
    }
}

/// Malformed or truncated frame content
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Incomplete frame {part}: expected {expected} bytes, got {received}")]
    IncompleteFrame {
        part: FramePart,
        expected: usize,
        received: usize,
    },

    #[error("Frame too large: {0} bytes (max {max})", max = u32::MAX)]
    FrameTooLarge(usize),

    #[error("Frame payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("Invalid JSON response: {0}")]
    MalformedResponse(String),
}

/// Failure while receiving a frame: either the transport broke or the
/// bytes that did arrive do not form a frame.
#[derive(Debug, Error)]
pub enum FrameError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl From<io::Error> for FrameError {
    fn from(err: io::Error) -> Self {
        FrameError::Transport(TransportError::from_io(err))
    }
}

/// A command that was framed correctly but cannot be served.
///
/// The `Display` text is exactly the `data` message sent back to the client.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Empty command")]
    Empty,

    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    #[error("No filename provided")]
    MissingFilename,

    #[error("Invalid UPLOAD command format")]
    InvalidUploadFormat,

    #[error("Invalid base64 data")]
    InvalidBase64,

    #[error("Invalid filename: {0}")]
    InvalidFilename(String),

    #[error("File {0} does not exist")]
    FileNotFound(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("{0}")]
    Io(#[from] io::Error),
}
