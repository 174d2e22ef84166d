//! Connection Handler
//!
//! Serves exactly one request on one accepted connection.
//!
//! ## States
//! ```text
//! AwaitLength ─▶ AwaitPayload ─▶ Dispatch ─▶ SendLength ─▶ SendPayload ─▶ Closed
//!      │               │             │            │              │
//!      └───────────────┴─────────────┴────────────┴──────────────┴──▶ Closed (no response)
//! ```
//! Any transport or protocol failure jumps straight to `Closed`. The stream
//! is owned by the handler and dropped (closed) when [`Connection::handle`]
//! returns, whichever way it returns.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};

use crate::config::Timeouts;
use crate::error::{FrameError, ProtocolError};
use crate::protocol::{frame_length, process, read_frame_length, read_frame_payload};
use crate::storage::FileService;

/// Where a connection is in its single exchange
#[derive(Debug)]
pub enum ConnectionState {
    /// Waiting for the 4-byte length prefix
    AwaitLength,

    /// Waiting for `len` payload bytes
    AwaitPayload { len: u32 },

    /// Running the command
    Dispatch { payload: Vec<u8> },

    /// Writing the response length prefix
    SendLength { response: Vec<u8> },

    /// Writing the response body
    SendPayload { response: Vec<u8> },

    /// Done; the stream is released
    Closed,
}

impl ConnectionState {
    pub fn name(&self) -> &'static str {
        match self {
            ConnectionState::AwaitLength => "AwaitLength",
            ConnectionState::AwaitPayload { .. } => "AwaitPayload",
            ConnectionState::Dispatch { .. } => "Dispatch",
            ConnectionState::SendLength { .. } => "SendLength",
            ConnectionState::SendPayload { .. } => "SendPayload",
            ConnectionState::Closed => "Closed",
        }
    }
}

/// Handles a single client connection
pub struct Connection<'a, S> {
    /// The client stream
    stream: S,

    /// Service the command runs against
    service: &'a FileService,

    /// Peer address for logging
    peer_addr: String,
}

impl<'a> Connection<'a, TcpStream> {
    /// Wrap an accepted TCP stream, applying the socket timeouts
    pub fn accept(
        stream: TcpStream,
        service: &'a FileService,
        timeouts: Timeouts,
    ) -> std::io::Result<Self> {
        let peer_addr = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        stream.set_nodelay(true)?;
        stream.set_read_timeout(timeouts.read)?;
        stream.set_write_timeout(timeouts.write)?;

        Ok(Self::new(stream, service, peer_addr))
    }

    /// Serve the connection, then shut the socket down in both directions
    pub fn serve(self) -> Result<(), FrameError> {
        let stream = self.stream.try_clone();
        let result = self.handle();
        if let Ok(stream) = stream {
            let _ = stream.shutdown(Shutdown::Both);
        }
        result
    }
}

impl<'a, S: Read + Write> Connection<'a, S> {
    /// Create a handler over any byte stream
    pub fn new(stream: S, service: &'a FileService, peer_addr: impl Into<String>) -> Self {
        Self {
            stream,
            service,
            peer_addr: peer_addr.into(),
        }
    }

    /// Run the state machine to `Closed`
    ///
    /// Returns the error that aborted the exchange, if any. No response is
    /// sent after a failure.
    pub fn handle(mut self) -> Result<(), FrameError> {
        tracing::debug!("Connection established from {}", self.peer_addr);

        let mut state = ConnectionState::AwaitLength;
        loop {
            let current = state.name();
            state = match self.step(state) {
                Ok(ConnectionState::Closed) => {
                    tracing::debug!("Served {}", self.peer_addr);
                    return Ok(());
                }
                Ok(next) => next,
                Err(e) => {
                    self.log_abort(current, &e);
                    return Err(e);
                }
            };
        }
    }

    /// Advance one state
    fn step(&mut self, state: ConnectionState) -> Result<ConnectionState, FrameError> {
        let next = match state {
            ConnectionState::AwaitLength => ConnectionState::AwaitPayload {
                len: read_frame_length(&mut self.stream)?,
            },
            ConnectionState::AwaitPayload { len } => {
                tracing::trace!("Expecting {} byte command from {}", len, self.peer_addr);
                ConnectionState::Dispatch {
                    payload: read_frame_payload(&mut self.stream, len)?,
                }
            }
            ConnectionState::Dispatch { payload } => {
                let text = String::from_utf8(payload).map_err(|_| ProtocolError::InvalidUtf8)?;
                let response = process(&text, self.service);
                tracing::debug!("Responding {:?} to {}", response.status, self.peer_addr);
                ConnectionState::SendLength {
                    response: response.to_json()?,
                }
            }
            ConnectionState::SendLength { response } => {
                let len = frame_length(&response)?;
                self.stream.write_all(&len.to_be_bytes())?;
                ConnectionState::SendPayload { response }
            }
            ConnectionState::SendPayload { response } => {
                self.stream.write_all(&response)?;
                self.stream.flush()?;
                tracing::trace!("Sent {} byte response to {}", response.len(), self.peer_addr);
                ConnectionState::Closed
            }
            ConnectionState::Closed => ConnectionState::Closed,
        };

        Ok(next)
    }

    fn log_abort(&self, state: &str, err: &FrameError) {
        match err {
            FrameError::Transport(e) if e.is_disconnect() => {
                tracing::debug!("Client {} went away in {}: {}", self.peer_addr, state, e);
            }
            FrameError::Transport(e) => {
                tracing::warn!("Dropping {} in {}: {}", self.peer_addr, state, e);
            }
            FrameError::Protocol(e) => {
                tracing::warn!("Bad frame from {} in {}: {}", self.peer_addr, state, e);
            }
        }
    }

    /// Get the peer address string
    pub fn peer_addr(&self) -> &str {
        &self.peer_addr
    }
}
