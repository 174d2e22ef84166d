//! Client Transport
//!
//! One TCP connection per operation. Every failure, whichever layer it
//! comes from, is returned as an `ERROR` [`Response`] instead of an `Err`,
//! so callers only ever handle one result shape.

use std::fs;
use std::io;
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use crate::config::ClientConfig;
use crate::error::{FilewireError, ProtocolError, TransportError};
use crate::protocol::{
    decode_content, encode_content, read_frame, write_frame, Body, Command, Response,
};
use crate::storage::FileService;

/// Outcome of a GET or UPLOAD
#[derive(Debug, Clone)]
pub struct Transfer {
    /// What the server (or the transport) said
    pub response: Response,

    /// File bytes moved; 0 when the transfer failed
    pub bytes: u64,

    /// Wall-clock time around the whole exchange, local file I/O included
    pub duration: Duration,
}

impl Transfer {
    fn finish(response: Response, bytes: u64, started: Instant) -> Self {
        let bytes = if response.is_ok() { bytes } else { 0 };
        Self {
            response,
            bytes,
            duration: started.elapsed(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.response.is_ok()
    }

    /// Bytes per second; 0 for failed or instantaneous transfers
    pub fn throughput(&self) -> f64 {
        let secs = self.duration.as_secs_f64();
        if secs > 0.0 {
            self.bytes as f64 / secs
        } else {
            0.0
        }
    }
}

/// Client for a filewire server
#[derive(Debug, Clone)]
pub struct Client {
    config: ClientConfig,
}

impl Client {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// List files on the server
    pub fn list(&self) -> Response {
        let timeout = Duration::from_millis(self.config.list_timeout_ms);
        self.send_command(&Command::List.to_wire(), timeout)
    }

    /// Download `filename` into the local download directory
    pub fn get(&self, filename: &str) -> Transfer {
        let started = Instant::now();
        let command = Command::Get {
            filename: filename.to_string(),
        };
        let timeout = Duration::from_millis(self.config.transfer_timeout_ms);
        let response = self.send_command(&command.to_wire(), timeout);

        if !response.is_ok() {
            tracing::warn!("Download of {} failed: {:?}", filename, response.message_text());
            return Transfer::finish(response, 0, started);
        }

        match self.save_download(&response) {
            Ok(bytes) => {
                let transfer = Transfer::finish(response, bytes, started);
                tracing::info!(
                    "Downloaded {} ({} bytes in {:.2?}, {:.0} B/s)",
                    filename,
                    transfer.bytes,
                    transfer.duration,
                    transfer.throughput()
                );
                transfer
            }
            Err(message) => {
                tracing::warn!("Could not store download {}: {}", filename, message);
                Transfer::finish(Response::error(message), 0, started)
            }
        }
    }

    /// Upload `filename` from the local upload directory
    pub fn upload(&self, filename: &str) -> Transfer {
        let started = Instant::now();
        let path = self.config.upload_dir.join(filename);

        let content = match fs::read(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::warn!("Upload source {} not found", path.display());
                let response = Response::error(format!("File {} not found", path.display()));
                return Transfer::finish(response, 0, started);
            }
            Err(e) => {
                let response = Response::error(format!("Cannot read {}: {}", path.display(), e));
                return Transfer::finish(response, 0, started);
            }
        };

        let size = content.len() as u64;
        let command = Command::Upload {
            filename: filename.to_string(),
            data: encode_content(&content),
        };
        drop(content);

        let timeout = self.config.upload_timeout(size);
        let response = self.send_command(&command.to_wire(), timeout);
        let transfer = Transfer::finish(response, size, started);

        if transfer.is_ok() {
            tracing::info!(
                "Uploaded {} ({} bytes in {:.2?}, {:.0} B/s)",
                filename,
                transfer.bytes,
                transfer.duration,
                transfer.throughput()
            );
        } else {
            tracing::warn!("Upload of {} failed: {:?}", filename, transfer.response.message_text());
        }
        transfer
    }

    /// Send raw command text and wait for the response
    ///
    /// `timeout` bounds each socket read and write on its own, not the
    /// exchange as a whole: a peer that keeps trickling bytes can hold the
    /// call for longer. `Duration::ZERO` disables it.
    pub fn send_command(&self, command: &str, timeout: Duration) -> Response {
        match self.exchange(command.as_bytes(), timeout) {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Request to {} failed: {}", self.config.server_addr, e);
                Response::error(e.to_string())
            }
        }
    }

    fn exchange(&self, request: &[u8], timeout: Duration) -> Result<Response, FilewireError> {
        let mut stream = self.connect()?;
        stream.set_nodelay(true).map_err(TransportError::from_io)?;
        let timeout = (!timeout.is_zero()).then_some(timeout);
        stream.set_read_timeout(timeout).map_err(TransportError::from_io)?;
        stream.set_write_timeout(timeout).map_err(TransportError::from_io)?;

        tracing::debug!("Sending {} byte command to {}", request.len(), self.config.server_addr);
        write_frame(&mut stream, request)?;
        let payload = read_frame(&mut stream)?;
        let _ = stream.shutdown(Shutdown::Both);

        tracing::debug!("Received {} byte response", payload.len());
        Ok(Response::from_json(&payload)?)
    }

    fn connect(&self) -> Result<TcpStream, TransportError> {
        let addr = &self.config.server_addr;
        let connect_timeout = self.config.connect_timeout();
        let connect_err = |source| TransportError::Connect {
            addr: addr.clone(),
            source,
        };

        let mut last_err = None;
        for candidate in addr.to_socket_addrs().map_err(connect_err)? {
            let attempt = match connect_timeout {
                Some(limit) => TcpStream::connect_timeout(&candidate, limit),
                None => TcpStream::connect(candidate),
            };
            match attempt {
                Ok(stream) => return Ok(stream),
                Err(e) => last_err = Some(e),
            }
        }

        Err(connect_err(last_err.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
        })))
    }

    /// Decode a GET response and write it under the download directory
    fn save_download(&self, response: &Response) -> Result<u64, String> {
        let (name, encoded) = match &response.body {
            Body::File { filename, content } => (filename, content),
            _ => return Err(ProtocolError::MalformedResponse("GET reply carried no file".into()).to_string()),
        };

        let content = decode_content(encoded).map_err(|e| e.to_string())?;
        let target = FileService::open(&self.config.download_dir).map_err(|e| e.to_string())?;
        target.upload(name, &content).map_err(|e| e.to_string())?;

        Ok(content.len() as u64)
    }
}
