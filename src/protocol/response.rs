//! Response definitions
//!
//! Structured results and their JSON wire form:
//!
//! ```text
//! {"status":"OK","data":["a.txt","b.bin"]}                  LIST
//! {"status":"OK","data_namafile":"a.txt","data_file":"..."} GET
//! {"status":"OK","data":"File uploaded successfully"}       UPLOAD
//! {"status":"ERROR","data":"<message>"}                     any failure
//! ```

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{CommandError, ProtocolError};

/// Message returned by a successful UPLOAD
pub const UPLOAD_OK_MESSAGE: &str = "File uploaded successfully";

/// Response status codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "ERROR")]
    Error,
}

/// Operation-specific part of a response
///
/// Untagged: the field names tell the shapes apart. `File` is listed first
/// because it is the only shape without a `data` field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Body {
    /// GET: filename plus base64 content
    File {
        #[serde(rename = "data_namafile")]
        filename: String,
        #[serde(rename = "data_file")]
        content: String,
    },

    /// LIST: file names
    Listing { data: Vec<String> },

    /// UPLOAD success text, or an error message
    Message { data: String },
}

/// A response to send to, or received by, a client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Status code
    pub status: Status,

    /// Payload
    #[serde(flatten)]
    pub body: Body,
}

impl Response {
    /// Create an OK response listing file names
    pub fn listing(names: Vec<String>) -> Self {
        Self {
            status: Status::Ok,
            body: Body::Listing { data: names },
        }
    }

    /// Create an OK response carrying a file, base64-encoding its content
    pub fn file(filename: impl Into<String>, content: &[u8]) -> Self {
        Self {
            status: Status::Ok,
            body: Body::File {
                filename: filename.into(),
                content: STANDARD.encode(content),
            },
        }
    }

    /// Create an OK response with a message
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            status: Status::Ok,
            body: Body::Message { data: message.into() },
        }
    }

    /// Create an ERROR response
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            body: Body::Message { data: message.into() },
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == Status::Ok
    }

    /// The message text, for message-shaped responses
    pub fn message_text(&self) -> Option<&str> {
        match &self.body {
            Body::Message { data } => Some(data),
            _ => None,
        }
    }

    /// Serialize to the JSON wire form
    pub fn to_json(&self) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(self).map_err(|e| ProtocolError::MalformedResponse(e.to_string()))
    }

    /// Parse the JSON wire form
    pub fn from_json(bytes: &[u8]) -> Result<Self, ProtocolError> {
        serde_json::from_slice(bytes).map_err(|e| ProtocolError::MalformedResponse(e.to_string()))
    }
}

impl From<CommandError> for Response {
    fn from(err: CommandError) -> Self {
        Response::error(err.to_string())
    }
}

/// Decode base64 file content as carried in GET responses and UPLOAD commands
pub fn decode_content(encoded: &str) -> Result<Vec<u8>, CommandError> {
    STANDARD
        .decode(encoded.trim())
        .map_err(|_| CommandError::InvalidBase64)
}

/// Encode file content for the wire
pub fn encode_content(content: &[u8]) -> String {
    STANDARD.encode(content)
}
