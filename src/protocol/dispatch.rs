//! Command dispatch
//!
//! Turns request text into a [`Response`] by running it against a
//! [`FileService`]. Every command-level failure becomes an `ERROR` response;
//! nothing escapes as a panic or an `Err`.

use crate::error::CommandError;
use crate::storage::FileService;

use super::command::Command;
use super::response::{decode_content, Response, UPLOAD_OK_MESSAGE};

/// Parse and execute one request
pub fn process(text: &str, service: &FileService) -> Response {
    let command = match Command::parse(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!("Rejected command ({} bytes): {}", text.len(), e);
            return e.into();
        }
    };

    tracing::debug!("Dispatching {} ({} bytes)", command.verb(), text.len());

    match execute(&command, service) {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!("{} failed: {}", command.verb(), e);
            e.into()
        }
    }
}

/// Execute a parsed command
pub fn execute(command: &Command, service: &FileService) -> Result<Response, CommandError> {
    match command {
        Command::List => Ok(Response::listing(service.list()?)),
        Command::Get { filename } => {
            let content = service.get(filename)?;
            Ok(Response::file(filename.as_str(), &content))
        }
        Command::Upload { filename, data } => {
            let content = decode_content(data)?;
            service.upload(filename, &content)?;
            Ok(Response::message(UPLOAD_OK_MESSAGE))
        }
    }
}
