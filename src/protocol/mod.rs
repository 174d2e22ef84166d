//! Protocol Module
//!
//! Defines the wire protocol for client-server communication.
//!
//! ## Exchange
//! Exactly one frame in each direction per connection:
//! ```text
//! client ── [len u32 BE][command text] ──▶ server
//! client ◀── [len u32 BE][JSON response] ── server
//! ```
//!
//! ### Commands
//! - `LIST`
//! - `GET <filename>`
//! - `UPLOAD <filename> <base64>`
//!
//! ### Status Codes
//! - `OK`
//! - `ERROR`

mod codec;
mod command;
mod dispatch;
mod response;

pub use codec::{
    encode_frame, frame_length, read_frame, read_frame_length, read_frame_payload, write_frame,
    LENGTH_PREFIX_SIZE, MAX_FRAME_PAYLOAD,
};
pub use command::{split_words, Command, Verb};
pub use dispatch::{execute, process};
pub use response::{decode_content, encode_content, Body, Response, Status, UPLOAD_OK_MESSAGE};
