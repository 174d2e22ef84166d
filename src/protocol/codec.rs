//! Frame codec
//!
//! Encoding and decoding of length-prefixed frames.
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────┬──────────────────────────────────┐
//! │ Len (4, u32 BE)  │        Payload (Len bytes)       │
//! └──────────────────┴──────────────────────────────────┘
//! ```
//!
//! A single underlying read or write moving fewer bytes than requested is
//! normal; every function here loops until the frame part is complete or
//! the stream ends.

use std::io::{Read, Write};

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, FramePart, ProtocolError};

/// Length prefix size: 4 bytes, big-endian
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Largest payload a frame can describe
pub const MAX_FRAME_PAYLOAD: usize = u32::MAX as usize;

// =============================================================================
// Encoding
// =============================================================================

/// Encode a payload as a frame: 4-byte big-endian length + payload
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, ProtocolError> {
    let len = frame_length(payload)?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_SIZE + payload.len());
    frame.put_u32(len);
    frame.put_slice(payload);

    Ok(frame.freeze())
}

/// The length prefix for `payload`, if it fits in 32 bits
pub fn frame_length(payload: &[u8]) -> Result<u32, ProtocolError> {
    u32::try_from(payload.len()).map_err(|_| ProtocolError::FrameTooLarge(payload.len()))
}

/// Write a complete frame to a stream and flush it
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), FrameError> {
    let len = frame_length(payload)?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

// =============================================================================
// Decoding
// =============================================================================

/// Read a complete frame from a stream
///
/// Blocks until the whole payload has arrived, the peer closes the stream
/// (`IncompleteFrame`), or the socket timeout expires (`TimedOut`).
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>, FrameError> {
    let len = read_frame_length(reader)?;
    read_frame_payload(reader, len)
}

/// Read the 4-byte length prefix
pub fn read_frame_length<R: Read>(reader: &mut R) -> Result<u32, FrameError> {
    let bytes = read_exactly(reader, LENGTH_PREFIX_SIZE, FramePart::Length)?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Read exactly `len` payload bytes
pub fn read_frame_payload<R: Read>(reader: &mut R, len: u32) -> Result<Vec<u8>, FrameError> {
    read_exactly(reader, len as usize, FramePart::Payload)
}

/// Read exactly `len` bytes, looping over short reads.
///
/// The buffer grows with the bytes that actually arrive, so a forged length
/// prefix does not allocate the full declared size up front.
fn read_exactly<R: Read>(
    reader: &mut R,
    len: usize,
    part: FramePart,
) -> Result<Vec<u8>, FrameError> {
    let mut buf = Vec::with_capacity(len.min(64 * 1024));
    reader.by_ref().take(len as u64).read_to_end(&mut buf)?;

    if buf.len() != len {
        return Err(ProtocolError::IncompleteFrame {
            part,
            expected: len,
            received: buf.len(),
        }
        .into());
    }

    Ok(buf)
}
