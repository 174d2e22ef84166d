//! Codec Tests
//!
//! Tests for frame encoding/decoding over streams.

use std::io::{self, Cursor, Read};

use filewire::error::{FrameError, FramePart, ProtocolError, TransportError};
use filewire::protocol::{
    encode_frame, read_frame, read_frame_length, read_frame_payload, write_frame,
    LENGTH_PREFIX_SIZE,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn decode(bytes: &[u8]) -> Result<Vec<u8>, FrameError> {
    read_frame(&mut Cursor::new(bytes.to_vec()))
}

/// Reader that returns a timeout error once its data runs out
struct StallingReader {
    data: Cursor<Vec<u8>>,
}

impl Read for StallingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.data.read(buf)? {
            0 => Err(io::Error::new(io::ErrorKind::WouldBlock, "timed out")),
            n => Ok(n),
        }
    }
}

// =============================================================================
// Round Trip Tests
// =============================================================================

#[test]
fn test_encode_decode_empty_payload() {
    let frame = encode_frame(b"").unwrap();
    assert_eq!(frame.len(), LENGTH_PREFIX_SIZE);
    assert_eq!(decode(&frame).unwrap(), b"");
}

#[test]
fn test_encode_decode_binary_payload() {
    // Not valid UTF-8; the codec does not care
    let payload: Vec<u8> = (0..=255).chain([0xFF, 0xFE, 0x00]).collect();
    let frame = encode_frame(&payload).unwrap();
    assert_eq!(decode(&frame).unwrap(), payload);
}

#[test]
fn test_encode_decode_large_payload() {
    let payload = vec![0x5Au8; 3 * 1024 * 1024 + 7];
    let frame = encode_frame(&payload).unwrap();
    assert_eq!(&frame[..4], &(payload.len() as u32).to_be_bytes());
    assert_eq!(decode(&frame).unwrap(), payload);
}

#[test]
fn test_write_frame_matches_encode_frame() {
    let mut out = Vec::new();
    write_frame(&mut out, b"UPLOAD a.txt aGk=").unwrap();
    assert_eq!(out, encode_frame(b"UPLOAD a.txt aGk=").unwrap().to_vec());
}

#[test]
fn test_consecutive_frames_on_one_stream() {
    let mut stream = Vec::new();
    write_frame(&mut stream, b"first").unwrap();
    write_frame(&mut stream, b"second").unwrap();

    let mut reader = Cursor::new(stream);
    assert_eq!(read_frame(&mut reader).unwrap(), b"first");
    assert_eq!(read_frame(&mut reader).unwrap(), b"second");
}

#[test]
fn test_length_and_payload_read_separately() {
    let frame = encode_frame(b"LIST").unwrap();
    let mut reader = Cursor::new(frame.to_vec());

    let len = read_frame_length(&mut reader).unwrap();
    assert_eq!(len, 4);
    assert_eq!(read_frame_payload(&mut reader, len).unwrap(), b"LIST");
}

// =============================================================================
// Error Handling Tests
// =============================================================================

#[test]
fn test_empty_stream() {
    let err = decode(&[]).unwrap_err();
    assert!(matches!(
        err,
        FrameError::Protocol(ProtocolError::IncompleteFrame {
            part: FramePart::Length,
            expected: 4,
            received: 0,
        })
    ));
}

#[test]
fn test_declared_length_exceeds_data() {
    // Header says 100 bytes, peer closes after 10
    let mut bytes = 100u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(&[b'x'; 10]);

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err,
        FrameError::Protocol(ProtocolError::IncompleteFrame {
            part: FramePart::Payload,
            expected: 100,
            received: 10,
        })
    ));
    assert_eq!(
        err.to_string(),
        "Incomplete frame payload: expected 100 bytes, got 10"
    );
}

#[test]
fn test_forged_huge_length_fails_without_allocating() {
    let mut bytes = u32::MAX.to_be_bytes().to_vec();
    bytes.extend_from_slice(b"tiny");

    let err = decode(&bytes).unwrap_err();
    assert!(matches!(
        err,
        FrameError::Protocol(ProtocolError::IncompleteFrame { received: 4, .. })
    ));
}

#[test]
fn test_timeout_is_transport_error() {
    let mut bytes = 8u32.to_be_bytes().to_vec();
    bytes.extend_from_slice(b"GET");

    let mut reader = StallingReader {
        data: Cursor::new(bytes),
    };
    let err = read_frame(&mut reader).unwrap_err();
    assert!(matches!(err, FrameError::Transport(TransportError::TimedOut)));
}
