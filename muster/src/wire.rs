//! Wire format for framed call traffic.
//!
//! Frame format: `[length:4][checksum:4][call_id:8][payload:N]`
//!
//! - **length**: Total frame size including header (little-endian u32)
//! - **checksum**: CRC32C of (call_id + payload) for integrity verification
//! - **call_id**: Correlates a reply frame with the request that produced it
//!   (little-endian u64); each connection carries one call at a time, the id
//!   guards against desynchronized streams
//! - **payload**: Codec-encoded envelope or reply

use tokio::io::{AsyncRead, AsyncReadExt};

/// Header size: 4 (length) + 4 (checksum) + 8 (call id) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Maximum payload size (1MB).
///
/// Frames larger than this are rejected to prevent memory exhaustion attacks.
pub const MAX_PAYLOAD_SIZE: usize = 1024 * 1024;

/// Wire format error types.
#[derive(Debug, Clone, thiserror::Error)]
pub enum WireError {
    /// Not enough data to parse the frame.
    #[error("insufficient data: need {needed} bytes, have {have}")]
    InsufficientData {
        /// Minimum bytes required to parse.
        needed: usize,
        /// Actual bytes available.
        have: usize,
    },

    /// Checksum verification failed - data was corrupted.
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Expected checksum from header.
        expected: u32,
        /// Computed checksum from data.
        actual: u32,
    },

    /// Payload exceeds maximum allowed size.
    #[error("frame too large: {size} bytes (max {MAX_PAYLOAD_SIZE})")]
    FrameTooLarge {
        /// Actual payload size in bytes.
        size: usize,
    },

    /// Length field has an invalid value.
    #[error("invalid frame length: {length}")]
    InvalidLength {
        /// The invalid length value from the header.
        length: u32,
    },
}

/// Frame header for wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Total frame size including header.
    pub length: u32,
    /// CRC32C checksum of (call_id + payload).
    pub checksum: u32,
    /// Call correlation id.
    pub call_id: u64,
}

impl FrameHeader {
    /// Serialize header into buffer (must be at least HEADER_SIZE bytes).
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than HEADER_SIZE.
    pub fn serialize_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..4].copy_from_slice(&self.length.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8..16].copy_from_slice(&self.call_id.to_le_bytes());
    }

    /// Deserialize header from buffer.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientData` if buffer is smaller than HEADER_SIZE.
    pub fn deserialize(buf: &[u8]) -> Result<Self, WireError> {
        if buf.len() < HEADER_SIZE {
            return Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: buf.len(),
            });
        }

        let length = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
        let checksum = u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]);
        let call_id = u64::from_le_bytes([
            buf[8], buf[9], buf[10], buf[11], buf[12], buf[13], buf[14], buf[15],
        ]);

        Ok(Self {
            length,
            checksum,
            call_id,
        })
    }
}

/// Compute CRC32C checksum over call_id + payload.
fn compute_checksum(call_id: u64, payload: &[u8]) -> u32 {
    let crc = crc32c::crc32c(&call_id.to_le_bytes());
    crc32c::crc32c_append(crc, payload)
}

/// Serialize a frame with call id and payload.
///
/// Returns: `[length:4][checksum:4][call_id:8][payload:N]`
///
/// # Errors
///
/// Returns `FrameTooLarge` if payload exceeds MAX_PAYLOAD_SIZE.
///
/// # Examples
///
/// ```
/// use muster::wire::{encode_frame, decode_frame};
///
/// let frame = encode_frame(7, b"hello").expect("encode");
/// let (call_id, payload) = decode_frame(&frame).expect("decode");
///
/// assert_eq!(call_id, 7);
/// assert_eq!(payload.as_slice(), b"hello");
/// ```
pub fn encode_frame(call_id: u64, payload: &[u8]) -> Result<Vec<u8>, WireError> {
    if payload.len() > MAX_PAYLOAD_SIZE {
        return Err(WireError::FrameTooLarge {
            size: payload.len(),
        });
    }

    let total_length = HEADER_SIZE + payload.len();
    let mut data = vec![0u8; total_length];

    let header = FrameHeader {
        length: total_length as u32,
        checksum: compute_checksum(call_id, payload),
        call_id,
    };

    header.serialize_into(&mut data[..HEADER_SIZE]);
    data[HEADER_SIZE..].copy_from_slice(payload);

    Ok(data)
}

/// Decode a frame, validating checksum.
///
/// # Errors
///
/// - `InsufficientData`: Not enough bytes to parse header or full frame
/// - `ChecksumMismatch`: Data was corrupted
/// - `InvalidLength`: Length field is malformed
pub fn decode_frame(data: &[u8]) -> Result<(u64, Vec<u8>), WireError> {
    let header = FrameHeader::deserialize(data)?;

    if header.length < HEADER_SIZE as u32 {
        return Err(WireError::InvalidLength {
            length: header.length,
        });
    }

    let expected_len = header.length as usize;
    if data.len() < expected_len {
        return Err(WireError::InsufficientData {
            needed: expected_len,
            have: data.len(),
        });
    }

    let payload = &data[HEADER_SIZE..expected_len];

    let computed = compute_checksum(header.call_id, payload);
    if computed != header.checksum {
        return Err(WireError::ChecksumMismatch {
            expected: header.checksum,
            actual: computed,
        });
    }

    Ok((header.call_id, payload.to_vec()))
}

/// Try to decode from a buffer that may contain partial data.
///
/// Useful for streaming scenarios where frames arrive incrementally.
///
/// # Returns
///
/// - `Ok(Some((call_id, payload, consumed)))` if a complete frame was parsed
/// - `Ok(None)` if more data is needed (not an error condition)
/// - `Err` if data is malformed
pub fn try_decode_frame(data: &[u8]) -> Result<Option<(u64, Vec<u8>, usize)>, WireError> {
    if data.len() < HEADER_SIZE {
        return Ok(None); // Need more data for header
    }

    let header = FrameHeader::deserialize(data)?;

    if header.length < HEADER_SIZE as u32 {
        return Err(WireError::InvalidLength {
            length: header.length,
        });
    }
    if header.length as usize > HEADER_SIZE + MAX_PAYLOAD_SIZE {
        return Err(WireError::FrameTooLarge {
            size: header.length as usize - HEADER_SIZE,
        });
    }

    let expected_len = header.length as usize;
    if data.len() < expected_len {
        return Ok(None); // Need more data for payload
    }

    let payload = &data[HEADER_SIZE..expected_len];

    let computed = compute_checksum(header.call_id, payload);
    if computed != header.checksum {
        return Err(WireError::ChecksumMismatch {
            expected: header.checksum,
            actual: computed,
        });
    }

    Ok(Some((header.call_id, payload.to_vec(), expected_len)))
}

/// Read one complete frame from a stream, buffering partial data in `buf`.
///
/// Leftover bytes beyond the decoded frame stay in `buf` for the next read.
///
/// # Returns
///
/// - `Ok(Some((call_id, payload)))` when a complete frame arrives
/// - `Ok(None)` on clean EOF at a frame boundary
///
/// # Errors
///
/// - `ErrorKind::UnexpectedEof` if the stream closes mid-frame
/// - `ErrorKind::InvalidData` if the frame is malformed or corrupted
///   (callers should drop the connection; the stream can no longer be
///   trusted to be frame-aligned)
pub async fn read_frame<S: AsyncRead + Unpin>(
    stream: &mut S,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<(u64, Vec<u8>)>> {
    let mut chunk = [0u8; 4096];
    loop {
        match try_decode_frame(buf) {
            Ok(Some((call_id, payload, consumed))) => {
                buf.drain(..consumed);
                return Ok(Some((call_id, payload)));
            }
            Ok(None) => {}
            Err(e) => {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e));
            }
        }

        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            if buf.is_empty() {
                return Ok(None);
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed mid-frame",
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_roundtrip() {
        let frame = encode_frame(0x123456789ABCDEF0, b"hello world").expect("encode");
        let (call_id, payload) = decode_frame(&frame).expect("decode");

        assert_eq!(call_id, 0x123456789ABCDEF0);
        assert_eq!(payload.as_slice(), b"hello world");
    }

    #[test]
    fn test_checksum_validation() {
        let frame = encode_frame(1, b"test").expect("encode");

        // Corrupt the payload
        let mut corrupted = frame.clone();
        corrupted[HEADER_SIZE] ^= 0xFF;

        let result = decode_frame(&corrupted);
        assert!(matches!(result, Err(WireError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_checksum_header_corruption() {
        let frame = encode_frame(1, b"test").expect("encode");

        // Corrupt the call id in the header
        let mut corrupted = frame.clone();
        corrupted[10] ^= 0xFF;

        let result = decode_frame(&corrupted);
        assert!(matches!(result, Err(WireError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_insufficient_data_header() {
        let result = decode_frame(&[0u8; 10]);
        assert!(matches!(
            result,
            Err(WireError::InsufficientData {
                needed: HEADER_SIZE,
                have: 10
            })
        ));
    }

    #[test]
    fn test_insufficient_data_payload() {
        let frame = encode_frame(1, b"test data that is longer").expect("encode");

        let partial = &frame[..HEADER_SIZE + 5];
        let result = decode_frame(partial);
        assert!(matches!(result, Err(WireError::InsufficientData { .. })));
    }

    #[test]
    fn test_try_decode_partial_header() {
        let frame = encode_frame(1, b"test data").expect("encode");

        let result = try_decode_frame(&frame[..10]);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_try_decode_partial_payload() {
        let frame = encode_frame(1, b"test data").expect("encode");

        let result = try_decode_frame(&frame[..HEADER_SIZE + 2]);
        assert!(matches!(result, Ok(None)));
    }

    #[test]
    fn test_try_decode_complete() {
        let frame = encode_frame(1, b"test data").expect("encode");

        let result = try_decode_frame(&frame).expect("decode");
        let (call_id, payload, consumed) = result.expect("has data");

        assert_eq!(call_id, 1);
        assert_eq!(payload.as_slice(), b"test data");
        assert_eq!(consumed, frame.len());
    }

    #[test]
    fn test_try_decode_with_extra_data() {
        let frame = encode_frame(1, b"test").expect("encode");

        // Add extra data after the frame
        let mut extended = frame.clone();
        extended.extend_from_slice(b"extra garbage");

        let result = try_decode_frame(&extended).expect("decode");
        let (call_id, payload, consumed) = result.expect("has data");

        assert_eq!(call_id, 1);
        assert_eq!(payload.as_slice(), b"test");
        assert_eq!(consumed, frame.len()); // Only the original frame consumed
    }

    #[test]
    fn test_empty_payload() {
        let frame = encode_frame(42, &[]).expect("encode");

        assert_eq!(frame.len(), HEADER_SIZE);

        let (call_id, payload) = decode_frame(&frame).expect("decode");
        assert_eq!(call_id, 42);
        assert!(payload.is_empty());
    }

    #[test]
    fn test_frame_too_large() {
        let large_payload = vec![0u8; MAX_PAYLOAD_SIZE + 1];

        let result = encode_frame(1, &large_payload);
        assert!(matches!(result, Err(WireError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_max_size_payload() {
        let max_payload = vec![0xAB; MAX_PAYLOAD_SIZE];

        let frame = encode_frame(1, &max_payload).expect("encode");
        let (call_id, payload) = decode_frame(&frame).expect("decode");

        assert_eq!(call_id, 1);
        assert_eq!(max_payload, payload);
    }

    #[test]
    fn test_invalid_length_too_small() {
        // Frame with length field smaller than header size
        let mut bad_frame = vec![0u8; HEADER_SIZE];
        bad_frame[0..4].copy_from_slice(&10u32.to_le_bytes()); // length = 10 < 16

        let result = decode_frame(&bad_frame);
        assert!(matches!(result, Err(WireError::InvalidLength { length: 10 })));
    }

    #[test]
    fn test_try_decode_oversized_length_field() {
        // A header announcing an absurd length must fail fast rather than
        // make the reader wait for gigabytes that never arrive.
        let mut bad_frame = vec![0u8; HEADER_SIZE];
        bad_frame[0..4].copy_from_slice(&(u32::MAX).to_le_bytes());

        let result = try_decode_frame(&bad_frame);
        assert!(matches!(result, Err(WireError::FrameTooLarge { .. })));
    }

    #[test]
    fn test_header_serialization() {
        let header = FrameHeader {
            length: 100,
            checksum: 0xDEADBEEF,
            call_id: 0x1234567890ABCDEF,
        };

        let mut buf = [0u8; HEADER_SIZE];
        header.serialize_into(&mut buf);

        let deserialized = FrameHeader::deserialize(&buf).expect("deserialize");
        assert_eq!(header, deserialized);
    }

    #[test]
    fn test_frame_structure() {
        let frame = encode_frame(0x1111111111111111, b"test").expect("encode");

        assert_eq!(frame.len(), HEADER_SIZE + 4);

        // Check length field
        let length = u32::from_le_bytes([frame[0], frame[1], frame[2], frame[3]]);
        assert_eq!(length as usize, frame.len());

        // Check call id
        let call_id = u64::from_le_bytes(frame[8..16].try_into().expect("slice"));
        assert_eq!(call_id, 0x1111111111111111);

        // Check payload
        assert_eq!(&frame[HEADER_SIZE..], b"test");
    }

    #[tokio::test]
    async fn test_read_frame_stream() {
        let mut data = Vec::new();
        data.extend_from_slice(&encode_frame(1, b"first").expect("encode"));
        data.extend_from_slice(&encode_frame(2, b"second").expect("encode"));

        let mut reader = std::io::Cursor::new(data);
        let mut buf = Vec::new();

        let (id, payload) = read_frame(&mut reader, &mut buf)
            .await
            .expect("read")
            .expect("frame");
        assert_eq!(id, 1);
        assert_eq!(payload.as_slice(), b"first");

        let (id, payload) = read_frame(&mut reader, &mut buf)
            .await
            .expect("read")
            .expect("frame");
        assert_eq!(id, 2);
        assert_eq!(payload.as_slice(), b"second");

        // Clean EOF at a frame boundary
        let eof = read_frame(&mut reader, &mut buf).await.expect("read");
        assert!(eof.is_none());
    }

    #[tokio::test]
    async fn test_read_frame_mid_frame_eof() {
        let frame = encode_frame(1, b"truncated").expect("encode");
        let mut reader = std::io::Cursor::new(frame[..frame.len() - 3].to_vec());
        let mut buf = Vec::new();

        let err = read_frame(&mut reader, &mut buf)
            .await
            .expect_err("should fail");
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_read_frame_corrupted() {
        let mut frame = encode_frame(1, b"payload").expect("encode");
        frame[HEADER_SIZE] ^= 0xFF;

        let mut reader = std::io::Cursor::new(frame);
        let mut buf = Vec::new();

        let err = read_frame(&mut reader, &mut buf)
            .await
            .expect_err("should fail");
        assert_eq!(err.kind(), std::io::ErrorKind::InvalidData);
    }
}
