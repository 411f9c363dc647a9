//! The frame codec shared by both wires: 2-byte BE type, 2-byte BE length,
//! payload, 2-byte BE CRC-CCITT-FALSE over everything before it.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};

use crate::crc::crc_ccitt_false;

/// Largest payload a frame may carry.
pub const MAX_PAYLOAD_SIZE: u16 = 1024;
/// Bytes occupied by the type + length header.
pub const HEADER_SIZE: usize = 4;
/// Bytes occupied by the trailing CRC.
pub const CRC_SIZE: usize = 2;
/// Command type reserved for failure frames.
pub const FAILURE_TYPE: u16 = 0xFFFF;

/// The parsed type + length header of a frame, before the payload and CRC
/// have been read off the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Command type (`< 100` ramapp passthrough, `>= 100` programmer command,
    /// or `0xFFFF` for a failure frame).
    pub command: u16,
    /// Declared payload length, not yet validated against
    /// [`MAX_PAYLOAD_SIZE`] — callers apply their own endpoint-specific
    /// bound (`EMSGSIZE` on the programmer side, `EINVAL` on the ramapp
    /// side).
    pub length: u16,
}

/// Parse the 4-byte type+length header. `bytes` must be exactly 4 bytes.
#[must_use]
pub fn decode_header(bytes: &[u8]) -> FrameHeader {
    debug_assert_eq!(bytes.len(), HEADER_SIZE);
    let mut cursor = bytes;
    let command = cursor.read_u16::<BigEndian>().unwrap_or(0);
    let length = cursor.read_u16::<BigEndian>().unwrap_or(0);
    FrameHeader { command, length }
}

/// Compute the CRC over `header + payload` (everything but the trailing
/// CRC field itself).
#[must_use]
pub fn frame_crc(command: u16, payload: &[u8]) -> u16 {
    let mut head = [0u8; HEADER_SIZE];
    #[allow(clippy::unwrap_used)]
    {
        let mut cursor: &mut [u8] = &mut head;
        cursor.write_u16::<BigEndian>(command).unwrap();
        cursor.write_u16::<BigEndian>(payload.len() as u16).unwrap();
    }
    let seed = crc_ccitt_false(0xFFFF, &head);
    crc_ccitt_false(seed, payload)
}

/// Verify that `buf` (a complete frame: header + payload + CRC) carries a
/// correct trailing CRC. `buf` must be at least `HEADER_SIZE + CRC_SIZE`
/// bytes.
#[must_use]
pub fn verify_crc(buf: &[u8]) -> bool {
    if buf.len() < HEADER_SIZE + CRC_SIZE {
        return false;
    }
    let body_len = buf.len() - CRC_SIZE;
    let expected = crc_ccitt_false(0xFFFF, &buf[..body_len]);
    let actual = u16::from_be_bytes([buf[body_len], buf[body_len + 1]]);
    expected == actual
}

/// Build a successful response frame: `command` with `payload`, CRC appended.
#[must_use]
pub fn encode_success(command: u16, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    #[allow(clippy::unwrap_used)]
    {
        buf.write_u16::<BigEndian>(command).unwrap();
        buf.write_u16::<BigEndian>(payload.len() as u16).unwrap();
        buf.extend_from_slice(payload);
        let crc = crc_ccitt_false(0xFFFF, &buf);
        buf.write_u16::<BigEndian>(crc).unwrap();
    }
    buf
}

/// Build a failure frame: type `0xFFFF`, 4-byte payload holding `code` as a
/// signed big-endian `i32`, CRC appended.
#[must_use]
pub fn encode_failure(code: i32) -> Vec<u8> {
    encode_success(FAILURE_TYPE, &code.to_be_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_header_reads_type_and_length() {
        let header = decode_header(&[0x00, 0x64, 0x00, 0x05]);
        assert_eq!(header.command, 100);
        assert_eq!(header.length, 5);
    }

    #[test]
    fn encode_success_round_trips_through_verify_crc() {
        let frame = encode_success(100, &[]);
        assert_eq!(&frame[0..4], &[0x00, 0x64, 0x00, 0x00]);
        assert_eq!(frame.len(), 6);
        assert!(verify_crc(&frame));
    }

    #[test]
    fn encode_failure_matches_spec_scenario_enotconn() {
        // disconnect while not connected -> type 0xFFFF, len 4, payload -107
        let frame = encode_failure(-107);
        assert_eq!(&frame[0..4], &[0xFF, 0xFF, 0x00, 0x04]);
        assert_eq!(&frame[4..8], &(-107i32).to_be_bytes());
        assert!(verify_crc(&frame));
    }

    #[test]
    fn verify_crc_rejects_corrupted_payload() {
        let mut frame = encode_success(100, &[1, 2, 3]);
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;
        assert!(!verify_crc(&frame));
    }

    #[test]
    fn frame_crc_matches_what_encode_success_appends() {
        let payload = [0xAA, 0xBB];
        let frame = encode_success(42, &payload);
        let crc = frame_crc(42, &payload);
        assert_eq!(&frame[frame.len() - 2..], &crc.to_be_bytes());
    }
}
