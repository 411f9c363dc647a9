//! Host-side half of the fast-write pipeline: stream a binary image from
//! the host channel to the ramapp's fast-data register in 256-byte chunks,
//! ACKing each one back to the host.
//!
//! Control record — the resolved 18-byte-frame wire format (header 4 +
//! payload 12 + CRC 2): `addr: u32 BE`, `total_size: u32 BE`,
//! `expected_crc: u16 BE`, `reserved: u16` (always `0x0000`).

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::tap::Tap;
use crate::target_control::TargetControl;

/// Size of the fast-write control payload (address + total size + expected
/// CRC + reserved).
pub const CONTROL_PAYLOAD_SIZE: usize = 12;
/// Size of each streamed flash row.
pub const CHUNK_SIZE: usize = 256;
/// 2-byte acknowledgement the programmer writes back to the host after
/// forwarding each chunk.
pub const CHUNK_ACK: [u8; 2] = [0x00, 0x00];

struct ControlRecord {
    #[allow(dead_code)]
    addr: u32,
    total_size: u32,
}

fn parse_control(payload: &[u8]) -> Result<ControlRecord> {
    if payload.len() != CONTROL_PAYLOAD_SIZE {
        return Err(Error::MessageSize);
    }
    let addr = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let total_size = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    if total_size == 0 || total_size % CHUNK_SIZE as u32 != 0 {
        return Err(Error::Invalid("fast-write size must be a nonzero multiple of 256"));
    }
    Ok(ControlRecord { addr, total_size })
}

/// Relay the control frame to the ramapp, then stream `total_size` bytes
/// from `channel` to the target in `CHUNK_SIZE` pieces, ACKing each on the
/// host channel. Does not read the ramapp's final reply — the caller does
/// that with its own framed read, since the reply is relayed to the host
/// verbatim rather than built here.
pub fn run<T: Tap, C: Channel>(
    target: &mut TargetControl<T>,
    channel: &mut C,
    payload: &[u8],
    control_frame: &[u8],
) -> Result<()> {
    let control = parse_control(payload)?;
    target.tap().fast_data_write(control_frame)?;

    let mut remaining = control.total_size;
    while remaining > 0 {
        let mut chunk = [0u8; CHUNK_SIZE];
        channel.read_exact_timeout(&mut chunk, crate::programmer::REQUEST_TIMEOUT)?;
        target.tap().fast_data_write(&chunk)?;
        channel.write_all(&CHUNK_ACK)?;
        remaining -= CHUNK_SIZE as u32;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MockChannel;
    use crate::tap::mock::MockTap;

    fn control_frame(addr: u32, total_size: u32, expected_crc: u16) -> (Vec<u8>, Vec<u8>) {
        let mut payload = Vec::with_capacity(CONTROL_PAYLOAD_SIZE);
        payload.extend_from_slice(&addr.to_be_bytes());
        payload.extend_from_slice(&total_size.to_be_bytes());
        payload.extend_from_slice(&expected_crc.to_be_bytes());
        payload.extend_from_slice(&[0, 0]);
        let frame = crate::framing::encode_success(crate::programmer::FAST_WRITE, &payload);
        (payload, frame)
    }

    #[test]
    fn streams_whole_rows_and_acks_each_one() {
        let (payload, frame) = control_frame(0x1000, 512, 0xABCD);
        let mut target = TargetControl::new(MockTap::default());
        let mut channel = MockChannel::with_input(&[0xAAu8; 512]);
        run(&mut target, &mut channel, &payload, &frame).unwrap();
        assert_eq!(channel.written, [CHUNK_ACK, CHUNK_ACK].concat());
        assert_eq!(target.tap().fast_data_out.len(), frame.len() + 512);
    }

    #[test]
    fn rejects_size_not_a_multiple_of_256() {
        let (payload, frame) = control_frame(0x1000, 300, 0xABCD);
        let mut target = TargetControl::new(MockTap::default());
        let mut channel = MockChannel::default();
        let err = run(&mut target, &mut channel, &payload, &frame).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn rejects_zero_size() {
        let (payload, frame) = control_frame(0x1000, 0, 0xABCD);
        let mut target = TargetControl::new(MockTap::default());
        let mut channel = MockChannel::default();
        let err = run(&mut target, &mut channel, &payload, &frame).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn rejects_wrong_control_payload_length() {
        let mut target = TargetControl::new(MockTap::default());
        let mut channel = MockChannel::default();
        let err = run(&mut target, &mut channel, &[0u8; 4], &[]).unwrap_err();
        assert!(matches!(err, Error::MessageSize));
    }
}
