//! The ramapp's packet engine: reads a request off the fast-data register,
//! dispatches it against a `Flash`, frames the reply, and writes it back
//! over the same register. Unlike the programmer side, every reply here is
//! framed — there is no raw/unframed fast path.

pub mod fast_write;
#[cfg(any(test, feature = "mock"))]
pub mod mock;

use log::{trace, warn};

use crate::error::{Error, Result};
use crate::framing::{decode_header, encode_failure, encode_success, verify_crc, CRC_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE};

/// No-op liveness check.
pub const PING: u16 = 1;
/// Erase a region of flash.
pub const ERASE: u16 = 2;
/// Read a region of flash.
pub const READ: u16 = 3;
/// Write a region of flash, with a synchronous read-back verify.
pub const WRITE: u16 = 4;
/// Stream-write a region via the double-buffered pipeline.
pub const FAST_WRITE: u16 = 106;

/// The target-side physical flash controller. The controller itself is out
/// of scope; this is the behavioral interface ramapp programs against,
/// grounded on the teacher's `ChipOps` trait shape (a mock-friendly
/// capability set with default methods).
pub trait Flash {
    /// Erase `size` bytes starting at `address`.
    fn erase(&mut self, address: u32, size: u32) -> Result<()>;

    /// Read `buf.len()` bytes starting at `address`.
    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()>;

    /// Write `data` starting at `address`, returning the number of bytes
    /// actually written (compared against `data.len()` by the caller).
    fn write(&mut self, address: u32, data: &[u8]) -> Result<usize>;

    /// Begin an asynchronous write of one flash row. Must be followed by
    /// `async_wait` before the row may be read or overwritten.
    fn async_write_row(&mut self, address: u32, data: &[u8]) -> Result<()>;

    /// Block until the outstanding `async_write_row` completes.
    fn async_wait(&mut self) -> Result<()>;

    /// Word-wise verify: does the flash at `address` already hold `data`?
    /// Default implementation reads back and compares; a real controller
    /// may override this to compare 32-bit-wise without an intermediate
    /// buffer.
    fn compare_row(&mut self, address: u32, data: &[u8]) -> Result<bool> {
        let mut readback = vec![0u8; data.len()];
        self.read(address, &mut readback)?;
        Ok(readback == data)
    }
}

/// The target-side half of the fast-data register: the same role
/// `Tap::fast_data_read/write` plays for the programmer, but driven from
/// inside the target rather than over ICSP.
pub trait FastData {
    /// Read `buf.len()` bytes from the register.
    fn fast_data_read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` to the register.
    fn fast_data_write(&mut self, buf: &[u8]) -> Result<()>;
}

/// Drives one ramapp request/response cycle at a time.
pub struct RamappEngine<F: Flash, D: FastData> {
    flash: F,
    fast_data: D,
}

impl<F: Flash, D: FastData> RamappEngine<F, D> {
    /// Build an engine over a flash controller and a fast-data register.
    pub fn new(flash: F, fast_data: D) -> Self {
        Self { flash, fast_data }
    }

    /// Borrow the flash controller.
    pub fn flash(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Borrow the fast-data register.
    pub fn fast_data(&mut self) -> &mut D {
        &mut self.fast_data
    }

    /// Read, dispatch and reply to one request.
    pub fn process_one(&mut self) -> Result<()> {
        match self.handle_one() {
            Ok(frame) => {
                trace!("replying with {} bytes", frame.len());
                self.fast_data.fast_data_write(&frame)?;
                Ok(())
            }
            Err(err) => {
                warn!("request failed: {err} (code {})", err.code());
                self.fast_data.fast_data_write(&encode_failure(err.code()))?;
                Ok(())
            }
        }
    }

    fn read_request(&mut self) -> Result<Vec<u8>> {
        let mut header = [0u8; HEADER_SIZE];
        self.fast_data.fast_data_read(&mut header)?;
        let parsed = decode_header(&header);
        // The ramapp side rejects an oversized declared length with EINVAL,
        // not EMSGSIZE — an asymmetry with the programmer side confirmed
        // from the original implementation.
        if parsed.length > MAX_PAYLOAD_SIZE {
            return Err(Error::Invalid("ramapp request exceeds maximum payload size"));
        }
        let mut rest = vec![0u8; parsed.length as usize + CRC_SIZE];
        self.fast_data.fast_data_read(&mut rest)?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + rest.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&rest);
        Ok(frame)
    }

    fn handle_one(&mut self) -> Result<Vec<u8>> {
        let request = self.read_request()?;
        if !verify_crc(&request) {
            return Err(Error::BadCrc);
        }
        let header = decode_header(&request[0..HEADER_SIZE]);
        let body_end = request.len() - CRC_SIZE;
        let payload = &request[HEADER_SIZE..body_end];

        match header.command {
            PING => Ok(encode_success(PING, &[])),
            ERASE => {
                self.handle_erase(payload)?;
                Ok(encode_success(ERASE, &[]))
            }
            READ => {
                let data = self.handle_read(payload)?;
                Ok(encode_success(READ, &data))
            }
            WRITE => {
                self.handle_write(payload)?;
                Ok(encode_success(WRITE, &[]))
            }
            FAST_WRITE => {
                fast_write::run(&mut self.flash, &mut self.fast_data, payload)?;
                Ok(encode_success(FAST_WRITE, &[]))
            }
            _ => Err(Error::NoCommand),
        }
    }

    fn handle_erase(&mut self, payload: &[u8]) -> Result<()> {
        let (address, size) = read_addr_size(payload)?;
        self.flash.erase(address, size)
    }

    fn handle_read(&mut self, payload: &[u8]) -> Result<Vec<u8>> {
        let (address, size) = read_addr_size(payload)?;
        let mut buf = vec![0u8; size as usize];
        self.flash.read(address, &mut buf)?;
        Ok(buf)
    }

    fn handle_write(&mut self, payload: &[u8]) -> Result<()> {
        let (address, size) = read_addr_size(payload)?;
        let size = size as usize;
        if payload.len() < 8 + size {
            return Err(Error::Invalid("write payload shorter than declared size"));
        }
        let data = &payload[8..8 + size];
        let written = self.flash.write(address, data)?;
        if written != size {
            return Err(Error::FlashWrite);
        }
        let mut readback = vec![0u8; size];
        self.flash.read(address, &mut readback)?;
        if readback == data {
            Ok(())
        } else {
            Err(Error::FlashWrite)
        }
    }
}

fn read_addr_size(payload: &[u8]) -> Result<(u32, u32)> {
    if payload.len() < 8 {
        return Err(Error::Invalid("payload too short for address/size"));
    }
    let address = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let size = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    Ok((address, size))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::framing::encode_success;
    use crate::ramapp::mock::{MockFastData, MockFlash};

    fn engine() -> RamappEngine<MockFlash, MockFastData> {
        RamappEngine::new(MockFlash::new(4096), MockFastData::default())
    }

    #[test]
    fn ping_replies_success() {
        let mut eng = engine();
        eng.fast_data().queue_input(&encode_success(PING, &[]));
        eng.process_one().unwrap();
        assert_eq!(eng.fast_data().output, encode_success(PING, &[]));
    }

    #[test]
    fn write_then_read_round_trips() {
        let mut eng = engine();
        let mut write_payload = vec![];
        write_payload.extend_from_slice(&100u32.to_be_bytes());
        write_payload.extend_from_slice(&4u32.to_be_bytes());
        write_payload.extend_from_slice(&[1, 2, 3, 4]);
        eng.fast_data().queue_input(&encode_success(WRITE, &write_payload));
        eng.process_one().unwrap();
        assert_eq!(eng.fast_data().output, encode_success(WRITE, &[]));

        let mut read_payload = vec![];
        read_payload.extend_from_slice(&100u32.to_be_bytes());
        read_payload.extend_from_slice(&4u32.to_be_bytes());
        eng.fast_data().output.clear();
        eng.fast_data().queue_input(&encode_success(READ, &read_payload));
        eng.process_one().unwrap();
        assert_eq!(eng.fast_data().output, encode_success(READ, &[1, 2, 3, 4]));
    }

    #[test]
    fn unknown_command_replies_enocommand() {
        let mut eng = engine();
        eng.fast_data().queue_input(&encode_success(99, &[]));
        eng.process_one().unwrap();
        assert_eq!(eng.fast_data().output, encode_failure(-1008));
    }

    #[test]
    fn oversized_declared_length_replies_einval() {
        let mut eng = engine();
        // Header only, declaring a length beyond MAX_PAYLOAD_SIZE; no
        // payload bytes need to follow since the engine rejects before
        // reading them.
        let mut header = vec![0x00, 0x01];
        header.extend_from_slice(&(MAX_PAYLOAD_SIZE + 1).to_be_bytes());
        eng.fast_data().queue_input(&header);
        eng.process_one().unwrap();
        assert_eq!(eng.fast_data().output, encode_failure(-22));
    }
}
