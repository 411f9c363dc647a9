//! Target-side half of the fast-write pipeline: the double-buffered
//! streaming write with row-wise verify, run from inside the ramapp.
//!
//! Three phases, exactly mirroring the original's `handle_fast_write`:
//! prime the pipeline with the first row, then for every subsequent row
//! read the next row into the other buffer while the previous row's write
//! completes, verify the completed row, and start writing the new one;
//! finally wait for and verify the last row and check the running CRC.

use crate::crc::crc_ccitt_false;
use crate::error::{Error, Result};
use crate::ramapp::{Flash, FastData};

/// Bytes streamed and written per row.
pub const FLASH_ROW_SIZE: usize = 256;
/// Size of the control record this pipeline expects as its payload.
pub const CONTROL_PAYLOAD_SIZE: usize = 12;

/// Run the pipeline. `payload` is the 12-byte control record (address,
/// total size, expected CRC, reserved) already stripped of its frame
/// header and CRC by the caller.
pub fn run<F: Flash, D: FastData>(flash: &mut F, fast_data: &mut D, payload: &[u8]) -> Result<()> {
    if payload.len() != CONTROL_PAYLOAD_SIZE {
        return Err(Error::Invalid("fast-write control record must be 12 bytes"));
    }
    let address = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    let total_size = u32::from_be_bytes([payload[4], payload[5], payload[6], payload[7]]);
    let expected_crc = u16::from_be_bytes([payload[8], payload[9]]);
    if total_size == 0 || total_size % FLASH_ROW_SIZE as u32 != 0 {
        return Err(Error::Invalid("fast-write size must be a nonzero multiple of 256"));
    }

    let mut buffers = [[0u8; FLASH_ROW_SIZE]; 2];

    fast_data.fast_data_read(&mut buffers[0])?;
    flash.async_write_row(address, &buffers[0])?;
    let mut actual_crc = crc_ccitt_false(0xFFFF, &buffers[0]);

    let mut index = 0usize;
    let mut offset = FLASH_ROW_SIZE as u32;
    while offset < total_size {
        index ^= 1;
        fast_data.fast_data_read(&mut buffers[index])?;
        flash.async_wait()?;
        let written_addr = address + offset - FLASH_ROW_SIZE as u32;
        if !flash.compare_row(written_addr, &buffers[index ^ 1])? {
            return Err(Error::FlashWrite);
        }
        flash.async_write_row(address + offset, &buffers[index])?;
        actual_crc = crc_ccitt_false(actual_crc, &buffers[index]);
        offset += FLASH_ROW_SIZE as u32;
    }

    flash.async_wait()?;
    let written_addr = address + offset - FLASH_ROW_SIZE as u32;
    if !flash.compare_row(written_addr, &buffers[index])? {
        return Err(Error::FlashWrite);
    }
    if actual_crc != expected_crc {
        return Err(Error::BadCrc);
    }
    Ok(())
}
