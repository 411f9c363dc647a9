//! EJTAG/MTAP transport: the bit-reversal helpers, the named TAP/MTAP
//! constants, and the `Tap` trait the target-control and programmer layers
//! program against. The bit-banged ICSP primitives underneath a `Tap`
//! implementation are out of scope — this module only defines the seam.

use std::time::{Duration, Instant};

use crate::error::{Error, Result};

#[cfg(any(test, feature = "mock"))]
pub mod mock;

/// How long `xfer_instruction` polls for the `PrAcc` handshake bit before
/// giving up.
pub const PRACC_TIMEOUT: Duration = Duration::from_millis(500);

/// Reverse the bit order of a byte. The wire shifts LSB-first; every named
/// constant in this module is declared MSB-first and reversed here, at the
/// point of use, rather than baked pre-reversed into the constant.
#[must_use]
pub const fn reverse8(value: u8) -> u8 {
    value.reverse_bits()
}

/// Reverse the bit order of a 32-bit word, same rationale as [`reverse8`].
#[must_use]
pub const fn reverse32(value: u32) -> u32 {
    value.reverse_bits()
}

// MTAP instructions (5-bit TAP instruction register values, MSB-first).
/// Select the MTAP (Microchip TAP) data register chain.
pub const MTAP_SW_MTAP: u8 = 0x04;
/// Select the ETAP (EJTAG TAP) data register chain.
pub const MTAP_SW_ETAP: u8 = 0x05;
/// Issue an 8-bit MCHP command through the MTAP data register.
pub const MTAP_COMMAND: u8 = 0x07;
/// Read the 32-bit IDCODE register.
pub const MTAP_IDCODE: u8 = 0x01;

// ETAP instructions.
/// Address register, used by the debug-instruction single-step sequence.
pub const ETAP_ADDRESS: u8 = 0x08;
/// Data register, used to shift the instruction word to execute.
pub const ETAP_DATA: u8 = 0x09;
/// Control register, used to poll `PrAcc` and to step the processor.
pub const ETAP_CONTROL: u8 = 0x0A;
/// Forces the target into EJTAG debug mode on the next reset.
pub const ETAP_EJTAGBOOT: u8 = 0x0C;
/// Fast-data register, the 32-bit memory-mapped channel ramapp replies over.
pub const ETAP_FASTDATA: u8 = 0x0E;

// MCHP_COMMAND 8-bit values shifted through MTAP_COMMAND.
/// Read the device status byte.
pub const MCHP_STATUS: u8 = 0x00;
/// Assert the device reset line.
pub const MCHP_ASSERT_RST: u8 = 0xD1;
/// De-assert the device reset line.
pub const MCHP_DE_ASSERT_RST: u8 = 0xD0;
/// Begin a chip erase.
pub const MCHP_ERASE: u8 = 0xFC;

// Status byte bits, nominal (un-reversed) positions.
/// Code-protect state bit.
pub const STATUS_CPS: u8 = 1 << 7;
/// NVM error bit.
pub const STATUS_NVMERR: u8 = 1 << 5;
/// Configuration-ready bit, set once chip erase completes.
pub const STATUS_CFGRDY: u8 = 1 << 3;
/// Flash-controller-busy bit, clear once chip erase completes.
pub const STATUS_FCBUSY: u8 = 1 << 2;
/// Device-in-reset bit.
pub const STATUS_DEVRST: u8 = 1;

/// Control-register value written before polling; the readback is masked
/// against [`CONTROL_PRACC_BIT`].
pub const CONTROL_PRACC_POLL: u32 = 0x0004_C000;
/// Bit within a [`CONTROL_PRACC_POLL`] readback that signals the processor
/// is waiting for the next debug instruction.
pub const CONTROL_PRACC_BIT: u32 = 0x0004_0000;
/// Control-register value that steps the processor over the instruction
/// just shifted into the data register.
pub const CONTROL_EXECUTE: u32 = 0x0000_C000;

/// The hardware seam for driving a target's EJTAG TAP and fast-data
/// register. Grounded on `hisiflash`'s `ConnectionPort`/`Port` traits,
/// which play the identical role of "the trait the protocol layer programs
/// against, implemented natively or by a mock".
pub trait Tap {
    /// Shift a 5-bit TAP instruction (already in wire bit order).
    fn send_command(&mut self, instruction: u8) -> Result<()>;

    /// Shift 32 bits of data through the selected register, returning
    /// whatever was shifted out.
    fn xfer_data_32(&mut self, data: u32) -> Result<u32>;

    /// Shift 8 bits of data through the selected register (used for MCHP
    /// commands and the status byte, which are byte-wide).
    fn xfer_data_8(&mut self, data: u8) -> Result<u8>;

    /// Read `buf.len()` bytes from the fast-data register, MSB-first,
    /// padded to whole 32-bit words.
    fn fast_data_read(&mut self, buf: &mut [u8]) -> Result<()>;

    /// Write `buf` to the fast-data register, MSB-first, padded to whole
    /// 32-bit words.
    fn fast_data_write(&mut self, buf: &[u8]) -> Result<()>;

    /// Initialize and begin driving the ICSP lines.
    fn start(&mut self) -> Result<()>;

    /// Release the ICSP lines.
    fn stop(&mut self) -> Result<()>;

    /// Drive (or release, high-Z) the target's `MCLR` pin, for `reset`.
    fn set_mclr(&mut self, asserted: bool) -> Result<()>;

    /// Shift one EJTAG debug instruction: poll `PrAcc`, write it to the
    /// data register, then step the processor over it. Built purely from
    /// `send_command`/`xfer_data_32`; carries the 500ms `PrAcc`-poll
    /// deadline.
    fn xfer_instruction(&mut self, instruction: u32) -> Result<()> {
        self.send_command(reverse8(ETAP_CONTROL))?;
        let deadline = Instant::now() + PRACC_TIMEOUT;
        loop {
            let status = reverse32(self.xfer_data_32(reverse32(CONTROL_PRACC_POLL))?);
            if status & CONTROL_PRACC_BIT != 0 {
                break;
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
        self.send_command(reverse8(ETAP_DATA))?;
        self.xfer_data_32(reverse32(instruction))?;
        self.send_command(reverse8(ETAP_CONTROL))?;
        self.xfer_data_32(reverse32(CONTROL_EXECUTE))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reverse8_is_involutive() {
        for value in 0..=255u8 {
            assert_eq!(reverse8(reverse8(value)), value);
        }
    }

    #[test]
    fn reverse8_known_value() {
        assert_eq!(reverse8(0b1000_0001), 0b1000_0001);
        assert_eq!(reverse8(0b1100_0000), 0b0000_0011);
    }

    #[test]
    fn reverse32_known_value() {
        assert_eq!(reverse32(0x0000_0001), 0x8000_0000);
        assert_eq!(reverse32(0xFFFF_FFFF), 0xFFFF_FFFF);
    }
}
