//! The EJTAG bring-up sequence: entering serial execution mode, uploading
//! the ramapp instruction stream, and the two MTAP commands (`device
//! status`, `chip erase`) the programmer issues directly.

use std::time::{Duration, Instant};

use log::{debug, trace};

use crate::error::{Error, Result};
use crate::tap::{
    reverse8, Tap, ETAP_EJTAGBOOT, MCHP_ASSERT_RST, MCHP_DE_ASSERT_RST, MCHP_ERASE, MCHP_STATUS,
    MTAP_COMMAND, MTAP_SW_ETAP, MTAP_SW_MTAP, STATUS_CFGRDY, STATUS_CPS, STATUS_FCBUSY,
};

/// How long `chip_erase` polls the status register before giving up.
pub const ERASE_TIMEOUT: Duration = Duration::from_secs(3);

/// The instruction that starts the uploaded ramapp executing.
pub const RAMAPP_START_INSTRUCTION: u32 = 0x0000_0000;

/// Owns a `Tap` and drives the sequence that gets a target from power-on
/// into a running ramapp.
pub struct TargetControl<T: Tap> {
    tap: T,
}

impl<T: Tap> TargetControl<T> {
    /// Wrap a `Tap`.
    pub fn new(tap: T) -> Self {
        Self { tap }
    }

    /// Consume self, returning the wrapped `Tap`.
    pub fn into_inner(self) -> T {
        self.tap
    }

    /// Borrow the wrapped `Tap`.
    pub fn tap(&mut self) -> &mut T {
        &mut self.tap
    }

    fn mtap_command(&mut self) -> Result<()> {
        self.tap.send_command(reverse8(MTAP_SW_MTAP))?;
        self.tap.send_command(reverse8(MTAP_COMMAND))?;
        Ok(())
    }

    fn mchp_status(&mut self) -> Result<u8> {
        let raw = self.tap.xfer_data_8(reverse8(MCHP_STATUS))?;
        Ok(reverse8(raw))
    }

    /// Drop the target into EJTAG serial execution mode, ready to receive
    /// the ramapp instruction stream. Fails with [`Error::Protocol`] if the
    /// device reports code-protect engaged (`STATUS_CPS` clear).
    pub fn enter_serial_execution(&mut self) -> Result<()> {
        self.mtap_command()?;
        let status = self.mchp_status()?;
        if status & STATUS_CPS == 0 {
            debug!("code-protect engaged (status=0x{status:02X}), refusing to enter serial execution");
            return Err(Error::Protocol);
        }
        self.tap.xfer_data_8(reverse8(MCHP_ASSERT_RST))?;
        self.tap.send_command(reverse8(MTAP_SW_ETAP))?;
        self.tap.send_command(reverse8(ETAP_EJTAGBOOT))?;
        self.mtap_command()?;
        self.tap.xfer_data_8(reverse8(MCHP_DE_ASSERT_RST))?;
        self.tap.send_command(reverse8(MTAP_SW_ETAP))?;
        Ok(())
    }

    /// Shift each word of the generated ramapp instruction stream into the
    /// target and start it. `instructions` is supplied by the caller — the
    /// generated stream itself is out of scope.
    pub fn upload_ramapp(&mut self, instructions: &[u32]) -> Result<()> {
        debug!("uploading {} ramapp instructions", instructions.len());
        for &instruction in instructions {
            self.tap.xfer_instruction(instruction)?;
        }
        self.tap.xfer_instruction(RAMAPP_START_INSTRUCTION)
    }

    /// Read the raw target status byte (`device_status` command).
    pub fn read_device_status(&mut self) -> Result<u8> {
        self.mtap_command()?;
        self.mchp_status()
    }

    /// Erase the whole chip, polling until `CFGRDY` is set and `FCBUSY` is
    /// clear or `ERASE_TIMEOUT` elapses.
    pub fn chip_erase(&mut self) -> Result<()> {
        self.mtap_command()?;
        self.tap.xfer_data_8(reverse8(MCHP_ERASE))?;
        self.tap.xfer_data_8(reverse8(MCHP_DE_ASSERT_RST))?;

        let deadline = Instant::now() + ERASE_TIMEOUT;
        loop {
            let status = self.mchp_status()?;
            trace!("erase poll: status=0x{status:02X}");
            if status & (STATUS_FCBUSY | STATUS_CFGRDY) == STATUS_CFGRDY {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::Timeout);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tap::mock::MockTap;

    #[test]
    fn enter_serial_execution_succeeds_when_cps_set() {
        let mut ctl = TargetControl::new(MockTap::default());
        ctl.enter_serial_execution().unwrap();
    }

    #[test]
    fn enter_serial_execution_fails_protocol_when_code_protected() {
        let mut ctl = TargetControl::new(MockTap::not_ready());
        let err = ctl.enter_serial_execution().unwrap_err();
        assert!(matches!(err, Error::Protocol));
    }

    #[test]
    fn upload_ramapp_shifts_every_instruction_then_starts() {
        let mut ctl = TargetControl::new(MockTap::default());
        ctl.upload_ramapp(&[1, 2, 3]).unwrap();
        let executed = &ctl.tap().executed_instructions;
        assert_eq!(executed, &[1, 2, 3, RAMAPP_START_INSTRUCTION]);
    }

    #[test]
    fn read_device_status_returns_raw_byte() {
        let mut ctl = TargetControl::new(MockTap::default());
        let status = ctl.read_device_status().unwrap();
        assert_eq!(status, STATUS_CPS);
    }

    #[test]
    fn chip_erase_completes_once_cfgrdy_is_set() {
        let mut ctl = TargetControl::new(MockTap::default());
        ctl.chip_erase().unwrap();
        let status = ctl.read_device_status().unwrap();
        assert_eq!(status & STATUS_CFGRDY, STATUS_CFGRDY);
        assert_eq!(status & STATUS_FCBUSY, 0);
    }
}
