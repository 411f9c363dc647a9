//! An in-memory [`Tap`] that models just enough of a target's MTAP/ETAP
//! state machine to drive `target_control` and `programmer` tests without
//! hardware. Grounded on the teacher's `MockSerial`
//! (`protocol/ymodem.rs` tests).

use std::collections::VecDeque;

use super::{
    reverse8, reverse32, Tap, CONTROL_EXECUTE, CONTROL_PRACC_BIT, CONTROL_PRACC_POLL,
    ETAP_CONTROL, ETAP_DATA, MCHP_ASSERT_RST, MCHP_DE_ASSERT_RST, MCHP_ERASE, MCHP_STATUS,
    MTAP_COMMAND, STATUS_CFGRDY, STATUS_CPS, STATUS_DEVRST, STATUS_FCBUSY,
};
use crate::error::Result;

/// An in-memory target. All fields are nominal (un-reversed) values; the
/// `Tap` methods do the wire-order reversal a real TAP would do in
/// hardware.
#[derive(Debug)]
pub struct MockTap {
    status: u8,
    selected: u8,
    started: bool,
    mclr_asserted: bool,
    /// Bytes a caller of `fast_data_read` will receive, in order.
    pub fast_data_in: VecDeque<u8>,
    /// Bytes written via `fast_data_write`, in order.
    pub fast_data_out: Vec<u8>,
    /// Every EJTAG debug instruction executed via `xfer_instruction`.
    pub executed_instructions: Vec<u32>,
}

impl Default for MockTap {
    fn default() -> Self {
        Self {
            status: STATUS_CPS,
            selected: 0,
            started: false,
            mclr_asserted: false,
            fast_data_in: VecDeque::new(),
            fast_data_out: Vec::new(),
            executed_instructions: Vec::new(),
        }
    }
}

impl MockTap {
    /// A target that has not been code-protect-released yet
    /// (`STATUS_CPS` clear): `enter_serial_execution` should fail.
    #[must_use]
    pub fn not_ready() -> Self {
        Self {
            status: 0,
            ..Self::default()
        }
    }

    /// Queue bytes to be returned by subsequent `fast_data_read` calls.
    pub fn queue_fast_data(&mut self, data: &[u8]) {
        self.fast_data_in.extend(data.iter().copied());
    }

    /// Whether `start`/`stop` currently consider the link open.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether `MCLR` is currently asserted (driven low).
    #[must_use]
    pub fn mclr_asserted(&self) -> bool {
        self.mclr_asserted
    }
}

impl Tap for MockTap {
    fn send_command(&mut self, instruction: u8) -> Result<()> {
        self.selected = reverse8(instruction);
        Ok(())
    }

    fn xfer_data_32(&mut self, data: u32) -> Result<u32> {
        match self.selected {
            ETAP_CONTROL => {
                let written = reverse32(data);
                if written == CONTROL_EXECUTE {
                    return Ok(0);
                }
                debug_assert_eq!(written, CONTROL_PRACC_POLL);
                Ok(reverse32(CONTROL_PRACC_POLL | CONTROL_PRACC_BIT))
            }
            ETAP_DATA => {
                self.executed_instructions.push(reverse32(data));
                Ok(0)
            }
            _ => Ok(0),
        }
    }

    fn xfer_data_8(&mut self, data: u8) -> Result<u8> {
        if self.selected != MTAP_COMMAND {
            return Ok(0);
        }
        match reverse8(data) {
            MCHP_STATUS => Ok(reverse8(self.status)),
            MCHP_ASSERT_RST => {
                self.status |= STATUS_DEVRST;
                Ok(0)
            }
            MCHP_DE_ASSERT_RST => {
                self.status &= !STATUS_DEVRST;
                Ok(0)
            }
            MCHP_ERASE => {
                // Resolves on the very next status read, keeping erase
                // tests free of real sleeps.
                self.status = (self.status & !STATUS_FCBUSY) | STATUS_CFGRDY;
                Ok(0)
            }
            _ => Ok(0),
        }
    }

    fn fast_data_read(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.fast_data_in.len() < buf.len() {
            return Err(crate::error::Error::Timeout);
        }
        for slot in buf.iter_mut() {
            #[allow(clippy::unwrap_used)]
            {
                *slot = self.fast_data_in.pop_front().unwrap();
            }
        }
        Ok(())
    }

    fn fast_data_write(&mut self, buf: &[u8]) -> Result<()> {
        self.fast_data_out.extend_from_slice(buf);
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        self.started = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.started = false;
        Ok(())
    }

    fn set_mclr(&mut self, asserted: bool) -> Result<()> {
        self.mclr_asserted = asserted;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn xfer_instruction_records_the_instruction() {
        let mut tap = MockTap::default();
        tap.xfer_instruction(0xDEAD_BEEF).unwrap();
        assert_eq!(tap.executed_instructions, vec![0xDEAD_BEEF]);
    }

    #[test]
    fn start_stop_track_link_state() {
        let mut tap = MockTap::default();
        assert!(!tap.is_started());
        tap.start().unwrap();
        assert!(tap.is_started());
        tap.stop().unwrap();
        assert!(!tap.is_started());
    }
}
