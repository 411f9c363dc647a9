//! In-memory `Flash`/`FastData` backends for ramapp tests.

use std::collections::VecDeque;

use super::{FastData, Flash};
use crate::error::Result;

/// A flat byte array standing in for the target's flash controller.
/// Asynchronous writes complete immediately — there is no latency to
/// simulate for a mock, only the ordering contract (`async_wait` before
/// the row may be read back).
#[derive(Debug)]
pub struct MockFlash {
    cells: Vec<u8>,
}

impl MockFlash {
    /// Build a mock flash of `size` bytes, erased to `0xFF`.
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            cells: vec![0xFF; size],
        }
    }
}

impl Flash for MockFlash {
    fn erase(&mut self, address: u32, size: u32) -> Result<()> {
        let start = address as usize;
        let end = start + size as usize;
        self.cells[start..end].fill(0xFF);
        Ok(())
    }

    fn read(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let start = address as usize;
        buf.copy_from_slice(&self.cells[start..start + buf.len()]);
        Ok(())
    }

    fn write(&mut self, address: u32, data: &[u8]) -> Result<usize> {
        let start = address as usize;
        self.cells[start..start + data.len()].copy_from_slice(data);
        Ok(data.len())
    }

    fn async_write_row(&mut self, address: u32, data: &[u8]) -> Result<()> {
        self.write(address, data).map(|_| ())
    }

    fn async_wait(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An in-memory [`FastData`] register: reads drain a queue, writes
/// accumulate for inspection — same shape as `channel::MockChannel`.
#[derive(Debug, Default)]
pub struct MockFastData {
    input: VecDeque<u8>,
    /// Everything written to the register so far, in order.
    pub output: Vec<u8>,
}

impl MockFastData {
    /// Queue bytes to be returned by subsequent `fast_data_read` calls.
    pub fn queue_input(&mut self, data: &[u8]) {
        self.input.extend(data.iter().copied());
    }
}

impl FastData for MockFastData {
    fn fast_data_read(&mut self, buf: &mut [u8]) -> Result<()> {
        if self.input.len() < buf.len() {
            return Err(crate::error::Error::Timeout);
        }
        for slot in buf.iter_mut() {
            #[allow(clippy::unwrap_used)]
            {
                *slot = self.input.pop_front().unwrap();
            }
        }
        Ok(())
    }

    fn fast_data_write(&mut self, buf: &[u8]) -> Result<()> {
        self.output.extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read_round_trips() {
        let mut flash = MockFlash::new(16);
        flash.write(0, &[1, 2, 3, 4]).unwrap();
        let mut buf = [0u8; 4];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [1, 2, 3, 4]);
    }

    #[test]
    fn erase_resets_to_0xff() {
        let mut flash = MockFlash::new(16);
        flash.write(0, &[1, 2, 3, 4]).unwrap();
        flash.erase(0, 4).unwrap();
        let mut buf = [0u8; 4];
        flash.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0xFF; 4]);
    }
}
