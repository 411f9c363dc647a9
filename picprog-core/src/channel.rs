//! The byte-stream-with-timeout abstraction the programmer's host link is
//! built on. The physical transport (USB CDC-ACM) is out of scope; this
//! trait is the shape the packet engine programs against, exactly as
//! `hisiflash`'s `ConnectionPort`/`Port` traits describe a scope they don't
//! themselves implement on every target.

use std::time::Duration;

use crate::error::{Error, Result};

/// A duplex byte stream that can bound a read by a deadline.
pub trait Channel {
    /// Read exactly `buf.len()` bytes, failing with [`Error::Timeout`] if
    /// `timeout` elapses before they all arrive.
    fn read_exact_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()>;

    /// Write `buf` in full.
    fn write_all(&mut self, buf: &[u8]) -> Result<()>;
}

/// An in-memory [`Channel`] backed by fixed read/write buffers, for tests.
/// Grounded on the teacher's `MockSerial` (`protocol/ymodem.rs` tests):
/// reads drain a queue and fail with a timeout once it is exhausted; writes
/// accumulate for later inspection.
#[cfg(any(test, feature = "mock"))]
#[derive(Debug, Default)]
pub struct MockChannel {
    read_buf: std::collections::VecDeque<u8>,
    /// Everything written to this channel so far, in order.
    pub written: Vec<u8>,
}

#[cfg(any(test, feature = "mock"))]
impl MockChannel {
    /// Build a mock whose reads are served from `data`, in order.
    #[must_use]
    pub fn with_input(data: &[u8]) -> Self {
        Self {
            read_buf: data.iter().copied().collect(),
            written: Vec::new(),
        }
    }

    /// Append more bytes to the read queue.
    pub fn push_input(&mut self, data: &[u8]) {
        self.read_buf.extend(data.iter().copied());
    }
}

#[cfg(any(test, feature = "mock"))]
impl Channel for MockChannel {
    fn read_exact_timeout(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<()> {
        if self.read_buf.len() < buf.len() {
            return Err(Error::Timeout);
        }
        for slot in buf.iter_mut() {
            #[allow(clippy::unwrap_used)]
            {
                *slot = self.read_buf.pop_front().unwrap();
            }
        }
        Ok(())
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.written.extend_from_slice(buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_channel_reads_in_order() {
        let mut chan = MockChannel::with_input(&[1, 2, 3, 4]);
        let mut buf = [0u8; 2];
        chan.read_exact_timeout(&mut buf, Duration::from_millis(10))
            .unwrap();
        assert_eq!(buf, [1, 2]);
        chan.read_exact_timeout(&mut buf, Duration::from_millis(10))
            .unwrap();
        assert_eq!(buf, [3, 4]);
    }

    #[test]
    fn mock_channel_times_out_on_short_read() {
        let mut chan = MockChannel::with_input(&[1]);
        let mut buf = [0u8; 2];
        let err = chan
            .read_exact_timeout(&mut buf, Duration::from_millis(10))
            .unwrap_err();
        assert!(matches!(err, Error::Timeout));
    }

    #[test]
    fn mock_channel_records_writes() {
        let mut chan = MockChannel::default();
        chan.write_all(&[9, 9]).unwrap();
        assert_eq!(chan.written, vec![9, 9]);
    }
}
