//! `fast-write` — stream a binary image into flash via the double-buffered
//! pipeline, 256 bytes at a time. Grounded on
//! `hisiflash::target::ws63::Ws63Flasher::flash_fwpkg`'s
//! progress-callback-driven chunked transfer.

use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use picprog_core::channel::Channel;
use picprog_core::crc::crc_ccitt_false;
use picprog_core::error::{Error, Result};
use picprog_core::framing::encode_success;

use super::read_response;
use crate::serial::SerialChannel;

const FAST_WRITE: u16 = 106;
const ROW_SIZE: usize = 256;
const ACK_TIMEOUT: Duration = Duration::from_secs(2);
const FINAL_TIMEOUT: Duration = Duration::from_secs(10);

fn validate_size(data: &[u8]) -> Result<()> {
    if data.is_empty() || data.len() % ROW_SIZE != 0 {
        return Err(Error::Invalid("fast-write size must be a nonzero multiple of 256"));
    }
    Ok(())
}

/// Stream `data` into flash starting at `address`. `data.len()` must be a
/// nonzero multiple of 256.
pub fn fast_write(channel: &mut SerialChannel, address: u32, data: &[u8]) -> Result<()> {
    validate_size(data)?;

    let expected_crc = crc_ccitt_false(0xFFFF, data);
    let mut control = Vec::with_capacity(12);
    control.extend_from_slice(&address.to_be_bytes());
    control.extend_from_slice(&(data.len() as u32).to_be_bytes());
    control.extend_from_slice(&expected_crc.to_be_bytes());
    control.extend_from_slice(&[0, 0]);

    channel.write_all(&encode_success(FAST_WRITE, &control))?;

    let bar = ProgressBar::new(data.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:40.cyan/blue} {bytes}/{total_bytes} ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for chunk in data.chunks(ROW_SIZE) {
        channel.write_all(chunk)?;
        let mut ack = [0u8; 2];
        channel.read_exact_timeout(&mut ack, ACK_TIMEOUT)?;
        bar.inc(chunk.len() as u64);
    }
    bar.finish_and_clear();

    read_response(channel, FINAL_TIMEOUT)?;
    println!("{}", style("fast-write complete").green());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_input() {
        let err = validate_size(&[]).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn rejects_size_not_a_multiple_of_256() {
        let err = validate_size(&[0u8; 300]).unwrap_err();
        assert!(matches!(err, Error::Invalid(_)));
    }

    #[test]
    fn accepts_whole_rows() {
        validate_size(&[0u8; 512]).unwrap();
    }
}
