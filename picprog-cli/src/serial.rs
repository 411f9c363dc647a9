//! A real [`Channel`] backed by `serialport`, grounded on
//! `hisiflash/src/connection/serial.rs`'s `SerialPort` wrapper.

use std::io::{self, Read, Write};
use std::time::Duration;

use picprog_core::channel::Channel;
use picprog_core::error::{Error, Result};

/// The host-programmer link, a CDC-ACM virtual serial port.
pub struct SerialChannel {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialChannel {
    /// Open `path` at `baud`. The baud rate is a formality for a CDC-ACM
    /// virtual port, but the device still expects a value to be set.
    pub fn open(path: &str, baud: u32) -> Result<Self> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(500))
            .open()
            .map_err(|err| Error::Io(io::Error::other(err)))?;
        Ok(Self { port })
    }
}

impl Channel for SerialChannel {
    fn read_exact_timeout(&mut self, buf: &mut [u8], timeout: Duration) -> Result<()> {
        self.port
            .set_timeout(timeout)
            .map_err(|err| Error::Io(io::Error::other(err)))?;
        self.port.read_exact(buf).map_err(Error::Io)
    }

    fn write_all(&mut self, buf: &[u8]) -> Result<()> {
        self.port.write_all(buf).map_err(Error::Io)
    }
}

/// List the serial ports the host can see, for `list-ports`.
pub fn list_ports() -> Result<Vec<String>> {
    let ports = serialport::available_ports().map_err(|err| Error::Io(io::Error::other(err)))?;
    Ok(ports.into_iter().map(|p| p.port_name).collect())
}
