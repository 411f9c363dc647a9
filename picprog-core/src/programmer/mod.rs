//! The programmer's packet engine: reads a request off the host channel,
//! dispatches it, writes the response. Owned by the caller's loop as a
//! plain value — no module-level singleton, unlike the original's static
//! `struct programmer_t`.

pub mod fast_write;

use std::time::Duration;

use log::{debug, trace, warn};

use crate::channel::Channel;
use crate::error::{Error, Result};
use crate::framing::{decode_header, encode_failure, encode_success, verify_crc, CRC_SIZE, HEADER_SIZE, MAX_PAYLOAD_SIZE};
use crate::tap::{reverse8, Tap, ETAP_FASTDATA};
use crate::target_control::TargetControl;

/// Deadline for a single channel read, both for the request header and for
/// the trailing payload/CRC bytes.
pub const REQUEST_TIMEOUT: Duration = Duration::from_millis(500);

/// Request a no-op reply, used to check the link is alive.
pub const PING: u16 = 100;
/// Bring a target up and upload the ramapp.
pub const CONNECT: u16 = 101;
/// Release the target and ICSP lines.
pub const DISCONNECT: u16 = 102;
/// Pulse `MCLR` to reset the target.
pub const RESET: u16 = 103;
/// Read the raw MTAP status byte.
pub const DEVICE_STATUS: u16 = 104;
/// Erase the whole chip.
pub const CHIP_ERASE: u16 = 105;
/// Stream a binary image into flash via the double-buffered pipeline.
pub const FAST_WRITE: u16 = 106;
/// Report the programmer's firmware version.
pub const VERSION: u16 = 107;

/// This crate's version, echoed verbatim by the `version` command.
pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

/// Owns the session's `connected` flag, the target's TAP, and the host
/// channel, and drives one request/response cycle at a time.
pub struct ProgrammerSession<T: Tap, C: Channel> {
    target: TargetControl<T>,
    channel: C,
    connected: bool,
    ramapp_instructions: Vec<u32>,
}

impl<T: Tap, C: Channel> ProgrammerSession<T, C> {
    /// Build a session. `ramapp_instructions` is the generated EJTAG
    /// instruction stream `connect` uploads — out of scope to generate
    /// here, supplied by the caller (e.g. a `build.rs`-produced constant).
    pub fn new(tap: T, channel: C, ramapp_instructions: Vec<u32>) -> Self {
        Self {
            target: TargetControl::new(tap),
            channel,
            connected: false,
            ramapp_instructions,
        }
    }

    /// Whether a ramapp is currently uploaded and running.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Read one request, dispatch it, and write back a response. Framing
    /// and protocol errors (bad CRC, precondition violations, a payload-read
    /// timeout) are reported to the host as a failure frame and do not end
    /// the session; a real channel I/O error propagates instead, since there
    /// is no reliable way to answer over a broken transport.
    ///
    /// A timeout waiting for the *header* means no request is pending at
    /// all — the original `programmer_process_packet` skips both dispatch
    /// and response on that read failing, rather than answering with a
    /// failure frame, so an idle link stays silent instead of spewing
    /// `ETIMEDOUT` frames every poll.
    pub fn process_one(&mut self) -> Result<()> {
        let mut header = [0u8; HEADER_SIZE];
        match self.channel.read_exact_timeout(&mut header, REQUEST_TIMEOUT) {
            Ok(()) => {}
            Err(Error::Timeout) => return Ok(()),
            Err(err) => return Err(err),
        }

        match self.handle_one(&header) {
            Ok(frame) => {
                trace!("replying with {} bytes", frame.len());
                self.channel.write_all(&frame)?;
                Ok(())
            }
            Err(Error::Io(io_err)) => Err(Error::Io(io_err)),
            Err(err) => {
                warn!("request failed: {err} (code {})", err.code());
                self.channel.write_all(&encode_failure(err.code()))?;
                Ok(())
            }
        }
    }

    /// Read the payload and CRC that follow an already-read header, then
    /// dispatch. `type < 100` is a ramapp passthrough: forwarded verbatim
    /// once a session is connected, with no local CRC check, since the
    /// ramapp itself verifies the frame it receives. `type >= 100` is a
    /// programmer command: the CRC is verified here before dispatch.
    fn handle_one(&mut self, header_bytes: &[u8; HEADER_SIZE]) -> Result<Vec<u8>> {
        let header = decode_header(header_bytes);
        if header.length > MAX_PAYLOAD_SIZE {
            return Err(Error::MessageSize);
        }
        let mut rest = vec![0u8; header.length as usize + CRC_SIZE];
        self.channel.read_exact_timeout(&mut rest, REQUEST_TIMEOUT)?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + rest.len());
        frame.extend_from_slice(header_bytes);
        frame.extend_from_slice(&rest);

        if header.command < 100 {
            if !self.connected {
                return Err(Error::NotConnected);
            }
            self.target.tap().fast_data_write(&frame)?;
            self.ramapp_read()
        } else {
            if !verify_crc(&frame) {
                return Err(Error::BadCrc);
            }
            let body_end = frame.len() - CRC_SIZE;
            let payload = &frame[HEADER_SIZE..body_end];
            self.handle_programmer_command(header.command, payload, &frame)
        }
    }

    /// Read one complete frame back from the ramapp over the fast-data
    /// register: header first (to learn the length), then payload + CRC.
    fn ramapp_read(&mut self) -> Result<Vec<u8>> {
        let mut header = [0u8; HEADER_SIZE];
        self.target.tap().fast_data_read(&mut header)?;
        let parsed = decode_header(&header);
        if parsed.length > MAX_PAYLOAD_SIZE {
            return Err(Error::Protocol);
        }
        let mut rest = vec![0u8; parsed.length as usize + CRC_SIZE];
        self.target.tap().fast_data_read(&mut rest)?;
        let mut frame = Vec::with_capacity(HEADER_SIZE + rest.len());
        frame.extend_from_slice(&header);
        frame.extend_from_slice(&rest);
        Ok(frame)
    }

    fn handle_programmer_command(
        &mut self,
        command: u16,
        payload: &[u8],
        request: &[u8],
    ) -> Result<Vec<u8>> {
        match command {
            PING => Ok(encode_success(command, &[])),
            CONNECT => {
                self.handle_connect()?;
                Ok(encode_success(command, &[]))
            }
            DISCONNECT => {
                self.handle_disconnect()?;
                Ok(encode_success(command, &[]))
            }
            RESET => {
                self.handle_reset()?;
                Ok(encode_success(command, &[]))
            }
            DEVICE_STATUS => {
                let status = self.handle_device_status()?;
                Ok(encode_success(command, &[status]))
            }
            CHIP_ERASE => {
                self.handle_chip_erase()?;
                Ok(encode_success(command, &[]))
            }
            FAST_WRITE => self.handle_fast_write_command(payload, request),
            VERSION => Ok(encode_success(command, VERSION_STRING.as_bytes())),
            _ => Err(Error::UnknownCommand),
        }
    }

    fn handle_connect(&mut self) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        debug!("connecting: entering serial execution and uploading ramapp");
        self.target.tap().start()?;
        self.target
            .enter_serial_execution()
            .map_err(|_| Error::EnterSerialExecutionMode)?;
        self.target
            .upload_ramapp(&self.ramapp_instructions)
            .map_err(|_| Error::RamappUpload)?;
        self.target.tap().send_command(reverse8(ETAP_FASTDATA))?;
        self.connected = true;
        debug!("connected");
        Ok(())
    }

    fn handle_disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        self.target.tap().stop()?;
        self.connected = false;
        debug!("disconnected");
        Ok(())
    }

    fn handle_reset(&mut self) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        self.target.tap().set_mclr(true)?;
        std::thread::sleep(Duration::from_micros(2));
        self.target.tap().set_mclr(false)?;
        std::thread::sleep(Duration::from_millis(20));
        Ok(())
    }

    fn handle_device_status(&mut self) -> Result<u8> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        self.target.tap().start()?;
        let status = self.target.read_device_status()?;
        self.target.tap().stop()?;
        Ok(status)
    }

    fn handle_chip_erase(&mut self) -> Result<()> {
        if self.connected {
            return Err(Error::AlreadyConnected);
        }
        self.target.tap().start()?;
        self.target.chip_erase()?;
        self.target.tap().stop()?;
        Ok(())
    }

    fn handle_fast_write_command(&mut self, payload: &[u8], request: &[u8]) -> Result<Vec<u8>> {
        if !self.connected {
            return Err(Error::NotConnected);
        }
        fast_write::run(&mut self.target, &mut self.channel, payload, request)?;
        self.ramapp_read()
    }
}
