//! Protocol core for a two-stage in-circuit flash programmer.
//!
//! Two cooperating firmware endpoints share one framed request/response
//! protocol over a two-stage transport:
//!
//! - **Programmer** ([`programmer::ProgrammerSession`]) — host-microcontroller
//!   firmware. Talks to a PC tool over a byte [`channel::Channel`], and to the
//!   target over a bit-banged [`tap::Tap`].
//! - **Ramapp** ([`ramapp::RamappEngine`]) — uploaded into target RAM by the
//!   programmer, executes flash operations against a [`ramapp::Flash`] and
//!   replies over a [`ramapp::FastData`] register.
//!
//! The physical USB/ICSP/flash-controller/fast-data-register plumbing is out
//! of scope; this crate only defines the traits the two packet engines
//! program against and drives them to completion.
//!
//! ```ignore
//! use picprog_core::programmer::{ProgrammerSession, PING};
//! use picprog_core::channel::MockChannel;
//! use picprog_core::tap::mock::MockTap;
//! use picprog_core::framing::encode_success;
//!
//! let request = encode_success(PING, &[]);
//! let mut session = ProgrammerSession::new(MockTap::default(), MockChannel::with_input(&request), vec![]);
//! session.process_one().unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod crc;
pub mod error;
pub mod framing;
pub mod programmer;
pub mod ramapp;
pub mod tap;
pub mod target_control;

pub use error::{Error, Result};
