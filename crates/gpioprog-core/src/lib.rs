//! gpioprog-core - Core library for bit-banged SPI flash programming
//!
//! This crate drives a 25-series SPI NOR flash that sits behind an FPGA,
//! using nothing but general purpose I/O pins. It is `no_std` compatible so
//! the same code can run on a microcontroller or on a Linux single board
//! computer.
//!
//! The layers, from the pins up:
//!
//! - [`programmer`] - the GPIO provider trait and the bit-bang transport
//! - [`protocol`] - SPI25 command sequences on top of the transport
//! - [`flash`] - the verified, retrying sector writer
//! - [`session`] - one complete programming run including the FPGA boot
//!
//! # Features
//!
//! - `std` - Enable standard library support (`std::error::Error` impls)
//!
//! # Example
//!
//! ```ignore
//! use gpioprog_core::programmer::{BitbangSpi, BusConfig};
//! use gpioprog_core::session::{Job, Session, SessionConfig};
//! use gpioprog_core::flash::NoProgress;
//!
//! let mut bus = BitbangSpi::new(pins, BusConfig::default())?;
//! let image: &[u8] = &[0xAA; 1024];
//! let report = Session::new(SessionConfig::default())
//!     .run(&mut bus, Job::Program(image), &mut NoProgress)?;
//! assert!(report.is_done());
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

#[cfg(feature = "std")]
extern crate std;

pub mod error;
pub mod flash;
pub mod programmer;
pub mod protocol;
pub mod session;
pub mod spi;

pub use error::{Error, Result};
