//! Programmer traits and the bit-bang transport
//!
//! [`GpioPins`] is the boundary to the hardware: anything that can drive and
//! sample a handful of digital lines and wait for a while. [`BitbangSpi`]
//! turns such a provider into an SPI master by toggling the lines itself, and
//! implements [`SpiTransport`], the interface the protocol layer talks to.

pub mod bitbang;
mod traits;

pub use bitbang::{BitbangSpi, BusConfig, PinAssignments};
pub use traits::*;
