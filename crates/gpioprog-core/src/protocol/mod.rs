//! Flash protocol implementations
//!
//! This module implements the SPI flash command sequences used to talk to
//! the configuration flash.

pub mod spi25;

pub use spi25::*;
