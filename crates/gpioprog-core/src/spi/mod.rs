//! SPI flash constants
//!
//! Opcodes, status register bits and the geometry of the flash parts this
//! crate supports (64 KiB erase blocks, 256 byte pages, 24-bit addresses).

pub mod opcodes;

pub use opcodes::*;

/// Smallest erase unit used by the sector programmer (64 KiB block)
pub const SECTOR_SIZE: usize = 64 * 1024;

/// Largest single page program operation
pub const PAGE_SIZE: usize = 256;

/// Number of bytes returned by the identify command
pub const IDENTITY_LEN: usize = 20;

/// Width of a flash address on the wire, in bits
pub const ADDRESS_BITS: u8 = 24;

/// Mask selecting the bits of an address that reach the device
pub const ADDRESS_MASK: u32 = (1 << ADDRESS_BITS) - 1;

/// Start of the 64 KiB sector containing `addr`
pub const fn sector_base(addr: u32) -> u32 {
    addr & !(SECTOR_SIZE as u32 - 1)
}
