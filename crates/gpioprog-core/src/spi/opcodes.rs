//! Standard JEDEC SPI flash opcodes
//!
//! Only the subset needed to identify, erase, program and read back a
//! 25-series part with 3-byte addressing is defined here.

use bitflags::bitflags;

// ============================================================================
// Power and identification
// ============================================================================

/// Release from Deep Power Down / Read Electronic Signature
pub const RES: u8 = 0xAB;
/// Read JEDEC ID (manufacturer + device ID, followed by extended bytes)
pub const RDID: u8 = 0x9F;

// ============================================================================
// Write control and status
// ============================================================================

/// Write Enable - required before every erase or program operation
pub const WREN: u8 = 0x06;
/// Read Status Register 1
pub const RDSR: u8 = 0x05;

// ============================================================================
// Read, program, erase (3-byte address)
// ============================================================================

/// Read Data
pub const READ: u8 = 0x03;
/// Page Program (up to 256 bytes)
pub const PP: u8 = 0x02;
/// Block Erase 64KB
pub const BE_D8: u8 = 0xD8;

bitflags! {
    /// Status register 1 bits
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusRegister: u8 {
        /// Write In Progress - an erase or program operation is running
        const WIP = 1 << 0;
        /// Write Enable Latch
        const WEL = 1 << 1;
    }
}

impl StatusRegister {
    /// True while the device is still busy with an erase or program
    pub fn is_busy(self) -> bool {
        self.contains(Self::WIP)
    }
}
