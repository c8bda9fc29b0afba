//! Progress reporting hooks

use super::sector::SectorStats;
use crate::spi::IDENTITY_LEN;

/// Progress callbacks for sector writes
///
/// One sector write emits, per attempt: `sector_start`, `erasing`, then for
/// a non-empty sector `writing` with a `write_progress` per page and
/// `verifying` with a `verify_progress` per page. An attempt either ends in
/// `verify_mismatch` (and the next attempt starts over) or the call ends
/// with `sector_complete`.
pub trait WriteProgress {
    /// A (new) attempt at writing `len` bytes at `addr` starts
    fn sector_start(&mut self, addr: u32, len: usize);

    /// The 64 KiB block is being erased
    fn erasing(&mut self);

    /// Page programming starts
    fn writing(&mut self, bytes_to_write: usize);

    /// Called after each programmed page
    fn write_progress(&mut self, bytes_written: usize);

    /// Read-back verification starts
    fn verifying(&mut self, bytes_to_verify: usize);

    /// Called after each verified page
    fn verify_progress(&mut self, bytes_verified: usize);

    /// Read-back differed from the source at `addr`; the sector restarts
    fn verify_mismatch(&mut self, addr: u32);

    /// The sector is written and verified
    fn sector_complete(&mut self, stats: &SectorStats);
}

/// Progress callbacks for a whole session
pub trait SessionProgress: WriteProgress {
    /// The flash answered the identify command
    fn identity(&mut self, id: &[u8; IDENTITY_LEN]);

    /// The SPI lines were released and the FPGA was taken out of reset
    fn booting(&mut self);
}

/// A no-op progress reporter
pub struct NoProgress;

impl WriteProgress for NoProgress {
    fn sector_start(&mut self, _addr: u32, _len: usize) {}
    fn erasing(&mut self) {}
    fn writing(&mut self, _bytes_to_write: usize) {}
    fn write_progress(&mut self, _bytes_written: usize) {}
    fn verifying(&mut self, _bytes_to_verify: usize) {}
    fn verify_progress(&mut self, _bytes_verified: usize) {}
    fn verify_mismatch(&mut self, _addr: u32) {}
    fn sector_complete(&mut self, _stats: &SectorStats) {}
}

impl SessionProgress for NoProgress {
    fn identity(&mut self, _id: &[u8; IDENTITY_LEN]) {}
    fn booting(&mut self) {}
}
