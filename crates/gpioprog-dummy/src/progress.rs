//! Progress sink that remembers every callback

use gpioprog_core::flash::{SectorStats, SessionProgress, WriteProgress};
use gpioprog_core::spi::IDENTITY_LEN;

/// One progress callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mark {
    /// Flash identity reported
    Identity([u8; IDENTITY_LEN]),
    /// Sector attempt started at address with length
    SectorStart(u32, usize),
    /// Erase issued
    Erasing,
    /// Programming started
    Writing(usize),
    /// Read-back started
    Verifying(usize),
    /// Read-back mismatch at address
    Mismatch(u32),
    /// Sector done
    Complete(SectorStats),
    /// SPI released, FPGA out of reset
    Booting,
}

/// Records the sequence of progress callbacks
///
/// Per-page progress calls are counted rather than stored.
#[derive(Debug, Default)]
pub struct ProgressLog {
    /// Callbacks in order
    pub marks: Vec<Mark>,
    /// Number of `write_progress` calls
    pub page_writes: usize,
    /// Number of `verify_progress` calls
    pub page_verifies: usize,
}

impl ProgressLog {
    /// Statistics of every completed sector, in order
    pub fn completed(&self) -> Vec<SectorStats> {
        self.marks
            .iter()
            .filter_map(|m| match m {
                Mark::Complete(stats) => Some(*stats),
                _ => None,
            })
            .collect()
    }

    /// Position of the first mark matching `pred`
    pub fn position(&self, pred: impl Fn(&Mark) -> bool) -> Option<usize> {
        self.marks.iter().position(pred)
    }

    /// Number of marks matching `pred`
    pub fn count(&self, pred: impl Fn(&Mark) -> bool) -> usize {
        self.marks.iter().filter(|m| pred(m)).count()
    }
}

impl WriteProgress for ProgressLog {
    fn sector_start(&mut self, addr: u32, len: usize) {
        self.marks.push(Mark::SectorStart(addr, len));
    }

    fn erasing(&mut self) {
        self.marks.push(Mark::Erasing);
    }

    fn writing(&mut self, bytes_to_write: usize) {
        self.marks.push(Mark::Writing(bytes_to_write));
    }

    fn write_progress(&mut self, _bytes_written: usize) {
        self.page_writes += 1;
    }

    fn verifying(&mut self, bytes_to_verify: usize) {
        self.marks.push(Mark::Verifying(bytes_to_verify));
    }

    fn verify_progress(&mut self, _bytes_verified: usize) {
        self.page_verifies += 1;
    }

    fn verify_mismatch(&mut self, addr: u32) {
        self.marks.push(Mark::Mismatch(addr));
    }

    fn sector_complete(&mut self, stats: &SectorStats) {
        self.marks.push(Mark::Complete(*stats));
    }
}

impl SessionProgress for ProgressLog {
    fn identity(&mut self, id: &[u8; IDENTITY_LEN]) {
        self.marks.push(Mark::Identity(*id));
    }

    fn booting(&mut self) {
        self.marks.push(Mark::Booting);
    }
}
