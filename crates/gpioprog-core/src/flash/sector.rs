//! Verified sector writes
//!
//! [`write_sector`] erases the 64 KiB block at `addr`, programs `data` into
//! it page by page and then reads every page back. If any byte differs the
//! whole sequence starts over from the erase. By default it keeps doing that
//! until the sector verifies.
//!
//! The procedure is an explicit state machine ([`SectorPhase`]); a failed
//! comparison is the only edge back to [`SectorPhase::Erasing`].

use crate::error::{Error, Result};
use crate::programmer::SpiTransport;
use crate::protocol::spi25;
use crate::spi::PAGE_SIZE;

use super::progress::WriteProgress;

/// Knobs for [`write_sector`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriteOptions {
    /// Give up after this many failed verifications of the same sector.
    /// `None` (the default) retries until the sector verifies.
    pub max_attempts: Option<u32>,
}

impl WriteOptions {
    /// Retry until every sector verifies
    pub fn retry_forever() -> Self {
        Self { max_attempts: None }
    }

    /// Fail a sector after `attempts` unsuccessful erase/program/verify cycles
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts.max(1));
        self
    }
}

/// Where a sector write currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorPhase {
    /// Issue write enable and the block erase (start of every attempt)
    Erasing,
    /// Poll status until the erase or page program finished, then continue
    /// programming at `resume_at`
    AwaitingComplete {
        /// Offset of the next page to program
        resume_at: usize,
    },
    /// Program the page starting at `offset`
    Programming {
        /// Offset into the sector data
        offset: usize,
    },
    /// Read back and compare the page starting at `offset`
    Verifying {
        /// Offset into the sector data
        offset: usize,
    },
    /// Everything verified
    Done,
}

/// What it took to write one sector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SectorStats {
    /// Start address of the sector
    pub addr: u32,
    /// Number of data bytes written
    pub len: usize,
    /// Erase/program/verify cycles, 1 when nothing had to be redone
    pub attempts: u32,
    /// Page program commands issued over all attempts
    pub pages_programmed: u32,
    /// Status register reads over all attempts
    pub status_polls: u32,
}

/// Write `data` to the sector at `addr` and verify it
///
/// `addr` should be the start of a 64 KiB block and `data` must fit inside
/// that block. An empty `data` just erases the block.
///
/// Only returns an error when `options.max_attempts` is set and exhausted.
pub fn write_sector<T, W>(
    bus: &mut T,
    addr: u32,
    data: &[u8],
    options: &WriteOptions,
    progress: &mut W,
) -> Result<SectorStats>
where
    T: SpiTransport + ?Sized,
    W: WriteProgress + ?Sized,
{
    let mut stats = SectorStats {
        addr,
        len: data.len(),
        ..Default::default()
    };
    let mut phase = SectorPhase::Erasing;

    loop {
        phase = match phase {
            SectorPhase::Erasing => {
                stats.attempts = stats.attempts.saturating_add(1);
                log::debug!(
                    "Writing 0x{:06X}..0x{:06X} (attempt {})",
                    addr,
                    (addr + data.len() as u32).saturating_sub(1),
                    stats.attempts
                );
                progress.sector_start(addr, data.len());
                progress.erasing();

                spi25::write_enable(bus);
                spi25::erase_sector(bus, addr);
                SectorPhase::AwaitingComplete { resume_at: 0 }
            }

            SectorPhase::AwaitingComplete { resume_at } => {
                let polls = spi25::wait_ready(bus);
                stats.status_polls = stats.status_polls.saturating_add(polls);
                if data.is_empty() {
                    SectorPhase::Done
                } else if resume_at < data.len() {
                    SectorPhase::Programming { offset: resume_at }
                } else {
                    progress.verifying(data.len());
                    SectorPhase::Verifying { offset: 0 }
                }
            }

            SectorPhase::Programming { offset } => {
                if offset == 0 {
                    progress.writing(data.len());
                }
                let end = page_end(offset, data.len());

                spi25::write_enable(bus);
                spi25::program_page(bus, addr + offset as u32, &data[offset..end]);
                stats.pages_programmed = stats.pages_programmed.saturating_add(1);
                progress.write_progress(end);

                SectorPhase::AwaitingComplete { resume_at: end }
            }

            SectorPhase::Verifying { offset } if offset >= data.len() => SectorPhase::Done,

            SectorPhase::Verifying { offset } => {
                let end = page_end(offset, data.len());
                let mut buf = [0u8; PAGE_SIZE];
                let readback = &mut buf[..end - offset];
                spi25::read_bytes(bus, addr + offset as u32, readback);

                match first_mismatch(readback, &data[offset..end]) {
                    None => {
                        progress.verify_progress(end);
                        SectorPhase::Verifying { offset: end }
                    }
                    Some(i) => {
                        let bad = addr + (offset + i) as u32;
                        log::warn!(
                            "Read-back mismatch at 0x{:06X}: expected 0x{:02X}, found 0x{:02X}; rewriting sector 0x{:06X}",
                            bad,
                            data[offset + i],
                            readback[i],
                            addr
                        );
                        progress.verify_mismatch(bad);

                        if let Some(max) = options.max_attempts {
                            if stats.attempts >= max {
                                log::error!(
                                    "Giving up on sector 0x{:06X} after {} attempts",
                                    addr,
                                    stats.attempts
                                );
                                return Err(Error::VerifyFailed { addr });
                            }
                        }
                        SectorPhase::Erasing
                    }
                }
            }

            SectorPhase::Done => {
                log::debug!(
                    "Sector 0x{:06X}: {} bytes, {} attempt(s), {} pages, {} status polls",
                    addr,
                    stats.len,
                    stats.attempts,
                    stats.pages_programmed,
                    stats.status_polls
                );
                progress.sector_complete(&stats);
                return Ok(stats);
            }
        };
    }
}

/// End of the page-sized chunk starting at `offset`
#[inline]
fn page_end(offset: usize, len: usize) -> usize {
    core::cmp::min(offset + PAGE_SIZE, len)
}

fn first_mismatch(readback: &[u8], expected: &[u8]) -> Option<usize> {
    readback.iter().zip(expected).position(|(a, b)| a != b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_end_clamps_to_data() {
        assert_eq!(page_end(0, 1000), 256);
        assert_eq!(page_end(768, 1000), 1000);
        assert_eq!(page_end(0, 1), 1);
    }

    #[test]
    fn test_first_mismatch() {
        assert_eq!(first_mismatch(&[1, 2, 3], &[1, 2, 3]), None);
        assert_eq!(first_mismatch(&[1, 9, 3], &[1, 2, 3]), Some(1));
    }

    #[test]
    fn test_max_attempts_never_zero() {
        assert_eq!(WriteOptions::default().max_attempts, None);
        assert_eq!(WriteOptions::default().with_max_attempts(0).max_attempts, Some(1));
        assert_eq!(WriteOptions::retry_forever().max_attempts, None);
    }
}
