//! One programming session, from idle pins to a booted FPGA
//!
//! A session walks through a fixed sequence of states:
//!
//! ```text
//! Init -> Identify -> Stream -> Release -> AwaitReady -> Done
//!   |                              ^                 \-> Failed
//!   \------ (restart only) --------/
//! ```
//!
//! Streaming reads the image in 64 KiB chunks and hands each one to the
//! sector writer at the next address. Once the image is in, the SPI lines
//! are released so the FPGA can read the flash, the FPGA is taken out of
//! reset and the done line is polled with a timeout. That timeout is the
//! only bounded wait in the whole run; flash status polling and sector
//! verification never give up.

use embedded_io::{Error as _, ErrorKind, Read};

use crate::error::{Error, Result};
use crate::flash::{write_sector, SessionProgress, WriteOptions};
use crate::programmer::{BitbangSpi, GpioPins, Level};
use crate::protocol::spi25;
use crate::spi::{sector_base, ADDRESS_MASK, IDENTITY_LEN, SECTOR_SIZE};

/// Flash offset the image is written to by default
pub const DEFAULT_FLASH_OFFSET: u32 = 0x83_0000;

/// How long to wait for the FPGA to report done, in milliseconds
pub const DEFAULT_READY_TIMEOUT_MS: u32 = 2000;

/// Interval between done line polls, in milliseconds
pub const DEFAULT_READY_POLL_MS: u32 = 10;

/// Session parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Flash address of the first image byte (must be 64 KiB aligned)
    pub flash_offset: u32,
    /// Give up waiting for the done line after this many milliseconds
    pub ready_timeout_ms: u32,
    /// Poll the done line this often
    pub ready_poll_ms: u32,
    /// Retry policy for sector writes
    pub write: WriteOptions,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            flash_offset: DEFAULT_FLASH_OFFSET,
            ready_timeout_ms: DEFAULT_READY_TIMEOUT_MS,
            ready_poll_ms: DEFAULT_READY_POLL_MS,
            write: WriteOptions::default(),
        }
    }
}

impl SessionConfig {
    /// Check offsets and intervals
    pub fn validate(&self) -> Result<()> {
        if self.flash_offset != sector_base(self.flash_offset) {
            log::error!(
                "Flash offset 0x{:06X} is not aligned to a 64 KiB sector",
                self.flash_offset
            );
            return Err(Error::InvalidConfig);
        }
        if self.flash_offset > ADDRESS_MASK {
            return Err(Error::AddressOutOfBounds);
        }
        if self.ready_poll_ms == 0 {
            log::error!("Ready poll interval must be at least 1 ms");
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

/// What a session should do
pub enum Job<R> {
    /// Write the image read from `R`, then boot the FPGA
    Program(R),
    /// Leave the flash alone and only restart the FPGA
    RestartOnly,
}

/// Session state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Put all lines into their idle state
    #[default]
    Init,
    /// Wake the flash and read its identity
    Identify,
    /// Write the image sector by sector
    Stream,
    /// Hand the SPI lines to the FPGA and release its reset
    Release,
    /// Wait for the FPGA to report configuration done
    AwaitReady,
    /// The FPGA came up
    Done,
    /// The FPGA did not come up within the timeout
    Failed,
}

/// Outcome of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SessionReport {
    /// Final state, [`SessionState::Done`] or [`SessionState::Failed`]
    pub state: SessionState,
    /// Identity bytes, when the flash was identified
    pub identity: Option<[u8; IDENTITY_LEN]>,
    /// Number of sectors written
    pub sectors: usize,
    /// Number of image bytes written
    pub bytes_written: usize,
    /// Sector rewrites caused by read-back mismatches
    pub retries: u32,
}

impl SessionReport {
    /// Whether the FPGA reported done
    pub fn is_done(&self) -> bool {
        self.state == SessionState::Done
    }
}

/// A programming session
#[derive(Debug, Clone, Copy, Default)]
pub struct Session {
    config: SessionConfig,
}

impl Session {
    /// Create a session with the given parameters
    pub fn new(config: SessionConfig) -> Self {
        Self { config }
    }

    /// Run the session to completion
    ///
    /// Returns `Ok` for both [`SessionState::Done`] and
    /// [`SessionState::Failed`]; a missing done signal is reported through
    /// the report, not as an error. Errors are configuration problems and
    /// input read failures.
    pub fn run<P, R, W>(
        &self,
        bus: &mut BitbangSpi<P>,
        job: Job<R>,
        progress: &mut W,
    ) -> Result<SessionReport>
    where
        P: GpioPins,
        R: Read,
        W: SessionProgress + ?Sized,
    {
        self.config.validate()?;

        let mut source = match job {
            Job::Program(source) => Some(source),
            Job::RestartOnly => None,
        };
        let mut report = SessionReport::default();
        let mut state = SessionState::Init;

        loop {
            let next = match state {
                SessionState::Init => {
                    bus.claim();
                    if source.is_some() {
                        SessionState::Identify
                    } else {
                        SessionState::Release
                    }
                }

                SessionState::Identify => {
                    spi25::power_up(bus);
                    let id = spi25::read_identity(bus);
                    log::info!(
                        "Flash JEDEC ID: {:02X} {:02X}{:02X}",
                        id[0],
                        id[1],
                        id[2]
                    );
                    progress.identity(&id);
                    report.identity = Some(id);
                    SessionState::Stream
                }

                SessionState::Stream => {
                    if let Some(source) = source.as_mut() {
                        self.stream(bus, source, progress, &mut report)?;
                    }
                    SessionState::Release
                }

                SessionState::Release => {
                    bus.release();
                    bus.set_reset(Level::High);
                    progress.booting();
                    SessionState::AwaitReady
                }

                SessionState::AwaitReady => {
                    if self.await_ready(bus) {
                        SessionState::Done
                    } else {
                        log::warn!(
                            "FPGA did not signal done within {} ms",
                            self.config.ready_timeout_ms
                        );
                        SessionState::Failed
                    }
                }

                SessionState::Done | SessionState::Failed => {
                    report.state = state;
                    return Ok(report);
                }
            };

            log::debug!("session: {:?} -> {:?}", state, next);
            state = next;
        }
    }

    fn stream<P, R, W>(
        &self,
        bus: &mut BitbangSpi<P>,
        source: &mut R,
        progress: &mut W,
        report: &mut SessionReport,
    ) -> Result<()>
    where
        P: GpioPins,
        R: Read,
        W: SessionProgress + ?Sized,
    {
        let mut buf = [0u8; SECTOR_SIZE];
        let mut addr = self.config.flash_offset;

        loop {
            let len = fill(source, &mut buf)?;

            if len > 0 {
                if u64::from(addr) + len as u64 > u64::from(ADDRESS_MASK) + 1 {
                    log::error!(
                        "Image runs past the end of flash at 0x{:06X}",
                        ADDRESS_MASK
                    );
                    return Err(Error::AddressOutOfBounds);
                }

                let stats = write_sector(bus, addr, &buf[..len], &self.config.write, progress)?;
                report.sectors += 1;
                report.bytes_written += len;
                report.retries += stats.attempts - 1;
                addr += len as u32;
            }

            // A short read means the input is exhausted
            if len < buf.len() {
                log::debug!(
                    "Image written: {} bytes in {} sector(s)",
                    report.bytes_written,
                    report.sectors
                );
                return Ok(());
            }
        }
    }

    fn await_ready<P: GpioPins>(&self, bus: &mut BitbangSpi<P>) -> bool {
        let polls = self.config.ready_timeout_ms / self.config.ready_poll_ms;
        for _ in 0..polls {
            bus.delay_ms(self.config.ready_poll_ms);
            if bus.is_ready() {
                return true;
            }
        }
        bus.is_ready()
    }
}

/// Read until `buf` is full or the source reports end of input
fn fill<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut len = 0;
    while len < buf.len() {
        match source.read(&mut buf[len..]) {
            Ok(0) => break,
            Ok(n) => len += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                log::error!("Reading input failed: {:?}", e);
                return Err(Error::Io);
            }
        }
    }
    Ok(len)
}
