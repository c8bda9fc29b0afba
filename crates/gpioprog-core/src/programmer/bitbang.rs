//! Bitbang SPI master on top of a GPIO provider
//!
//! This module turns four [`GpioPins`] lines into an SPI mode 0 master:
//! data is changed while the clock is low and is considered valid while the
//! clock is high, with the input line sampled at the midpoint of the high
//! phase. Bits go out MSB first.
//!
//! [`BitbangSpi`] is the single owned bus handle. Besides the SPI lines it
//! also owns the FPGA's reset and done lines, so the session can hand the
//! SPI lines over to the FPGA and watch it boot without anyone else touching
//! the pins.

use super::traits::{Direction, GpioPins, Level, Pin, SpiTransport};
use crate::error::{Error, Result};

/// Default half-period delay in nanoseconds (for ~100 kHz SPI clock)
pub const DEFAULT_HALF_PERIOD_NS: u64 = 5000;

/// Settling time around chip select edges, in microseconds
const CS_SETTLE_US: u32 = 1;

/// Settling time after putting the lines into their idle state
const IDLE_SETTLE_US: u32 = 10;

/// GPIO line assignment
///
/// The defaults match the usual Raspberry Pi wiring of an FPGA board that
/// exposes its configuration flash on the 40-pin header (BCM numbering).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinAssignments {
    /// Flash chip select (active low)
    pub cs: Pin,
    /// SPI clock
    pub sck: Pin,
    /// Host to flash data (flash DI)
    pub mosi: Pin,
    /// Flash to host data (flash DO)
    pub miso: Pin,
    /// FPGA reset (low holds the FPGA in reset)
    pub reset: Pin,
    /// FPGA configuration done / ready (input)
    pub done: Pin,
}

impl Default for PinAssignments {
    fn default() -> Self {
        Self {
            cs: 12,
            sck: 16,
            mosi: 13,
            miso: 6,
            reset: 26,
            done: 5,
        }
    }
}

impl PinAssignments {
    /// All lines in a fixed order: cs, sck, mosi, miso, reset, done
    pub fn all(&self) -> [Pin; 6] {
        [self.cs, self.sck, self.mosi, self.miso, self.reset, self.done]
    }

    /// Check that no line is assigned twice
    pub fn validate(&self) -> Result<()> {
        let all = self.all();
        for (i, a) in all.iter().enumerate() {
            if all[i + 1..].contains(a) {
                log::error!("GPIO line {} is assigned to more than one signal", a);
                return Err(Error::InvalidConfig);
            }
        }
        Ok(())
    }
}

/// Transport configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusConfig {
    /// Which GPIO line carries which signal
    pub pins: PinAssignments,
    /// Half of one SPI clock period in nanoseconds (0 = as fast as possible)
    pub half_period_ns: u64,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            pins: PinAssignments::default(),
            half_period_ns: DEFAULT_HALF_PERIOD_NS,
        }
    }
}

impl BusConfig {
    /// Create a configuration with the given pins and the default clock
    pub fn new(pins: PinAssignments) -> Self {
        Self {
            pins,
            ..Default::default()
        }
    }

    /// Set the half-period delay in nanoseconds
    pub fn with_half_period_ns(mut self, ns: u64) -> Self {
        self.half_period_ns = ns;
        self
    }

    /// Set SPI speed in Hz (approximate, via half-period calculation)
    pub fn with_speed_hz(mut self, hz: u32) -> Self {
        // half_period = 1_000_000_000 / (2 * frequency) in nanoseconds
        if hz > 0 {
            self.half_period_ns = 500_000_000 / u64::from(hz);
        }
        self
    }
}

/// Bit-banged SPI master owning all programmer lines
pub struct BitbangSpi<P: GpioPins> {
    gpio: P,
    config: BusConfig,
}

impl<P: GpioPins> BitbangSpi<P> {
    /// Wrap a GPIO provider
    ///
    /// No line is touched until [`claim`](Self::claim) is called.
    pub fn new(gpio: P, config: BusConfig) -> Result<Self> {
        config.pins.validate()?;
        Ok(Self { gpio, config })
    }

    /// The configuration this bus was built with
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Borrow the underlying GPIO provider
    pub fn gpio(&self) -> &P {
        &self.gpio
    }

    /// Give back the GPIO provider
    pub fn into_inner(self) -> P {
        self.gpio
    }

    /// Drive every line to its idle level
    ///
    /// Chip select high, clock and data-out low, data-in as input, FPGA held
    /// in reset, done line as input.
    pub fn claim(&mut self) {
        let pins = self.config.pins;
        self.gpio.set_direction(pins.cs, Direction::Output(Level::High));
        self.gpio.set_direction(pins.sck, Direction::Output(Level::Low));
        self.gpio.set_direction(pins.miso, Direction::Input);
        self.gpio.set_direction(pins.mosi, Direction::Output(Level::Low));
        self.gpio.set_direction(pins.reset, Direction::Output(Level::Low));
        self.gpio.set_direction(pins.done, Direction::Input);

        self.gpio.write(pins.cs, Level::High);
        self.gpio.write(pins.sck, Level::Low);
        self.gpio.write(pins.mosi, Level::Low);
        self.gpio.write(pins.reset, Level::Low);
        self.gpio.delay_us(IDLE_SETTLE_US);
    }

    /// Stop driving the SPI lines so the FPGA can read its flash
    pub fn release(&mut self) {
        let pins = self.config.pins;
        self.gpio.set_direction(pins.cs, Direction::Input);
        self.gpio.set_direction(pins.sck, Direction::Input);
        self.gpio.set_direction(pins.mosi, Direction::Input);
    }

    /// Drive the FPGA reset line (high lets it run)
    pub fn set_reset(&mut self, level: Level) {
        let pin = self.config.pins.reset;
        self.gpio.write(pin, level);
    }

    /// Whether the FPGA reports configuration done
    pub fn is_ready(&mut self) -> bool {
        let pin = self.config.pins.done;
        self.gpio.read(pin).is_high()
    }

    /// Wait for `ms` milliseconds
    pub fn delay_ms(&mut self, ms: u32) {
        self.gpio.delay_ms(ms);
    }

    #[inline]
    fn half_period_delay(&mut self) {
        if self.config.half_period_ns > 0 {
            self.gpio.delay_ns(self.config.half_period_ns);
        }
    }
}

impl<P: GpioPins> SpiTransport for BitbangSpi<P> {
    fn begin(&mut self) {
        let cs = self.config.pins.cs;
        self.gpio.delay_us(CS_SETTLE_US);
        self.gpio.write(cs, Level::Low);
        self.gpio.delay_us(CS_SETTLE_US);
    }

    fn end(&mut self) {
        let pins = self.config.pins;
        // The last bit leaves the clock high; bring it back to idle first.
        self.gpio.write(pins.sck, Level::Low);
        self.gpio.delay_us(CS_SETTLE_US);
        self.gpio.write(pins.cs, Level::High);
        self.gpio.delay_us(CS_SETTLE_US);
    }

    fn xfer(&mut self, data: u32, nbits: u8) -> u32 {
        debug_assert!((1..=32).contains(&nbits), "xfer of {} bits", nbits);
        let pins = self.config.pins;
        let mut rdata = 0u32;

        for i in (0..u32::from(nbits)).rev() {
            self.gpio.write(pins.sck, Level::Low);

            // Data is changed while clock is low
            self.gpio.write(pins.mosi, Level::from((data >> i) & 1 != 0));
            self.half_period_delay();

            // Data is considered valid while clock is high
            self.gpio.write(pins.sck, Level::High);
            self.half_period_delay();

            if self.gpio.read(pins.miso).is_high() {
                rdata |= 1 << i;
            }
        }

        rdata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Dir(Pin, Direction),
        Write(Pin, Level),
        Read(Pin),
        Delay(u64),
    }

    /// Records every call; feeds `miso_bits` back MSB first on reads
    struct Recorder {
        events: [Option<Event>; 512],
        len: usize,
        miso_bits: u32,
        miso_pos: u32,
    }

    impl Recorder {
        fn new(miso_bits: u32, width: u32) -> Self {
            Self {
                events: [None; 512],
                len: 0,
                miso_bits,
                miso_pos: width,
            }
        }

        fn push(&mut self, e: Event) {
            self.events[self.len] = Some(e);
            self.len += 1;
        }

        fn events(&self) -> impl Iterator<Item = Event> + '_ {
            self.events[..self.len].iter().flatten().copied()
        }
    }

    impl GpioPins for Recorder {
        fn set_direction(&mut self, pin: Pin, direction: Direction) {
            self.push(Event::Dir(pin, direction));
        }

        fn write(&mut self, pin: Pin, level: Level) {
            self.push(Event::Write(pin, level));
        }

        fn read(&mut self, pin: Pin) -> Level {
            self.push(Event::Read(pin));
            self.miso_pos -= 1;
            Level::from((self.miso_bits >> self.miso_pos) & 1 != 0)
        }

        fn delay_ns(&mut self, ns: u64) {
            self.push(Event::Delay(ns));
        }
    }

    fn bus(miso_bits: u32, width: u32, half_period_ns: u64) -> BitbangSpi<Recorder> {
        let config = BusConfig::default().with_half_period_ns(half_period_ns);
        BitbangSpi::new(Recorder::new(miso_bits, width), config).unwrap()
    }

    #[test]
    fn test_xfer_is_msb_first_per_bit_sequence() {
        let pins = PinAssignments::default();
        let mut spi = bus(0, 8, 7);
        spi.xfer(0xA5, 8);

        let events: [Event; 6 * 8] = {
            let mut out = [Event::Delay(0); 48];
            for (slot, e) in out.iter_mut().zip(spi.gpio().events()) {
                *slot = e;
            }
            out
        };
        assert_eq!(spi.gpio().events().count(), 48);

        for bit in 0..8 {
            let expected = Level::from((0xA5u32 >> (7 - bit)) & 1 != 0);
            let chunk = &events[bit * 6..bit * 6 + 6];
            assert_eq!(
                chunk,
                &[
                    Event::Write(pins.sck, Level::Low),
                    Event::Write(pins.mosi, expected),
                    Event::Delay(7),
                    Event::Write(pins.sck, Level::High),
                    Event::Delay(7),
                    Event::Read(pins.miso),
                ]
            );
        }
    }

    #[test]
    fn test_xfer_samples_input_into_matching_bits() {
        let mut spi = bus(0x00C0_FFEE, 24, 0);
        assert_eq!(spi.xfer(0, 24), 0x00C0_FFEE);

        let mut spi = bus(0x8000_0001, 32, 0);
        assert_eq!(spi.xfer(0xFFFF_FFFF, 32), 0x8000_0001);
    }

    #[test]
    fn test_zero_half_period_skips_delays() {
        let mut spi = bus(0, 8, 0);
        spi.xfer(0xFF, 8);
        assert!(spi.gpio().events().all(|e| !matches!(e, Event::Delay(_))));
    }

    #[test]
    fn test_exchange_leaves_clock_low_around_select() {
        let pins = PinAssignments::default();
        let mut spi = bus(0, 8, 0);
        spi.begin();
        spi.xfer(0x9F, 8);
        spi.end();

        let writes: [Option<(Pin, Level)>; 64] = {
            let mut out = [None; 64];
            let iter = spi.gpio().events().filter_map(|e| match e {
                Event::Write(p, l) => Some((p, l)),
                _ => None,
            });
            for (slot, w) in out.iter_mut().zip(iter) {
                *slot = Some(w);
            }
            out
        };
        let writes: &[Option<(Pin, Level)>] = &writes[..writes.iter().flatten().count()];

        assert_eq!(writes.first(), Some(&Some((pins.cs, Level::Low))));
        assert_eq!(writes.last(), Some(&Some((pins.cs, Level::High))));
        assert_eq!(
            writes[writes.len() - 2],
            Some((pins.sck, Level::Low)),
            "clock must be low when select is released"
        );
    }

    #[test]
    fn test_claim_and_release_directions() {
        let pins = PinAssignments::default();
        let mut spi = bus(0, 0, 0);
        spi.claim();
        spi.release();

        let dirs: [Option<(Pin, Direction)>; 16] = {
            let mut out = [None; 16];
            let iter = spi.gpio().events().filter_map(|e| match e {
                Event::Dir(p, d) => Some((p, d)),
                _ => None,
            });
            for (slot, d) in out.iter_mut().zip(iter) {
                *slot = Some(d);
            }
            out
        };

        assert!(dirs.contains(&Some((pins.cs, Direction::Output(Level::High)))));
        assert!(dirs.contains(&Some((pins.sck, Direction::Output(Level::Low)))));
        assert!(dirs.contains(&Some((pins.miso, Direction::Input))));
        assert!(dirs.contains(&Some((pins.reset, Direction::Output(Level::Low)))));
        assert!(dirs.contains(&Some((pins.done, Direction::Input))));
        assert_eq!(&dirs[6..9], &[
            Some((pins.cs, Direction::Input)),
            Some((pins.sck, Direction::Input)),
            Some((pins.mosi, Direction::Input)),
        ]);
    }

    #[test]
    fn test_duplicate_pin_rejected() {
        let pins = PinAssignments {
            done: 12,
            ..Default::default()
        };
        assert_eq!(pins.validate(), Err(Error::InvalidConfig));
        assert!(BitbangSpi::new(Recorder::new(0, 0), BusConfig::new(pins)).is_err());
    }

    #[test]
    fn test_bus_hands_back_provider() {
        let mut spi = bus(0, 8, 250);
        assert_eq!(spi.config().half_period_ns, 250);
        assert_eq!(spi.config().pins, PinAssignments::default());
        spi.xfer(0xA5, 8);

        let recorder = spi.into_inner();
        let delays = recorder
            .events()
            .filter(|e| matches!(e, Event::Delay(250)))
            .count();
        assert_eq!(delays, 16);
    }

    #[test]
    fn test_speed_to_half_period() {
        assert_eq!(BusConfig::default().with_speed_hz(100_000).half_period_ns, 5000);
        assert_eq!(BusConfig::default().with_speed_hz(1_000_000).half_period_ns, 500);
        assert_eq!(
            BusConfig::default().with_speed_hz(0).half_period_ns,
            DEFAULT_HALF_PERIOD_NS
        );
    }
}
