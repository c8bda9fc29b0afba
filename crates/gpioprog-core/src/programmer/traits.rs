//! GPIO provider and SPI transport trait definitions

/// Physical GPIO line number as understood by the provider
pub type Pin = u32;

/// Logic level of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    /// Driven or sampled low
    Low,
    /// Driven or sampled high
    High,
}

impl Level {
    /// Whether the level is [`Level::High`]
    #[inline]
    pub fn is_high(self) -> bool {
        self == Level::High
    }
}

impl From<bool> for Level {
    #[inline]
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

/// Direction of a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// High impedance input; the line is released to whoever else drives it
    Input,
    /// Driven output, starting at the given level
    Output(Level),
}

/// GPIO and timing provider
///
/// This is the only code path that touches the pins. All methods are
/// synchronous and a call must have taken effect on the pin before it
/// returns.
///
/// # Ordering
///
/// [`GpioPins::write`] is a *device-visible write*: the new level must reach
/// the pin before the call returns, and consecutive writes must arrive in
/// program order without being merged. The flash samples real transitions,
/// not a final value, so an implementation backed by memory-mapped registers
/// has to use volatile stores followed by a fence. Implementations backed by
/// a blocking system call (like the Linux GPIO character device) get this
/// for free.
///
/// Line errors are the provider's business: backends log them and carry on,
/// because the protocol above has no way to recover a half-clocked bit.
pub trait GpioPins {
    /// Change the direction of a line
    fn set_direction(&mut self, pin: Pin, direction: Direction);

    /// Drive an output line (device-visible write, see the trait docs)
    fn write(&mut self, pin: Pin, level: Level);

    /// Sample a line
    fn read(&mut self, pin: Pin) -> Level;

    /// Busy-wait or sleep for at least `ns` nanoseconds
    fn delay_ns(&mut self, ns: u64);

    /// Wait for at least `us` microseconds
    fn delay_us(&mut self, us: u32) {
        self.delay_ns(u64::from(us) * 1_000);
    }

    /// Wait for at least `ms` milliseconds
    fn delay_ms(&mut self, ms: u32) {
        self.delay_ns(u64::from(ms) * 1_000_000);
    }
}

impl<P: GpioPins + ?Sized> GpioPins for &mut P {
    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        (**self).set_direction(pin, direction)
    }

    fn write(&mut self, pin: Pin, level: Level) {
        (**self).write(pin, level)
    }

    fn read(&mut self, pin: Pin) -> Level {
        (**self).read(pin)
    }

    fn delay_ns(&mut self, ns: u64) {
        (**self).delay_ns(ns)
    }
}

/// Bit-level SPI transport
///
/// A command exchange is bracketed by [`begin`](SpiTransport::begin) and
/// [`end`](SpiTransport::end); in between any number of
/// [`xfer`](SpiTransport::xfer) calls shift bits in and out, MSB first.
pub trait SpiTransport {
    /// Assert chip select and start a command exchange
    fn begin(&mut self);

    /// Finish the command exchange and release chip select
    fn end(&mut self);

    /// Shift out the low `nbits` bits of `data` (1..=32), MSB first, and
    /// return the bits sampled on the input line at the same positions
    fn xfer(&mut self, data: u32, nbits: u8) -> u32;
}

impl<T: SpiTransport + ?Sized> SpiTransport for &mut T {
    fn begin(&mut self) {
        (**self).begin()
    }

    fn end(&mut self) {
        (**self).end()
    }

    fn xfer(&mut self, data: u32, nbits: u8) -> u32 {
        (**self).xfer(data, nbits)
    }
}
