//! Linux GPIO line provider
//!
//! [`LinuxGpio`] requests the six programmer lines from one GPIO chip and
//! implements [`GpioPins`] on them. Direction changes go through a line
//! reconfiguration, levels through `set_value`/`value`, and delays through
//! `std::thread::sleep`.

use std::time::Duration;

use crate::error::{LinuxGpioError, Result};

use gpiocdev::chip::Chip;
use gpiocdev::line::{Offset, Value};
use gpiocdev::request::{Config, Request};

use gpioprog_core::programmer::{BusConfig, Direction, GpioPins, Level, Pin};

/// GPIO chip used when neither `dev` nor `gpiochip` is given
pub const DEFAULT_DEVICE: &str = "/dev/gpiochip0";

/// Consumer label shown by `gpioinfo` while the lines are held
const CONSUMER: &str = "gpioprog";

/// Configuration for opening the GPIO lines
#[derive(Debug, Clone)]
pub struct LinuxGpioConfig {
    /// Device path (e.g., "/dev/gpiochip0")
    pub device: String,
    /// Pin assignment and clock speed for the bit-bang transport
    pub bus: BusConfig,
}

impl Default for LinuxGpioConfig {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE)
    }
}

impl LinuxGpioConfig {
    /// Create a configuration for `device` with the default wiring
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            bus: BusConfig::default(),
        }
    }

    /// Set the half-period delay in nanoseconds
    pub fn with_half_period_ns(mut self, ns: u64) -> Self {
        self.bus = self.bus.with_half_period_ns(ns);
        self
    }

    /// Set SPI speed in Hz (approximate, via half-period calculation)
    pub fn with_speed_hz(mut self, hz: u32) -> Self {
        self.bus = self.bus.with_speed_hz(hz);
        self
    }
}

#[inline]
fn value(level: Level) -> Value {
    if level.is_high() {
        Value::Active
    } else {
        Value::Inactive
    }
}

/// GPIO lines held through the character device
pub struct LinuxGpio {
    /// GPIO line request handle
    request: Request,
    /// Current configuration of every requested line
    lines: Config,
}

impl LinuxGpio {
    /// Open the chip and request all programmer lines
    ///
    /// Every line starts out as an input so nothing is driven until the
    /// transport claims the bus.
    pub fn open(config: &LinuxGpioConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxGpioError::NoDevice);
        }

        log::debug!("linux_gpio: Opening device {}", config.device);

        let chip = Chip::from_path(&config.device).map_err(|e| LinuxGpioError::ChipOpenFailed {
            path: config.device.clone(),
            source: e,
        })?;
        let info = chip.info().map_err(|e| LinuxGpioError::ChipOpenFailed {
            path: config.device.clone(),
            source: e,
        })?;
        log::debug!(
            "linux_gpio: {} [{}] has {} lines",
            info.name,
            info.label,
            info.num_lines
        );

        let pins = config.bus.pins;
        let names = ["cs", "sck", "mosi", "miso", "reset", "done"];
        for (name, offset) in names.into_iter().zip(pins.all()) {
            if offset >= info.num_lines {
                return Err(LinuxGpioError::InvalidLineNumber {
                    name,
                    value: offset.to_string(),
                });
            }
        }

        let mut lines = Config::default();
        for offset in pins.all() {
            lines.with_line(offset).as_input();
        }

        let request = Request::from_config(lines.clone())
            .on_chip(&config.device)
            .with_consumer(CONSUMER)
            .request()
            .map_err(LinuxGpioError::LineRequestFailed)?;

        log::info!(
            "linux_gpio: Opened {} (cs={}, sck={}, mosi={}, miso={}, reset={}, done={})",
            config.device,
            pins.cs,
            pins.sck,
            pins.mosi,
            pins.miso,
            pins.reset,
            pins.done
        );

        Ok(Self { request, lines })
    }
}

impl GpioPins for LinuxGpio {
    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        match direction {
            Direction::Input => {
                self.lines.with_line(pin).as_input();
            }
            Direction::Output(level) => {
                self.lines.with_line(pin).as_output(value(level));
            }
        }
        if let Err(e) = self.request.reconfigure(&self.lines) {
            log::error!("Failed to set direction of line {}: {}", pin, e);
        }
    }

    fn write(&mut self, pin: Pin, level: Level) {
        if let Err(e) = self.request.set_value(pin, value(level)) {
            log::error!("Failed to set line {}: {}", pin, e);
        }
    }

    fn read(&mut self, pin: Pin) -> Level {
        match self.request.value(pin) {
            Ok(Value::Active) => Level::High,
            Ok(Value::Inactive) => Level::Low,
            Err(e) => {
                log::error!("Failed to get line {}: {}", pin, e);
                Level::Low
            }
        }
    }

    fn delay_ns(&mut self, ns: u64) {
        if ns > 0 {
            std::thread::sleep(Duration::from_nanos(ns));
        }
    }
}

fn parse_line(name: &'static str, value: &str) -> Result<Offset> {
    value
        .parse()
        .map_err(|_| LinuxGpioError::InvalidLineNumber {
            name,
            value: value.to_string(),
        })
}

/// Parse backend options from a list of key-value pairs
///
/// Every option has a default, so an empty list gives the standard wiring
/// on `/dev/gpiochip0`.
///
/// # Supported Options
///
/// - `dev=/dev/gpiochipN` - GPIO chip device path
/// - `gpiochip=N` - GPIO chip number (alternative to dev)
/// - `cs=N` - chip select line (default 12)
/// - `sck=N` - clock line (default 16)
/// - `mosi=N` or `io0=N` - host to flash data line (default 13)
/// - `miso=N` or `io1=N` - flash to host data line (default 6)
/// - `reset=N` - FPGA reset line (default 26)
/// - `done=N` - FPGA done line (default 5)
/// - `spispeed=N` - SPI speed in kHz (approximate, default ~100 kHz)
/// - `halfperiod=N` - half clock period in nanoseconds (overrides spispeed)
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxGpioConfig> {
    let mut config = LinuxGpioConfig::new(String::new());
    let mut gpiochip: Option<u32> = None;
    let mut half_period: Option<u64> = None;

    for (key, value) in options {
        match *key {
            "dev" => config.device = value.to_string(),
            "gpiochip" => {
                gpiochip = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid gpiochip value: {}", value))
                })?);
            }
            "cs" => config.bus.pins.cs = parse_line("cs", value)?,
            "sck" => config.bus.pins.sck = parse_line("sck", value)?,
            "mosi" | "io0" => config.bus.pins.mosi = parse_line("mosi", value)?,
            "miso" | "io1" => config.bus.pins.miso = parse_line("miso", value)?,
            "reset" => config.bus.pins.reset = parse_line("reset", value)?,
            "done" => config.bus.pins.done = parse_line("done", value)?,
            "spispeed" => {
                let speed_khz = value
                    .parse::<u32>()
                    .ok()
                    .filter(|&khz| khz > 0)
                    .ok_or_else(|| {
                        LinuxGpioError::InvalidParameter(format!("Invalid spispeed value: {}", value))
                    })?;
                config = config.with_speed_hz(speed_khz.saturating_mul(1000));
            }
            "halfperiod" => {
                half_period = Some(value.parse().map_err(|_| {
                    LinuxGpioError::InvalidParameter(format!("Invalid halfperiod value: {}", value))
                })?);
            }
            _ => {
                log::warn!("linux_gpio: Unknown option: {}={}", key, value);
            }
        }
    }

    if let Some(ns) = half_period {
        config = config.with_half_period_ns(ns);
    }

    // Handle dev vs gpiochip
    if config.device.is_empty() {
        match gpiochip {
            Some(n) if n > 9 => {
                return Err(LinuxGpioError::InvalidParameter(
                    "Maximum gpiochip number supported is 9".to_string(),
                ));
            }
            Some(n) => config.device = format!("/dev/gpiochip{}", n),
            None => config.device = DEFAULT_DEVICE.to_string(),
        }
    } else if gpiochip.is_some() {
        return Err(LinuxGpioError::InvalidParameter(
            "Only one of 'dev' or 'gpiochip' can be specified".to_string(),
        ));
    }

    if config.bus.pins.validate().is_err() {
        return Err(LinuxGpioError::InvalidParameter(
            "Each signal needs its own GPIO line".to_string(),
        ));
    }

    Ok(config)
}
