//! gpioprog-linux-gpio - Linux GPIO character device backend
//!
//! This crate implements [`GpioPins`](gpioprog_core::programmer::GpioPins)
//! on top of the Linux GPIO character device interface (gpiocdev), so the
//! bit-bang transport in `gpioprog-core` can drive a flash and FPGA wired to
//! a board's GPIO header.
//!
//! Every line change is a separate blocking ioctl, which makes each write
//! visible on the pin before the call returns.
//!
//! # Example
//!
//! ```no_run
//! use gpioprog_core::programmer::BitbangSpi;
//! use gpioprog_core::protocol;
//! use gpioprog_linux_gpio::{LinuxGpio, LinuxGpioConfig};
//!
//! let config = LinuxGpioConfig::new("/dev/gpiochip0");
//! let gpio = LinuxGpio::open(&config)?;
//! let mut bus = BitbangSpi::new(gpio, config.bus)?;
//!
//! bus.claim();
//! protocol::power_up(&mut bus);
//! let id = protocol::read_identity(&mut bus);
//! println!("JEDEC ID: {:02X} {:02X} {:02X}", id[0], id[1], id[2]);
//! bus.release();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # Options
//!
//! The CLI passes `-g key=value,...` through [`parse_options`]:
//!
//! ```bash
//! # Different chip and chip select line, slower clock
//! gpioprog -g gpiochip=1,cs=8,spispeed=50 bitstream.bin
//! ```
//!
//! # Wiring
//!
//! | Signal | Default (BCM) | Direction |
//! |--------|---------------|-----------|
//! | CS#    | 12            | output, released after programming |
//! | SCK    | 16            | output, released after programming |
//! | MOSI   | 13            | output, released after programming |
//! | MISO   | 6             | input |
//! | RESET  | 26            | output (FPGA reset, active low) |
//! | DONE   | 5             | input (FPGA configuration done) |
//!
//! # System Requirements
//!
//! - Linux kernel 4.8+ with GPIO character device support (kernel 5.5+ for v2 API)
//! - Access to `/dev/gpiochipN` devices (may require root or udev rules)

pub mod device;
pub mod error;

pub use device::{parse_options, LinuxGpio, LinuxGpioConfig, DEFAULT_DEVICE};
pub use error::{LinuxGpioError, Result};
