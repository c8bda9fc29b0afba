//! CLI argument parsing

use clap::Parser;
use gpioprog_core::session::DEFAULT_READY_TIMEOUT_MS;
use std::path::PathBuf;

/// Parse a string as a hex or decimal u32
fn parse_hex_u32(s: &str) -> Result<u32, String> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        u32::from_str_radix(hex, 16).map_err(|e| format!("Invalid hex value: {}", e))
    } else {
        s.parse::<u32>().map_err(|e| format!("Invalid number: {}", e))
    }
}

/// Where the image comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// Read the image from a file
    File(PathBuf),
    /// Read the image from standard input
    Stdin,
    /// Don't touch the flash, only restart the FPGA
    RestartOnly,
}

/// Parse the positional input argument
fn parse_input(s: &str) -> Result<Input, String> {
    match s {
        "" => Err("Input must not be empty".to_string()),
        ".." => Ok(Input::RestartOnly),
        "-" => Ok(Input::Stdin),
        path => Ok(Input::File(PathBuf::from(path))),
    }
}

/// Split a GPIO option string into key-value pairs
///
/// Format: "option1=value1,option2=value2"; entries without `=` are ignored.
pub fn split_options(s: &str) -> Vec<(&str, &str)> {
    s.split(',')
        .filter_map(|opt| opt.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}

const GPIO_HELP: &str = "GPIO options as key=value pairs separated by commas \
[dev, gpiochip, cs, sck, mosi, miso, reset, done, spispeed (kHz), halfperiod (ns)]";

#[derive(Parser)]
#[command(name = "gpioprog")]
#[command(
    author,
    version,
    about = "Write an FPGA image to its SPI flash over bit-banged GPIO and boot it",
    long_about = None
)]
pub struct Cli {
    /// Image to write: a file, `-` for standard input, or `..` to only
    /// restart the FPGA
    #[arg(value_parser = parse_input)]
    pub input: Input,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[arg(short, long, default_value = "", help = GPIO_HELP)]
    pub gpio: String,

    /// Flash address of the first image byte (hex or decimal, 64 KiB aligned)
    #[arg(long, value_parser = parse_hex_u32, default_value = "0x830000")]
    pub offset: u32,

    /// Milliseconds to wait for the FPGA to report done
    #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT_MS)]
    pub ready_timeout: u32,

    /// Give up on a sector after this many failed verifications
    /// (default: retry until it verifies)
    #[arg(long)]
    pub max_attempts: Option<u32>,
}

impl Cli {
    /// Log level selected by the verbosity flags
    pub fn log_level(&self) -> log::LevelFilter {
        match self.verbose {
            0 => log::LevelFilter::Info,
            1 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    }
}

/// Logger for the chosen level; `RUST_LOG` still overrides it
pub fn logger(level: log::LevelFilter) -> env_logger::Builder {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level).parse_default_env();
    builder
}
