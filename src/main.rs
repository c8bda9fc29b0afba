//! gpioprog - FPGA configuration flash programmer
//!
//! Writes an image into the SPI NOR flash an FPGA boots from, using plain
//! GPIO lines as a bit-banged SPI bus, then lets go of the bus, releases the
//! FPGA from reset and waits for it to report that configuration is done.
//!
//! ```bash
//! gpioprog bitstream.bin           # write at 0x830000 and boot
//! cat bitstream.bin | gpioprog -   # same, from standard input
//! gpioprog ..                      # only restart the FPGA
//! ```

mod cli;
mod input;
mod progress;

use clap::Parser;
use cli::Cli;
use gpioprog_core::flash::WriteOptions;
use gpioprog_core::programmer::BitbangSpi;
use gpioprog_core::session::{Session, SessionConfig, SessionState};
use gpioprog_linux_gpio::LinuxGpio;
use progress::IndicatifProgress;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Usage errors exit with 1, help and version with 0
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            std::process::exit(if e.use_stderr() { 1 } else { 0 });
        }
    };

    // Initialize logger at the level chosen by -v
    cli::logger(cli.log_level()).init();

    let job = match input::open(&cli.input) {
        Ok(job) => job,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let write = match cli.max_attempts {
        Some(n) => WriteOptions::default().with_max_attempts(n),
        None => WriteOptions::retry_forever(),
    };
    let config = SessionConfig {
        flash_offset: cli.offset,
        ready_timeout_ms: cli.ready_timeout,
        write,
        ..Default::default()
    };
    config.validate()?;

    let options = cli::split_options(&cli.gpio);
    let gpio_config = gpioprog_linux_gpio::parse_options(&options)?;
    let gpio = LinuxGpio::open(&gpio_config)?;
    let mut bus = BitbangSpi::new(gpio, gpio_config.bus)?;

    let mut progress = IndicatifProgress::new();
    let report = Session::new(config).run(&mut bus, job, &mut progress)?;

    let done = report.state == SessionState::Done;
    progress.finish(if done { "FPGA is up" } else { "FPGA did not come up" });
    drop(progress);

    if report.sectors > 0 {
        println!(
            "Wrote {} bytes in {} sector(s) at 0x{:06X} ({} retries)",
            report.bytes_written, report.sectors, cli.offset, report.retries
        );
    }

    if !done {
        std::process::exit(1);
    }
    println!("DONE.");
    Ok(())
}
