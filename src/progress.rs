//! Terminal progress for a programming session

use gpioprog_core::flash::{SectorStats, SessionProgress, WriteProgress};
use gpioprog_core::spi::IDENTITY_LEN;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter using indicatif progress bars
pub struct IndicatifProgress {
    multi: MultiProgress,
    current_bar: Option<ProgressBar>,
    sector: u32,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            current_bar: None,
            sector: 0,
        }
    }

    fn create_bar(&mut self, total: u64, phase: &str) {
        let pb = self.multi.add(ProgressBar::new(total));
        pb.set_style(
            ProgressStyle::default_bar()
                .template(&format!(
                    "{{spinner:.green}} [{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{bytes}}/{{total_bytes}} ({{bytes_per_sec}}, {{eta}}) {} 0x{:06X}",
                    phase, self.sector
                ))
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        self.current_bar = Some(pb);
    }

    fn create_spinner(&mut self, message: String) {
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message);
        pb.enable_steady_tick(Duration::from_millis(100));
        self.current_bar = Some(pb);
    }

    pub fn finish(&mut self, message: &str) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    fn set_position(&self, pos: usize) {
        if let Some(pb) = &self.current_bar {
            pb.set_position(pos as u64);
        }
    }
}

impl WriteProgress for IndicatifProgress {
    fn sector_start(&mut self, addr: u32, _len: usize) {
        self.finish("");
        self.sector = addr;
    }

    fn erasing(&mut self) {
        self.create_spinner(format!("Erasing sector 0x{:06X}...", self.sector));
    }

    fn writing(&mut self, bytes_to_write: usize) {
        self.finish("Erase complete");
        self.create_bar(bytes_to_write as u64, "Writing");
    }

    fn write_progress(&mut self, bytes_written: usize) {
        self.set_position(bytes_written);
    }

    fn verifying(&mut self, bytes_to_verify: usize) {
        self.finish("Write complete");
        self.create_bar(bytes_to_verify as u64, "Verifying");
    }

    fn verify_progress(&mut self, bytes_verified: usize) {
        self.set_position(bytes_verified);
    }

    fn verify_mismatch(&mut self, addr: u32) {
        if let Some(pb) = self.current_bar.take() {
            pb.abandon_with_message(format!("Mismatch at 0x{:06X}", addr));
        }
    }

    fn sector_complete(&mut self, stats: &SectorStats) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
        let retries = match stats.attempts {
            0 | 1 => String::new(),
            n => format!(" after {} attempts", n),
        };
        let _ = self.multi.println(format!(
            "Sector 0x{:06X}: {} bytes written{}",
            stats.addr, stats.len, retries
        ));
    }
}

impl SessionProgress for IndicatifProgress {
    fn identity(&mut self, id: &[u8; IDENTITY_LEN]) {
        let hex: Vec<String> = id.iter().map(|b| format!("{:02X}", b)).collect();
        println!("Flash ID: {}", hex.join(" "));
    }

    fn booting(&mut self) {
        self.finish("");
        self.create_spinner("Waiting for FPGA...".to_string());
    }
}

impl Drop for IndicatifProgress {
    fn drop(&mut self) {
        if let Some(pb) = self.current_bar.take() {
            pb.finish_and_clear();
        }
    }
}
