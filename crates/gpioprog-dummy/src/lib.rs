//! gpioprog-dummy - Pin-level flash emulator for testing
//!
//! [`SimFlash`] implements [`GpioPins`] and behaves like a 25-series SPI NOR
//! flash wired to those pins, plus the FPGA that boots from it. It decodes
//! the bit stream the bit-bang transport produces (mode 0, MSB first), so
//! tests exercise the real transport, protocol, sector writer and session
//! without hardware.
//!
//! It can also:
//! - corrupt a number of read-back commands, or one flash address, to
//!   exercise the retry loop
//! - keep the status register busy for a number of polls
//! - record every pin change and flag bus rule violations
//! - delay or suppress the FPGA done signal
//!
//! [`ProgressLog`] is a progress sink that records every callback, for
//! asserting on the order of events.

mod progress;

pub use progress::{Mark, ProgressLog};

use gpioprog_core::programmer::{Direction, GpioPins, Level, Pin, PinAssignments};
use gpioprog_core::spi::{
    opcodes, StatusRegister, ADDRESS_MASK, IDENTITY_LEN, PAGE_SIZE, SECTOR_SIZE,
};

/// When the emulated FPGA raises its done line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootBehaviour {
    /// After this many reads of the done line once reset is released and
    /// the SPI lines are let go (0 = on the first read)
    AfterPolls(u32),
    /// Never
    Never,
}

/// Configuration for the emulated flash
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Pin wiring, must match the bus under test
    pub pins: PinAssignments,
    /// Bytes returned by the identify command
    pub identity: [u8; IDENTITY_LEN],
    /// Flash size in bytes
    pub size: usize,
    /// Status polls that report busy after each erase or program
    pub busy_polls: u32,
    /// Read commands whose first data byte is inverted
    pub corrupt_reads: u32,
    /// Flash address whose byte is inverted the first time a read covers it
    pub corrupt_at: Option<u32>,
    /// Whether the part starts in deep power-down (ignores all but RES)
    pub powered_down: bool,
    /// FPGA boot behaviour
    pub boot: BootBehaviour,
    /// Keep a log of every pin change
    pub record_events: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        let mut identity = [0u8; IDENTITY_LEN];
        // Winbond W25Q128 with a made-up unique ID after the JEDEC bytes
        identity[..3].copy_from_slice(&[0xEF, 0x40, 0x18]);
        for (i, byte) in identity[3..].iter_mut().enumerate() {
            *byte = 0xA0 + i as u8;
        }
        Self {
            pins: PinAssignments::default(),
            identity,
            size: 16 * 1024 * 1024,
            busy_polls: 2,
            corrupt_reads: 0,
            corrupt_at: None,
            powered_down: true,
            boot: BootBehaviour::AfterPolls(3),
            record_events: false,
        }
    }
}

/// A pin-level event seen by the emulator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusEvent {
    /// Direction change
    Direction(Pin, Direction),
    /// Level written to a pin
    Write(Pin, Level),
}

/// A complete command decoded between select edges
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimCommand {
    /// Opcode byte
    pub opcode: u8,
    /// 24-bit address, for commands that carry one
    pub addr: Option<u32>,
    /// Number of bytes after opcode and address
    pub data_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Signal {
    Cs,
    Sck,
    Mosi,
    Miso,
    Reset,
    Done,
}

/// Emulated SPI NOR flash and FPGA behind a set of GPIO lines
pub struct SimFlash {
    config: SimConfig,
    memory: Vec<u8>,

    // Line state
    cs: Level,
    sck: Level,
    mosi: Level,
    miso: Level,
    reset: Level,
    released: [bool; 3],

    // Current transaction
    rx: Vec<u8>,
    in_byte: u8,
    bit: u8,
    out_byte: u8,
    corrupt_this_read: bool,

    // Device state
    awake: bool,
    wel: bool,
    busy_left: u32,
    corrupt_left: u32,
    corrupt_at: Option<u32>,
    done_reads: u32,

    commands: Vec<SimCommand>,
    events: Vec<BusEvent>,
    violations: Vec<String>,
    elapsed_ns: u64,
}

impl SimFlash {
    /// Create a new emulator; the flash starts fully erased
    pub fn new(config: SimConfig) -> Self {
        let memory = vec![0xFF; config.size];
        Self {
            awake: !config.powered_down,
            corrupt_left: config.corrupt_reads,
            corrupt_at: config.corrupt_at,
            config,
            memory,
            cs: Level::High,
            sck: Level::Low,
            mosi: Level::Low,
            miso: Level::High,
            reset: Level::Low,
            released: [true; 3],
            rx: Vec::new(),
            in_byte: 0,
            bit: 0,
            out_byte: 0xFF,
            corrupt_this_read: false,
            wel: false,
            busy_left: 0,
            done_reads: 0,
            commands: Vec::new(),
            events: Vec::new(),
            violations: Vec::new(),
            elapsed_ns: 0,
        }
    }

    /// Create an emulator with pre-filled flash contents at `addr`
    pub fn with_data(config: SimConfig, addr: usize, data: &[u8]) -> Self {
        let mut sim = Self::new(config);
        sim.memory[addr..addr + data.len()].copy_from_slice(data);
        sim
    }

    /// Flash contents
    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    /// All commands decoded so far, in order
    pub fn commands(&self) -> &[SimCommand] {
        &self.commands
    }

    /// Commands with the given opcode
    pub fn commands_with(&self, opcode: u8) -> impl Iterator<Item = &SimCommand> + '_ {
        self.commands.iter().filter(move |c| c.opcode == opcode)
    }

    /// Recorded pin events (empty unless `record_events` is set)
    pub fn events(&self) -> &[BusEvent] {
        &self.events
    }

    /// Bus rule violations (clock not idle at select edges and similar)
    pub fn violations(&self) -> &[String] {
        &self.violations
    }

    /// Total time spent in delays, in nanoseconds
    pub fn elapsed_ns(&self) -> u64 {
        self.elapsed_ns
    }

    /// Whether the part has been woken from deep power-down
    pub fn is_awake(&self) -> bool {
        self.awake
    }

    /// Whether the FPGA reset line is driven high
    pub fn fpga_running(&self) -> bool {
        self.reset == Level::High
    }

    /// Whether cs, sck and mosi are all inputs
    pub fn spi_released(&self) -> bool {
        self.released.iter().all(|&r| r)
    }

    fn signal(&self, pin: Pin) -> Option<Signal> {
        let p = &self.config.pins;
        match pin {
            _ if pin == p.cs => Some(Signal::Cs),
            _ if pin == p.sck => Some(Signal::Sck),
            _ if pin == p.mosi => Some(Signal::Mosi),
            _ if pin == p.miso => Some(Signal::Miso),
            _ if pin == p.reset => Some(Signal::Reset),
            _ if pin == p.done => Some(Signal::Done),
            _ => None,
        }
    }

    fn status(&self) -> StatusRegister {
        let mut status = StatusRegister::empty();
        status.set(StatusRegister::WIP, self.busy_left > 0);
        status.set(StatusRegister::WEL, self.wel);
        status
    }

    fn select(&mut self) {
        if self.sck != Level::Low {
            self.violations.push("select asserted with clock high".to_string());
        }
        self.rx.clear();
        self.in_byte = 0;
        self.bit = 0;
        self.out_byte = 0xFF;
        self.corrupt_this_read = false;
    }

    fn deselect(&mut self) {
        if self.sck != Level::Low {
            self.violations.push("select released with clock high".to_string());
        }
        if self.bit != 0 {
            log::debug!("sim: {} stray bits dropped at deselect", self.bit);
        }
        if !self.rx.is_empty() {
            self.execute();
        }
    }

    fn rising_edge(&mut self) {
        self.miso = Level::from((self.out_byte >> (7 - self.bit)) & 1 != 0);
        self.in_byte = (self.in_byte << 1) | u8::from(self.mosi.is_high());
        self.bit += 1;

        if self.bit == 8 {
            self.rx.push(self.in_byte);
            self.in_byte = 0;
            self.bit = 0;
            self.out_byte = self.next_out_byte();
        }
    }

    fn address(&self) -> Option<u32> {
        (self.rx.len() >= 4)
            .then(|| u32::from_be_bytes([0, self.rx[1], self.rx[2], self.rx[3]]))
    }

    /// Byte the device shifts out after `self.rx` has been received
    fn next_out_byte(&mut self) -> u8 {
        if !self.awake {
            return 0xFF;
        }
        let index = self.rx.len();
        match self.rx[0] {
            opcodes::RDID => self
                .config
                .identity
                .get(index - 1)
                .copied()
                .unwrap_or(0xFF),
            opcodes::RDSR => self.status().bits(),
            opcodes::READ if index >= 4 => {
                let addr = self.address().unwrap_or(0) as usize;
                let offset = index - 4;
                let byte = self.memory[(addr + offset) % self.memory.len()];
                if offset == 0 && self.corrupt_left > 0 {
                    self.corrupt_left -= 1;
                    self.corrupt_this_read = true;
                    log::debug!("sim: corrupting read at 0x{:06X}", addr);
                }
                let target = ((addr + offset) % self.memory.len()) as u32;
                if self.corrupt_at == Some(target) {
                    self.corrupt_at = None;
                    log::debug!("sim: corrupting byte at 0x{:06X}", target);
                    return !byte;
                }
                if offset == 0 && self.corrupt_this_read {
                    !byte
                } else {
                    byte
                }
            }
            _ => 0xFF,
        }
    }

    fn execute(&mut self) {
        let opcode = self.rx[0];
        let addr = self.address();
        let addressed = matches!(opcode, opcodes::READ | opcodes::PP | opcodes::BE_D8);
        let header = if addressed && addr.is_some() { 4 } else { 1 };
        self.commands.push(SimCommand {
            opcode,
            addr: if header == 4 { addr } else { None },
            data_len: self.rx.len() - header,
        });

        if !self.awake {
            if opcode == opcodes::RES {
                self.awake = true;
            }
            return;
        }

        match opcode {
            opcodes::RES => {}
            opcodes::WREN => {
                if self.busy_left == 0 {
                    self.wel = true;
                }
            }
            opcodes::RDSR => {
                self.busy_left = self.busy_left.saturating_sub(1);
            }
            opcodes::BE_D8 => {
                if let (true, Some(addr)) = (self.wel && self.busy_left == 0, addr) {
                    let base = (addr & ADDRESS_MASK) as usize & !(SECTOR_SIZE - 1);
                    let end = (base + SECTOR_SIZE).min(self.memory.len());
                    self.memory[base.min(end)..end].fill(0xFF);
                    self.wel = false;
                    self.busy_left = self.config.busy_polls;
                }
            }
            opcodes::PP => {
                if let (true, Some(addr)) = (self.wel && self.busy_left == 0, addr) {
                    let page = (addr & ADDRESS_MASK) as usize & !(PAGE_SIZE - 1);
                    for (i, &byte) in self.rx[4..].iter().enumerate() {
                        // Programming wraps around inside the page
                        let column = (addr as usize + i) % PAGE_SIZE;
                        let target = (page + column) % self.memory.len();
                        self.memory[target] &= byte;
                    }
                    self.wel = false;
                    self.busy_left = self.config.busy_polls;
                }
            }
            _ => {}
        }
    }

    fn done_level(&mut self) -> Level {
        if self.reset != Level::High || !self.spi_released() {
            return Level::Low;
        }
        match self.config.boot {
            BootBehaviour::Never => Level::Low,
            BootBehaviour::AfterPolls(n) => {
                if self.done_reads >= n {
                    Level::High
                } else {
                    self.done_reads += 1;
                    Level::Low
                }
            }
        }
    }

    fn drive(&mut self, signal: Signal, level: Level) {
        match signal {
            Signal::Cs => {
                let old = self.cs;
                self.cs = level;
                match (old, level) {
                    (Level::High, Level::Low) => self.select(),
                    (Level::Low, Level::High) => self.deselect(),
                    _ => {}
                }
            }
            Signal::Sck => {
                let old = self.sck;
                self.sck = level;
                if old == Level::Low && level == Level::High {
                    if self.cs == Level::Low {
                        self.rising_edge();
                    } else {
                        self.violations
                            .push("clock pulsed with select released".to_string());
                    }
                }
            }
            Signal::Mosi => self.mosi = level,
            Signal::Reset => self.reset = level,
            Signal::Miso | Signal::Done => {
                self.violations.push(format!("host drove input line {:?}", signal));
            }
        }
    }
}

impl GpioPins for SimFlash {
    fn set_direction(&mut self, pin: Pin, direction: Direction) {
        if self.config.record_events {
            self.events.push(BusEvent::Direction(pin, direction));
        }
        let Some(signal) = self.signal(pin) else {
            self.violations.push(format!("unknown pin {}", pin));
            return;
        };
        let slot = match signal {
            Signal::Cs => Some(0),
            Signal::Sck => Some(1),
            Signal::Mosi => Some(2),
            _ => None,
        };
        match direction {
            Direction::Input => {
                if let Some(slot) = slot {
                    self.released[slot] = true;
                }
            }
            Direction::Output(level) => {
                if let Some(slot) = slot {
                    self.released[slot] = false;
                }
                self.drive(signal, level);
            }
        }
    }

    fn write(&mut self, pin: Pin, level: Level) {
        if self.config.record_events {
            self.events.push(BusEvent::Write(pin, level));
        }
        match self.signal(pin) {
            Some(signal) => self.drive(signal, level),
            None => self.violations.push(format!("unknown pin {}", pin)),
        }
    }

    fn read(&mut self, pin: Pin) -> Level {
        match self.signal(pin) {
            Some(Signal::Miso) if self.cs == Level::Low => self.miso,
            // Pulled up while nobody drives it
            Some(Signal::Miso) => Level::High,
            Some(Signal::Done) => self.done_level(),
            Some(Signal::Cs) => self.cs,
            Some(Signal::Sck) => self.sck,
            Some(Signal::Mosi) => self.mosi,
            Some(Signal::Reset) => self.reset,
            None => {
                self.violations.push(format!("unknown pin {}", pin));
                Level::Low
            }
        }
    }

    fn delay_ns(&mut self, ns: u64) {
        self.elapsed_ns += ns;
    }
}
