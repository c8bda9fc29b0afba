//! SPI25 protocol implementation
//!
//! Each function here is one chip-select bracketed command exchange built
//! from fixed-width transfers: 8 bits for opcodes and data, 24 bits for
//! addresses. Nothing is validated; keeping addresses inside the part and
//! page programs inside a page is the caller's job.

use crate::programmer::SpiTransport;
use crate::spi::{opcodes, StatusRegister, ADDRESS_BITS, IDENTITY_LEN};

/// Release the flash from deep power-down
pub fn power_up<T: SpiTransport + ?Sized>(bus: &mut T) {
    bus.begin();
    bus.xfer(u32::from(opcodes::RES), 8);
    bus.end();
}

/// Read the JEDEC identification bytes
///
/// The first three bytes are the manufacturer and device ID; the rest is
/// whatever extended information the part returns (often the unique ID or
/// a repeat of the JEDEC ID).
pub fn read_identity<T: SpiTransport + ?Sized>(bus: &mut T) -> [u8; IDENTITY_LEN] {
    let mut id = [0u8; IDENTITY_LEN];
    bus.begin();
    bus.xfer(u32::from(opcodes::RDID), 8);
    for byte in id.iter_mut() {
        *byte = bus.xfer(0, 8) as u8;
    }
    bus.end();
    log::trace!("spi25: identity {:02X?}", id);
    id
}

/// Send the Write Enable command
///
/// Must precede every erase and program; the latch is consumed by the next
/// one of those.
pub fn write_enable<T: SpiTransport + ?Sized>(bus: &mut T) {
    bus.begin();
    bus.xfer(u32::from(opcodes::WREN), 8);
    bus.end();
}

/// Erase the 64 KiB block containing `addr` to all ones
pub fn erase_sector<T: SpiTransport + ?Sized>(bus: &mut T, addr: u32) {
    log::trace!("spi25: erase 64K @ 0x{:06X}", addr);
    bus.begin();
    bus.xfer(u32::from(opcodes::BE_D8), 8);
    bus.xfer(addr, ADDRESS_BITS);
    bus.end();
}

/// Program up to one page starting at `addr`
///
/// `data` must not run past the end of the page containing `addr`; the
/// device would wrap around to the start of the page.
pub fn program_page<T: SpiTransport + ?Sized>(bus: &mut T, addr: u32, data: &[u8]) {
    log::trace!("spi25: program {} bytes @ 0x{:06X}", data.len(), addr);
    bus.begin();
    bus.xfer(u32::from(opcodes::PP), 8);
    bus.xfer(addr, ADDRESS_BITS);
    for &byte in data {
        bus.xfer(u32::from(byte), 8);
    }
    bus.end();
}

/// Read `buf.len()` bytes starting at `addr`
pub fn read_bytes<T: SpiTransport + ?Sized>(bus: &mut T, addr: u32, buf: &mut [u8]) {
    bus.begin();
    bus.xfer(u32::from(opcodes::READ), 8);
    bus.xfer(addr, ADDRESS_BITS);
    for byte in buf.iter_mut() {
        *byte = bus.xfer(0, 8) as u8;
    }
    bus.end();
}

/// Read status register 1
pub fn read_status<T: SpiTransport + ?Sized>(bus: &mut T) -> StatusRegister {
    bus.begin();
    bus.xfer(u32::from(opcodes::RDSR), 8);
    let status = bus.xfer(0, 8) as u8;
    bus.end();
    StatusRegister::from_bits_retain(status)
}

/// Poll the status register until the Write In Progress bit clears
///
/// Unbounded: a part that never finishes stalls the caller. Returns the
/// number of status reads, including the final idle one.
pub fn wait_ready<T: SpiTransport + ?Sized>(bus: &mut T) -> u32 {
    let mut polls = 0u32;
    loop {
        polls = polls.wrapping_add(1);
        if !read_status(bus).is_busy() {
            return polls;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Op {
        Begin,
        End,
        Xfer(u32, u8),
    }

    /// Command-level recorder; replies to every transfer from `reply`
    struct Recorder {
        ops: [Option<Op>; 600],
        len: usize,
        reply: fn(usize) -> u32,
    }

    impl Recorder {
        fn new(reply: fn(usize) -> u32) -> Self {
            Self {
                ops: [None; 600],
                len: 0,
                reply,
            }
        }

        fn ops(&self) -> &[Option<Op>] {
            &self.ops[..self.len]
        }

        fn push(&mut self, op: Op) {
            self.ops[self.len] = Some(op);
            self.len += 1;
        }
    }

    impl SpiTransport for Recorder {
        fn begin(&mut self) {
            self.push(Op::Begin);
        }

        fn end(&mut self) {
            self.push(Op::End);
        }

        fn xfer(&mut self, data: u32, nbits: u8) -> u32 {
            let index = self.len;
            self.push(Op::Xfer(data, nbits));
            (self.reply)(index)
        }
    }

    #[test]
    fn test_power_up_frame() {
        let mut bus = Recorder::new(|_| 0);
        power_up(&mut bus);
        assert_eq!(
            bus.ops(),
            &[Some(Op::Begin), Some(Op::Xfer(0xAB, 8)), Some(Op::End)]
        );
    }

    #[test]
    fn test_identity_frame() {
        let mut bus = Recorder::new(|i| i as u32);
        let id = read_identity(&mut bus);

        let ops = bus.ops();
        assert_eq!(ops.len(), 1 + 1 + IDENTITY_LEN + 1);
        assert_eq!(ops[1], Some(Op::Xfer(0x9F, 8)));
        assert!(ops[2..2 + IDENTITY_LEN]
            .iter()
            .all(|op| *op == Some(Op::Xfer(0, 8))));
        // Replies are the op index, so byte n came from op n + 2
        for (n, byte) in id.iter().enumerate() {
            assert_eq!(*byte as usize, n + 2);
        }
    }

    #[test]
    fn test_erase_frame() {
        let mut bus = Recorder::new(|_| 0);
        write_enable(&mut bus);
        erase_sector(&mut bus, 0x83_0000);
        assert_eq!(
            bus.ops(),
            &[
                Some(Op::Begin),
                Some(Op::Xfer(0x06, 8)),
                Some(Op::End),
                Some(Op::Begin),
                Some(Op::Xfer(0xD8, 8)),
                Some(Op::Xfer(0x83_0000, 24)),
                Some(Op::End),
            ]
        );
    }

    #[test]
    fn test_program_frame() {
        let mut bus = Recorder::new(|_| 0);
        let data: [u8; 256] = core::array::from_fn(|i| i as u8);
        program_page(&mut bus, 0x12_3400, &data);

        let ops = bus.ops();
        assert_eq!(ops.len(), 1 + 2 + 256 + 1);
        assert_eq!(ops[1], Some(Op::Xfer(0x02, 8)));
        assert_eq!(ops[2], Some(Op::Xfer(0x12_3400, 24)));
        for (i, op) in ops[3..259].iter().enumerate() {
            assert_eq!(*op, Some(Op::Xfer(i as u32, 8)));
        }
        assert_eq!(ops[259], Some(Op::End));
    }

    #[test]
    fn test_read_frame() {
        let mut bus = Recorder::new(|i| 0x40 + i as u32);
        let mut buf = [0u8; 4];
        read_bytes(&mut bus, 0x00_0100, &mut buf);

        assert_eq!(
            bus.ops(),
            &[
                Some(Op::Begin),
                Some(Op::Xfer(0x03, 8)),
                Some(Op::Xfer(0x00_0100, 24)),
                Some(Op::Xfer(0, 8)),
                Some(Op::Xfer(0, 8)),
                Some(Op::Xfer(0, 8)),
                Some(Op::Xfer(0, 8)),
                Some(Op::End),
            ]
        );
        assert_eq!(buf, [0x43, 0x44, 0x45, 0x46]);
    }

    #[test]
    fn test_status_frame_and_busy_bit() {
        let mut bus = Recorder::new(|_| 0x03);
        let status = read_status(&mut bus);
        assert!(status.is_busy());
        assert!(status.contains(StatusRegister::WEL));
        assert_eq!(
            bus.ops(),
            &[
                Some(Op::Begin),
                Some(Op::Xfer(0x05, 8)),
                Some(Op::Xfer(0, 8)),
                Some(Op::End),
            ]
        );
    }

    #[test]
    fn test_wait_ready_polls_until_idle() {
        // Status bytes land on op indices 2, 6, 10, ...; busy for the first two
        let mut bus = Recorder::new(|i| if i < 10 { 0x01 } else { 0x00 });
        assert_eq!(wait_ready(&mut bus), 3);
        assert_eq!(bus.ops().len(), 12);
    }
}
