//! Whole sessions against the pin-level emulator

use gpioprog_core::flash::WriteOptions;
use gpioprog_core::programmer::{BitbangSpi, BusConfig};
use gpioprog_core::session::{Job, Session, SessionConfig, SessionState};
use gpioprog_core::spi::{opcodes, SECTOR_SIZE};
use gpioprog_core::Error;
use gpioprog_dummy::{BootBehaviour, Mark, ProgressLog, SimConfig, SimFlash};

const OFFSET: usize = 0x83_0000;

fn bus(config: SimConfig) -> BitbangSpi<SimFlash> {
    let bus_config = BusConfig::new(config.pins).with_half_period_ns(0);
    BitbangSpi::new(SimFlash::new(config), bus_config).unwrap()
}

#[test]
fn test_program_and_boot() {
    let mut bus = bus(SimConfig::default());
    let image = vec![0xAA; 70_000];
    let mut log = ProgressLog::default();

    let report = Session::default()
        .run(&mut bus, Job::Program(&image[..]), &mut log)
        .unwrap();

    assert_eq!(report.state, SessionState::Done);
    assert!(report.is_done());
    assert_eq!(report.identity, Some(SimConfig::default().identity));
    assert_eq!(report.sectors, 2);
    assert_eq!(report.bytes_written, 70_000);
    assert_eq!(report.retries, 0);

    let sectors: Vec<_> = log.completed().iter().map(|s| (s.addr, s.len)).collect();
    assert_eq!(sectors, vec![(0x83_0000, 65_536), (0x84_0000, 4_464)]);

    // Identify comes before any flash write, boot after all of them
    let identity = log.position(|m| matches!(m, Mark::Identity(_))).unwrap();
    let first_sector = log.position(|m| matches!(m, Mark::SectorStart(..))).unwrap();
    assert!(identity < first_sector);
    assert_eq!(log.marks.last(), Some(&Mark::Booting));

    let sim = bus.gpio();
    assert_eq!(&sim.memory()[OFFSET..OFFSET + image.len()], &image[..]);
    assert!(sim.memory()[OFFSET + image.len()..OFFSET + 2 * SECTOR_SIZE]
        .iter()
        .all(|&b| b == 0xFF));
    assert!(sim.fpga_running());
    assert!(sim.spi_released());
    assert!(sim.violations().is_empty(), "{:?}", sim.violations());
}

#[test]
fn test_identity_read_after_wake() {
    let mut bus = bus(SimConfig::default());
    Session::default()
        .run(&mut bus, Job::Program(&[0x01u8; 10][..]), &mut ProgressLog::default())
        .unwrap();

    let order: Vec<u8> = bus.gpio().commands().iter().map(|c| c.opcode).collect();
    assert_eq!(&order[..3], &[opcodes::RES, opcodes::RDID, opcodes::WREN]);
    let rdid = &bus.gpio().commands()[1];
    assert_eq!(rdid.data_len, 20);
}

#[test]
fn test_one_byte_past_a_sector() {
    let mut bus = bus(SimConfig::default());
    let image: Vec<u8> = (0..SECTOR_SIZE + 1).map(|i| (i % 251) as u8).collect();
    let mut log = ProgressLog::default();

    let report = Session::default()
        .run(&mut bus, Job::Program(&image[..]), &mut log)
        .unwrap();

    assert!(report.is_done());
    let sectors: Vec<_> = log.completed().iter().map(|s| (s.addr, s.len)).collect();
    assert_eq!(sectors, vec![(0x83_0000, 65_536), (0x84_0000, 1)]);
    assert_eq!(&bus.gpio().memory()[OFFSET..OFFSET + image.len()], &image[..]);
}

#[test]
fn test_exact_sector_image_writes_one_sector() {
    let mut bus = bus(SimConfig::default());
    let image = vec![0x3C; SECTOR_SIZE];

    let report = Session::default()
        .run(&mut bus, Job::Program(&image[..]), &mut ProgressLog::default())
        .unwrap();

    assert_eq!(report.sectors, 1);
    assert_eq!(bus.gpio().commands_with(opcodes::BE_D8).count(), 1);
}

#[test]
fn test_empty_image_still_boots() {
    let mut bus = bus(SimConfig::default());

    let report = Session::default()
        .run(&mut bus, Job::Program(&[0u8; 0][..]), &mut ProgressLog::default())
        .unwrap();

    assert!(report.is_done());
    assert!(report.identity.is_some());
    assert_eq!(report.sectors, 0);
    assert_eq!(bus.gpio().commands_with(opcodes::BE_D8).count(), 0);
}

#[test]
fn test_restart_only() {
    let mut bus = bus(SimConfig::default());
    let mut log = ProgressLog::default();

    let report = Session::default()
        .run(&mut bus, Job::<&[u8]>::RestartOnly, &mut log)
        .unwrap();

    assert_eq!(report.state, SessionState::Done);
    assert_eq!(report.identity, None);
    assert_eq!(report.sectors, 0);
    assert_eq!(log.marks, vec![Mark::Booting]);

    let sim = bus.gpio();
    assert!(sim.commands().is_empty());
    assert!(!sim.is_awake());
    assert!(sim.fpga_running());
    assert!(sim.spi_released());
}

#[test]
fn test_retries_are_reported() {
    let mut bus = bus(SimConfig {
        corrupt_reads: 2,
        ..Default::default()
    });
    let image = vec![0x42; 1000];

    let report = Session::default()
        .run(&mut bus, Job::Program(&image[..]), &mut ProgressLog::default())
        .unwrap();

    assert!(report.is_done());
    assert_eq!(report.retries, 2);
    assert_eq!(&bus.gpio().memory()[OFFSET..OFFSET + image.len()], &image[..]);
}

#[test]
fn test_bounded_retries_abort_session() {
    let mut bus = bus(SimConfig {
        corrupt_reads: 10,
        ..Default::default()
    });
    let config = SessionConfig {
        write: WriteOptions::default().with_max_attempts(3),
        ..Default::default()
    };

    let result = Session::new(config).run(
        &mut bus,
        Job::Program(&[0x42u8; 100][..]),
        &mut ProgressLog::default(),
    );

    assert_eq!(
        result,
        Err(Error::VerifyFailed {
            addr: OFFSET as u32
        })
    );
    assert!(!bus.gpio().fpga_running());
}

#[test]
fn test_fpga_never_ready() {
    let mut bus = bus(SimConfig {
        boot: BootBehaviour::Never,
        ..Default::default()
    });
    let mut log = ProgressLog::default();

    let report = Session::default()
        .run(&mut bus, Job::Program(&[0x11u8; 300][..]), &mut log)
        .unwrap();

    assert_eq!(report.state, SessionState::Failed);
    assert!(!report.is_done());
    // The image was still written
    assert_eq!(log.completed().len(), 1);
    assert!(bus.gpio().elapsed_ns() >= 2_000_000_000);
}

#[test]
fn test_slow_boot_within_timeout() {
    let mut bus = bus(SimConfig {
        boot: BootBehaviour::AfterPolls(150),
        ..Default::default()
    });

    let report = Session::default()
        .run(&mut bus, Job::<&[u8]>::RestartOnly, &mut ProgressLog::default())
        .unwrap();

    assert!(report.is_done());
}

#[test]
fn test_custom_ready_timeout() {
    let mut bus = bus(SimConfig {
        boot: BootBehaviour::AfterPolls(150),
        ..Default::default()
    });
    let config = SessionConfig {
        ready_timeout_ms: 500,
        ..Default::default()
    };

    let report = Session::new(config)
        .run(&mut bus, Job::<&[u8]>::RestartOnly, &mut ProgressLog::default())
        .unwrap();

    assert_eq!(report.state, SessionState::Failed);
}

#[test]
fn test_image_past_end_of_flash() {
    let mut bus = bus(SimConfig::default());
    let config = SessionConfig {
        flash_offset: 0xFF_0000,
        ..Default::default()
    };
    let image = vec![0u8; SECTOR_SIZE + 1];

    let result = Session::new(config).run(
        &mut bus,
        Job::Program(&image[..]),
        &mut ProgressLog::default(),
    );

    assert_eq!(result, Err(Error::AddressOutOfBounds));
    // The first sector fit and was written
    assert_eq!(bus.gpio().commands_with(opcodes::BE_D8).count(), 1);
}

#[test]
fn test_misaligned_offset_touches_nothing() {
    let mut bus = bus(SimConfig {
        record_events: true,
        ..Default::default()
    });
    let config = SessionConfig {
        flash_offset: 0x83_0100,
        ..Default::default()
    };

    let result = Session::new(config).run(
        &mut bus,
        Job::Program(&[1u8][..]),
        &mut ProgressLog::default(),
    );

    assert_eq!(result, Err(Error::InvalidConfig));
    assert!(bus.gpio().events().is_empty());
}
