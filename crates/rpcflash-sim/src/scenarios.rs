//! Driver scenarios against the emulated device

use rpcflash_core::error::{JobResult, PalError, RequestError};
use rpcflash_core::fls::{Fls, FlsConfig, JobKind, JobNotification, MemIfMode, MemIfStatus};
use rpcflash_core::pal::{DeviceState, TransferMode};
use rpcflash_core::rpc::regs::RPC_DREAR;
use rpcflash_core::sdf::{opcodes, Vendor};

use crate::{sim_pal, NorDevice, SimClock, SimConfig, SimRpc, BUSY_FOREVER};

type SimFls<'a, N = ()> = Fls<'a, SimRpc, SimClock, N>;

fn driver<'a>(sim: SimConfig, config: &FlsConfig) -> (SimFls<'a>, SimClock) {
    let clock = SimClock::new();
    let mut fls = Fls::new(sim_pal(sim, clock.clone()), ());
    fls.init(config).unwrap();
    (fls, clock)
}

fn micron<'a>() -> (SimFls<'a>, SimClock) {
    driver(SimConfig::micron(), &FlsConfig::default())
}

/// Poll until the job settles, returning the number of polls
fn settle<N: JobNotification>(fls: &mut SimFls<'_, N>) -> usize {
    for polls in 0..100_000 {
        if fls.job_result() != JobResult::Pending {
            return polls;
        }
        fls.main_function();
    }
    panic!("job did not settle");
}

fn device<'f, N: JobNotification>(fls: &'f SimFls<'_, N>) -> &'f NorDevice {
    fls.pal().regs().device()
}

fn device_mut<'f, N: JobNotification>(fls: &'f mut SimFls<'_, N>) -> &'f mut NorDevice {
    fls.pal_mut().regs_mut().device_mut()
}

fn invalidations<N: JobNotification>(fls: &SimFls<'_, N>) -> u32 {
    fls.pal().regs().invalidations()
}

fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

// ============================================================================
// Init and vendor detection
// ============================================================================

#[test]
fn test_init_detects_micron() {
    let (fls, _) = micron();
    assert_eq!(fls.status(), MemIfStatus::Idle);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(fls.pal().vendor(), Vendor::Micron);
    assert_eq!(fls.pal().jedec_id().unwrap().device, 0xBA20);
    assert_eq!(fls.pal().transfer_mode(), TransferMode::QspiDdrBurst);
    assert_eq!(fls.pal().calibrated_tap(), 3);
    assert_eq!(fls.sector_size(), 64 * 1024);
    assert_eq!(fls.page_size(), 256);
    assert_eq!(fls.pal().regs().resets(), 1);
}

#[test]
fn test_small_window_selects_4k_sectors() {
    let config = FlsConfig {
        write_window_size: 64 * 1024,
        ..FlsConfig::default()
    };
    let (fls, _) = driver(SimConfig::micron(), &config);
    assert_eq!(fls.sector_size(), 4 * 1024);
}

#[test]
fn test_unknown_vendor_stays_uninit() {
    let clock = SimClock::new();
    let mut fls: SimFls<'_> = Fls::new(sim_pal(SimConfig::unknown(), clock), ());
    assert_eq!(fls.init(&FlsConfig::default()), Err(PalError::NotSupported));
    assert_eq!(fls.status(), MemIfStatus::Uninit);
    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.pal().transfer_mode(), TransferMode::SpiSdrBurst);

    let mut buf = [0u8; 16];
    assert_eq!(fls.read(0, &mut buf), Err(RequestError::NotIdle));
}

#[test]
fn test_macronix_setup_sequence() {
    let (fls, _) = driver(SimConfig::macronix(), &FlsConfig::default());
    let dev = device(&fls);
    assert_eq!(fls.pal().vendor(), Vendor::Macronix);
    assert_eq!(dev.status_writes(), &[vec![0x40, 0x87]]);
    assert_eq!(dev.count(opcodes::EXSO), 1);
    assert!(!dev.in_secured_area());
}

#[test]
fn test_cypress_setup_sequence() {
    let (fls, _) = driver(SimConfig::cypress(), &FlsConfig::default());
    let dev = device(&fls);
    assert_eq!(dev.register(opcodes::CYPRESS_CR1V), Some(opcodes::CYPRESS_CR1V_QUAD as u8));
    assert_eq!(dev.register(opcodes::CYPRESS_CR2V), Some(opcodes::CYPRESS_CR2V_4B as u8));
    assert_eq!(fls.pal().transfer_mode(), TransferMode::QspiSdrBurst);
}

#[test]
fn test_second_init_skips_device_bring_up() {
    let (mut fls, _) = micron();
    device_mut(&mut fls).clear_commands();
    assert_eq!(fls.init(&FlsConfig::default()), Ok(()));
    assert_eq!(device(&fls).count(opcodes::RDID), 0);
    assert_eq!(fls.status(), MemIfStatus::Idle);
}

#[test]
fn test_invalid_config_fails_init() {
    let clock = SimClock::new();
    let mut fls: SimFls<'_> = Fls::new(sim_pal(SimConfig::micron(), clock), ());
    let config = FlsConfig {
        read_at_once: [0, 4096],
        ..FlsConfig::default()
    };
    assert_eq!(fls.init(&config), Err(PalError::Parameter));
    assert_eq!(fls.status(), MemIfStatus::Uninit);
}

// ============================================================================
// Calibration
// ============================================================================

#[test]
fn test_calibration_picks_window_middle() {
    let sim = SimConfig {
        passing_taps: 4..=7,
        ..SimConfig::micron()
    };
    let (fls, _) = driver(sim, &FlsConfig::default());
    assert_eq!(fls.pal().calibrated_tap(), 5);
    assert_eq!(fls.pal().transfer_mode(), TransferMode::QspiDdrBurst);
}

#[test]
fn test_failed_calibration_falls_back_to_sdr() {
    let sim = SimConfig {
        passing_taps: 9..=9,
        ..SimConfig::micron()
    };
    let (mut fls, _) = driver(sim, &FlsConfig::default());
    assert!(fls.pal().calibrated_tap() >= 8);
    assert_eq!(fls.pal().transfer_mode(), TransferMode::QspiSdrBurst);

    let data = pattern(64);
    device_mut(&mut fls).fill(0x3000, &data);
    let mut buf = vec![0u8; 64];
    fls.read(0x3000, &mut buf).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(fls.take_buffer().unwrap(), &data[..]);
}

#[test]
fn test_calibration_is_rate_limited() {
    let (mut fls, clock) = micron();
    let mut buf = [0u8; 4];
    let mut second = [0u8; 4];

    let before = invalidations(&fls);
    fls.read(0, &mut buf).unwrap();
    settle(&mut fls);
    // one line for the read, none for calibration
    assert_eq!(invalidations(&fls) - before, 1);

    clock.advance(rpcflash_core::pal::CALIBRATION_INTERVAL_US + 1);
    let before = invalidations(&fls);
    fls.take_buffer();
    fls.read(0, &mut second).unwrap();
    settle(&mut fls);
    // eight taps plus the read line
    assert_eq!(invalidations(&fls) - before, 9);
}

// ============================================================================
// Jobs
// ============================================================================

#[test]
fn test_erase_opcode_follows_sector_size() {
    let (mut fls, _) = micron();
    fls.erase(0x10000, 0x20000).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(device(&fls).count(opcodes::BE64_4B), 2);
    assert_eq!(device(&fls).count(opcodes::SE_4B), 0);

    let config = FlsConfig {
        write_window_size: 64 * 1024,
        ..FlsConfig::default()
    };
    let (mut fls, _) = driver(SimConfig::micron(), &config);
    fls.erase(0, 0x2000).unwrap();
    settle(&mut fls);
    let dev = device(&fls);
    assert_eq!(dev.count(opcodes::SE_4B), 2);
    let addrs: Vec<_> = dev
        .commands()
        .iter()
        .filter(|cmd| cmd.opcode == opcodes::SE_4B)
        .map(|cmd| cmd.addr)
        .collect();
    assert_eq!(addrs, vec![Some(0), Some(0x1000)]);
}

#[test]
fn test_erase_4k_uses_4k_opcode() {
    let (mut fls, _) = micron();
    fls.erase_4k(0x10000, 0x10000).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(device(&fls).count(opcodes::SE_4B), 1);
    assert_eq!(device(&fls).count(opcodes::BE64_4B), 0);
}

#[test]
fn test_erase_write_read_round_trip() {
    let (mut fls, _) = micron();
    let data = pattern(1024);
    let mut buf = vec![0u8; 1024];

    device_mut(&mut fls).fill(0x20000, &[0u8; 64]);
    fls.erase(0x20000, 0x10000).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);

    fls.blank_check(0x20000, 0x10000).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);

    fls.write(0x20000, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(device(&fls).count(opcodes::PP_4B), 4);
    assert_eq!(&device(&fls).data()[0x20000..0x20400], &data[..]);

    fls.compare(0x20000, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);

    fls.read(0x20000, &mut buf).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(fls.take_buffer().unwrap(), &data[..]);

    fls.blank_check(0x20000, 0x10000).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.last_return(), Err(PalError::Erase));
}

#[test]
fn test_compare_mismatch_fails() {
    let (mut fls, _) = micron();
    let data = pattern(100);
    let mut on_flash = data.clone();
    on_flash[97] ^= 0x01;
    device_mut(&mut fls).fill(0x4000, &on_flash);

    fls.compare(0x4000, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.last_return(), Err(PalError::Verify));
}

#[test]
fn test_unaligned_write_chunks_stay_in_page() {
    let (mut fls, _) = micron();
    let data = pattern(0x200);
    fls.write(0x50F0, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);

    let dev = device(&fls);
    let programs: Vec<_> = dev
        .commands()
        .iter()
        .filter(|cmd| cmd.opcode == opcodes::PP_4B)
        .map(|cmd| (cmd.addr, cmd.data.len()))
        .collect();
    assert_eq!(
        programs,
        vec![
            (Some(0x50F0), 0x10),
            (Some(0x5100), 0x100),
            (Some(0x5200), 0xF0),
        ]
    );
    assert_eq!(&dev.data()[0x50F0..0x52F0], &data[..]);
}

#[test]
fn test_write_length_not_multiple_of_16_fails() {
    let (mut fls, _) = micron();
    let data = pattern(20);
    fls.write(0x6000, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.last_return(), Err(PalError::Align));
}

#[test]
fn test_back_to_back_write_rejected() {
    let (mut fls, _) = micron();
    let first = pattern(256);
    let second = vec![0u8; 256];

    fls.write(0x8000, &first).unwrap();
    assert_eq!(fls.status(), MemIfStatus::Busy);
    assert_eq!(fls.job(), JobKind::Write);
    assert_eq!(fls.write(0x9000, &second), Err(RequestError::NotIdle));

    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(&device(&fls).data()[0x8000..0x8100], &first[..]);
    assert!(device(&fls).data()[0x9000..0x9100].iter().all(|&b| b == 0xFF));
}

#[test]
fn test_rejected_requests_leave_state_alone() {
    let config = FlsConfig {
        write_window_start: 0x10000,
        write_window_size: 0x100000,
        ..FlsConfig::default()
    };
    let (mut fls, _) = driver(SimConfig::micron(), &config);
    let data = pattern(16);

    assert_eq!(
        fls.erase(0x10001, 0x10000),
        Err(RequestError::Misaligned {
            addr: 0x10001,
            len: 0x10000
        })
    );
    assert_eq!(
        fls.write(0xFFFF, &data),
        Err(RequestError::OutOfWindow {
            addr: 0xFFFF,
            len: 16
        })
    );
    assert!(matches!(
        fls.erase(0x100000, 0x20000),
        Err(RequestError::OutOfWindow { .. })
    ));
    assert_eq!(fls.status(), MemIfStatus::Idle);
    assert_eq!(fls.job(), JobKind::Idle);
    assert_eq!(fls.job_result(), JobResult::Ok);
}

#[test]
fn test_locked_driver_refuses_and_skips() {
    let (mut fls, _) = micron();
    let mut buf = [0u8; 4];
    assert!(fls.lock().try_acquire());
    assert_eq!(fls.read(0, &mut buf), Err(RequestError::Locked));

    device_mut(&mut fls).clear_commands();
    fls.main_function();
    assert!(device(&fls).commands().is_empty());
    fls.lock().release();
}

#[test]
fn test_nvm_offset_applied_once() {
    let config = FlsConfig {
        nvm_offset: 0x40000,
        ..FlsConfig::default()
    };
    let (mut fls, _) = driver(SimConfig::micron(), &config);
    let data = pattern(32);
    fls.write(0x100, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(&device(&fls).data()[0x40100..0x40120], &data[..]);

    let config = FlsConfig {
        nvm_offset: 0xFFFF_FF00,
        ..FlsConfig::default()
    };
    let (mut fls, _) = driver(SimConfig::micron(), &config);
    let mut buf = [0u8; 0x200];
    assert_eq!(fls.read(0, &mut buf), Err(RequestError::AddressOverflow));
}

#[test]
fn test_mode_selects_chunk_size() {
    let (mut fls, _) = micron();
    let mut fast = vec![0u8; 1024];
    let mut slow = vec![0u8; 1024];

    fls.read(0, &mut fast).unwrap();
    // one chunk, one poll to finish
    assert_eq!(settle(&mut fls), 2);

    fls.take_buffer();
    fls.set_mode(MemIfMode::Slow);
    fls.read(0, &mut slow).unwrap();
    assert_eq!(settle(&mut fls), 5);
}

#[test]
fn test_remaining_tracks_progress() {
    let (mut fls, _) = micron();
    fls.set_mode(MemIfMode::Slow);
    let mut buf = vec![0u8; 600];
    assert_eq!(fls.remaining(), 0);

    fls.read(0, &mut buf).unwrap();
    assert_eq!(fls.remaining(), 600);
    fls.main_function();
    assert_eq!(fls.remaining(), 344);
    fls.main_function();
    fls.main_function();
    assert_eq!(fls.remaining(), 0);
    settle(&mut fls);
    assert_eq!(fls.remaining(), 0);
}

#[test]
fn test_idle_main_function_does_nothing() {
    let (mut fls, _) = micron();
    device_mut(&mut fls).clear_commands();
    fls.main_function();
    assert!(device(&fls).commands().is_empty());
}

#[test]
fn test_set_sector_size() {
    let (mut fls, _) = micron();
    assert_eq!(fls.set_sector_size(0x1000), Ok(()));
    assert_eq!(fls.sector_size(), 0x1000);
    assert_eq!(fls.set_sector_size(0x2000), Err(PalError::Size));
    assert_eq!(fls.sector_size(), 0x1000);

    fls.erase(0x1000, 0x1000).unwrap();
    settle(&mut fls);
    assert_eq!(device(&fls).count(opcodes::SE_4B), 1);
}

#[test]
fn test_sector_size_locked_during_erase() {
    let (mut fls, _) = micron();
    fls.set_sector_size(0x1000).unwrap();
    device_mut(&mut fls).fill(0x1000, &[0u8; 0x2000]);

    fls.erase(0x1000, 0x2000).unwrap();
    fls.main_function();
    assert_eq!(fls.set_sector_size(0x10000), Err(PalError::Busy));
    assert_eq!(fls.sector_size(), 0x1000);

    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(device(&fls).count(opcodes::SE_4B), 2);
    assert!(device(&fls).data()[0x1000..0x3000].iter().all(|&b| b == 0xFF));
    assert_eq!(fls.set_sector_size(0x10000), Ok(()));
}

#[derive(Default)]
struct Counter {
    ends: usize,
    errors: usize,
}

impl JobNotification for Counter {
    fn job_end(&mut self) {
        self.ends += 1;
    }

    fn job_error(&mut self) {
        self.errors += 1;
    }
}

#[test]
fn test_notifications() {
    let clock = SimClock::new();
    let mut fls: SimFls<'_, Counter> =
        Fls::new(sim_pal(SimConfig::micron(), clock), Counter::default());
    fls.init(&FlsConfig::default()).unwrap();

    let data = pattern(16);
    fls.write(0x100, &data).unwrap();
    settle(&mut fls);
    fls.compare(0x200, &data).unwrap();
    settle(&mut fls);
    fls.cancel();

    assert_eq!(fls.notifier().ends, 1);
    assert_eq!(fls.notifier().errors, 1);
}

// ============================================================================
// Busy handling
// ============================================================================

#[test]
fn test_timeout_after_exact_budget() {
    let (mut fls, clock) = micron();
    let data = pattern(256);
    fls.write(0x7000, &data).unwrap();
    fls.main_function();
    device_mut(&mut fls).set_busy(BUSY_FOREVER);

    let budget = fls.config().write_at_once[MemIfMode::Fast.index()]
        * fls.pal().word_write_timeout_us();
    clock.advance(budget);
    fls.main_function();
    assert_eq!(fls.job_result(), JobResult::Pending);
    assert_eq!(fls.last_return(), Ok(DeviceState::Busy));

    clock.advance(1);
    fls.main_function();
    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.last_return(), Err(PalError::Timeout));
    assert_eq!(fls.status(), MemIfStatus::Idle);
}

#[test]
fn test_reads_wait_without_timeout() {
    let (mut fls, clock) = micron();
    let mut buf = [0u8; 16];
    fls.read(0, &mut buf).unwrap();
    device_mut(&mut fls).set_busy(BUSY_FOREVER);
    clock.advance(u32::MAX / 2);
    fls.main_function();
    assert_eq!(fls.job_result(), JobResult::Pending);

    device_mut(&mut fls).set_busy(0);
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
}

#[test]
fn test_cancel_is_idempotent() {
    let (mut fls, _) = micron();
    fls.cancel();
    assert_eq!(fls.job_result(), JobResult::Canceled);
    assert_eq!(fls.status(), MemIfStatus::Idle);

    let data = pattern(512);
    fls.write(0xA000, &data).unwrap();
    fls.main_function();
    fls.cancel();
    assert_eq!(fls.job_result(), JobResult::Canceled);
    assert_eq!(fls.job(), JobKind::Idle);
    assert_eq!(fls.status(), MemIfStatus::Idle);
    assert_eq!(&device(&fls).data()[0xA000..0xA100], &data[..256]);
    assert!(device(&fls).data()[0xA100..0xA200].iter().all(|&b| b == 0xFF));

    fls.cancel();
    assert_eq!(fls.job_result(), JobResult::Canceled);
    assert_eq!(fls.status(), MemIfStatus::Idle);

    fls.erase(0xA000 & !0xFFFF, 0x10000).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
}

#[test]
fn test_cancel_keeps_uninit_driver_uninit() {
    let clock = SimClock::new();
    let mut fls: SimFls<'_> = Fls::new(sim_pal(SimConfig::micron(), clock), ());
    fls.cancel();
    assert_eq!(fls.status(), MemIfStatus::Uninit);
    assert_eq!(fls.job_result(), JobResult::Canceled);
    assert_eq!(fls.erase(0, 0x10000), Err(RequestError::NotIdle));

    fls.emergency_unlock().ok();
    assert_eq!(fls.status(), MemIfStatus::Uninit);
    assert_eq!(fls.erase(0, 0x10000), Err(RequestError::NotIdle));

    device_mut(&mut fls).clear_commands();
    for _ in 0..100 {
        fls.main_function();
    }
    assert!(device(&fls).commands().is_empty());
    assert_eq!(fls.remaining(), 0);
}

#[test]
fn test_cancel_after_failed_init_stays_uninit() {
    let clock = SimClock::new();
    let mut fls: SimFls<'_> = Fls::new(sim_pal(SimConfig::unknown(), clock), ());
    assert!(fls.init(&FlsConfig::default()).is_err());
    fls.cancel();
    assert_eq!(fls.status(), MemIfStatus::Uninit);
    let data = pattern(16);
    assert_eq!(fls.write(0, &data), Err(RequestError::NotIdle));
}

#[test]
fn test_emergency_unlock() {
    let (mut fls, clock) = micron();
    let data = pattern(256);
    fls.write(0xB000, &data).unwrap();
    fls.main_function();
    device_mut(&mut fls).set_busy(BUSY_FOREVER);

    // holder died with the lock taken
    assert!(fls.lock().try_acquire());
    fls.main_function();
    assert_eq!(fls.job_result(), JobResult::Pending);

    clock.set_step(1);
    assert_eq!(fls.emergency_unlock(), Ok(DeviceState::Busy));
    assert!(!fls.lock().is_held());
    assert_eq!(fls.job_result(), JobResult::Canceled);
    assert_eq!(fls.status(), MemIfStatus::Idle);
    assert_eq!(fls.job(), JobKind::Idle);
}

#[test]
fn test_cypress_erase_error_is_cleared() {
    let (mut fls, _) = driver(SimConfig::cypress(), &FlsConfig::default());
    device_mut(&mut fls).fail_next_erase();
    fls.erase(0x30000, 0x10000).unwrap();
    settle(&mut fls);

    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.last_return(), Err(PalError::Erase));
    let dev = device(&fls);
    assert_eq!(dev.count(opcodes::CLSR), 1);
    assert!(!dev.status().contains(opcodes::StatusReg::E_ERR));
}

#[test]
fn test_cypress_program_error_is_write_error() {
    let (mut fls, _) = driver(SimConfig::cypress(), &FlsConfig::default());
    device_mut(&mut fls).fail_next_program();
    let data = pattern(32);
    fls.write(0x100, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.last_return(), Err(PalError::Write));
}

// ============================================================================
// OTP
// ============================================================================

#[test]
fn test_micron_otp() {
    let (mut fls, _) = micron();
    let data = [0x12, 0x34, 0x56];
    let mut buf = [0u8; 3];

    fls.otp_write(0x10, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(&device(&fls).otp()[0x10..0x14], &[0x12, 0x34, 0x56, 0xFF]);
    assert_eq!(device(&fls).count(opcodes::OTP_PROGRAM), 1);

    fls.otp_read(0x10, &mut buf).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(fls.take_buffer().unwrap(), &data[..]);

    assert_eq!(fls.lock_otp(), Ok(()));
    assert!(device(&fls).otp_locked());
}

#[test]
fn test_otp_jobs_split_into_words() {
    let (mut fls, _) = micron();
    let data = [1, 2, 3, 4, 5, 6];
    fls.otp_write(0x20, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(device(&fls).count(opcodes::OTP_PROGRAM), 2);
    assert_eq!(&device(&fls).otp()[0x20..0x26], &data);
}

#[test]
fn test_macronix_otp_uses_secured_area() {
    let (mut fls, _) = driver(SimConfig::macronix(), &FlsConfig::default());
    let data = [0xA0, 0x0B];
    let mut buf = [0u8; 2];

    fls.otp_write(0x4, &data).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Ok);
    assert_eq!(&device(&fls).otp()[0x4..0x6], &data);
    assert!(!device(&fls).in_secured_area());
    assert!(device(&fls).data()[0x4..0x6].iter().all(|&b| b == 0xFF));

    fls.otp_read(0x4, &mut buf).unwrap();
    settle(&mut fls);
    assert_eq!(fls.take_buffer().unwrap(), &data[..]);
    assert!(!device(&fls).in_secured_area());

    assert_eq!(fls.lock_otp(), Ok(()));
    assert!(device(&fls).otp_locked());
}

#[test]
fn test_otp_not_supported_on_cypress() {
    let (mut fls, _) = driver(SimConfig::cypress(), &FlsConfig::default());
    let mut buf = [0u8; 4];
    fls.otp_read(0, &mut buf).unwrap();
    settle(&mut fls);
    assert_eq!(fls.job_result(), JobResult::Failed);
    assert_eq!(fls.last_return(), Err(PalError::NotSupported));
    assert_eq!(fls.lock_otp(), Err(PalError::NotSupported));
}

#[test]
fn test_lock_otp_refused_while_busy() {
    let (mut fls, _) = micron();
    let mut buf = [0u8; 4];
    fls.read(0, &mut buf).unwrap();
    assert_eq!(fls.lock_otp(), Err(PalError::Busy));
    assert!(!device(&fls).otp_locked());
}

// ============================================================================
// Protocol driver
// ============================================================================

#[test]
fn test_program_page_checks() {
    let (mut fls, _) = micron();
    let pal = fls.pal_mut();
    assert_eq!(pal.program_page(0x08, &[0; 16]), Err(PalError::Align));
    assert_eq!(pal.program_page(0xF0, &[0; 32]), Err(PalError::Align));
    assert_eq!(pal.program_page(0x100, &[0; 24]), Err(PalError::Align));
    assert_eq!(pal.program_page(0, &[0; 272]), Err(PalError::Size));
    assert_eq!(pal.program_page(0, &[]), Err(PalError::Size));
}

#[test]
fn test_erase_sector_checks() {
    let (mut fls, _) = micron();
    let pal = fls.pal_mut();
    assert_eq!(pal.erase_sector(0x1000), Err(PalError::Align));
    assert_eq!(pal.erase_sector(pal.device_size()), Err(PalError::Size));
}

#[test]
fn test_stalled_transfer_times_out() {
    let (mut fls, clock) = micron();
    clock.set_step(1);
    fls.pal_mut().regs_mut().stall_transfers(true);
    assert_eq!(fls.pal_mut().write_enable(), Err(PalError::Timeout));
}

#[test]
fn test_otp_length_checked() {
    let (mut fls, _) = micron();
    let pal = fls.pal_mut();
    assert_eq!(pal.otp_write(0, &[]), Err(PalError::Parameter));
    let mut buf = [0u8; 5];
    assert_eq!(pal.otp_read(0, &mut buf), Err(PalError::Parameter));
}

#[test]
fn test_read_across_window_boundary() {
    let (mut fls, _) = micron();
    let pal = fls.pal_mut();
    pal.set_parameters(256, 64 * 1024, 0x0800_0000, 5000, 3000).unwrap();

    let mut buf = [0u8; 32];
    pal.read(0x03FF_FFF0, &mut buf).unwrap();
    assert!(buf.iter().all(|&b| b == 0xFF));
    // last segment selects the second window
    assert_eq!(pal.regs().reg(RPC_DREAR), 0x0002_0001);

    assert_eq!(pal.start_read(0x03FF_FFF0, 32), Err(PalError::Align));
    assert_eq!(pal.start_read(0x07FF_FFF0, 32), Err(PalError::Size));
}
