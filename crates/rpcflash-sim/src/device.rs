//! Emulated serial NOR device
//!
//! Executes one SPI command at a time. Program and erase leave the device
//! busy for a configurable number of status polls.

use std::collections::BTreeMap;

use rpcflash_core::sdf::opcodes;
use rpcflash_core::sdf::StatusReg;

use crate::SimConfig;

/// Busy poll count that never runs out
pub const BUSY_FOREVER: u32 = u32::MAX;

/// One command as seen on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Opcode
    pub opcode: u8,
    /// Address phase, if any
    pub addr: Option<u32>,
    /// Bytes sent after the address
    pub data: Vec<u8>,
}

/// Emulated flash device
#[derive(Debug)]
pub struct NorDevice {
    config: SimConfig,
    data: Vec<u8>,
    otp: Vec<u8>,
    otp_locked: bool,
    secured: bool,
    status: StatusReg,
    busy_polls: u32,
    registers: BTreeMap<u32, u8>,
    status_writes: Vec<Vec<u8>>,
    fail_next_erase: bool,
    fail_next_program: bool,
    log: Vec<Command>,
}

impl NorDevice {
    /// Create an erased device
    pub fn new(config: SimConfig) -> Self {
        let mut device = Self {
            data: vec![0xFF; config.size],
            otp: vec![0xFF; config.otp_size],
            otp_locked: false,
            secured: false,
            status: StatusReg::empty(),
            busy_polls: 0,
            registers: BTreeMap::new(),
            status_writes: Vec::new(),
            fail_next_erase: false,
            fail_next_program: false,
            log: Vec::new(),
            config,
        };
        if let Some(addr) = device.config.calibration_pattern_at {
            let pattern = rpcflash_core::pal::CALIBRATION_PATTERN.to_le_bytes();
            device.fill(addr, &pattern);
        }
        device
    }

    /// Device configuration
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Main array contents
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Overwrite main array contents without going through the bus
    pub fn fill(&mut self, addr: u32, bytes: &[u8]) {
        let start = addr as usize;
        let end = (start + bytes.len()).min(self.data.len());
        if start < end {
            self.data[start..end].copy_from_slice(&bytes[..end - start]);
        }
    }

    /// OTP contents
    pub fn otp(&self) -> &[u8] {
        &self.otp
    }

    /// Whether the OTP area has been locked
    pub fn otp_locked(&self) -> bool {
        self.otp_locked
    }

    /// Whether the secured OTP area is entered
    pub fn in_secured_area(&self) -> bool {
        self.secured
    }

    /// Raw status register
    pub fn status(&self) -> StatusReg {
        self.status
    }

    /// Value written to an addressed configuration register
    pub fn register(&self, addr: u32) -> Option<u8> {
        self.registers.get(&addr).copied()
    }

    /// Payloads of all status register writes
    pub fn status_writes(&self) -> &[Vec<u8>] {
        &self.status_writes
    }

    /// Keep the device busy for `polls` status reads
    pub fn set_busy(&mut self, polls: u32) {
        self.busy_polls = polls;
    }

    /// Busy polls set after each program or erase
    pub fn set_cycle_polls(&mut self, polls: u32) {
        self.config.busy_polls = polls;
    }

    /// Make the next erase fail with the erase error bit
    pub fn fail_next_erase(&mut self) {
        self.fail_next_erase = true;
    }

    /// Make the next page program fail with the program error bit
    pub fn fail_next_program(&mut self) {
        self.fail_next_program = true;
    }

    /// Every command seen so far
    pub fn commands(&self) -> &[Command] {
        &self.log
    }

    /// Number of commands seen with `opcode`
    pub fn count(&self, opcode: u8) -> usize {
        self.log.iter().filter(|cmd| cmd.opcode == opcode).count()
    }

    /// Forget captured commands
    pub fn clear_commands(&mut self) {
        self.log.clear();
    }

    /// Read main array bytes through the memory-mapped path
    pub fn read_array(&self, addr: u32, dst: &mut [u8]) {
        for (i, byte) in dst.iter_mut().enumerate() {
            *byte = self.data.get(addr as usize + i).copied().unwrap_or(0xFF);
        }
    }

    /// Run one command
    pub fn transfer(&mut self, opcode: u8, addr: Option<u32>, tx: &[u8], rx: &mut [u8]) {
        log::trace!("sim: 0x{:02X} addr {:?} tx {:02X?}", opcode, addr, tx);
        self.log.push(Command {
            opcode,
            addr,
            data: tx.to_vec(),
        });

        let addr_or_zero = addr.unwrap_or(0);
        match opcode {
            opcodes::RDID => {
                let id = [
                    self.config.manufacturer_id,
                    (self.config.device_id >> 8) as u8,
                    self.config.device_id as u8,
                    0,
                ];
                for (dst, src) in rx.iter_mut().zip(id) {
                    *dst = src;
                }
            }
            opcodes::RDSR => {
                let mut status = self.status;
                if self.busy_polls > 0 {
                    status |= StatusReg::WIP;
                    if self.busy_polls != BUSY_FOREVER {
                        self.busy_polls -= 1;
                    }
                }
                if let Some(first) = rx.first_mut() {
                    *first = status.bits();
                }
            }
            opcodes::WREN => self.status.insert(StatusReg::WEL),
            opcodes::WRDI => self.status.remove(StatusReg::WEL),
            opcodes::CLSR => self
                .status
                .remove(StatusReg::E_ERR | StatusReg::P_ERR),
            opcodes::WRSR => {
                if self.take_write_enable() {
                    self.status_writes.push(tx.to_vec());
                }
            }
            opcodes::WRAR => {
                if self.take_write_enable() {
                    if let Some(&value) = tx.first() {
                        self.registers.insert(addr_or_zero, value);
                    }
                }
            }
            opcodes::ENSO => self.secured = true,
            opcodes::EXSO => self.secured = false,
            opcodes::READ if self.secured => self.read_otp(addr_or_zero, rx),
            opcodes::READ | opcodes::FAST_READ => self.read_array(addr_or_zero, rx),
            opcodes::PP if self.secured => self.program_otp(addr_or_zero, tx),
            opcodes::PP | opcodes::PP_4B => self.program(addr_or_zero, tx),
            opcodes::OTP_READ => self.read_otp(addr_or_zero, rx),
            opcodes::OTP_PROGRAM => self.program_otp(addr_or_zero, tx),
            opcodes::WRSCUR => {
                if self.take_write_enable() {
                    self.otp_locked = true;
                }
            }
            opcodes::SE_4B => self.erase(addr_or_zero, 4 * 1024),
            opcodes::BE32_4B => self.erase(addr_or_zero, 32 * 1024),
            opcodes::BE64_4B => self.erase(addr_or_zero, 64 * 1024),
            _ => log::warn!("sim: unsupported opcode 0x{:02X}", opcode),
        }
    }

    fn take_write_enable(&mut self) -> bool {
        if self.status.contains(StatusReg::WEL) {
            self.status.remove(StatusReg::WEL);
            true
        } else {
            log::warn!("sim: write without write enable");
            false
        }
    }

    fn start_cycle(&mut self) {
        self.busy_polls = self.config.busy_polls;
    }

    fn program(&mut self, addr: u32, tx: &[u8]) {
        if !self.take_write_enable() {
            return;
        }
        self.start_cycle();
        if self.fail_next_program {
            self.fail_next_program = false;
            self.status.insert(StatusReg::P_ERR);
            return;
        }
        // Program only clears bits
        for (i, &byte) in tx.iter().enumerate() {
            match self.data.get_mut(addr as usize + i) {
                Some(cell) => *cell &= byte,
                None => {
                    log::warn!("sim: program beyond device end at 0x{:08X}", addr);
                    break;
                }
            }
        }
    }

    fn erase(&mut self, addr: u32, size: usize) {
        if !self.take_write_enable() {
            return;
        }
        self.start_cycle();
        if self.fail_next_erase {
            self.fail_next_erase = false;
            self.status.insert(StatusReg::E_ERR);
            return;
        }
        let start = addr as usize & !(size - 1);
        let end = (start + size).min(self.data.len());
        if start >= end {
            log::warn!("sim: erase beyond device end at 0x{:08X}", addr);
            return;
        }
        self.data[start..end].fill(0xFF);
    }

    fn read_otp(&self, addr: u32, rx: &mut [u8]) {
        for (i, byte) in rx.iter_mut().enumerate() {
            *byte = self.otp.get(addr as usize + i).copied().unwrap_or(0xFF);
        }
    }

    fn program_otp(&mut self, addr: u32, tx: &[u8]) {
        if !self.take_write_enable() {
            return;
        }
        if self.otp_locked {
            log::warn!("sim: OTP program while locked");
            return;
        }
        for (i, &byte) in tx.iter().enumerate() {
            let at = addr + i as u32;
            if let Some(cell) = self.otp.get_mut(at as usize) {
                *cell &= byte;
            }
            if Some(at) == self.config.otp_lock_addr && byte & 1 == 0 {
                self.otp_locked = true;
            }
        }
    }
}
