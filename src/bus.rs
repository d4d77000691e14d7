use crate::{
  config::MachineConfig,
  error::EmuResult,
  mem::MemoryImage,
  regs::{self, RegisterWrite},
  tia::{Tia, TickCount},
};

/// Routes CPU accesses to memory or to the register window, and owes the
/// raster engine the ticks of every executed cycle. Owed ticks are paid
/// lazily: right before a register access, and when a tick budget runs out.
/// A register write never overtakes owed ticks: when the budget stops the
/// engine short, the write waits until the debt is paid.
pub struct Bus {
  mem: MemoryImage,
  pub tia: Tia,
  ticks_per_cycle: u64,
  pending: u64,
  budget: u64,
  deferred: Vec<(u16, u8)>,
}

enum BusTarget {
  Registers, Memory,
}

impl Bus {
  pub fn new(config: &MachineConfig) -> Self {
    Self {
      mem: MemoryImage::new(config.memory_size),
      tia: Tia::new(config.geometry),
      ticks_per_cycle: config.ticks_per_cpu_cycle,
      pending: 0,
      budget: 0,
      deferred: Vec::new(),
    }
  }

  pub fn reset(&mut self) {
    self.mem.clear();
    self.restart();
  }

  /// Fresh engine and no owed ticks; memory is kept.
  pub fn restart(&mut self) {
    self.tia.reset();
    self.pending = 0;
    self.budget = 0;
    self.deferred.clear();
  }

  pub fn mem(&self) -> &MemoryImage { &self.mem }
  pub fn mem_mut(&mut self) -> &mut MemoryImage { &mut self.mem }

  fn map(&self, addr: u16) -> BusTarget {
    if addr < regs::WINDOW { BusTarget::Registers } else { BusTarget::Memory }
  }

  pub fn read(&mut self, addr: u16) -> EmuResult<u8> {
    match self.map(addr) {
      BusTarget::Registers => {
        self.flush();
        // reading the sync strobe still stalls the beam
        if RegisterWrite::decode(addr).is_some_and(|r| r.is_strobe()) {
          self.sync_line();
        }
        Ok(self.tia.read(addr))
      }
      BusTarget::Memory => self.mem.read(addr as usize),
    }
  }

  pub fn write(&mut self, addr: u16, val: u8) -> EmuResult<()> {
    match self.map(addr) {
      BusTarget::Registers => {
        self.flush();
        if RegisterWrite::decode(addr).is_some_and(|r| r.is_strobe()) {
          self.sync_line();
        } else if self.pending > 0 {
          log::trace!("register write {addr:02X} <- {val:02X} waits for {} ticks", self.pending);
          self.deferred.push((addr, val));
        } else {
          self.tia.write(addr, val);
        }
        Ok(())
      }
      BusTarget::Memory => self.mem.write(addr as usize, val),
    }
  }

  /// Side effect free read, for debuggers and tests.
  pub fn peek(&self, addr: u16) -> EmuResult<u8> {
    match self.map(addr) {
      BusTarget::Registers => Ok(self.tia.read(addr)),
      BusTarget::Memory => self.mem.read(addr as usize),
    }
  }

  pub fn read16(&mut self, addr: u16) -> EmuResult<u16> {
    let lo = self.read(addr)?;
    let hi = self.read(addr.wrapping_add(1))?;
    Ok(u16::from_le_bytes([lo, hi]))
  }

  /// Charges `cycles` CPU cycles to the engine.
  pub fn cycles(&mut self, cycles: u8) {
    self.pending += cycles as u64 * self.ticks_per_cycle;
  }

  /// Allows the engine to run up to `ticks` more ticks.
  pub fn begin_slice(&mut self, ticks: TickCount) {
    self.budget = ticks.get();
  }

  pub fn slice_done(&self) -> bool {
    self.budget == 0
  }

  /// Ticks executed by the CPU but not yet run by the engine.
  pub fn pending_ticks(&self) -> u64 {
    self.pending
  }

  /// Register writes still waiting for owed ticks.
  pub fn deferred_writes(&self) -> &[(u16, u8)] {
    &self.deferred
  }

  /// Pays owed ticks to the engine, as far as the budget allows. Deferred
  /// writes land once nothing is owed.
  pub fn flush(&mut self) {
    let ticks = self.pending.min(self.budget);
    if ticks > 0 {
      self.tia.advance(TickCount::new(ticks));
      self.pending -= ticks;
      self.budget -= ticks;
    }

    if self.pending == 0 {
      for (addr, val) in self.deferred.drain(..) {
        self.tia.write(addr, val);
      }
    }
  }

  fn sync_line(&mut self) {
    if self.pending == 0 && self.tia.ticks_to_line_end() <= self.budget {
      let ticks = self.tia.wait_for_line_end();
      self.budget -= ticks;
      return;
    }

    // the beam is ahead of the engine by the owed ticks
    let line = self.tia.geometry().ticks_per_scanline as u64;
    let column = (self.tia.position().column as u64 + self.pending) % line;
    self.pending += line - column;
    self.flush();
  }
}

#[cfg(test)]
mod bus_tests {
  use super::*;
  use crate::{error::EmuError, regs::*, tia::RasterPosition};

  fn bus() -> Bus {
    Bus::new(&MachineConfig::default())
  }

  #[test]
  fn register_window_bypasses_memory() {
    let mut bus = bus();
    bus.write(COLUBK as u16, 0x44).unwrap();
    assert_eq!(bus.tia.registers().background_color(), 0x44);
    assert_eq!(bus.mem().read(COLUBK as usize), Ok(0));
    assert_eq!(bus.read(COLUBK as u16), Ok(0));

    bus.write(0x80, 0x12).unwrap();
    assert_eq!(bus.read(0x80), Ok(0x12));
  }

  #[test]
  fn pending_ticks_paid_before_register_write() {
    let mut bus = bus();
    bus.begin_slice(TickCount::new(1000));
    bus.cycles(5);
    assert_eq!(bus.tia.position().column, 0);

    bus.write(COLUBK as u16, 0x02).unwrap();
    assert_eq!(bus.tia.position().column, 15);
    assert_eq!(bus.pending_ticks(), 0);
  }

  #[test]
  fn wsync_write_stalls_to_line_end() {
    let mut bus = bus();
    bus.begin_slice(TickCount::new(10_000));
    bus.cycles(10);
    bus.write(WSYNC as u16, 0).unwrap();
    assert_eq!(bus.tia.position(), RasterPosition { scanline: 1, column: 0 });
  }

  #[test]
  fn wsync_read_stalls_and_reads_zero() {
    let mut bus = bus();
    bus.begin_slice(TickCount::new(10_000));
    bus.cycles(3);
    assert_eq!(bus.read(WSYNC as u16), Ok(0));
    assert_eq!(bus.tia.position(), RasterPosition { scanline: 1, column: 0 });
  }

  #[test]
  fn budget_caps_engine_and_carries_debt() {
    let mut bus = bus();
    bus.begin_slice(TickCount::new(10));
    bus.cycles(6);
    bus.flush();
    assert!(bus.slice_done());
    assert_eq!(bus.tia.position().column, 10);
    assert_eq!(bus.pending_ticks(), 8);

    // the stall owes the rest of the line measured from the beam, not the engine
    bus.write(WSYNC as u16, 0).unwrap();
    assert_eq!(bus.pending_ticks(), 228 - 10);

    bus.begin_slice(TickCount::new(1000));
    bus.flush();
    assert_eq!(bus.tia.position(), RasterPosition { scanline: 1, column: 0 });
  }

  #[test]
  fn write_waits_for_owed_ticks() {
    let mut bus = bus();
    bus.begin_slice(TickCount::new(4));
    bus.cycles(3);
    bus.write(COLUBK as u16, 0x44).unwrap();
    assert_eq!(bus.tia.position().column, 4);
    assert_eq!(bus.tia.registers().background_color(), 0);
    assert_eq!(bus.deferred_writes(), &[(COLUBK as u16, 0x44)]);

    bus.begin_slice(TickCount::new(4));
    bus.flush();
    assert_eq!(bus.tia.position().column, 8);
    assert_eq!(bus.tia.registers().background_color(), 0);

    bus.begin_slice(TickCount::new(100));
    bus.flush();
    assert_eq!(bus.tia.position().column, 9);
    assert_eq!(bus.tia.registers().background_color(), 0x44);
    assert!(bus.deferred_writes().is_empty());
    assert!(!bus.slice_done());
  }

  #[test]
  fn restart_drops_deferred_writes() {
    let mut bus = bus();
    bus.cycles(1);
    bus.write(VBLANK as u16, 0x02).unwrap();
    assert_eq!(bus.deferred_writes().len(), 1);

    bus.restart();
    assert!(bus.deferred_writes().is_empty());
    assert_eq!(bus.pending_ticks(), 0);
    assert!(!bus.tia.registers().vblank_active());
  }

  #[test]
  fn memory_errors_propagate() {
    let config = MachineConfig { memory_size: 0x1000, ..Default::default() };
    let mut bus = Bus::new(&config);
    assert_eq!(bus.read(0x1000), Err(EmuError::Addressing { addr: 0x1000, capacity: 0x1000 }));
    assert!(bus.write(0xF000, 0).is_err());
  }
}
