use serde::Serialize;

use crate::{
  config::MachineConfig,
  cpu::{Cpu, CpuSnapshot},
  error::{EmuError, EmuResult},
  frame::{self, DisplaySink, FrameBuffer},
  regs::{HardwareRegisters, RegisterSnapshot},
  tia::{FrameStats, RasterPosition, Tia, TickCount},
};

pub struct Console {
  config: MachineConfig,
  cpu: Cpu,
  faulted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConsoleState {
  pub cpu: CpuSnapshot,
  pub registers: RegisterSnapshot,
  pub position: RasterPosition,
  pub frames: u64,
  pub last_frame: Option<FrameStats>,
  pub pending_ticks: u64,
}

impl Console {
  pub fn new(config: MachineConfig) -> EmuResult<Self> {
    config.validate()?;
    let cpu = Cpu::new(&config);
    Ok(Self { config, cpu, faulted: false })
  }

  /// Builds a console with the reference geometry and boots `program`.
  pub fn boot_from_bytes(program: &[u8]) -> EmuResult<Self> {
    let mut console = Self::new(MachineConfig::default())?;
    console.boot(program)?;
    Ok(console)
  }

  /// Clears memory and the engine, copies `program` to the load base,
  /// points both vectors at it and resets the CPU.
  pub fn boot(&mut self, program: &[u8]) -> EmuResult<()> {
    self.cpu.bus.reset();
    self.faulted = false;

    let result = self.load_program(program);
    if result.is_err() {
      self.faulted = true;
    }
    result
  }

  fn load_program(&mut self, program: &[u8]) -> EmuResult<()> {
    let layout = self.config.layout;
    let mem = self.cpu.bus.mem_mut();
    mem.load(layout.base as usize, program)?;
    mem.write16(layout.reset_vector as usize, layout.base)?;
    mem.write16(layout.irq_vector as usize, layout.base)?;

    log::debug!("booted {} byte program at {:04X}", program.len(), layout.base);
    self.cpu.reset()
  }

  /// Restarts the loaded program from a clean engine and CPU state.
  pub fn reset(&mut self) -> EmuResult<()> {
    self.cpu.bus.restart();
    self.faulted = false;
    let result = self.cpu.reset();
    self.guard(result)
  }

  fn guard<T>(&mut self, result: EmuResult<T>) -> EmuResult<T> {
    if let Err(e) = &result {
      log::warn!("fault at {:04X}: {e}; frame discarded", self.cpu.pc);
      self.faulted = true;
    }
    result
  }

  fn check_faulted(&self) -> EmuResult<()> {
    if self.faulted { Err(EmuError::Faulted) } else { Ok(()) }
  }

  /// Runs one instruction, paying its ticks to the engine immediately.
  pub fn step(&mut self) -> EmuResult<()> {
    self.check_faulted()?;
    self.cpu.bus.begin_slice(TickCount::new(u64::MAX));
    let result = self.cpu.step();
    self.cpu.bus.flush();
    self.cpu.bus.begin_slice(TickCount::default());
    self.guard(result)
  }

  /// Runs the program until the engine has consumed exactly `budget` ticks.
  /// Ticks of an instruction that straddles the budget carry over to the
  /// next call, along with any register write waiting behind them, so
  /// cutting a frame into several budgets draws the same frame.
  pub fn run_ticks(&mut self, budget: TickCount) -> EmuResult<()> {
    self.check_faulted()?;
    self.cpu.bus.begin_slice(budget);

    loop {
      self.cpu.bus.flush();
      if self.cpu.bus.slice_done() { break; }

      let result = self.cpu.step();
      self.guard(result)?;
    }

    Ok(())
  }

  pub fn run_frame(&mut self) -> EmuResult<&FrameBuffer> {
    let ticks = self.config.geometry.ticks_per_frame();
    self.run_ticks(TickCount::new(ticks))?;
    if let Some(stats) = self.cpu.bus.tia.take_frame_ready() {
      log::debug!("frame {} done: {stats:?}", self.get_tia().frames());
    }
    Ok(self.get_screen())
  }

  /// Hands the current frame to `sink`. Refused after a fault.
  pub fn present(&self, sink: &mut dyn DisplaySink) -> EmuResult<()> {
    self.check_faulted()?;
    let (width, height) = self.get_resolution();
    frame::present_to(sink, self.get_screen().snapshot(), width, height)
  }

  pub fn state(&self) -> ConsoleState {
    let tia = self.get_tia();
    ConsoleState {
      cpu: self.cpu.snapshot(),
      registers: tia.registers().snapshot(),
      position: tia.position(),
      frames: tia.frames(),
      last_frame: tia.last_frame_stats(),
      pending_ticks: self.cpu.bus.pending_ticks(),
    }
  }

  pub fn state_json(&self) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&self.state())
  }
}

impl Console {
  pub fn config(&self) -> &MachineConfig { &self.config }
  pub fn is_faulted(&self) -> bool { self.faulted }

  pub fn get_cpu(&mut self) -> &mut Cpu {
    &mut self.cpu
  }

  pub fn get_tia(&self) -> &Tia {
    &self.cpu.bus.tia
  }

  pub fn get_registers(&self) -> &HardwareRegisters {
    self.cpu.bus.tia.registers()
  }

  pub fn get_resolution(&self) -> (usize, usize) {
    (self.config.geometry.visible_width, self.config.geometry.visible_height)
  }

  pub fn get_screen(&self) -> &FrameBuffer {
    self.cpu.bus.tia.lcd()
  }
}

#[cfg(test)]
mod console_tests {
  use super::*;
  use crate::frame::CaptureSink;

  #[test]
  fn boot_sets_vectors() {
    let console = Console::boot_from_bytes(&[0xEA]).unwrap();
    let mem = console.cpu.bus.mem();
    assert_eq!(mem.read16(0xFFFC), Ok(0xF000));
    assert_eq!(mem.read16(0xFFFE), Ok(0xF000));
    assert_eq!(console.cpu.pc, 0xF000);
  }

  #[test]
  fn oversized_program_is_load_overflow() {
    let mut console = Console::new(MachineConfig::default()).unwrap();
    let err = console.boot(&vec![0xEA; 0x1001]).unwrap_err();
    assert_eq!(err, EmuError::LoadOverflow { base: 0xF000, len: 0x1001, capacity: 0x10000 });
    assert!(console.cpu.bus.mem().as_slice().iter().all(|b| *b == 0));
    assert_eq!(console.run_frame().err(), Some(EmuError::Faulted));
  }

  #[test]
  fn fault_poisons_until_reset() {
    // JMP $3000 on an 8K machine runs off the end of memory
    let config = MachineConfig {
      memory_size: 0x2000,
      layout: crate::config::LoadLayout { base: 0x1000, reset_vector: 0x1FFC, irq_vector: 0x1FFE },
      ..Default::default()
    };
    let mut console = Console::new(config).unwrap();
    console.boot(&[0x4C, 0x00, 0x30]).unwrap();

    let err = console.run_frame().err();
    assert!(matches!(err, Some(EmuError::Addressing { addr: 0x3000, .. })));
    assert!(console.is_faulted());

    let mut sink = CaptureSink::default();
    assert_eq!(console.present(&mut sink), Err(EmuError::Faulted));
    assert!(sink.frames.is_empty());

    console.reset().unwrap();
    assert!(!console.is_faulted());
    assert_eq!(console.get_tia().position(), RasterPosition::default());
  }

  #[test]
  fn step_pays_ticks_immediately() {
    // NOP
    let mut console = Console::boot_from_bytes(&[0xEA]).unwrap();
    console.step().unwrap();
    assert_eq!(console.get_tia().position().column, 6);
  }

  #[test]
  fn run_frame_takes_finished_frame() {
    // JMP $F000
    let mut console = Console::boot_from_bytes(&[0x4C, 0x00, 0xF0]).unwrap();
    console.run_frame().unwrap();
    assert_eq!(console.get_tia().frames(), 1);
    assert!(console.get_cpu().bus.tia.take_frame_ready().is_none());
    assert!(console.get_tia().last_frame_stats().is_some());
  }

  #[test]
  fn present_uses_configured_resolution() {
    let mut console = Console::boot_from_bytes(&[0x4C, 0x00, 0xF0]).unwrap();
    console.run_frame().unwrap();

    let mut sink = CaptureSink::default();
    console.present(&mut sink).unwrap();
    let (width, height) = console.get_resolution();
    assert_eq!((width, height), (160, 192));
    assert_eq!(sink.frames[0].len(), width * height * crate::frame::PIXEL_BYTES);
  }

  #[test]
  fn state_dump_is_json() {
    let console = Console::boot_from_bytes(&[0xEA]).unwrap();
    let value: serde_json::Value = serde_json::from_str(&console.state_json().unwrap()).unwrap();
    assert_eq!(value["cpu"]["pc"], 0xF000);
    assert_eq!(value["position"]["scanline"], 0);
  }
}
