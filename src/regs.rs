use bitfield_struct::bitfield;
use bitflags::bitflags;
use serde::Serialize;

pub const VSYNC: u8  = 0x00;
pub const VBLANK: u8 = 0x01;
pub const WSYNC: u8  = 0x02;
pub const COLUPF: u8 = 0x08;
pub const COLUBK: u8 = 0x09;
pub const CTRLPF: u8 = 0x0A;
pub const PF0: u8    = 0x0D;
pub const PF1: u8    = 0x0E;
pub const PF2: u8    = 0x0F;

/// Size of the memory mapped register window starting at address 0.
pub const WINDOW: u16 = 0x40;

bitflags! {
  #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
  pub struct SyncBits: u8 {
    const sync  = 0b0000_0010;
    const latch = 0b0100_0000;
    const dump  = 0b1000_0000;
  }
}

#[bitfield(u8)]
#[derive(PartialEq, Eq)]
pub struct PlayfieldCtrl {
  pub reflect: bool,
  pub score: bool,
  pub priority: bool,
  #[bits(1)]
  __: u8,
  #[bits(2)]
  pub ball_size: u8,
  #[bits(2)]
  __: u8,
}

/// Decoded target of a register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterWrite {
  VSync,
  VBlank,
  WaitSync,
  PlayfieldColor,
  BackgroundColor,
  PlayfieldCtrl,
  Playfield(usize),
}

impl RegisterWrite {
  /// The address to handler table. `None` for addresses outside the window
  /// and for registers this model does not implement.
  pub fn decode(addr: u16) -> Option<Self> {
    if addr >= WINDOW { return None; }

    use RegisterWrite::*;
    match addr as u8 {
      VSYNC  => Some(VSync),
      VBLANK => Some(VBlank),
      WSYNC  => Some(WaitSync),
      COLUPF => Some(PlayfieldColor),
      COLUBK => Some(BackgroundColor),
      CTRLPF => Some(PlayfieldCtrl),
      PF0 => Some(Playfield(0)),
      PF1 => Some(Playfield(1)),
      PF2 => Some(Playfield(2)),
      _ => None,
    }
  }

  /// Strobes carry no state; the bus turns them into timing requests.
  pub fn is_strobe(&self) -> bool {
    matches!(self, RegisterWrite::WaitSync)
  }
}

/// Register file read by the raster engine on every tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct HardwareRegisters {
  vsync: SyncBits,
  vblank: SyncBits,
  background_color: u8,
  playfield_color: u8,
  playfield: [u8; 3],
  ctrl: PlayfieldCtrl,
}

impl HardwareRegisters {
  /// Applies one decoded write. Each handler touches exactly one field.
  pub fn apply(&mut self, reg: RegisterWrite, val: u8) {
    match reg {
      RegisterWrite::VSync => self.vsync = SyncBits::from_bits_retain(val),
      RegisterWrite::VBlank => self.vblank = SyncBits::from_bits_retain(val),
      RegisterWrite::WaitSync => {}
      RegisterWrite::PlayfieldColor => self.playfield_color = val,
      RegisterWrite::BackgroundColor => self.background_color = val,
      RegisterWrite::PlayfieldCtrl => self.ctrl = PlayfieldCtrl::from_bits(val),
      RegisterWrite::Playfield(i) => self.playfield[i] = val,
    }
  }

  /// Every register is write only and reads back as zero.
  pub fn read(&self, _addr: u16) -> u8 { 0 }

  pub fn vsync_active(&self) -> bool {
    self.vsync.contains(SyncBits::sync)
  }

  pub fn vblank_active(&self) -> bool {
    self.vblank.contains(SyncBits::sync)
  }

  pub fn background_color(&self) -> u8 { self.background_color }
  pub fn playfield_color(&self) -> u8 { self.playfield_color }
  pub fn playfield_pattern(&self) -> [u8; 3] { self.playfield }
  pub fn playfield_ctrl(&self) -> PlayfieldCtrl { self.ctrl }

  /// Playfield bit for one of the 20 cells of a half line, left to right.
  /// PF0 contributes its high nibble low bit first, PF1 is read high bit
  /// first and PF2 low bit first.
  pub fn playfield_cell(&self, cell: usize) -> bool {
    let [pf0, pf1, pf2] = self.playfield;
    match cell {
      0..=3   => pf0 & (0x10 << cell) != 0,
      4..=11  => pf1 & (0x80 >> (cell - 4)) != 0,
      12..=19 => pf2 & (0x01 << (cell - 12)) != 0,
      _ => false,
    }
  }

  pub fn snapshot(&self) -> RegisterSnapshot {
    RegisterSnapshot {
      vsync: self.vsync_active(),
      vblank: self.vblank_active(),
      background_color: self.background_color,
      playfield_color: self.playfield_color,
      playfield: self.playfield,
      playfield_ctrl: self.ctrl.into_bits(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RegisterSnapshot {
  pub vsync: bool,
  pub vblank: bool,
  pub background_color: u8,
  pub playfield_color: u8,
  pub playfield: [u8; 3],
  pub playfield_ctrl: u8,
}
