// One tick = one color clock. NTSC: 228 ticks per scanline, 262 scanlines,
// 68 ticks of horizontal blank before the 160 visible columns.

use serde::Serialize;

use crate::{
  config::Geometry,
  error::{EmuError, EmuResult},
  frame::FrameBuffer,
  regs::{HardwareRegisters, RegisterWrite},
};

/// A validated number of engine ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TickCount(u64);

impl TickCount {
  pub const fn new(ticks: u64) -> Self { Self(ticks) }
  pub const fn get(self) -> u64 { self.0 }
}

impl From<u32> for TickCount {
  fn from(ticks: u32) -> Self { Self(ticks as u64) }
}

impl From<u64> for TickCount {
  fn from(ticks: u64) -> Self { Self(ticks) }
}

impl TryFrom<i64> for TickCount {
  type Error = EmuError;

  fn try_from(ticks: i64) -> EmuResult<Self> {
    u64::try_from(ticks)
      .map(Self)
      .map_err(|_| EmuError::InvalidTickRequest(format!("negative tick count {ticks}")))
  }
}

impl TryFrom<f64> for TickCount {
  type Error = EmuError;

  fn try_from(ticks: f64) -> EmuResult<Self> {
    if !ticks.is_finite() || ticks < 0.0 || ticks.fract() != 0.0 || ticks > u64::MAX as f64 {
      return Err(EmuError::InvalidTickRequest(format!("tick count {ticks} is not a whole non negative number")));
    }
    Ok(Self(ticks as u64))
  }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RasterPosition {
  pub scanline: usize,
  pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Band {
  VerticalSync,
  Blank,
  Visible,
}

/// Ticks spent in each band over one frame.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FrameStats {
  pub vsync_ticks: u64,
  pub blank_ticks: u64,
  pub visible_ticks: u64,
  pub pixels: u64,
}

pub struct Tia {
  geometry: Geometry,
  regs: HardwareRegisters,
  pos: RasterPosition,
  lcd: FrameBuffer,

  stats: FrameStats,
  last_stats: Option<FrameStats>,
  frames: u64,
  frame_ready: Option<FrameStats>,
}

impl Tia {
  pub fn new(geometry: Geometry) -> Self {
    Self {
      geometry,
      regs: HardwareRegisters::default(),
      pos: RasterPosition::default(),
      lcd: FrameBuffer::new(geometry.visible_width, geometry.visible_height),
      stats: FrameStats::default(),
      last_stats: None,
      frames: 0,
      frame_ready: None,
    }
  }

  pub fn reset(&mut self) {
    *self = Self::new(self.geometry);
  }

  pub fn geometry(&self) -> &Geometry { &self.geometry }
  pub fn registers(&self) -> &HardwareRegisters { &self.regs }
  pub fn position(&self) -> RasterPosition { self.pos }
  pub fn lcd(&self) -> &FrameBuffer { &self.lcd }
  pub fn frames(&self) -> u64 { self.frames }
  pub fn last_frame_stats(&self) -> Option<FrameStats> { self.last_stats }

  /// Stats of a frame completed since the last call, if any.
  pub fn take_frame_ready(&mut self) -> Option<FrameStats> {
    self.frame_ready.take()
  }

  /// Decodes and applies a register write. Returns the decoded target so the
  /// caller can act on strobes; unmapped addresses are ignored.
  pub fn write(&mut self, addr: u16, val: u8) -> Option<RegisterWrite> {
    let Some(reg) = RegisterWrite::decode(addr) else {
      log::trace!("ignored register write {addr:02X} <- {val:02X}");
      return None;
    };
    self.regs.apply(reg, val);
    Some(reg)
  }

  pub fn read(&self, addr: u16) -> u8 {
    self.regs.read(addr)
  }

  /// Band of `scanline` under the current register values. Sync takes
  /// precedence over blanking; rows outside the visible window are always
  /// blank.
  pub fn classify(&self, scanline: usize) -> Band {
    let g = &self.geometry;
    if scanline < g.vsync_lines && self.regs.vsync_active() {
      return Band::VerticalSync;
    }

    let first = g.first_visible_line();
    let visible_rows = first..first + g.visible_height;
    if !visible_rows.contains(&scanline) || self.regs.vblank_active() {
      return Band::Blank;
    }

    Band::Visible
  }

  /// Color register value for visible column `x` on the current registers.
  pub fn pixel_color(&self, x: usize) -> u8 {
    let half = self.geometry.visible_width / 2;
    let cell = if x < half {
      x * 20 / half.max(1)
    } else {
      let cell = (x - half) * 20 / (self.geometry.visible_width - half);
      if self.regs.playfield_ctrl().reflect() { 19 - cell } else { cell }
    };

    if self.regs.playfield_cell(cell) {
      self.regs.playfield_color()
    } else {
      self.regs.background_color()
    }
  }

  /// Runs exactly `ticks` steps.
  pub fn advance(&mut self, ticks: TickCount) {
    for _ in 0..ticks.get() {
      self.step();
    }
  }

  pub fn ticks_to_line_end(&self) -> u64 {
    (self.geometry.ticks_per_scanline - self.pos.column) as u64
  }

  /// Runs the rest of the current scanline, leaving the beam at column 0.
  /// Returns the number of ticks consumed.
  pub fn wait_for_line_end(&mut self) -> u64 {
    let ticks = self.ticks_to_line_end();
    self.advance(TickCount::new(ticks));
    ticks
  }

  fn step(&mut self) {
    let RasterPosition { scanline, column } = self.pos;

    match self.classify(scanline) {
      Band::VerticalSync => self.stats.vsync_ticks += 1,
      Band::Blank => self.stats.blank_ticks += 1,
      Band::Visible => {
        self.stats.visible_ticks += 1;
        if let Some(x) = column.checked_sub(self.geometry.hblank_columns()) {
          let y = scanline - self.geometry.first_visible_line();
          let color = self.pixel_color(x);
          self.lcd.set_pixel(x, y, color);
          self.stats.pixels += 1;
        }
      }
    }

    self.pos.column += 1;
    if self.pos.column < self.geometry.ticks_per_scanline { return; }

    self.pos.column = 0;
    self.pos.scanline += 1;
    if self.pos.scanline < self.geometry.total_scanlines() { return; }

    self.pos.scanline = 0;
    self.frames += 1;
    let stats = std::mem::take(&mut self.stats);
    self.last_stats = Some(stats);
    self.frame_ready = Some(stats);
  }
}
