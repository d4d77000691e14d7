use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::error::{EmuError, EmuResult};

/// Raster geometry of one television frame, in engine ticks (color clocks)
/// and scanlines. The defaults describe NTSC: 228 ticks per line, 262 lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Geometry {
  pub visible_width: usize,
  pub visible_height: usize,
  pub vsync_lines: usize,
  pub vblank_top: usize,
  pub vblank_bottom: usize,
  pub ticks_per_scanline: usize,
}

impl Default for Geometry {
  fn default() -> Self {
    Self::ntsc()
  }
}

impl Geometry {
  pub const fn ntsc() -> Self {
    Self {
      visible_width: 160,
      visible_height: 192,
      vsync_lines: 3,
      vblank_top: 37,
      vblank_bottom: 30,
      ticks_per_scanline: 228,
    }
  }

  pub fn validate(&self) -> EmuResult<()> {
    let named = [
      ("visible_width", self.visible_width),
      ("visible_height", self.visible_height),
      ("ticks_per_scanline", self.ticks_per_scanline),
    ];
    if let Some((name, _)) = named.iter().find(|(_, v)| *v == 0) {
      return Err(EmuError::InvalidGeometry(format!("{name} must be non zero")));
    }

    if self.visible_width > self.ticks_per_scanline {
      return Err(EmuError::InvalidGeometry(format!(
        "visible width {} exceeds {} ticks per scanline",
        self.visible_width, self.ticks_per_scanline
      )));
    }

    Ok(())
  }

  /// Leading columns of every scanline that never produce a pixel.
  pub fn hblank_columns(&self) -> usize {
    self.ticks_per_scanline - self.visible_width
  }

  /// First scanline of the visible window.
  pub fn first_visible_line(&self) -> usize {
    self.vsync_lines + self.vblank_top
  }

  pub fn total_scanlines(&self) -> usize {
    self.first_visible_line() + self.visible_height + self.vblank_bottom
  }

  pub fn ticks_per_frame(&self) -> u64 {
    (self.ticks_per_scanline * self.total_scanlines()) as u64
  }
}

/// Where a program lands in memory and where the CPU finds its entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadLayout {
  pub base: u16,
  pub reset_vector: u16,
  pub irq_vector: u16,
}

impl Default for LoadLayout {
  fn default() -> Self {
    Self { base: 0xF000, reset_vector: 0xFFFC, irq_vector: 0xFFFE }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
  pub memory_size: usize,
  pub ticks_per_cpu_cycle: u64,
  pub geometry: Geometry,
  pub layout: LoadLayout,
}

impl Default for MachineConfig {
  fn default() -> Self {
    Self {
      memory_size: 0x10000,
      ticks_per_cpu_cycle: 3,
      geometry: Geometry::default(),
      layout: LoadLayout::default(),
    }
  }
}

impl MachineConfig {
  pub fn from_toml(text: &str) -> EmuResult<Self> {
    let config: Self = toml::from_str(text)
      .map_err(|e| EmuError::Config(e.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  pub fn from_file(path: impl AsRef<Path>) -> EmuResult<Self> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)
      .map_err(|e| EmuError::Config(format!("{}: {e}", path.display())))?;
    Self::from_toml(&text)
  }

  pub fn validate(&self) -> EmuResult<()> {
    self.geometry.validate()?;

    if self.ticks_per_cpu_cycle == 0 {
      return Err(EmuError::Config("ticks_per_cpu_cycle must be non zero".into()));
    }

    // both vectors are two bytes wide
    for vector in [self.layout.reset_vector, self.layout.irq_vector] {
      let end = vector as usize + 2;
      if end > self.memory_size {
        return Err(EmuError::Config(format!(
          "vector {vector:#06X} outside memory of {:#X} bytes", self.memory_size
        )));
      }
    }

    Ok(())
  }
}

#[cfg(test)]
mod config_tests {
  use super::*;

  #[test]
  fn ntsc_timing_contract() {
    let g = Geometry::ntsc();
    assert_eq!(g.total_scanlines(), 262);
    assert_eq!(g.hblank_columns(), 68);
    assert_eq!(g.ticks_per_frame(), 228 * 262);
  }

  #[test]
  fn partial_toml_keeps_defaults() {
    let config = MachineConfig::from_toml("
      ticks_per_cpu_cycle = 3
      [geometry]
      visible_height = 228
      vblank_bottom = 36
    ").unwrap();

    assert_eq!(config.geometry.visible_height, 228);
    assert_eq!(config.geometry.total_scanlines(), 3 + 37 + 228 + 36);
    assert_eq!(config.layout, LoadLayout::default());
    assert_eq!(config.memory_size, 0x10000);
  }

  #[test]
  fn rejects_bad_geometry() {
    let err = MachineConfig::from_toml("
      [geometry]
      visible_width = 300
    ").unwrap_err();
    assert!(matches!(err, EmuError::InvalidGeometry(_)));

    let err = MachineConfig::from_toml("
      [geometry]
      ticks_per_scanline = 0
    ").unwrap_err();
    assert!(matches!(err, EmuError::InvalidGeometry(_)));
  }

  #[test]
  fn rejects_vectors_outside_memory() {
    let err = MachineConfig::from_toml("memory_size = 4096").unwrap_err();
    assert!(matches!(err, EmuError::Config(_)));
  }

  #[test]
  fn malformed_toml_is_config_error() {
    let err = MachineConfig::from_toml("memory_size = \"lots\"").unwrap_err();
    assert!(matches!(err, EmuError::Config(_)));
  }
}
