use crate::error::{EmuError, EmuResult};

/// Flat console address space. Capacity is fixed at construction; every
/// access is bounds checked and never wraps.
#[derive(Clone)]
pub struct MemoryImage {
  mem: Box<[u8]>,
}

impl MemoryImage {
  pub fn new(capacity: usize) -> Self {
    Self { mem: vec![0; capacity].into_boxed_slice() }
  }

  pub fn capacity(&self) -> usize {
    self.mem.len()
  }

  pub fn read(&self, addr: usize) -> EmuResult<u8> {
    self.mem.get(addr).copied()
      .ok_or(EmuError::Addressing { addr, capacity: self.capacity() })
  }

  pub fn write(&mut self, addr: usize, val: u8) -> EmuResult<()> {
    let capacity = self.capacity();
    let cell = self.mem.get_mut(addr)
      .ok_or(EmuError::Addressing { addr, capacity })?;
    *cell = val;
    Ok(())
  }

  pub fn read16(&self, addr: usize) -> EmuResult<u16> {
    Ok(u16::from_le_bytes([self.read(addr)?, self.read(addr + 1)?]))
  }

  pub fn write16(&mut self, addr: usize, val: u16) -> EmuResult<()> {
    // check the high byte first so a failed write leaves memory untouched
    if addr + 1 >= self.capacity() {
      return Err(EmuError::Addressing { addr: addr + 1, capacity: self.capacity() });
    }
    let [lo, hi] = val.to_le_bytes();
    self.write(addr, lo)?;
    self.write(addr + 1, hi)
  }

  /// Copies `bytes` starting at `base`. Nothing is written unless the whole
  /// sequence fits.
  pub fn load(&mut self, base: usize, bytes: &[u8]) -> EmuResult<()> {
    let capacity = self.capacity();
    let end = base.checked_add(bytes.len())
      .filter(|end| *end <= capacity)
      .ok_or(EmuError::LoadOverflow { base, len: bytes.len(), capacity })?;

    self.mem[base..end].copy_from_slice(bytes);
    log::debug!("loaded {} bytes at {base:#06X}", bytes.len());
    Ok(())
  }

  pub fn clear(&mut self) {
    self.mem.fill(0);
  }

  pub fn as_slice(&self) -> &[u8] {
    &self.mem
  }
}
