use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmuError {
  #[error("address {addr:#06X} outside memory of {capacity:#X} bytes")]
  Addressing { addr: usize, capacity: usize },

  #[error("invalid tick request: {0}")]
  InvalidTickRequest(String),

  #[error("{len} bytes at {base:#06X} overflow memory of {capacity:#X} bytes")]
  LoadOverflow { base: usize, len: usize, capacity: usize },

  #[error("invalid frame geometry: {0}")]
  InvalidGeometry(String),

  #[error("unknown opcode {opcode:02X} at {pc:04X}")]
  UnknownOpcode { opcode: u8, pc: u16 },

  #[error("frame buffer is {actual} bytes, display expects {expected}")]
  FrameSize { expected: usize, actual: usize },

  #[error("display sink failed: {0}")]
  Display(String),

  #[error("console faulted, frame discarded; reset required")]
  Faulted,

  #[error("config error: {0}")]
  Config(String),
}

pub type EmuResult<T> = Result<T, EmuError>;
