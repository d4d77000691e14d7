use bitflags::bitflags;
use serde::Serialize;

use crate::{
  bus::Bus,
  config::{LoadLayout, MachineConfig},
  error::{EmuError, EmuResult},
  instr::{AddrMode, Instruction, Mnemonic, INSTRUCTIONS},
};

bitflags! {
  #[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
  pub struct Flags: u8 {
    const c = 0b0000_0001;
    const z = 0b0000_0010;
    const i = 0b0000_0100;
    const d = 0b0000_1000;
    const b = 0b0001_0000;
    const u = 0b0010_0000;
    const v = 0b0100_0000;
    const n = 0b1000_0000;
  }
}

#[derive(Debug, Clone, Copy)]
enum Operand {
  None,
  Accumulator,
  Immediate(u8),
  Address(u16),
  Relative(i8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CpuSnapshot {
  pub a: u8, pub x: u8, pub y: u8,
  pub sp: u8, pub pc: u16, pub p: u8,
  pub cycles: usize,
}

pub struct Cpu {
  pub a: u8,
  pub x: u8,
  pub y: u8,
  pub sp: u8,
  pub pc: u16,
  pub p: Flags,
  pub cycles: usize,
  layout: LoadLayout,
  pub bus: Bus,
}

impl Cpu {
  pub fn new(config: &MachineConfig) -> Self {
    Self {
      a: 0, x: 0, y: 0,
      sp: 0xFD,
      pc: 0,
      p: Flags::i | Flags::u,
      cycles: 0,
      layout: config.layout,
      bus: Bus::new(config),
    }
  }

  /// Registers back to power on state, PC from the reset vector.
  pub fn reset(&mut self) -> EmuResult<()> {
    self.a = 0;
    self.x = 0;
    self.y = 0;
    self.sp = 0xFD;
    self.p = Flags::i | Flags::u;
    self.cycles = 0;
    self.pc = self.bus.mem().read16(self.layout.reset_vector as usize)?;
    log::debug!("cpu reset, entry {:04X}", self.pc);
    Ok(())
  }

  pub fn snapshot(&self) -> CpuSnapshot {
    CpuSnapshot {
      a: self.a, x: self.x, y: self.y,
      sp: self.sp, pc: self.pc, p: self.p.bits(),
      cycles: self.cycles,
    }
  }

  pub fn peek(&self, addr: u16) -> EmuResult<u8> {
    self.bus.peek(addr)
  }

  fn read(&mut self, addr: u16) -> EmuResult<u8> { self.bus.read(addr) }
  fn write(&mut self, addr: u16, val: u8) -> EmuResult<()> { self.bus.write(addr, val) }

  fn fetch_pc(&mut self) -> EmuResult<u8> {
    let val = self.read(self.pc)?;
    self.pc = self.pc.wrapping_add(1);
    Ok(val)
  }

  fn fetch_pc16(&mut self) -> EmuResult<u16> {
    Ok(u16::from_le_bytes([self.fetch_pc()?, self.fetch_pc()?]))
  }

  fn tick(&mut self, cycles: u8) {
    self.cycles += cycles as usize;
    self.bus.cycles(cycles);
  }

  fn stack_push(&mut self, val: u8) -> EmuResult<()> {
    self.write(0x100 | self.sp as u16, val)?;
    self.sp = self.sp.wrapping_sub(1);
    Ok(())
  }

  fn stack_pop(&mut self) -> EmuResult<u8> {
    self.sp = self.sp.wrapping_add(1);
    self.read(0x100 | self.sp as u16)
  }

  fn stack_push16(&mut self, val: u16) -> EmuResult<()> {
    let [lo, hi] = val.to_le_bytes();
    self.stack_push(hi)?;
    self.stack_push(lo)
  }

  fn stack_pop16(&mut self) -> EmuResult<u16> {
    Ok(u16::from_le_bytes([self.stack_pop()?, self.stack_pop()?]))
  }

  fn set_zn(&mut self, val: u8) {
    self.p.set(Flags::z, val == 0);
    self.p.set(Flags::n, val & 0x80 != 0);
  }

  /// Executes one instruction. The instruction's cycles are charged to the
  /// bus before any of its memory accesses.
  pub fn step(&mut self) -> EmuResult<()> {
    let pc = self.pc;
    let opcode = self.fetch_pc()?;
    let instr = INSTRUCTIONS[opcode as usize]
      .ok_or(EmuError::UnknownOpcode { opcode, pc })?;

    self.tick(instr.cycles);
    let operand = self.operand(&instr)?;
    self.execute(instr.mnemonic, operand)
  }

  fn operand(&mut self, instr: &Instruction) -> EmuResult<Operand> {
    use AddrMode::*;
    let operand = match instr.mode {
      Implied => Operand::None,
      Accumulator => Operand::Accumulator,
      Immediate => Operand::Immediate(self.fetch_pc()?),
      Relative => Operand::Relative(self.fetch_pc()? as i8),
      ZeroPage => Operand::Address(self.fetch_pc()? as u16),
      ZeroPageX => Operand::Address(self.fetch_pc()?.wrapping_add(self.x) as u16),
      ZeroPageY => Operand::Address(self.fetch_pc()?.wrapping_add(self.y) as u16),
      Absolute => Operand::Address(self.fetch_pc16()?),
      AbsoluteX => {
        let base = self.fetch_pc16()?;
        Operand::Address(self.indexed(base, self.x, instr.page_penalty))
      }
      AbsoluteY => {
        let base = self.fetch_pc16()?;
        Operand::Address(self.indexed(base, self.y, instr.page_penalty))
      }
      Indirect => {
        // the pointer high byte never carries into the next page
        let ptr = self.fetch_pc16()?;
        let lo = self.read(ptr)?;
        let hi = self.read((ptr & 0xFF00) | (ptr.wrapping_add(1) & 0x00FF))?;
        Operand::Address(u16::from_le_bytes([lo, hi]))
      }
      IndexedIndirect => {
        let ptr = self.fetch_pc()?.wrapping_add(self.x);
        Operand::Address(self.zero_page_ptr(ptr)?)
      }
      IndirectIndexed => {
        let ptr = self.fetch_pc()?;
        let base = self.zero_page_ptr(ptr)?;
        Operand::Address(self.indexed(base, self.y, instr.page_penalty))
      }
    };

    Ok(operand)
  }

  fn zero_page_ptr(&mut self, ptr: u8) -> EmuResult<u16> {
    let lo = self.read(ptr as u16)?;
    let hi = self.read(ptr.wrapping_add(1) as u16)?;
    Ok(u16::from_le_bytes([lo, hi]))
  }

  fn indexed(&mut self, base: u16, index: u8, page_penalty: bool) -> u16 {
    let addr = base.wrapping_add(index as u16);
    if page_penalty && (addr & 0xFF00) != (base & 0xFF00) {
      self.tick(1);
    }
    addr
  }

  fn load(&mut self, operand: Operand) -> EmuResult<u8> {
    match operand {
      Operand::Immediate(val) => Ok(val),
      Operand::Address(addr) => self.read(addr),
      Operand::Accumulator => Ok(self.a),
      Operand::None | Operand::Relative(_) => unreachable!("operand has no value"),
    }
  }

  fn store(&mut self, operand: Operand, val: u8) -> EmuResult<()> {
    match operand {
      Operand::Address(addr) => self.write(addr, val),
      Operand::Accumulator => { self.a = val; Ok(()) }
      _ => unreachable!("operand is not writable"),
    }
  }

  fn address(operand: Operand) -> u16 {
    match operand {
      Operand::Address(addr) => addr,
      _ => unreachable!("operand has no address"),
    }
  }

  fn execute(&mut self, mnemonic: Mnemonic, op: Operand) -> EmuResult<()> {
    use Mnemonic::*;
    match mnemonic {
      LDA => { self.a = self.load(op)?; self.set_zn(self.a); }
      LDX => { self.x = self.load(op)?; self.set_zn(self.x); }
      LDY => { self.y = self.load(op)?; self.set_zn(self.y); }
      STA => self.store(op, self.a)?,
      STX => self.store(op, self.x)?,
      STY => self.store(op, self.y)?,

      TAX => { self.x = self.a; self.set_zn(self.x); }
      TAY => { self.y = self.a; self.set_zn(self.y); }
      TXA => { self.a = self.x; self.set_zn(self.a); }
      TYA => { self.a = self.y; self.set_zn(self.a); }
      TSX => { self.x = self.sp; self.set_zn(self.x); }
      TXS => self.sp = self.x,

      PHA => self.stack_push(self.a)?,
      PHP => self.stack_push((self.p | Flags::b | Flags::u).bits())?,
      PLA => { self.a = self.stack_pop()?; self.set_zn(self.a); }
      PLP => self.pull_flags()?,

      AND => { self.a &= self.load(op)?; self.set_zn(self.a); }
      ORA => { self.a |= self.load(op)?; self.set_zn(self.a); }
      EOR => { self.a ^= self.load(op)?; self.set_zn(self.a); }
      ADC => { let val = self.load(op)?; self.adc(val); }
      SBC => { let val = self.load(op)?; self.sbc(val); }
      CMP => { let val = self.load(op)?; self.compare(self.a, val); }
      CPX => { let val = self.load(op)?; self.compare(self.x, val); }
      CPY => { let val = self.load(op)?; self.compare(self.y, val); }
      BIT => {
        let val = self.load(op)?;
        self.p.set(Flags::z, self.a & val == 0);
        self.p.set(Flags::v, val & 0x40 != 0);
        self.p.set(Flags::n, val & 0x80 != 0);
      }

      INC => { let val = self.load(op)?.wrapping_add(1); self.store(op, val)?; self.set_zn(val); }
      DEC => { let val = self.load(op)?.wrapping_sub(1); self.store(op, val)?; self.set_zn(val); }
      INX => { self.x = self.x.wrapping_add(1); self.set_zn(self.x); }
      INY => { self.y = self.y.wrapping_add(1); self.set_zn(self.y); }
      DEX => { self.x = self.x.wrapping_sub(1); self.set_zn(self.x); }
      DEY => { self.y = self.y.wrapping_sub(1); self.set_zn(self.y); }

      ASL => {
        let val = self.load(op)?;
        self.p.set(Flags::c, val & 0x80 != 0);
        self.shift_result(op, val << 1)?;
      }
      LSR => {
        let val = self.load(op)?;
        self.p.set(Flags::c, val & 0x01 != 0);
        self.shift_result(op, val >> 1)?;
      }
      ROL => {
        let val = self.load(op)?;
        let carry = self.p.contains(Flags::c) as u8;
        self.p.set(Flags::c, val & 0x80 != 0);
        self.shift_result(op, (val << 1) | carry)?;
      }
      ROR => {
        let val = self.load(op)?;
        let carry = (self.p.contains(Flags::c) as u8) << 7;
        self.p.set(Flags::c, val & 0x01 != 0);
        self.shift_result(op, (val >> 1) | carry)?;
      }

      BCC => self.branch(op, !self.p.contains(Flags::c)),
      BCS => self.branch(op, self.p.contains(Flags::c)),
      BNE => self.branch(op, !self.p.contains(Flags::z)),
      BEQ => self.branch(op, self.p.contains(Flags::z)),
      BPL => self.branch(op, !self.p.contains(Flags::n)),
      BMI => self.branch(op, self.p.contains(Flags::n)),
      BVC => self.branch(op, !self.p.contains(Flags::v)),
      BVS => self.branch(op, self.p.contains(Flags::v)),

      JMP => self.pc = Self::address(op),
      JSR => {
        self.stack_push16(self.pc.wrapping_sub(1))?;
        self.pc = Self::address(op);
      }
      RTS => self.pc = self.stack_pop16()?.wrapping_add(1),
      BRK => {
        self.stack_push16(self.pc.wrapping_add(1))?;
        self.stack_push((self.p | Flags::b | Flags::u).bits())?;
        self.p.insert(Flags::i);
        self.pc = self.bus.read16(self.layout.irq_vector)?;
      }
      RTI => {
        self.pull_flags()?;
        self.pc = self.stack_pop16()?;
      }

      CLC => self.p.remove(Flags::c),
      SEC => self.p.insert(Flags::c),
      CLI => self.p.remove(Flags::i),
      SEI => self.p.insert(Flags::i),
      CLD => self.p.remove(Flags::d),
      SED => self.p.insert(Flags::d),
      CLV => self.p.remove(Flags::v),
      NOP => {}
    }

    Ok(())
  }

  fn shift_result(&mut self, op: Operand, val: u8) -> EmuResult<()> {
    self.store(op, val)?;
    self.set_zn(val);
    Ok(())
  }

  fn pull_flags(&mut self) -> EmuResult<()> {
    let val = self.stack_pop()?;
    self.p = (Flags::from_bits_retain(val) - Flags::b) | Flags::u;
    Ok(())
  }

  fn compare(&mut self, reg: u8, val: u8) {
    self.p.set(Flags::c, reg >= val);
    self.set_zn(reg.wrapping_sub(val));
  }

  fn branch(&mut self, op: Operand, cond: bool) {
    let Operand::Relative(offset) = op else { unreachable!("branch without offset") };
    if !cond { return; }

    let target = self.pc.wrapping_add_signed(offset as i16);
    let crossed = (target & 0xFF00) != (self.pc & 0xFF00);
    self.tick(1 + crossed as u8);
    self.pc = target;
  }

  fn adc(&mut self, val: u8) {
    let carry = self.p.contains(Flags::c) as u16;
    let (a, m) = (self.a as u16, val as u16);
    let sum = a + m + carry;
    self.p.set(Flags::z, sum & 0xFF == 0);

    if !self.p.contains(Flags::d) {
      self.p.set(Flags::c, sum > 0xFF);
      self.p.set(Flags::v, (!(a ^ m) & (a ^ sum) & 0x80) != 0);
      self.p.set(Flags::n, sum & 0x80 != 0);
      self.a = sum as u8;
      return;
    }

    let mut lo = (a & 0x0F) + (m & 0x0F) + carry;
    let mut hi = (a >> 4) + (m >> 4);
    if lo > 9 { lo += 6; }
    if lo > 0x0F { hi += 1; }

    // N and V come from the half adjusted result on this part
    let partial = hi << 4;
    self.p.set(Flags::n, partial & 0x80 != 0);
    self.p.set(Flags::v, (!(a ^ m) & (a ^ partial) & 0x80) != 0);

    if hi > 9 { hi += 6; }
    self.p.set(Flags::c, hi > 0x0F);
    self.a = ((hi << 4) | (lo & 0x0F)) as u8;
  }

  fn sbc(&mut self, val: u8) {
    let borrow = !self.p.contains(Flags::c) as i16;
    let (a, m) = (self.a as i16, val as i16);
    let diff = a - m - borrow;

    // flags follow the binary result in both modes
    let result = diff as u8;
    self.p.set(Flags::c, diff >= 0);
    self.p.set(Flags::v, ((a ^ m) & (a ^ result as i16) & 0x80) != 0);
    self.set_zn(result);

    if !self.p.contains(Flags::d) {
      self.a = result;
      return;
    }

    let mut lo = (a & 0x0F) - (m & 0x0F) - borrow;
    let mut hi = (a >> 4) - (m >> 4);
    if lo < 0 { lo -= 6; hi -= 1; }
    if hi < 0 { hi -= 6; }
    self.a = (((hi << 4) | (lo & 0x0F)) & 0xFF) as u8;
  }
}
