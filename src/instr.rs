use std::{collections::HashMap, sync::LazyLock};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mnemonic {
  ADC, AND, ASL, BCC, BCS, BEQ, BIT, BMI, BNE, BPL, BRK, BVC, BVS, CLC,
  CLD, CLI, CLV, CMP, CPX, CPY, DEC, DEX, DEY, EOR, INC, INX, INY, JMP,
  JSR, LDA, LDX, LDY, LSR, NOP, ORA, PHA, PHP, PLA, PLP, ROL, ROR, RTI,
  RTS, SBC, SEC, SED, SEI, STA, STX, STY, TAX, TAY, TSX, TXA, TXS, TYA,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddrMode {
  #[serde(alias = "impl")]
  Implied,
  #[serde(alias = "acc")]
  Accumulator,
  #[serde(alias = "imm")]
  Immediate,
  #[serde(alias = "zp")]
  ZeroPage,
  #[serde(alias = "zpx")]
  ZeroPageX,
  #[serde(alias = "zpy")]
  ZeroPageY,
  #[serde(alias = "abs")]
  Absolute,
  #[serde(alias = "absx")]
  AbsoluteX,
  #[serde(alias = "absy")]
  AbsoluteY,
  #[serde(alias = "ind")]
  Indirect,
  #[serde(alias = "izx")]
  IndexedIndirect,
  #[serde(alias = "izy")]
  IndirectIndexed,
  #[serde(alias = "rel")]
  Relative,
}

#[derive(Deserialize, Debug, Clone, Copy)]
pub struct Instruction {
  #[serde(skip)]
  pub opcode: u8,
  pub mnemonic: Mnemonic,
  pub mode: AddrMode,
  pub cycles: u8,
  /// One extra cycle when indexing crosses a page.
  #[serde(default)]
  pub page_penalty: bool,
}

fn get_instructions() -> [Option<Instruction>; 256] {
  let json = include_str!("instr.json");
  let parsed: HashMap<String, Instruction> = serde_json
    ::from_str(json)
    .expect("embedded opcode table is valid json");

  let mut table = [None; 256];
  for (opcode_str, instr) in parsed {
    let opcode = opcode_str.strip_prefix("0x")
      .and_then(|hex| u8::from_str_radix(hex, 16).ok())
      .expect("embedded opcode keys are 0xNN");

    table[opcode as usize] = Some(Instruction { opcode, ..instr });
  }

  table
}

pub static INSTRUCTIONS: LazyLock<[Option<Instruction>; 256]> = LazyLock::new(get_instructions);
