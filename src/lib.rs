pub mod error;
pub mod config;

pub mod mem;
pub mod bus;

pub mod cpu;
pub mod instr;

pub mod regs;
pub mod tia;
pub mod frame;

pub mod console;
