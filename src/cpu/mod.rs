//! CPU emulation for the delay-line machine.
//!
//! This module implements the processor that runs on top of the lines:
//! - 3 word-length register lines: A (accumulator), B (operand), S (scratch)
//! - 29 bit-serial instructions over 40-bit words
//! - An execution loop where every pulse, including rotational waits, is a tick

pub mod registers;
pub mod decode;
pub mod alu;
pub mod transfer;
pub mod execute;

pub use registers::{Reg, Registers};
pub use decode::{DataAddr, DecodeError, Instruction, Opcode};
pub use execute::{Cpu, CpuError, CpuState};
