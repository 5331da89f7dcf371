//! Assembler and disassembler for delay-line programs.
//!
//! This module provides:
//! - A two-pass assembler (text → [`Program`])
//! - A disassembler (words → readable text)
//! - A JSON program image format

pub mod assembler;
pub mod disasm;
pub mod image;

pub use assembler::{assemble, AssemblerError, Program};
pub use disasm::{disassemble, disassemble_word};
pub use image::{load_image, save_image, ImageError, ProgramImage};
