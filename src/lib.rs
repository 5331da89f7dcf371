//! # Delay-Line Emulator
//!
//! A bit-serial emulator of a stored-program computer whose memory is made
//! of delay lines.
//!
//! Every word, in memory or in a register, circulates through a fixed-length
//! channel and can only be read or written as it passes the head, one bit per
//! clock pulse. The emulator reproduces that discipline exactly: instructions
//! wait for their operands to come round, arithmetic ripples a carry from one
//! pulse to the next, and the cost of every instruction, rotational waits
//! included, is visible in the machine's pulse counter.
//!
//! ```
//! use delayline::{assemble, Cpu, MachineConfig};
//!
//! let config = MachineConfig::default();
//! let program = assemble("LAI 20\nLBI 7\nNEG\nADD\nPRA\nHLT", &config).unwrap();
//! let mut cpu = Cpu::new(config).unwrap();
//! cpu.load_program(&program).unwrap();
//! cpu.run().unwrap();
//! assert_eq!(cpu.output(), &[13]);
//! ```

pub mod line;
pub mod config;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

#[cfg(feature = "wasm")]
pub mod wasm;

// Re-export commonly used types
pub use line::{Bit, BitChannel, BitOrder, MemoryBank, Word, WORD_SIZE};
pub use config::{ConfigError, MachineConfig};
pub use cpu::{Cpu, CpuState, CpuError, Registers, Instruction};
pub use asm::{assemble, disassemble, AssemblerError, Program, ProgramImage, load_image, save_image};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
