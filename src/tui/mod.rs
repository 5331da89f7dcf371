//! TUI debugger for the delay-line emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Register lines shown bit by bit
//! - Main memory view with the program counter and line head marked
//! - Step/run/breakpoint controls
//! - PRA output log

mod app;
mod ui;

pub use app::{DebuggerApp, MemoryRow, run_debugger};
