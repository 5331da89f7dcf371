//! WebAssembly bindings for the delay-line emulator.
//!
//! This module provides JavaScript-friendly wrappers around the core emulator.

use wasm_bindgen::prelude::*;
use serde::Serialize;
use crate::{Cpu, MachineConfig, Program, Word};
use crate::asm::assembler::assemble;
use crate::asm::disasm::disassemble_word;
use crate::cpu::Reg;

/// Initialize panic hook for better error messages in console.
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

fn js_err(e: impl std::fmt::Display) -> JsError {
    JsError::new(&e.to_string())
}

/// Register snapshot handed to JavaScript as JSON.
#[derive(Serialize)]
struct RegisterView {
    a: i64,
    b: i64,
    s: i64,
    pc: usize,
    base: usize,
    ticks: u64,
    cycles: u64,
    state: String,
}

/// WebAssembly-friendly machine wrapper.
#[wasm_bindgen]
pub struct WasmMachine {
    cpu: Cpu,
    program: Option<Program>,
}

#[wasm_bindgen]
impl WasmMachine {
    /// Create a machine with the default geometry.
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            cpu: Cpu::default(),
            program: None,
        }
    }

    /// Create a machine from a JSON geometry, e.g. `{"main_words": 32}`.
    #[wasm_bindgen]
    pub fn with_config(json: &str) -> Result<WasmMachine, JsError> {
        let config: MachineConfig = serde_json::from_str(json).map_err(js_err)?;
        Ok(Self {
            cpu: Cpu::new(config).map_err(js_err)?,
            program: None,
        })
    }

    /// Assemble and load a program. Returns the number of words.
    #[wasm_bindgen]
    pub fn load_asm(&mut self, source: &str) -> Result<usize, JsError> {
        let program = assemble(source, self.cpu.config()).map_err(js_err)?;
        let len = program.len();
        self.cpu.reset();
        self.cpu.load_program(&program).map_err(js_err)?;
        self.program = Some(program);
        Ok(len)
    }

    /// Step one instruction. Returns the executed mnemonic.
    #[wasm_bindgen]
    pub fn step(&mut self) -> Result<String, JsError> {
        let instr = self.cpu.step().map_err(js_err)?;
        Ok(instr.mnemonic().to_string())
    }

    /// Run until halt or max cycles. Returns the total cycle count.
    #[wasm_bindgen]
    pub fn run(&mut self, max_cycles: u32) -> Result<u64, JsError> {
        self.cpu.run_limited(u64::from(max_cycles)).map_err(js_err)?;
        Ok(self.cpu.cycles())
    }

    /// Reset the machine and reload the current program.
    #[wasm_bindgen]
    pub fn reset(&mut self) -> Result<(), JsError> {
        self.cpu.reset();
        if let Some(program) = &self.program {
            self.cpu.load_program(program).map_err(js_err)?;
        }
        Ok(())
    }

    #[wasm_bindgen]
    pub fn is_running(&self) -> bool {
        self.cpu.is_running()
    }

    #[wasm_bindgen]
    pub fn is_halted(&self) -> bool {
        self.cpu.is_halted()
    }

    #[wasm_bindgen]
    pub fn cycles(&self) -> u64 {
        self.cpu.cycles()
    }

    /// Pulses issued so far, rotational waits included.
    #[wasm_bindgen]
    pub fn ticks(&self) -> u64 {
        self.cpu.ticks()
    }

    #[wasm_bindgen]
    pub fn pc(&self) -> usize {
        self.cpu.pc()
    }

    /// Accumulator as a signed value.
    #[wasm_bindgen]
    pub fn accumulator(&self) -> i64 {
        self.cpu.regs().a_signed()
    }

    /// A register's cells as a string of 0/1, head first.
    #[wasm_bindgen]
    pub fn register_bits(&self, name: &str) -> Result<String, JsError> {
        let reg = match name.to_ascii_uppercase().as_str() {
            "A" => Reg::A,
            "B" => Reg::B,
            "S" => Reg::S,
            other => return Err(JsError::new(&format!("unknown register {}", other))),
        };
        Ok(self.cpu.regs().get(reg).bits().iter().map(|b| b.to_string()).collect())
    }

    /// Disassembly of a main-memory word.
    #[wasm_bindgen]
    pub fn main_word_at(&self, addr: usize) -> Result<String, JsError> {
        let word = self.cpu.read_main_word(addr).map_err(js_err)?;
        Ok(disassemble_word(word))
    }

    /// Printed values, oldest first.
    #[wasm_bindgen]
    pub fn output(&self) -> js_sys::Array {
        self.cpu
            .output()
            .iter()
            .map(|&v| JsValue::from_f64(v as f64))
            .collect()
    }

    /// Get registers and counters as a JSON string.
    #[wasm_bindgen]
    pub fn registers_json(&self) -> Result<String, JsError> {
        let regs = self.cpu.regs();
        let view = RegisterView {
            a: regs.peek(Reg::A).to_signed(),
            b: regs.peek(Reg::B).to_signed(),
            s: regs.peek(Reg::S).to_signed(),
            pc: self.cpu.pc(),
            base: self.cpu.base_address(),
            ticks: self.cpu.ticks(),
            cycles: self.cpu.cycles(),
            state: format!("{:?}", self.cpu.state()),
        };
        serde_json::to_string(&view).map_err(js_err)
    }
}

impl Default for WasmMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Assemble source code for the default geometry and return the word count.
#[wasm_bindgen]
pub fn wasm_assemble(source: &str) -> Result<usize, JsError> {
    let program = assemble(source, &MachineConfig::default()).map_err(js_err)?;
    Ok(program.len())
}

/// Disassemble a single 40-bit word given as a number.
#[wasm_bindgen]
pub fn wasm_disassemble(value: f64) -> String {
    disassemble_word(Word::new(value as u64))
}
