//! CPU execution engine.
//!
//! Implements the loader and the align / fetch / decode / execute cycle.
//! Everything the machine does is counted in pulses: waiting for a word to
//! come round the main line costs ticks exactly like arithmetic does.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use crate::asm::Program;
use crate::config::{ConfigError, MachineConfig};
use crate::cpu::{alu, transfer, Registers};
use crate::cpu::decode::{self, DataAddr, DecodeError, Instruction};
use crate::line::{Bit, BankError, BitOrder, MemoryBank, Word, WORD_SIZE};

/// Channel index of the single main-memory line.
const MAIN: usize = 0;

/// CPU execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// CPU is running normally.
    Running,
    /// CPU has halted (HLT or an execution fault). Terminal.
    Halted,
}

/// What a handler did besides pulsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Flow {
    ticks: usize,
    jump: Option<usize>,
}

impl Flow {
    const fn next(ticks: usize) -> Self {
        Self { ticks, jump: None }
    }

    const fn jump(ticks: usize, target: usize) -> Self {
        Self { ticks, jump: Some(target) }
    }
}

/// The delay-line CPU.
#[derive(Clone, Serialize)]
pub struct Cpu {
    config: MachineConfig,
    regs: Registers,
    /// Program memory: one line, instructions stored most significant bit first.
    main: MemoryBank,
    /// Data memory: one line per bank.
    data: MemoryBank,
    /// Word index of the next instruction.
    pc: usize,
    /// Word index of the first program word; relative jumps count from here.
    base: usize,
    state: CpuState,
    /// Pulses issued since reset.
    ticks: u64,
    /// Instructions executed since reset.
    cycles: u64,
    /// Values printed by PRA, oldest first.
    output: Vec<i64>,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a CPU with the given geometry.
    pub fn new(config: MachineConfig) -> Result<Self, CpuError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: MachineConfig) -> Self {
        Self {
            config,
            regs: Registers::new(),
            main: MemoryBank::new("main", 1, config.main_words, BitOrder::MsbFirst),
            data: MemoryBank::new("data", config.data_banks, config.bank_words, BitOrder::LsbFirst),
            pc: 0,
            base: 0,
            state: CpuState::Running,
            ticks: 0,
            cycles: 0,
            output: Vec::new(),
            last_instr: None,
        }
    }

    /// Reset registers, memory and counters.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.main.reset();
        self.data.reset();
        self.pc = 0;
        self.base = 0;
        self.state = CpuState::Running;
        self.ticks = 0;
        self.cycles = 0;
        self.output.clear();
        self.last_instr = None;
    }

    /// Load an assembled program and make it ready to run.
    ///
    /// Absolute operands were resolved against the program's base address,
    /// so a program assembled for a different main memory size is refused
    /// and the machine is left untouched.
    pub fn load_program(&mut self, program: &Program) -> Result<(), CpuError> {
        let words = self.config.main_words;
        if program.len() > words {
            return Err(CpuError::ProgramTooLarge { size: program.len(), available: words });
        }
        let expected = words - program.len();
        if program.base_address != expected {
            warn!(expected, assembled = program.base_address, "program base mismatch");
            return Err(CpuError::BaseMismatch { assembled: program.base_address, expected });
        }
        self.load_words(&program.words)
    }

    /// Load raw words at the tail of main memory.
    ///
    /// The main line is written over one full revolution with refresh off,
    /// so every word outside the program is cleared. Refresh is then turned
    /// back on and the line is rotated until the first program word is at
    /// the head.
    pub fn load_words(&mut self, program: &[Word]) -> Result<(), CpuError> {
        let words = self.config.main_words;
        if program.len() > words {
            return Err(CpuError::ProgramTooLarge { size: program.len(), available: words });
        }
        let base = words - program.len();

        let mut ticks = self.main.align(MAIN, 0)?;
        self.main.set_refresh(MAIN, false)?;
        for addr in 0..words {
            match addr.checked_sub(base).map(|i| program[i]) {
                Some(word) => {
                    for bit in word.bits_msb_first() {
                        self.main.schedule(MAIN, bit)?;
                        self.main.pulse(MAIN)?;
                    }
                }
                None => {
                    for _ in 0..WORD_SIZE {
                        self.main.pulse(MAIN)?;
                    }
                }
            }
        }
        ticks += words * WORD_SIZE;
        self.main.set_refresh(MAIN, true)?;
        ticks += self.main.align(MAIN, base % words)?;

        self.ticks += ticks as u64;
        self.base = base;
        self.pc = base % words;
        self.state = CpuState::Running;
        info!(base, len = program.len(), ticks, "program loaded");
        Ok(())
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed. An execution fault halts
    /// the CPU and is returned as an error.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        if self.state != CpuState::Running {
            return Err(CpuError::NotRunning(self.state));
        }

        let pc = self.pc;
        match self.cycle(pc) {
            Ok(instr) => Ok(instr),
            Err(e) => {
                warn!(pc, error = %e, "execution fault");
                self.state = CpuState::Halted;
                Err(e)
            }
        }
    }

    fn cycle(&mut self, pc: usize) -> Result<Instruction, CpuError> {
        // Align
        let wait = self.main.align(MAIN, pc)?;
        trace!(pc, wait, "main line aligned");

        // Fetch
        let mut bits = Vec::with_capacity(WORD_SIZE);
        for _ in 0..WORD_SIZE {
            bits.push(self.main.pulse(MAIN)?);
        }
        let raw = Word::from_msb_first(bits);
        self.ticks += (wait + WORD_SIZE) as u64;

        // Decode
        let instr = decode::decode(raw).map_err(|e| match e {
            DecodeError::UnknownOpcode(opcode) => CpuError::UnknownOpcode { opcode, pc },
        })?;

        // Execute
        let flow = self.execute(instr, pc)?;
        self.ticks += flow.ticks as u64;
        self.pc = flow.jump.unwrap_or((pc + 1) % self.config.main_words);
        self.cycles += 1;
        self.last_instr = Some(instr);

        debug!(pc, instr = instr.mnemonic(), operand = raw.operand(), ticks = self.ticks, "executed");
        Ok(instr)
    }

    /// Run until halt or error.
    ///
    /// Returns the number of instructions executed.
    pub fn run(&mut self) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;

        while self.state == CpuState::Running {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Run for at most `max_cycles` instructions.
    pub fn run_limited(&mut self, max_cycles: u64) -> Result<u64, CpuError> {
        let start_cycles = self.cycles;
        let limit = self.cycles + max_cycles;

        while self.state == CpuState::Running && self.cycles < limit {
            self.step()?;
        }

        Ok(self.cycles - start_cycles)
    }

    /// Execute a decoded instruction.
    fn execute(&mut self, instr: Instruction, pc: usize) -> Result<Flow, CpuError> {
        let flow = match instr {
            // ==================== Immediate loads ====================

            Instruction::Lai(imm) => Flow::next(alu::load_immediate(&mut self.regs.a, imm, BitOrder::LsbFirst)),
            Instruction::Lbi(imm) => Flow::next(alu::load_immediate(&mut self.regs.b, imm, BitOrder::LsbFirst)),
            Instruction::Lea(imm) => Flow::next(alu::load_immediate(&mut self.regs.a, imm, BitOrder::MsbFirst)),
            Instruction::Leb(imm) => Flow::next(alu::load_immediate(&mut self.regs.b, imm, BitOrder::MsbFirst)),

            // ==================== Arithmetic & logic ====================

            Instruction::Add => Flow::next(alu::add(&mut self.regs)),
            Instruction::Neg => Flow::next(alu::negate(&mut self.regs)),
            Instruction::Shl => Flow::next(alu::shift_left(&mut self.regs)),
            Instruction::Shr => Flow::next(alu::shift_right(&mut self.regs)),
            Instruction::And => Flow::next(alu::logic(&mut self.regs, Bit::and)),
            Instruction::Orr => Flow::next(alu::logic(&mut self.regs, Bit::or)),
            Instruction::Xor => Flow::next(alu::logic(&mut self.regs, Bit::xor)),
            Instruction::Mul => Flow::next(alu::multiply(&mut self.regs)),
            Instruction::Rnd(n) => Flow::next(alu::round(&mut self.regs, n)),
            Instruction::Mla(n) => Flow::next(alu::multiply_add(&mut self.regs, n)),

            // ==================== Data memory ====================

            Instruction::Sto(addr) => {
                let (bank, word) = self.data_address(addr, pc)?;
                Flow::next(transfer::store(&mut self.regs.a, &mut self.data, bank, word, false)?)
            }
            Instruction::Stb(addr) => {
                let (bank, word) = self.data_address(addr, pc)?;
                Flow::next(transfer::store(&mut self.regs.b, &mut self.data, bank, word, false)?)
            }
            Instruction::Stc(addr) => {
                let (bank, word) = self.data_address(addr, pc)?;
                Flow::next(transfer::store(&mut self.regs.a, &mut self.data, bank, word, true)?)
            }
            Instruction::Lda(addr) => {
                let (bank, word) = self.data_address(addr, pc)?;
                Flow::next(transfer::load(&mut self.regs.a, &mut self.data, bank, word)?)
            }
            Instruction::Ldb(addr) => {
                let (bank, word) = self.data_address(addr, pc)?;
                Flow::next(transfer::load(&mut self.regs.b, &mut self.data, bank, word)?)
            }
            Instruction::Col(addr) => {
                let (bank, word) = self.data_address(addr, pc)?;
                Flow::next(transfer::collate(&mut self.regs, &mut self.data, bank, word)?)
            }

            // ==================== Program memory ====================

            Instruction::Ldp(addr) => {
                let word = self.main_address(u64::from(addr), pc)?;
                Flow::next(transfer::load(&mut self.regs.a, &mut self.main, MAIN, word)?)
            }
            Instruction::Stp(addr) => {
                let word = self.main_address(u64::from(addr), pc)?;
                Flow::next(transfer::store_program(&mut self.regs, &mut self.main, word)?)
            }

            // ==================== Control flow ====================

            Instruction::Jmp(offset) => {
                let target = self.relative(offset, pc)?;
                Flow::jump(0, target)
            }
            Instruction::Jmpa(addr) => {
                let target = self.main_address(u64::from(addr), pc)?;
                Flow::jump(0, target)
            }
            Instruction::Jza(offset) => {
                let (scan, ticks) = alu::scan_a(&mut self.regs);
                if scan.zero {
                    Flow::jump(ticks, self.relative(offset, pc)?)
                } else {
                    Flow::next(ticks)
                }
            }
            Instruction::Jna(offset) => {
                let (scan, ticks) = alu::scan_a(&mut self.regs);
                if scan.negative {
                    Flow::jump(ticks, self.relative(offset, pc)?)
                } else {
                    Flow::next(ticks)
                }
            }
            Instruction::Pra => {
                let (scan, ticks) = alu::scan_a(&mut self.regs);
                info!(pc, value = scan.value, "PRA");
                self.output.push(scan.value);
                Flow::next(ticks)
            }
            Instruction::Nop => Flow::next(0),
            Instruction::Hlt => {
                info!(pc, cycles = self.cycles + 1, "halted");
                self.state = CpuState::Halted;
                Flow::next(0)
            }
        };

        Ok(flow)
    }

    fn data_address(&self, addr: DataAddr, pc: usize) -> Result<(usize, usize), CpuError> {
        let (bank, word) = (addr.bank as usize, addr.word as usize);
        if bank >= self.config.data_banks || word >= self.config.bank_words {
            return Err(CpuError::DataAddressOutOfRange { bank, word, pc });
        }
        Ok((bank, word))
    }

    fn main_address(&self, addr: u64, pc: usize) -> Result<usize, CpuError> {
        if addr >= self.config.main_words as u64 {
            return Err(CpuError::AddressOutOfRange { addr, pc });
        }
        Ok(addr as usize)
    }

    fn relative(&self, offset: u32, pc: usize) -> Result<usize, CpuError> {
        self.main_address(self.base as u64 + u64::from(offset), pc)
    }

    /// The machine geometry.
    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    /// CPU registers.
    pub fn regs(&self) -> &Registers {
        &self.regs
    }

    /// CPU registers, for presetting values before a run.
    pub fn regs_mut(&mut self) -> &mut Registers {
        &mut self.regs
    }

    /// Current execution state.
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Word index of the next instruction.
    pub fn pc(&self) -> usize {
        self.pc
    }

    /// Word index of the first program word.
    pub fn base_address(&self) -> usize {
        self.base
    }

    /// Pulses issued since reset, including alignment waits.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Instructions executed since reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Values printed so far.
    pub fn output(&self) -> &[i64] {
        &self.output
    }

    /// Drain the printed values.
    pub fn take_output(&mut self) -> Vec<i64> {
        std::mem::take(&mut self.output)
    }

    /// Program memory.
    pub fn main_memory(&self) -> &MemoryBank {
        &self.main
    }

    /// Data memory.
    pub fn data_memory(&self) -> &MemoryBank {
        &self.data
    }

    /// Data memory, for presetting values before a run.
    pub fn data_mut(&mut self) -> &mut MemoryBank {
        &mut self.data
    }

    /// A program-memory word, read without disturbing the rotation.
    pub fn read_main_word(&self, addr: usize) -> Result<Word, CpuError> {
        Ok(self.main.peek_word(MAIN, addr)?)
    }

    /// Word index currently at the head of the main line.
    pub fn main_clock(&self) -> usize {
        self.main.clock(MAIN).unwrap_or(0)
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }

    /// Check if the CPU is halted.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    /// Check if the CPU is running.
    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::build(MachineConfig::default())
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("pc", &self.pc)
            .field("base", &self.base)
            .field("cycles", &self.cycles)
            .field("ticks", &self.ticks)
            .field("regs", &self.regs)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("CPU not running: {0:?}")]
    NotRunning(CpuState),

    #[error("unknown opcode 0x{opcode:02X} at word {pc}")]
    UnknownOpcode { opcode: u8, pc: usize },

    #[error("data address {bank}:{word} out of range at word {pc}")]
    DataAddressOutOfRange { bank: usize, word: usize, pc: usize },

    #[error("main memory address {addr} out of range at word {pc}")]
    AddressOutOfRange { addr: u64, pc: usize },

    #[error("program size {size} exceeds main memory of {available} words")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("program assembled for base {assembled}, but this machine loads it at {expected}")]
    BaseMismatch { assembled: usize, expected: usize },

    #[error("memory error: {0}")]
    Bank(#[from] BankError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;
    use crate::cpu::decode::encode;
    use crate::cpu::registers::Reg;

    fn make_program(instructions: &[Instruction]) -> Vec<Word> {
        instructions.iter().map(encode).collect()
    }

    fn run_source(source: &str) -> Cpu {
        let mut cpu = Cpu::default();
        let program = assemble(source, cpu.config()).unwrap();
        cpu.load_program(&program).unwrap();
        cpu.run_limited(10_000).unwrap();
        cpu
    }

    #[test]
    fn test_cpu_halt() {
        let mut cpu = Cpu::default();
        cpu.load_words(&make_program(&[Instruction::Hlt])).unwrap();

        let executed = cpu.run().unwrap();

        assert_eq!(executed, 1);
        assert!(cpu.is_halted());
        assert!(matches!(cpu.step(), Err(CpuError::NotRunning(CpuState::Halted))));
    }

    #[test]
    fn test_loader_places_program_at_tail() {
        let mut cpu = Cpu::default();
        let program = make_program(&[Instruction::Lai(5), Instruction::Pra, Instruction::Hlt]);
        cpu.load_words(&program).unwrap();

        assert_eq!(cpu.base_address(), 61);
        assert_eq!(cpu.pc(), 61);
        assert_eq!(cpu.main_clock(), 61);
        for (i, word) in program.iter().enumerate() {
            assert_eq!(cpu.read_main_word(61 + i).unwrap(), *word);
        }
        assert_eq!(cpu.read_main_word(0).unwrap(), Word::ZERO);
        // One alignment to word 0, one revolution, then the wait to the base.
        assert_eq!(cpu.ticks(), (64 * WORD_SIZE + 61 * WORD_SIZE) as u64);
    }

    #[test]
    fn test_program_too_large() {
        let mut cpu = Cpu::new(MachineConfig::new(2, 1, 1)).unwrap();
        let program = make_program(&[Instruction::Nop; 3]);
        assert_eq!(
            cpu.load_words(&program),
            Err(CpuError::ProgramTooLarge { size: 3, available: 2 })
        );
    }

    #[test]
    fn test_program_for_other_geometry_rejected() {
        let program = assemble("JMPA END\nLAI 99\nPRA\nEND: HLT", &MachineConfig::default()).unwrap();
        let mut cpu = Cpu::new(MachineConfig::new(128, 4, 16)).unwrap();

        assert_eq!(
            cpu.load_program(&program),
            Err(CpuError::BaseMismatch { assembled: 60, expected: 124 })
        );
        assert_eq!(cpu.ticks(), 0);
        assert_eq!(cpu.base_address(), 0);
        assert_eq!(cpu.read_main_word(124).unwrap(), Word::ZERO);
    }

    #[test]
    fn test_add_negative_prints_difference() {
        let cpu = run_source("LAI 20\nLBI 7\nNEG\nADD\nPRA\nHLT\n");
        assert_eq!(cpu.output(), &[13]);
        assert!(cpu.is_halted());
    }

    #[test]
    fn test_register_and_data_instructions_end_to_end() {
        let source = "
            LAI 12
            LBI 10
            ORR             ; 12 | 10
            PRA
            XOR             ; 14 ^ 10
            PRA
            SHR             ; doubles
            PRA
            SHL             ; halves
            SHL
            PRA
            STB 2, 3
            LAI 0b10111
            RND 3           ; clear the low three bits
            PRA
            MLA 5           ; 16 + 5 * 10
            PRA
            LDA 2, 3
            PRA
            LEA 0x100       ; bit 8 lands at bit 31 in register order
            PRA
            HLT
        ";

        let cpu = run_source(source);

        assert!(cpu.is_halted());
        assert_eq!(cpu.output(), &[14, 4, 8, 2, 16, 66, 10, 1 << 31]);
        assert_eq!(cpu.data_memory().peek_word(2, 3).unwrap(), Word::new(10));
        assert_eq!(cpu.regs().peek(Reg::B), Word::new(10));
    }

    #[test]
    fn test_pra_prints_negative_values() {
        let cpu = run_source("LAI 7\nLBI 20\nNEG\nADD\nPRA\nHLT");
        assert_eq!(cpu.output(), &[-13]);
    }

    #[test]
    fn test_multiply_program() {
        let cpu = run_source("LAI 6\nLBI 121\nMUL\nPRA\nHLT");
        assert_eq!(cpu.output(), &[726]);
    }

    #[test]
    fn test_fetch_waits_for_rotation() {
        let mut cpu = Cpu::default();
        cpu.load_words(&make_program(&[Instruction::Nop, Instruction::Hlt])).unwrap();
        let before = cpu.ticks();
        cpu.step().unwrap();
        // Already aligned: only the fetch itself.
        assert_eq!(cpu.ticks() - before, WORD_SIZE as u64);
        let before = cpu.ticks();
        cpu.step().unwrap();
        assert_eq!(cpu.ticks() - before, WORD_SIZE as u64);
    }

    #[test]
    fn test_data_memory_round_trip() {
        let cpu = run_source(
            "LAI 1234\n\
             STC 2, 7\n\
             PRA\n\
             LDB 2, 7\n\
             ADD\n\
             PRA\n\
             HLT",
        );
        assert_eq!(cpu.output(), &[0, 1234]);
        assert_eq!(cpu.data_memory().peek_word(2, 7).unwrap(), Word::new(1234));
    }

    #[test]
    fn test_collate_program() {
        let mut cpu = Cpu::default();
        cpu.data_mut().write_word(1, 1, Word::new(0b1100)).unwrap();
        let program = assemble("LAI 1\nLBI 10\nCOL 1, 1\nPRA\nHLT", cpu.config()).unwrap();
        cpu.load_program(&program).unwrap();
        cpu.run().unwrap();
        assert_eq!(cpu.output(), &[1 + 0b1000]);
    }

    #[test]
    fn test_countdown_loop() {
        let cpu = run_source(
            "       LAI 3\n\
                    LBI 1\n\
                    NEG\n\
             LOOP:  PRA\n\
                    ADD\n\
                    JZA DONE\n\
                    JMP LOOP\n\
             DONE:  PRA\n\
                    HLT",
        );
        assert_eq!(cpu.output(), &[3, 2, 1, 0]);
    }

    #[test]
    fn test_jna_branches_on_sign_bit() {
        let cpu = run_source(
            "       LAI 5\n\
                    LBI 9\n\
                    NEG\n\
                    ADD\n\
                    JNA MINUS\n\
                    LAI 100\n\
             MINUS: PRA\n\
                    HLT",
        );
        assert_eq!(cpu.output(), &[-4]);
    }

    #[test]
    fn test_unknown_opcode_halts() {
        let mut cpu = Cpu::default();
        let program = vec![encode(&Instruction::Lai(1)), Word::from_parts(0x7E, 0)];
        cpu.load_words(&program).unwrap();
        cpu.step().unwrap();

        let err = cpu.step().unwrap_err();
        assert_eq!(err, CpuError::UnknownOpcode { opcode: 0x7E, pc: 63 });
        assert!(cpu.is_halted());
        // The fault had no effect beyond the fetch.
        assert_eq!(cpu.regs().peek(Reg::A), Word::new(1));
    }

    #[test]
    fn test_data_address_out_of_range_halts() {
        let mut cpu = Cpu::default();
        cpu.regs_mut().poke(Reg::A, Word::new(9));
        cpu.load_words(&make_program(&[Instruction::Stc(DataAddr::new(7, 0))])).unwrap();
        let err = cpu.step().unwrap_err();
        assert!(matches!(err, CpuError::DataAddressOutOfRange { bank: 7, .. }));
        assert!(cpu.is_halted());
        assert_eq!(cpu.regs().peek(Reg::A), Word::new(9));
    }

    #[test]
    fn test_ldp_reads_program_word() {
        let cpu = run_source(
            "       LDP DATA\n\
                    STO 0, 0\n\
                    HLT\n\
             DATA:  DAT 0x8000000000",
        );
        // Bit 39 of the program word is the first bit to stream into A.
        assert_eq!(cpu.data_memory().peek_word(0, 0).unwrap(), Word::new(1));
    }

    #[test]
    fn test_stp_rewrites_next_instruction() {
        // Build a PRA in A (memory orientation) and store it over a NOP.
        let cpu = run_source(
            "       LEA 0\n\
                    LDP TEMPLATE\n\
                    STP SLOT\n\
                    LAI 77\n\
             SLOT:  NOP\n\
                    HLT\n\
             TEMPLATE: PRA",
        );
        assert_eq!(cpu.output(), &[77]);
    }

    #[test]
    fn test_wheeler_jump_returns_to_caller() {
        let source = "
            ; Caller: pass the return address in B, then enter the subroutine.
                    LEB BACK
                    JMP SUB
            BACK:   LAI 2
                    PRA
                    HLT
            ; Subroutine: print 1, then plant JMPA BACK over its own exit.
            SUB:    LAI 1
                    PRA
                    LDP LINK
                    ADD
                    STP EXIT
            EXIT:   NOP
                    LAI 99        ; never reached
                    PRA
                    HLT
            LINK:   JMPA 0
        ";
        let mut cpu = Cpu::default();
        let program = assemble(source, cpu.config()).unwrap();
        cpu.load_program(&program).unwrap();
        cpu.run_limited(100).unwrap();

        assert!(cpu.is_halted());
        assert_eq!(cpu.output(), &[1, 2]);

        let exit = program.address_of("EXIT").unwrap();
        let back = program.address_of("BACK").unwrap();
        let rewritten = decode::decode(cpu.read_main_word(exit).unwrap()).unwrap();
        assert_eq!(rewritten, Instruction::Jmpa(back as u32));
    }

    #[test]
    fn test_machines_are_independent() {
        let small = MachineConfig::new(8, 1, 4);
        let mut a = Cpu::new(small).unwrap();
        let mut b = Cpu::default();
        let program = make_program(&[Instruction::Lai(3), Instruction::Pra, Instruction::Hlt]);
        a.load_words(&program).unwrap();
        b.load_words(&program).unwrap();
        a.run().unwrap();
        b.run().unwrap();
        assert_eq!(a.output(), b.output());
        assert_eq!(a.base_address(), 5);
        assert_eq!(b.base_address(), 61);
        assert!(a.ticks() < b.ticks());
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(matches!(
            Cpu::new(MachineConfig::new(0, 1, 1)),
            Err(CpuError::Config(ConfigError::EmptyMainMemory))
        ));
    }
}
