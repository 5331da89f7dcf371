//! Instruction decoder.
//!
//! Every instruction is one 40-bit word: an 8-bit opcode in bits 39..32 and
//! a 32-bit operand in bits 31..0. Data-memory instructions pack a bank
//! number into bits 7..4 of the operand and a word number into bits 3..0.

use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::line::Word;

/// A (bank, word) address in data memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DataAddr {
    pub bank: u8,
    pub word: u8,
}

impl DataAddr {
    /// Create an address. Each field keeps only its low 4 bits.
    pub const fn new(bank: u8, word: u8) -> Self {
        Self { bank: bank & 0x0F, word: word & 0x0F }
    }

    /// Unpack from the low byte of an operand.
    pub const fn from_operand(operand: u32) -> Self {
        Self::new(((operand >> 4) & 0x0F) as u8, (operand & 0x0F) as u8)
    }

    pub const fn to_operand(self) -> u32 {
        ((self.bank as u32) << 4) | self.word as u32
    }
}

/// Decoded instruction.
///
/// The instruction set is organized into groups:
/// - Immediate loads: LAI, LBI, LEA, LEB
/// - Serial arithmetic and logic on A and B
/// - Data-memory transfer between registers and the banks
/// - Program-memory transfer (LDP/STP), which is how code rewrites code
/// - Control: relative and absolute jumps, conditional branches, halt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Immediate loads ====================

    /// A := imm, injected least significant bit first
    Lai(u32),
    /// B := imm, injected least significant bit first
    Lbi(u32),
    /// A := imm, injected most significant bit first (memory orientation)
    Lea(u32),
    /// B := imm, injected most significant bit first (memory orientation)
    Leb(u32),

    // ==================== Arithmetic & logic ====================

    /// A := A + B
    Add,
    /// B := -B
    Neg,
    /// One pulse of A with a zero injected at the tail
    Shl,
    /// A replayed through S one cell later, with a zero in front
    Shr,
    /// A := A & B
    And,
    /// A := A | B
    Orr,
    /// A := A ^ B
    Xor,
    /// A := A * B (mod 2^40), B consumed
    Mul,
    /// Clear the low `n` bits of A
    Rnd(u32),
    /// A := A + n * B
    Mla(u32),

    // ==================== Data memory ====================

    /// [addr] := A
    Sto(DataAddr),
    /// [addr] := B
    Stb(DataAddr),
    /// [addr] := A, A := 0
    Stc(DataAddr),
    /// A := [addr]
    Lda(DataAddr),
    /// B := [addr]
    Ldb(DataAddr),
    /// S := [addr], A := A + (S & B)
    Col(DataAddr),

    // ==================== Program memory ====================

    /// A := main[addr]
    Ldp(u32),
    /// main[addr] := A
    Stp(u32),

    // ==================== Control flow ====================

    /// pc := base + offset
    Jmp(u32),
    /// pc := addr
    Jmpa(u32),
    /// if A = 0 then pc := base + offset
    Jza(u32),
    /// if A < 0 then pc := base + offset
    Jna(u32),
    /// Print A as a signed integer
    Pra,
    /// No operation
    Nop,
    /// Halt execution
    Hlt,
}

/// Opcode values. These are part of the program encoding and never change.
pub struct Opcode;

impl Opcode {
    pub const NOP: u8 = 0x00;
    pub const LAI: u8 = 0x01;
    pub const LBI: u8 = 0x02;
    pub const LEA: u8 = 0x03;
    pub const LEB: u8 = 0x04;
    pub const ADD: u8 = 0x05;
    pub const NEG: u8 = 0x06;
    pub const SHL: u8 = 0x07;
    pub const SHR: u8 = 0x08;
    pub const AND: u8 = 0x09;
    pub const ORR: u8 = 0x0A;
    pub const XOR: u8 = 0x0B;
    pub const MUL: u8 = 0x0C;
    pub const RND: u8 = 0x0D;
    pub const MLA: u8 = 0x0E;
    pub const STO: u8 = 0x10;
    pub const STB: u8 = 0x11;
    pub const STC: u8 = 0x12;
    pub const LDA: u8 = 0x13;
    pub const LDB: u8 = 0x14;
    pub const COL: u8 = 0x15;
    pub const LDP: u8 = 0x18;
    pub const STP: u8 = 0x19;
    pub const JMP: u8 = 0x20;
    pub const JMPA: u8 = 0x21;
    pub const JZA: u8 = 0x22;
    pub const JNA: u8 = 0x23;
    pub const PRA: u8 = 0x30;
    pub const HLT: u8 = 0xFF;
}

impl Instruction {
    /// Assembly mnemonic.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Lai(_) => "LAI",
            Instruction::Lbi(_) => "LBI",
            Instruction::Lea(_) => "LEA",
            Instruction::Leb(_) => "LEB",
            Instruction::Add => "ADD",
            Instruction::Neg => "NEG",
            Instruction::Shl => "SHL",
            Instruction::Shr => "SHR",
            Instruction::And => "AND",
            Instruction::Orr => "ORR",
            Instruction::Xor => "XOR",
            Instruction::Mul => "MUL",
            Instruction::Rnd(_) => "RND",
            Instruction::Mla(_) => "MLA",
            Instruction::Sto(_) => "STO",
            Instruction::Stb(_) => "STB",
            Instruction::Stc(_) => "STC",
            Instruction::Lda(_) => "LDA",
            Instruction::Ldb(_) => "LDB",
            Instruction::Col(_) => "COL",
            Instruction::Ldp(_) => "LDP",
            Instruction::Stp(_) => "STP",
            Instruction::Jmp(_) => "JMP",
            Instruction::Jmpa(_) => "JMPA",
            Instruction::Jza(_) => "JZA",
            Instruction::Jna(_) => "JNA",
            Instruction::Pra => "PRA",
            Instruction::Nop => "NOP",
            Instruction::Hlt => "HLT",
        }
    }
}

/// Decode an instruction word.
pub fn decode(word: Word) -> Result<Instruction, DecodeError> {
    let operand = word.operand();
    let data = DataAddr::from_operand(operand);

    let instruction = match word.opcode() {
        Opcode::NOP => Instruction::Nop,
        Opcode::LAI => Instruction::Lai(operand),
        Opcode::LBI => Instruction::Lbi(operand),
        Opcode::LEA => Instruction::Lea(operand),
        Opcode::LEB => Instruction::Leb(operand),
        Opcode::ADD => Instruction::Add,
        Opcode::NEG => Instruction::Neg,
        Opcode::SHL => Instruction::Shl,
        Opcode::SHR => Instruction::Shr,
        Opcode::AND => Instruction::And,
        Opcode::ORR => Instruction::Orr,
        Opcode::XOR => Instruction::Xor,
        Opcode::MUL => Instruction::Mul,
        Opcode::RND => Instruction::Rnd(operand),
        Opcode::MLA => Instruction::Mla(operand),
        Opcode::STO => Instruction::Sto(data),
        Opcode::STB => Instruction::Stb(data),
        Opcode::STC => Instruction::Stc(data),
        Opcode::LDA => Instruction::Lda(data),
        Opcode::LDB => Instruction::Ldb(data),
        Opcode::COL => Instruction::Col(data),
        Opcode::LDP => Instruction::Ldp(operand),
        Opcode::STP => Instruction::Stp(operand),
        Opcode::JMP => Instruction::Jmp(operand),
        Opcode::JMPA => Instruction::Jmpa(operand),
        Opcode::JZA => Instruction::Jza(operand),
        Opcode::JNA => Instruction::Jna(operand),
        Opcode::PRA => Instruction::Pra,
        Opcode::HLT => Instruction::Hlt,
        other => return Err(DecodeError::UnknownOpcode(other)),
    };

    Ok(instruction)
}

/// Encode an instruction back to a word.
pub fn encode(instr: &Instruction) -> Word {
    let (opcode, operand) = match *instr {
        Instruction::Nop => (Opcode::NOP, 0),
        Instruction::Lai(imm) => (Opcode::LAI, imm),
        Instruction::Lbi(imm) => (Opcode::LBI, imm),
        Instruction::Lea(imm) => (Opcode::LEA, imm),
        Instruction::Leb(imm) => (Opcode::LEB, imm),
        Instruction::Add => (Opcode::ADD, 0),
        Instruction::Neg => (Opcode::NEG, 0),
        Instruction::Shl => (Opcode::SHL, 0),
        Instruction::Shr => (Opcode::SHR, 0),
        Instruction::And => (Opcode::AND, 0),
        Instruction::Orr => (Opcode::ORR, 0),
        Instruction::Xor => (Opcode::XOR, 0),
        Instruction::Mul => (Opcode::MUL, 0),
        Instruction::Rnd(n) => (Opcode::RND, n),
        Instruction::Mla(n) => (Opcode::MLA, n),
        Instruction::Sto(addr) => (Opcode::STO, addr.to_operand()),
        Instruction::Stb(addr) => (Opcode::STB, addr.to_operand()),
        Instruction::Stc(addr) => (Opcode::STC, addr.to_operand()),
        Instruction::Lda(addr) => (Opcode::LDA, addr.to_operand()),
        Instruction::Ldb(addr) => (Opcode::LDB, addr.to_operand()),
        Instruction::Col(addr) => (Opcode::COL, addr.to_operand()),
        Instruction::Ldp(addr) => (Opcode::LDP, addr),
        Instruction::Stp(addr) => (Opcode::STP, addr),
        Instruction::Jmp(offset) => (Opcode::JMP, offset),
        Instruction::Jmpa(addr) => (Opcode::JMPA, addr),
        Instruction::Jza(offset) => (Opcode::JZA, offset),
        Instruction::Jna(offset) => (Opcode::JNA, offset),
        Instruction::Pra => (Opcode::PRA, 0),
        Instruction::Hlt => (Opcode::HLT, 0),
    };

    Word::from_parts(opcode, operand)
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("unknown opcode: 0x{0:02X}")]
    UnknownOpcode(u8),
}
