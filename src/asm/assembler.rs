//! Two-pass assembler for delay-line programs.
//!
//! Syntax:
//! ```text
//! ; Comment
//! LOOP:   PRA         ; Label on an instruction
//!         ADD
//!         JZA DONE    ; Relative: encodes DONE's instruction index
//!         JMP LOOP
//! DONE:   STO 1, 3    ; Data address: bank 1, word 3
//!         LEB DONE    ; Absolute: encodes base + index
//!         HLT
//!         DAT -1      ; Raw 40-bit word
//! ```
//!
//! The program is placed at the tail of main memory, so the base address is
//! only known once every instruction has been counted. Pass 1 collects labels
//! and statements; pass 2 resolves operands against the final base.

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::config::{ConfigError, MachineConfig, DATA_FIELD_LIMIT};
use crate::cpu::alu::MLA_LIMIT;
use crate::cpu::decode::{DataAddr, Opcode};
use crate::line::{Word, WORD_MASK};

/// An assembled program, ready to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    /// Word index of the first instruction in main memory.
    pub base_address: usize,
    /// Encoded words in load order.
    pub words: Vec<Word>,
    /// Label name to instruction index.
    pub labels: BTreeMap<String, usize>,
}

impl Program {
    /// Number of words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Absolute main-memory address of a label.
    pub fn address_of(&self, label: &str) -> Option<usize> {
        self.labels
            .get(&label.to_uppercase())
            .map(|index| self.base_address + index)
    }

    /// Labels bound to the instruction at `index`, in name order.
    pub fn labels_at(&self, index: usize) -> impl Iterator<Item = &str> {
        self.labels
            .iter()
            .filter(move |&(_, &i)| i == index)
            .map(|(name, _)| name.as_str())
    }
}

/// Assemble source code for a machine of the given geometry.
pub fn assemble(source: &str, config: &MachineConfig) -> Result<Program, AssemblerError> {
    config.validate()?;
    let mut asm = Assembler::new(config.main_words);
    asm.assemble(source)
}

/// How an instruction's operand is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OperandKind {
    /// No operand.
    None,
    /// Label resolves to its instruction index.
    Relative,
    /// Label resolves to base + index.
    Absolute,
    /// Literal bit count.
    Count,
    /// Literal repeat count, at most [`MLA_LIMIT`].
    Repeat,
    /// `bank, word` in data memory.
    Data,
}

impl OperandKind {
    /// Number of operands the kind takes.
    const fn arity(self) -> usize {
        match self {
            OperandKind::None => 0,
            OperandKind::Data => 2,
            _ => 1,
        }
    }
}

/// Opcode and operand kind for a mnemonic.
fn lookup(mnemonic: &str) -> Option<(u8, OperandKind)> {
    use OperandKind::*;

    let entry = match mnemonic {
        "NOP" => (Opcode::NOP, None),
        "LAI" => (Opcode::LAI, Absolute),
        "LBI" => (Opcode::LBI, Absolute),
        "LEA" => (Opcode::LEA, Absolute),
        "LEB" => (Opcode::LEB, Absolute),
        "ADD" => (Opcode::ADD, None),
        "NEG" => (Opcode::NEG, None),
        "SHL" => (Opcode::SHL, None),
        "SHR" => (Opcode::SHR, None),
        "AND" => (Opcode::AND, None),
        "ORR" => (Opcode::ORR, None),
        "XOR" => (Opcode::XOR, None),
        "MUL" => (Opcode::MUL, None),
        "RND" => (Opcode::RND, Count),
        "MLA" => (Opcode::MLA, Repeat),
        "STO" => (Opcode::STO, Data),
        "STB" => (Opcode::STB, Data),
        "STC" => (Opcode::STC, Data),
        "LDA" => (Opcode::LDA, Data),
        "LDB" => (Opcode::LDB, Data),
        "COL" => (Opcode::COL, Data),
        "LDP" => (Opcode::LDP, Absolute),
        "STP" => (Opcode::STP, Absolute),
        "JMP" => (Opcode::JMP, Relative),
        "JMPA" => (Opcode::JMPA, Absolute),
        "JZA" => (Opcode::JZA, Relative),
        "JNA" => (Opcode::JNA, Relative),
        "PRA" => (Opcode::PRA, None),
        "HLT" => (Opcode::HLT, None),
        _ => return Option::None,
    };
    Some(entry)
}

/// One statement collected by pass 1.
#[derive(Debug, Clone)]
enum Statement {
    Instruction {
        line: usize,
        mnemonic: String,
        opcode: u8,
        kind: OperandKind,
        operands: Vec<String>,
    },
    Data {
        line: usize,
        operands: Vec<String>,
    },
}

/// The assembler state.
struct Assembler {
    /// Words available in main memory.
    capacity: usize,
    /// Symbol table (label -> instruction index).
    symbols: BTreeMap<String, usize>,
    /// Statements in emission order.
    statements: Vec<Statement>,
    /// Labels seen since the last statement, with their lines.
    pending: Vec<(String, usize)>,
}

impl Assembler {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            symbols: BTreeMap::new(),
            statements: Vec::new(),
            pending: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Program, AssemblerError> {
        // Pass 1: collect labels and statements
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }
        if let Some((label, line)) = self.pending.first() {
            return Err(AssemblerError::DanglingLabel { line: *line, label: label.clone() });
        }

        let size = self.statements.len();
        if size > self.capacity {
            return Err(AssemblerError::ProgramTooLarge { size, available: self.capacity });
        }
        let base = self.capacity - size;

        // Pass 2: resolve operands against the base address
        let words = self
            .statements
            .iter()
            .map(|statement| self.encode(statement, base))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Program {
            base_address: base,
            words,
            labels: self.symbols.clone(),
        })
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        // Check for label definition
        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_uppercase();
            if !label.is_empty() {
                if self.symbols.contains_key(&label) {
                    return Err(AssemblerError::DuplicateLabel { line: line_num, label });
                }
                self.symbols.insert(label.clone(), self.statements.len());
                self.pending.push((label, line_num));
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        let mut parts = line.split_whitespace();
        let mnemonic = match parts.next() {
            Some(m) => m.to_uppercase(),
            None => return Ok(()),
        };
        let operands: Vec<String> = parts
            .flat_map(|part| part.split(','))
            .filter(|op| !op.is_empty())
            .map(str::to_uppercase)
            .collect();

        let (resolved, arity) = if mnemonic == "DAT" {
            (None, 1)
        } else {
            let (opcode, kind) = lookup(&mnemonic).ok_or_else(|| AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.clone(),
            })?;
            (Some((opcode, kind)), kind.arity())
        };
        if let Some(extra) = operands.get(arity) {
            return Err(AssemblerError::UnexpectedOperand {
                line: line_num,
                mnemonic,
                operand: extra.clone(),
            });
        }

        let statement = match resolved {
            Some((opcode, kind)) => Statement::Instruction { line: line_num, mnemonic, opcode, kind, operands },
            None => Statement::Data { line: line_num, operands },
        };
        self.statements.push(statement);
        self.pending.clear();
        Ok(())
    }

    fn encode(&self, statement: &Statement, base: usize) -> Result<Word, AssemblerError> {
        match statement {
            Statement::Data { line, operands } => {
                let text = first_operand(operands, "DAT", *line)?;
                parse_data_word(text, *line)
            }
            Statement::Instruction { line, mnemonic, opcode, kind, operands } => {
                let operand = match kind {
                    OperandKind::None => 0,
                    OperandKind::Relative => {
                        let text = first_operand(operands, mnemonic, *line)?;
                        self.resolve(text, 0, *line)?
                    }
                    OperandKind::Absolute => {
                        let text = first_operand(operands, mnemonic, *line)?;
                        self.resolve(text, base, *line)?
                    }
                    OperandKind::Count => {
                        let text = first_operand(operands, mnemonic, *line)?;
                        parse_literal(text, *line)?
                            .ok_or_else(|| unresolved(text, *line))?
                    }
                    OperandKind::Repeat => {
                        let text = first_operand(operands, mnemonic, *line)?;
                        let count = parse_literal(text, *line)?
                            .ok_or_else(|| unresolved(text, *line))?;
                        if count > MLA_LIMIT {
                            return Err(AssemblerError::ValueOutOfRange { line: *line, value: text.to_string() });
                        }
                        count
                    }
                    OperandKind::Data => self.data_operand(operands, mnemonic, *line)?,
                };
                Ok(Word::from_parts(*opcode, operand))
            }
        }
    }

    /// A label (offset by `base`) or, failing that, an integer literal.
    fn resolve(&self, text: &str, base: usize, line: usize) -> Result<u32, AssemblerError> {
        if let Some(&index) = self.symbols.get(text) {
            let addr = base + index;
            return u32::try_from(addr).map_err(|_| AssemblerError::ValueOutOfRange {
                line,
                value: addr.to_string(),
            });
        }
        parse_literal(text, line)?.ok_or_else(|| unresolved(text, line))
    }

    fn data_operand(&self, operands: &[String], mnemonic: &str, line: usize) -> Result<u32, AssemblerError> {
        let (bank, word) = match operands {
            [bank, word] => (bank, word),
            _ => {
                return Err(AssemblerError::MissingOperand {
                    line,
                    mnemonic: mnemonic.to_string(),
                })
            }
        };
        let field = |text: &str| -> Result<u8, AssemblerError> {
            let value = parse_literal(text, line)?.ok_or_else(|| unresolved(text, line))?;
            if value as usize >= DATA_FIELD_LIMIT {
                return Err(AssemblerError::ValueOutOfRange { line, value: text.to_string() });
            }
            Ok(value as u8)
        };
        Ok(DataAddr::new(field(bank)?, field(word)?).to_operand())
    }
}

fn first_operand<'a>(operands: &'a [String], mnemonic: &str, line: usize) -> Result<&'a str, AssemblerError> {
    operands
        .first()
        .map(String::as_str)
        .ok_or_else(|| AssemblerError::MissingOperand { line, mnemonic: mnemonic.to_string() })
}

fn unresolved(text: &str, line: usize) -> AssemblerError {
    AssemblerError::UnresolvedOperand { line, operand: text.to_string() }
}

/// Split an optional sign and radix prefix off a literal.
///
/// Returns `None` when `text` does not look like a number at all.
fn parse_magnitude(text: &str) -> Option<(bool, Result<u64, std::num::ParseIntError>)> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let parsed = if let Some(hex) = digits.strip_prefix("0X") {
        u64::from_str_radix(hex, 16)
    } else if let Some(bin) = digits.strip_prefix("0B") {
        u64::from_str_radix(bin, 2)
    } else if digits.starts_with(|c: char| c.is_ascii_digit()) {
        digits.parse::<u64>()
    } else {
        return None;
    };
    Some((negative, parsed))
}

/// Parse a 32-bit operand literal. Negative decimals become two's complement.
fn parse_literal(text: &str, line: usize) -> Result<Option<u32>, AssemblerError> {
    let out_of_range = || AssemblerError::ValueOutOfRange { line, value: text.to_string() };

    let Some((negative, parsed)) = parse_magnitude(text) else {
        return Ok(None);
    };
    let magnitude = parsed.map_err(|_| out_of_range())?;

    let value = if negative {
        if magnitude > 1 << 31 {
            return Err(out_of_range());
        }
        (magnitude as i64).wrapping_neg() as u32
    } else {
        u32::try_from(magnitude).map_err(|_| out_of_range())?
    };
    Ok(Some(value))
}

/// Parse a DAT value: any literal, truncated to 40 bits.
fn parse_data_word(text: &str, line: usize) -> Result<Word, AssemblerError> {
    let Some((negative, parsed)) = parse_magnitude(text) else {
        return Err(unresolved(text, line));
    };
    let magnitude = parsed.map_err(|_| AssemblerError::ValueOutOfRange {
        line,
        value: text.to_string(),
    })?;
    let value = if negative { magnitude.wrapping_neg() } else { magnitude };
    Ok(Word::new(value & WORD_MASK))
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("duplicate label on line {line}: {label}")]
    DuplicateLabel { line: usize, label: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("unresolved operand on line {line}: {operand}")]
    UnresolvedOperand { line: usize, operand: String },

    #[error("missing operand on line {line} for {mnemonic}")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("unexpected operand on line {line} for {mnemonic}: {operand}")]
    UnexpectedOperand { line: usize, mnemonic: String, operand: String },

    #[error("label on line {line} is not followed by an instruction: {label}")]
    DanglingLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: String },

    #[error("program size {size} exceeds main memory of {available} words")]
    ProgramTooLarge { size: usize, available: usize },

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}
