//! Disassembler for delay-line programs.
//!
//! Converts encoded words back to readable assembly.

use crate::asm::Program;
use crate::cpu::decode::{decode, DataAddr, Instruction};
use crate::line::Word;

/// Disassemble a single word to text.
///
/// Words that do not decode are shown as `DAT` so the listing can be
/// assembled again.
pub fn disassemble_word(word: Word) -> String {
    match decode(word) {
        Ok(decoded) => format_instruction(&decoded),
        Err(_) => format!("DAT 0x{:010X}", word.value()),
    }
}

/// Disassemble a program, listing absolute addresses and labels.
///
/// Addresses go in the trailing comment, so the listing reassembles without
/// picking up extra labels.
pub fn disassemble(program: &Program) -> String {
    let mut output = String::new();
    output.push_str("; Delay-line disassembly\n");
    output.push_str(&format!(
        "; {} words, base address {}\n\n",
        program.len(),
        program.base_address
    ));

    for (index, word) in program.words.iter().enumerate() {
        for label in program.labels_at(index) {
            output.push_str(&format!("{}:\n", label));
        }
        let addr = program.base_address + index;
        let text = disassemble_word(*word);
        let note = match decode(*word) {
            Ok(Instruction::Jmp(offset) | Instruction::Jza(offset) | Instruction::Jna(offset)) => {
                format!(" -> {}", program.base_address + offset as usize)
            }
            _ => String::new(),
        };
        output.push_str(&format!("        {:<20} ; {:04}  {}{}\n", text, addr, word, note));
    }

    output
}

/// Format a decoded instruction as assembly text.
fn format_instruction(instr: &Instruction) -> String {
    let mnemonic = instr.mnemonic();
    match *instr {
        Instruction::Lai(v)
        | Instruction::Lbi(v)
        | Instruction::Lea(v)
        | Instruction::Leb(v)
        | Instruction::Rnd(v)
        | Instruction::Mla(v)
        | Instruction::Ldp(v)
        | Instruction::Stp(v)
        | Instruction::Jmp(v)
        | Instruction::Jmpa(v)
        | Instruction::Jza(v)
        | Instruction::Jna(v) => format!("{} {}", mnemonic, v),

        Instruction::Sto(addr)
        | Instruction::Stb(addr)
        | Instruction::Stc(addr)
        | Instruction::Lda(addr)
        | Instruction::Ldb(addr)
        | Instruction::Col(addr) => format!("{} {}", mnemonic, format_data(addr)),

        Instruction::Add
        | Instruction::Neg
        | Instruction::Shl
        | Instruction::Shr
        | Instruction::And
        | Instruction::Orr
        | Instruction::Xor
        | Instruction::Mul
        | Instruction::Pra
        | Instruction::Nop
        | Instruction::Hlt => mnemonic.to_string(),
    }
}

fn format_data(addr: DataAddr) -> String {
    format!("{}, {}", addr.bank, addr.word)
}
