//! Transfers between registers and delay-line memory.
//!
//! A transfer first waits for the target word to come round (the wait is
//! counted in the returned ticks), then moves one bit per pulse with the
//! register and the memory channel pulsed together. Bits are copied in the
//! order they stream; no reordering happens on the way.

use crate::cpu::Registers;
use crate::line::{Bit, BankError, BitChannel, MemoryBank, WORD_SIZE};

/// Copy a register into `bank[channel][word]`.
///
/// With `clear`, the register is zeroed as it is copied out.
pub fn store(
    reg: &mut BitChannel,
    bank: &mut MemoryBank,
    channel: usize,
    word: usize,
    clear: bool,
) -> Result<usize, BankError> {
    let wait = bank.align(channel, word)?;
    for _ in 0..WORD_SIZE {
        bank.schedule(channel, reg.head())?;
        if clear {
            reg.schedule(Bit::Zero);
        }
        reg.pulse();
        bank.pulse(channel)?;
    }
    Ok(wait + WORD_SIZE)
}

/// Copy `bank[channel][word]` into a register. Memory is refreshed.
pub fn load(
    reg: &mut BitChannel,
    bank: &mut MemoryBank,
    channel: usize,
    word: usize,
) -> Result<usize, BankError> {
    let wait = bank.align(channel, word)?;
    for _ in 0..WORD_SIZE {
        reg.schedule(bank.head(channel)?);
        reg.pulse();
        bank.pulse(channel)?;
    }
    Ok(wait + WORD_SIZE)
}

/// Collate: S := bank word, then A := A + (S & B).
///
/// A and B are pulsed along with S during the copy so all three stay in
/// phase for the masked add that follows.
pub fn collate(
    regs: &mut Registers,
    bank: &mut MemoryBank,
    channel: usize,
    word: usize,
) -> Result<usize, BankError> {
    let wait = bank.align(channel, word)?;
    let Registers { a, b, s } = regs;

    for _ in 0..WORD_SIZE {
        s.schedule(bank.head(channel)?);
        bank.pulse(channel)?;
        a.pulse();
        b.pulse();
        s.pulse();
    }

    let mut carry = Bit::Zero;
    for _ in 0..WORD_SIZE {
        let masked = s.head().and(b.head());
        let (sum, carry_out) = a.head().full_add(masked, carry);
        carry = carry_out;
        a.schedule(sum);
        a.pulse();
        b.pulse();
        s.pulse();
    }

    Ok(wait + 2 * WORD_SIZE)
}

/// Overwrite a program-memory word with A.
///
/// Refresh is switched off on the main line for the duration of the copy
/// and restored afterwards. Nothing is touched if `word` is out of range.
pub fn store_program(
    regs: &mut Registers,
    main: &mut MemoryBank,
    word: usize,
) -> Result<usize, BankError> {
    let wait = main.align(0, word)?;
    main.set_refresh(0, false)?;
    for _ in 0..WORD_SIZE {
        main.schedule(0, regs.a.head())?;
        regs.a.pulse();
        main.pulse(0)?;
    }
    main.set_refresh(0, true)?;
    Ok(wait + WORD_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::Reg;
    use crate::line::{BitOrder, Word};

    fn data_bank() -> MemoryBank {
        MemoryBank::new("data", 4, 16, BitOrder::LsbFirst)
    }

    #[test]
    fn test_store_then_load() {
        let mut regs = Registers::new();
        let mut bank = data_bank();
        regs.poke(Reg::A, Word::new(1234));

        let ticks = store(&mut regs.a, &mut bank, 2, 5, false).unwrap();
        assert_eq!(ticks, 5 * WORD_SIZE + WORD_SIZE);
        assert_eq!(regs.peek(Reg::A), Word::new(1234));
        assert_eq!(bank.peek_word(2, 5).unwrap(), Word::new(1234));

        load(&mut regs.b, &mut bank, 2, 5).unwrap();
        assert_eq!(regs.peek(Reg::B), Word::new(1234));
        assert_eq!(bank.peek_word(2, 5).unwrap(), Word::new(1234));
    }

    #[test]
    fn test_store_and_clear() {
        let mut regs = Registers::new();
        let mut bank = data_bank();
        regs.poke(Reg::A, Word::new(99));
        store(&mut regs.a, &mut bank, 0, 0, true).unwrap();
        assert_eq!(regs.peek(Reg::A), Word::ZERO);
        assert_eq!(bank.peek_word(0, 0).unwrap(), Word::new(99));
    }

    #[test]
    fn test_collate() {
        let mut regs = Registers::new();
        let mut bank = data_bank();
        bank.write_word(1, 3, Word::new(0b1111_0000)).unwrap();
        regs.poke(Reg::A, Word::new(1));
        regs.poke(Reg::B, Word::new(0b1010_1010));

        collate(&mut regs, &mut bank, 1, 3).unwrap();
        assert_eq!(regs.peek(Reg::S), Word::new(0b1111_0000));
        assert_eq!(regs.peek(Reg::A), Word::new(1 + 0b1010_0000));
        assert_eq!(regs.peek(Reg::B), Word::new(0b1010_1010));
    }

    #[test]
    fn test_store_program_restores_refresh() {
        let mut regs = Registers::new();
        let mut main = MemoryBank::new("main", 1, 8, BitOrder::MsbFirst);
        regs.poke(Reg::A, Word::new(0xF0F0));
        store_program(&mut regs, &mut main, 6).unwrap();
        assert!(main.channel(0).unwrap().refresh());
        // A full revolution later the word is still there.
        main.align(0, 6).unwrap();
        main.align(0, 5).unwrap();
        let stored = main.peek_word(0, 6).unwrap();
        assert_eq!(BitOrder::LsbFirst.collect(BitOrder::MsbFirst.bits(stored)), Word::new(0xF0F0));
    }

    #[test]
    fn test_out_of_range_leaves_register_untouched() {
        let mut regs = Registers::new();
        let mut bank = data_bank();
        regs.poke(Reg::A, Word::new(5));
        assert!(store(&mut regs.a, &mut bank, 9, 0, true).is_err());
        assert_eq!(regs.peek(Reg::A), Word::new(5));
    }
}
