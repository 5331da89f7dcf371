//! Register file.
//!
//! The machine has three word-length delay lines used as registers:
//! - A: accumulator (main computation register)
//! - B: operand register (second ALU input, multiplier)
//! - S: scratch line used by SHR, MUL and COL
//!
//! Registers circulate exactly like memory. Between instructions each one is
//! in phase: its head holds bit 0, so a value streams out least significant
//! bit first and a ripple carry can follow it pulse by pulse.

use std::fmt;
use serde::{Serialize, Deserialize};
use crate::line::{Bit, BitChannel, Word, WORD_SIZE};

/// Register selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Reg {
    A,
    B,
    S,
}

impl Reg {
    pub const ALL: [Reg; 3] = [Reg::A, Reg::B, Reg::S];

    pub const fn name(self) -> &'static str {
        match self {
            Reg::A => "A",
            Reg::B => "B",
            Reg::S => "S",
        }
    }
}

/// The register file.
#[derive(Clone, Serialize)]
pub struct Registers {
    /// A: accumulator.
    pub a: BitChannel,
    /// B: operand register.
    pub b: BitChannel,
    /// S: scratch.
    pub s: BitChannel,
}

impl Registers {
    /// Create a register file with all registers zeroed.
    pub fn new() -> Self {
        Self {
            a: BitChannel::new(WORD_SIZE),
            b: BitChannel::new(WORD_SIZE),
            s: BitChannel::new(WORD_SIZE),
        }
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        for reg in Reg::ALL {
            let line = self.get_mut(reg);
            line.reset();
            line.set_refresh(true);
        }
    }

    pub fn get(&self, reg: Reg) -> &BitChannel {
        match reg {
            Reg::A => &self.a,
            Reg::B => &self.b,
            Reg::S => &self.s,
        }
    }

    pub fn get_mut(&mut self, reg: Reg) -> &mut BitChannel {
        match reg {
            Reg::A => &mut self.a,
            Reg::B => &mut self.b,
            Reg::S => &mut self.s,
        }
    }

    /// The value held in `reg`, read from the cells without pulsing.
    pub fn peek(&self, reg: Reg) -> Word {
        let line = self.get(reg);
        Word::from_lsb_first((0..WORD_SIZE).map(|i| line.peek(i)))
    }

    /// Overwrite `reg` with `value` over one word time.
    ///
    /// Used to preset registers from outside the instruction stream.
    pub fn poke(&mut self, reg: Reg, value: Word) {
        let line = self.get_mut(reg);
        for bit in value.bits_lsb_first() {
            line.schedule(bit);
            line.pulse();
        }
    }

    /// Pulse A and B together, returning their emitted bits.
    #[inline]
    pub(crate) fn pulse_ab(&mut self) -> (Bit, Bit) {
        (self.a.pulse(), self.b.pulse())
    }

    /// The value of A as a signed 40-bit integer.
    pub fn a_signed(&self) -> i64 {
        self.peek(Reg::A).to_signed()
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registers")
            .field("a", &self.peek(Reg::A))
            .field("b", &self.peek(Reg::B))
            .field("s", &self.peek(Reg::S))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poke_then_peek() {
        let mut regs = Registers::new();
        regs.poke(Reg::A, Word::new(0xAB_CDEF_0123));
        regs.poke(Reg::B, Word::new(42));
        assert_eq!(regs.peek(Reg::A), Word::new(0xAB_CDEF_0123));
        assert_eq!(regs.peek(Reg::B), Word::new(42));
        assert_eq!(regs.peek(Reg::S), Word::ZERO);
    }

    #[test]
    fn test_registers_stream_lsb_first() {
        let mut regs = Registers::new();
        regs.poke(Reg::A, Word::new(0b110));
        assert_eq!(regs.a.pulse(), Bit::Zero);
        assert_eq!(regs.a.pulse(), Bit::One);
        assert_eq!(regs.a.pulse(), Bit::One);
    }

    #[test]
    fn test_full_revolution_keeps_value() {
        let mut regs = Registers::new();
        regs.poke(Reg::B, Word::new(12345));
        regs.b.pulse_n(WORD_SIZE);
        assert_eq!(regs.peek(Reg::B), Word::new(12345));
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.poke(Reg::A, Word::new(7));
        regs.reset();
        assert_eq!(regs.peek(Reg::A), Word::ZERO);
    }

    #[test]
    fn test_a_signed() {
        let mut regs = Registers::new();
        regs.poke(Reg::A, Word::new((-13i64) as u64));
        assert_eq!(regs.a_signed(), -13);
    }
}
