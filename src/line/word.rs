//! The fixed 40-bit machine word.
//!
//! Every word in main memory, in a data bank, or in a register is exactly
//! [`WORD_SIZE`] bits. Instructions split the word into an 8-bit opcode
//! (bits 39..32) and a 32-bit operand (bits 31..0).

use std::fmt;
use serde::{de, Deserialize, Deserializer, Serialize};
use crate::line::Bit;

/// Number of bits in a machine word.
pub const WORD_SIZE: usize = 40;

/// Mask selecting the 40 valid bits of a word.
pub const WORD_MASK: u64 = (1 << WORD_SIZE) - 1;

const OPERAND_BITS: usize = 32;
const OPERAND_MASK: u64 = (1 << OPERAND_BITS) - 1;
const OPCODE_MASK: u64 = 0xFF;

/// A 40-bit word.
///
/// The value is stored in the low 40 bits of a `u64`; the upper bits are
/// always zero.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct Word(u64);

impl Word {
    /// The all-zero word.
    pub const ZERO: Word = Word(0);

    /// Create a word, truncating `value` to 40 bits.
    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value & WORD_MASK)
    }

    /// Compose an instruction word from an opcode and an operand.
    #[inline]
    pub const fn from_parts(opcode: u8, operand: u32) -> Self {
        Self(((opcode as u64) << OPERAND_BITS) | operand as u64)
    }

    /// The raw 40-bit value.
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Bits 39..32.
    #[inline]
    pub const fn opcode(self) -> u8 {
        ((self.0 >> OPERAND_BITS) & OPCODE_MASK) as u8
    }

    /// Bits 31..0.
    #[inline]
    pub const fn operand(self) -> u32 {
        (self.0 & OPERAND_MASK) as u32
    }

    /// Bit `index` (0 = least significant).
    #[inline]
    pub const fn bit(self, index: usize) -> Bit {
        Bit::of(self.0, index)
    }

    /// The word interpreted as a 40-bit two's complement integer.
    ///
    /// Bit 39 is the sign bit.
    pub const fn to_signed(self) -> i64 {
        ((self.0 << (64 - WORD_SIZE)) as i64) >> (64 - WORD_SIZE)
    }

    /// Bits in the order a memory channel stores them: most significant first.
    pub fn bits_msb_first(self) -> impl Iterator<Item = Bit> {
        (0..WORD_SIZE).rev().map(move |i| self.bit(i))
    }

    /// Bits in the order a register circulates them: least significant first.
    pub fn bits_lsb_first(self) -> impl Iterator<Item = Bit> {
        (0..WORD_SIZE).map(move |i| self.bit(i))
    }

    /// Rebuild a word from bits received most significant first.
    pub fn from_msb_first<I: IntoIterator<Item = Bit>>(bits: I) -> Self {
        let value = bits
            .into_iter()
            .take(WORD_SIZE)
            .fold(0u64, |acc, bit| (acc << 1) | u64::from(bit));
        Self::new(value)
    }

    /// Rebuild a word from bits received least significant first.
    pub fn from_lsb_first<I: IntoIterator<Item = Bit>>(bits: I) -> Self {
        let value = bits
            .into_iter()
            .take(WORD_SIZE)
            .enumerate()
            .fold(0u64, |acc, (i, bit)| acc | (u64::from(bit) << i));
        Self::new(value)
    }
}

/// The order in which a channel streams the bits of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BitOrder {
    /// Bit 39 first. Program memory holds instructions this way.
    MsbFirst,
    /// Bit 0 first. Registers and data banks circulate this way.
    LsbFirst,
}

impl BitOrder {
    /// The bits of `word` in this order.
    pub fn bits(self, word: Word) -> Box<dyn Iterator<Item = Bit>> {
        match self {
            BitOrder::MsbFirst => Box::new(word.bits_msb_first()),
            BitOrder::LsbFirst => Box::new(word.bits_lsb_first()),
        }
    }

    /// Reassemble a word from bits received in this order.
    pub fn collect<I: IntoIterator<Item = Bit>>(self, bits: I) -> Word {
        match self {
            BitOrder::MsbFirst => Word::from_msb_first(bits),
            BitOrder::LsbFirst => Word::from_lsb_first(bits),
        }
    }

    /// Index of the word bit streamed at position `i`.
    #[inline]
    pub const fn bit_index(self, i: usize) -> usize {
        match self {
            BitOrder::MsbFirst => WORD_SIZE - 1 - i,
            BitOrder::LsbFirst => i,
        }
    }
}

impl From<u64> for Word {
    fn from(value: u64) -> Self {
        Word::new(value)
    }
}

/// Deserialized values must already fit in 40 bits; they are not truncated.
impl<'de> Deserialize<'de> for Word {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = u64::deserialize(deserializer)?;
        if value > WORD_MASK {
            return Err(de::Error::custom(format!("word value {:#x} exceeds {} bits", value, WORD_SIZE)));
        }
        Ok(Word(value))
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word({:02X}:{:08X})", self.opcode(), self.operand())
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02X} {:08X}", self.opcode(), self.operand())
    }
}

impl fmt::Binary for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:040b}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parts() {
        let w = Word::from_parts(0x21, 0xDEAD_BEEF);
        assert_eq!(w.opcode(), 0x21);
        assert_eq!(w.operand(), 0xDEAD_BEEF);
        assert_eq!(w.value(), 0x21_DEAD_BEEF);
    }

    #[test]
    fn test_truncates_to_40_bits() {
        assert_eq!(Word::new(u64::MAX).value(), WORD_MASK);
    }

    #[test]
    fn test_deserialize_rejects_wide_values() {
        let word: Word = serde_json::from_str("1099511627775").unwrap();
        assert_eq!(word.value(), WORD_MASK);
        assert!(serde_json::from_str::<Word>("1099511627776").is_err());
    }

    #[test]
    fn test_signed_uses_bit_39() {
        assert_eq!(Word::new(WORD_MASK).to_signed(), -1);
        assert_eq!(Word::new(1 << 39).to_signed(), -(1i64 << 39));
        assert_eq!(Word::new((1 << 39) - 1).to_signed(), (1i64 << 39) - 1);
        // A value with only bit 31 set is positive at this width.
        assert_eq!(Word::new(1 << 31).to_signed(), 1i64 << 31);
    }

    #[test]
    fn test_bit_orders() {
        let w = Word::new(0b1011);
        let lsb: Vec<_> = w.bits_lsb_first().take(4).collect();
        assert_eq!(lsb, vec![Bit::One, Bit::One, Bit::Zero, Bit::One]);
        assert_eq!(Word::from_msb_first(w.bits_msb_first()), w);
        assert_eq!(Word::from_lsb_first(w.bits_lsb_first()), w);
    }

    #[test]
    fn test_bit_order_collect() {
        let w = Word::from_parts(0x21, 0x3C);
        for order in [BitOrder::MsbFirst, BitOrder::LsbFirst] {
            assert_eq!(order.collect(order.bits(w)), w);
        }
        assert_eq!(BitOrder::MsbFirst.bit_index(0), 39);
        assert_eq!(BitOrder::LsbFirst.bit_index(0), 0);
    }
}
