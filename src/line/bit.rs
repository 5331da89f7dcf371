//! Single binary digit carried by a delay line.
//!
//! A bit is the only value a cell of a [`BitChannel`](super::BitChannel)
//! can hold. Raw values coming from outside the machine are checked with
//! [`Bit::try_from`], which rejects anything other than 0 or 1.

use std::fmt;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// A single binary digit.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum Bit {
    /// No pulse.
    #[default]
    Zero = 0,
    /// Pulse present.
    One = 1,
}

impl Bit {
    /// Both bit values in order.
    pub const ALL: [Bit; 2] = [Bit::Zero, Bit::One];

    /// Build a bit from a boolean.
    #[inline]
    pub const fn from_bool(value: bool) -> Self {
        if value { Bit::One } else { Bit::Zero }
    }

    /// Extract bit `index` of `value`.
    #[inline]
    pub const fn of(value: u64, index: usize) -> Self {
        Self::from_bool((value >> index) & 1 == 1)
    }

    #[inline]
    pub const fn is_one(self) -> bool {
        matches!(self, Bit::One)
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        matches!(self, Bit::Zero)
    }

    #[inline]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Logical complement.
    #[inline]
    pub const fn not(self) -> Self {
        match self {
            Bit::Zero => Bit::One,
            Bit::One => Bit::Zero,
        }
    }

    #[inline]
    pub const fn and(self, other: Self) -> Self {
        Self::from_bool(self.is_one() && other.is_one())
    }

    #[inline]
    pub const fn or(self, other: Self) -> Self {
        Self::from_bool(self.is_one() || other.is_one())
    }

    #[inline]
    pub const fn xor(self, other: Self) -> Self {
        Self::from_bool(self.is_one() != other.is_one())
    }

    /// Full adder: returns (sum, carry_out).
    ///
    /// This is the only arithmetic primitive of the machine; every serial
    /// add, negate and multiply is a sequence of these, one per pulse.
    #[inline]
    pub const fn full_add(self, other: Self, carry: Self) -> (Self, Self) {
        let total = self.to_u8() + other.to_u8() + carry.to_u8();
        (Self::from_bool(total & 1 == 1), Self::from_bool(total >= 2))
    }
}

impl TryFrom<u8> for Bit {
    type Error = InvalidBit;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Bit::Zero),
            1 => Ok(Bit::One),
            other => Err(InvalidBit(other)),
        }
    }
}

impl From<bool> for Bit {
    fn from(value: bool) -> Self {
        Bit::from_bool(value)
    }
}

impl From<Bit> for u64 {
    fn from(bit: Bit) -> Self {
        bit.to_u8() as u64
    }
}

impl fmt::Debug for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u8())
    }
}

impl fmt::Display for Bit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_u8())
    }
}

/// A raw value that is not a binary digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid bit value {0} (must be 0 or 1)")]
pub struct InvalidBit(pub u8);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_from_rejects_non_binary() {
        assert_eq!(Bit::try_from(0), Ok(Bit::Zero));
        assert_eq!(Bit::try_from(1), Ok(Bit::One));
        assert_eq!(Bit::try_from(2), Err(InvalidBit(2)));
        assert_eq!(Bit::try_from(255), Err(InvalidBit(255)));
    }

    #[test]
    fn test_full_add_truth_table() {
        for a in Bit::ALL {
            for b in Bit::ALL {
                for c in Bit::ALL {
                    let (sum, carry) = a.full_add(b, c);
                    let total = a.to_u8() + b.to_u8() + c.to_u8();
                    assert_eq!(sum.to_u8(), total % 2);
                    assert_eq!(carry.to_u8(), total / 2);
                }
            }
        }
    }

    #[test]
    fn test_of_extracts_bits() {
        assert_eq!(Bit::of(0b100, 2), Bit::One);
        assert_eq!(Bit::of(0b100, 1), Bit::Zero);
        assert_eq!(Bit::of(1 << 39, 39), Bit::One);
    }
}
