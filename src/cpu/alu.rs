//! Bit-serial arithmetic and logic on the register lines.
//!
//! Each handler drives the registers one pulse at a time and returns the
//! number of pulses (machine ticks) it took. Registers are in phase on entry
//! and on exit: every line a handler touches is pulsed a whole number of
//! revolutions, except where the handler deliberately shifts a line.
//!
//! Values stream least significant bit first, so a carry produced on one
//! pulse is consumed by the next.

use crate::cpu::Registers;
use crate::line::{Bit, BitChannel, BitOrder, WORD_SIZE};

/// Inject a 32-bit immediate into `line`, zero-extended to a full word.
///
/// [`BitOrder::LsbFirst`] leaves the value in register orientation, ready
/// for arithmetic. [`BitOrder::MsbFirst`] leaves it in memory orientation,
/// lined up with the fields of an instruction word fetched by LDP.
pub fn load_immediate(line: &mut BitChannel, imm: u32, order: BitOrder) -> usize {
    let value = u64::from(imm);
    for i in 0..WORD_SIZE {
        line.schedule(Bit::of(value, order.bit_index(i)));
        line.pulse();
    }
    WORD_SIZE
}

/// One ripple-carry pass: `acc += addend`, both lines pulsed together.
fn ripple_add(acc: &mut BitChannel, addend: &mut BitChannel) -> usize {
    let mut carry = Bit::Zero;
    for _ in 0..WORD_SIZE {
        let (sum, carry_out) = acc.head().full_add(addend.head(), carry);
        carry = carry_out;
        acc.schedule(sum);
        acc.pulse();
        addend.pulse();
    }
    WORD_SIZE
}

/// A := A + B. B is refreshed unchanged.
pub fn add(regs: &mut Registers) -> usize {
    ripple_add(&mut regs.a, &mut regs.b)
}

/// Largest repeat count the assembler accepts for MLA.
///
/// Each repetition is a full ripple pass, so the cap bounds one MLA at
/// `MLA_LIMIT * WORD_SIZE` pulses. Hand-encoded words are not capped.
pub const MLA_LIMIT: u32 = 1 << 16;

/// A := A + n * B, one ripple pass per repetition.
pub fn multiply_add(regs: &mut Registers, n: u32) -> usize {
    (0..n).map(|_| add(regs)).sum()
}

/// B := -B (two's complement): invert, then add one.
pub fn negate(regs: &mut Registers) -> usize {
    let b = &mut regs.b;
    for _ in 0..WORD_SIZE {
        let bit = b.head();
        b.schedule(bit.not());
        b.pulse();
    }

    let mut carry = Bit::One;
    for _ in 0..WORD_SIZE {
        let (sum, carry_out) = b.head().full_add(Bit::Zero, carry);
        carry = carry_out;
        b.schedule(sum);
        b.pulse();
    }
    2 * WORD_SIZE
}

/// One pulse of A with a zero injected at the tail.
///
/// Every cell moves one place toward the head and bit 0 falls out, so the
/// value is halved (logical shift toward the least significant end).
pub fn shift_left(regs: &mut Registers) -> usize {
    regs.a.schedule(Bit::Zero);
    regs.a.pulse();
    1
}

/// Move every cell of A one place away from the head.
///
/// A single pulse cannot do this, so A is copied into S (clearing A), then
/// a zero followed by the first 39 bits of S is replayed into A. The value
/// doubles, modulo 2^40.
pub fn shift_right(regs: &mut Registers) -> usize {
    let Registers { a, s, .. } = regs;

    for _ in 0..WORD_SIZE {
        s.schedule(a.head());
        a.schedule(Bit::Zero);
        a.pulse();
        s.pulse();
    }

    a.schedule(Bit::Zero);
    a.pulse();
    for _ in 1..WORD_SIZE {
        a.schedule(s.head());
        a.pulse();
        s.pulse();
    }
    // S has fallen one cell behind A; bring it back into phase.
    s.pulse();

    2 * WORD_SIZE
}

/// Bitwise combination of A and B into A.
pub fn logic(regs: &mut Registers, op: fn(Bit, Bit) -> Bit) -> usize {
    for _ in 0..WORD_SIZE {
        let bit = op(regs.a.head(), regs.b.head());
        regs.a.schedule(bit);
        regs.pulse_ab();
    }
    WORD_SIZE
}

/// A := A * B (mod 2^40) by shift-and-add.
///
/// The multiplicand moves to S and A becomes the running product. Each
/// multiplier bit is consumed from B's head (a zero replaces it, so B ends
/// as zero). A is pulsed once per multiplier bit, which places the next
/// partial product one bit higher; a set bit ripple-adds S into A at that
/// offset without consuming S. After 40 bits A is back in phase.
pub fn multiply(regs: &mut Registers) -> usize {
    let Registers { a, b, s } = regs;
    let mut ticks = 0;

    for _ in 0..WORD_SIZE {
        s.schedule(a.head());
        a.schedule(Bit::Zero);
        a.pulse();
        s.pulse();
    }
    ticks += WORD_SIZE;

    for offset in 0..WORD_SIZE {
        if b.head().is_one() {
            let mut carry = Bit::Zero;
            for i in 0..WORD_SIZE {
                // Bits of S that would land above bit 39 wrap to the bottom
                // of A; they are dropped rather than added.
                if i < WORD_SIZE - offset {
                    let (sum, carry_out) = a.head().full_add(s.head(), carry);
                    carry = carry_out;
                    a.schedule(sum);
                }
                a.pulse();
                s.pulse();
            }
            ticks += WORD_SIZE;
        }
        b.schedule(Bit::Zero);
        b.pulse();
        a.pulse();
        ticks += 1;
    }

    ticks
}

/// Clear the low `n` bits of A, refreshing the rest.
pub fn round(regs: &mut Registers, n: u32) -> usize {
    for i in 0..WORD_SIZE {
        if (i as u64) < u64::from(n) {
            regs.a.schedule(Bit::Zero);
        }
        regs.a.pulse();
    }
    WORD_SIZE
}

/// Result of streaming A through once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scan {
    /// Every bit was zero.
    pub zero: bool,
    /// Bit 39, the last bit out.
    pub negative: bool,
    /// The value as a signed 40-bit integer.
    pub value: i64,
}

/// Stream A through one revolution (refreshed back) and report on it.
pub fn scan_a(regs: &mut Registers) -> (Scan, usize) {
    let bits: Vec<Bit> = (0..WORD_SIZE).map(|_| regs.a.pulse()).collect();
    let word = BitOrder::LsbFirst.collect(bits.iter().copied());
    let scan = Scan {
        zero: bits.iter().all(|b| b.is_zero()),
        negative: bits[WORD_SIZE - 1].is_one(),
        value: word.to_signed(),
    };
    (scan, WORD_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::registers::Reg;
    use crate::line::{Word, WORD_MASK};
    use proptest::prelude::*;

    fn regs_with(a: u64, b: u64) -> Registers {
        let mut regs = Registers::new();
        regs.poke(Reg::A, Word::new(a));
        regs.poke(Reg::B, Word::new(b));
        regs
    }

    #[test]
    fn test_load_immediate_orders() {
        let mut regs = Registers::new();
        load_immediate(&mut regs.a, 20, BitOrder::LsbFirst);
        assert_eq!(regs.peek(Reg::A), Word::new(20));

        load_immediate(&mut regs.b, 1, BitOrder::MsbFirst);
        // Memory orientation: bit 0 of the value sits in the last cell.
        assert_eq!(regs.peek(Reg::B), Word::new(1 << 39));
    }

    #[test]
    fn test_add_small() {
        let mut regs = regs_with(20, 7);
        assert_eq!(add(&mut regs), WORD_SIZE);
        assert_eq!(regs.peek(Reg::A), Word::new(27));
        assert_eq!(regs.peek(Reg::B), Word::new(7));
    }

    #[test]
    fn test_negate() {
        let mut regs = regs_with(0, 7);
        assert_eq!(negate(&mut regs), 2 * WORD_SIZE);
        assert_eq!(regs.peek(Reg::B).to_signed(), -7);

        let mut regs = regs_with(0, 0);
        negate(&mut regs);
        assert_eq!(regs.peek(Reg::B), Word::ZERO);
    }

    #[test]
    fn test_shift_left_halves() {
        let mut regs = regs_with(6, 0);
        assert_eq!(shift_left(&mut regs), 1);
        assert_eq!(regs.peek(Reg::A), Word::new(3));
    }

    #[test]
    fn test_shift_right_doubles() {
        let mut regs = regs_with(6, 0);
        assert_eq!(shift_right(&mut regs), 2 * WORD_SIZE);
        assert_eq!(regs.peek(Reg::A), Word::new(12));
        assert_eq!(regs.peek(Reg::S), Word::new(6));

        let mut regs = regs_with(1 << 39, 0);
        shift_right(&mut regs);
        assert_eq!(regs.peek(Reg::A), Word::ZERO);
    }

    #[test]
    fn test_logic() {
        let mut regs = regs_with(0b1100, 0b1010);
        logic(&mut regs, Bit::and);
        assert_eq!(regs.peek(Reg::A), Word::new(0b1000));

        let mut regs = regs_with(0b1100, 0b1010);
        logic(&mut regs, Bit::or);
        assert_eq!(regs.peek(Reg::A), Word::new(0b1110));

        let mut regs = regs_with(0b1100, 0b1010);
        logic(&mut regs, Bit::xor);
        assert_eq!(regs.peek(Reg::A), Word::new(0b0110));
    }

    #[test]
    fn test_multiply_example() {
        let mut regs = regs_with(6, 121);
        multiply(&mut regs);
        assert_eq!(regs.peek(Reg::A), Word::new(726));
        assert_eq!(regs.peek(Reg::B), Word::ZERO);
        assert_eq!(regs.peek(Reg::S), Word::new(6));
    }

    #[test]
    fn test_multiply_ticks_depend_on_multiplier() {
        let mut regs = regs_with(5, 0b101);
        let ticks = multiply(&mut regs);
        assert_eq!(ticks, WORD_SIZE + 2 * WORD_SIZE + WORD_SIZE);
    }

    #[test]
    fn test_round_clears_low_bits() {
        let mut regs = regs_with(0xFF, 0);
        round(&mut regs, 4);
        assert_eq!(regs.peek(Reg::A), Word::new(0xF0));

        let mut regs = regs_with(WORD_MASK, 0);
        round(&mut regs, 100);
        assert_eq!(regs.peek(Reg::A), Word::ZERO);
    }

    #[test]
    fn test_multiply_add() {
        let mut regs = regs_with(1, 10);
        assert_eq!(multiply_add(&mut regs, 3), 3 * WORD_SIZE);
        assert_eq!(regs.peek(Reg::A), Word::new(31));
    }

    #[test]
    fn test_scan() {
        let mut regs = regs_with((-5i64) as u64, 0);
        let (scan, ticks) = scan_a(&mut regs);
        assert_eq!(ticks, WORD_SIZE);
        assert!(!scan.zero);
        assert!(scan.negative);
        assert_eq!(scan.value, -5);
        // Scanning is non-destructive.
        assert_eq!(regs.a_signed(), -5);

        let mut regs = regs_with(0, 0);
        assert!(scan_a(&mut regs).0.zero);
    }

    proptest! {
        #[test]
        fn prop_add_matches_native(a in 0..=WORD_MASK, b in 0..=WORD_MASK) {
            let mut regs = regs_with(a, b);
            add(&mut regs);
            prop_assert_eq!(regs.peek(Reg::A).value(), (a + b) & WORD_MASK);
        }

        #[test]
        fn prop_add_commutes(a in 0..=WORD_MASK, b in 0..=WORD_MASK) {
            let mut ab = regs_with(a, b);
            let mut ba = regs_with(b, a);
            add(&mut ab);
            add(&mut ba);
            prop_assert_eq!(ab.peek(Reg::A), ba.peek(Reg::A));
        }

        #[test]
        fn prop_negate_is_additive_inverse(x in 0..=WORD_MASK) {
            let mut regs = regs_with(x, x);
            negate(&mut regs);
            add(&mut regs);
            prop_assert_eq!(regs.peek(Reg::A), Word::ZERO);
        }

        #[test]
        fn prop_multiply_matches_native(a in 0..=WORD_MASK, b in 0..=WORD_MASK) {
            let mut regs = regs_with(a, b);
            multiply(&mut regs);
            let expected = (a as u128 * b as u128) as u64 & WORD_MASK;
            prop_assert_eq!(regs.peek(Reg::A).value(), expected);
        }

        #[test]
        fn prop_shifts(a in 0..=WORD_MASK) {
            let mut regs = regs_with(a, 0);
            shift_left(&mut regs);
            prop_assert_eq!(regs.peek(Reg::A).value(), a >> 1);

            let mut regs = regs_with(a, 0);
            shift_right(&mut regs);
            prop_assert_eq!(regs.peek(Reg::A).value(), (a << 1) & WORD_MASK);
        }
    }
}
