//! The delay-line channel.
//!
//! A channel is a fixed-length loop of cells. Each [`pulse`](BitChannel::pulse)
//! emits the cell at the head, moves every other cell one place toward the
//! head, and injects one new cell at the tail. Nothing can be read or written
//! anywhere else, so reaching a given bit means waiting for it to come round.

use std::collections::VecDeque;
use std::fmt;
use serde::Serialize;
use thiserror::Error;
use crate::line::{Bit, InvalidBit};

/// Decide which bit enters the tail on a pulse.
///
/// A pending write always wins; otherwise the emitted bit is recirculated
/// when refresh is on, and the cell is lost (zero) when it is off.
#[inline]
pub const fn next_cell(emitted: Bit, pending: Option<Bit>, refresh: bool) -> Bit {
    match pending {
        Some(bit) => bit,
        None if refresh => emitted,
        None => Bit::Zero,
    }
}

/// A single delay line.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct BitChannel {
    /// Cells from head (front) to tail (back).
    cells: VecDeque<Bit>,
    /// Bit to inject on the next pulse.
    pending: Option<Bit>,
    /// Recirculate the emitted bit when no write is pending.
    refresh: bool,
}

impl BitChannel {
    /// Create a zeroed channel of `len` cells with refresh enabled.
    ///
    /// # Panics
    /// Panics if `len` is zero.
    pub fn new(len: usize) -> Self {
        assert!(len > 0, "delay line length must be non-zero");
        Self {
            cells: VecDeque::from(vec![Bit::Zero; len]),
            pending: None,
            refresh: true,
        }
    }

    /// Create a channel holding `bits`, head first.
    ///
    /// # Panics
    /// Panics if `bits` is empty.
    pub fn from_bits(bits: &[Bit]) -> Self {
        assert!(!bits.is_empty(), "delay line length must be non-zero");
        Self {
            cells: bits.iter().copied().collect(),
            pending: None,
            refresh: true,
        }
    }

    /// Number of cells. Never changes after construction.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; channels have at least one cell.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Advance the line by one cell and return the bit that left the head.
    pub fn pulse(&mut self) -> Bit {
        // The deque is never empty, so the fallback is unreachable.
        let emitted = self.cells.pop_front().unwrap_or_default();
        let injected = next_cell(emitted, self.pending.take(), self.refresh);
        self.cells.push_back(injected);
        emitted
    }

    /// Pulse `count` times, discarding the output.
    pub fn pulse_n(&mut self, count: usize) {
        for _ in 0..count {
            self.pulse();
        }
    }

    /// Schedule `bit` to be injected on the next pulse. Last write wins.
    #[inline]
    pub fn schedule(&mut self, bit: Bit) {
        self.pending = Some(bit);
    }

    /// Schedule a raw value, rejecting anything that is not 0 or 1.
    ///
    /// On error the channel, including any previously pending write, is
    /// left untouched.
    pub fn schedule_write(&mut self, value: u8) -> Result<(), ChannelError> {
        let bit = Bit::try_from(value)?;
        self.schedule(bit);
        Ok(())
    }

    /// The pending write, if any.
    #[inline]
    pub fn pending(&self) -> Option<Bit> {
        self.pending
    }

    /// The bit that the next pulse will emit.
    #[inline]
    pub fn head(&self) -> Bit {
        self.cells.front().copied().unwrap_or_default()
    }

    /// The most recently injected bit.
    #[inline]
    pub fn tail(&self) -> Bit {
        self.cells.back().copied().unwrap_or_default()
    }

    #[inline]
    pub fn refresh(&self) -> bool {
        self.refresh
    }

    #[inline]
    pub fn set_refresh(&mut self, refresh: bool) {
        self.refresh = refresh;
    }

    /// Clear every cell and cancel the pending write.
    pub fn reset(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = Bit::Zero);
        self.pending = None;
    }

    /// Cell `offset` places behind the head, without pulsing.
    ///
    /// Inspection only; the machine itself never reads this way.
    pub fn peek(&self, offset: usize) -> Bit {
        self.cells[offset % self.cells.len()]
    }

    /// A copy of the cells, head first.
    pub fn bits(&self) -> Vec<Bit> {
        self.cells.iter().copied().collect()
    }
}

impl fmt::Debug for BitChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bits: String = self.cells.iter().map(|b| if b.is_one() { '1' } else { '0' }).collect();
        f.debug_struct("BitChannel")
            .field("cells", &bits)
            .field("pending", &self.pending)
            .field("refresh", &self.refresh)
            .finish()
    }
}

/// Errors raised by a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("rejected write: {0}")]
    InvalidWrite(#[from] InvalidBit),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn bits(raw: &[u8]) -> Vec<Bit> {
        raw.iter().map(|&b| Bit::try_from(b).unwrap()).collect()
    }

    #[test]
    fn test_next_cell_priority() {
        for emitted in Bit::ALL {
            for refresh in [false, true] {
                assert_eq!(next_cell(emitted, Some(Bit::One), refresh), Bit::One);
                assert_eq!(next_cell(emitted, Some(Bit::Zero), refresh), Bit::Zero);
            }
            assert_eq!(next_cell(emitted, None, true), emitted);
            assert_eq!(next_cell(emitted, None, false), Bit::Zero);
        }
    }

    #[test]
    fn test_pulse_emits_head_and_shifts() {
        let mut line = BitChannel::from_bits(&bits(&[1, 0, 0]));
        line.set_refresh(false);
        assert_eq!(line.pulse(), Bit::One);
        assert_eq!(line.bits(), bits(&[0, 0, 0]));
    }

    #[test]
    fn test_last_scheduled_write_wins() {
        let mut line = BitChannel::new(4);
        line.schedule(Bit::One);
        line.schedule(Bit::Zero);
        line.schedule(Bit::One);
        line.pulse();
        assert_eq!(line.tail(), Bit::One);
        assert_eq!(line.pending(), None);
    }

    #[test]
    fn test_invalid_write_is_rejected_without_change() {
        let mut line = BitChannel::from_bits(&bits(&[1, 0, 1]));
        line.schedule(Bit::One);
        let before = line.clone();

        let err = line.schedule_write(2).unwrap_err();
        assert_eq!(err, ChannelError::InvalidWrite(InvalidBit(2)));
        assert_eq!(line, before);
        assert!(line.schedule_write(0).is_ok());
        assert_eq!(line.pending(), Some(Bit::Zero));
    }

    #[test]
    fn test_reset_clears_cells_and_pending() {
        let mut line = BitChannel::from_bits(&bits(&[1, 1, 1]));
        line.schedule(Bit::One);
        line.reset();
        assert_eq!(line.bits(), bits(&[0, 0, 0]));
        assert_eq!(line.pending(), None);
        assert_eq!(line.len(), 3);
    }

    #[test]
    fn test_write_then_read_back() {
        let pattern = bits(&[1, 0, 1, 1, 0, 1, 0, 1]);
        let mut line = BitChannel::new(16);

        line.set_refresh(false);
        for &bit in &pattern {
            line.schedule(bit);
            line.pulse();
        }
        line.set_refresh(true);

        // Let the word come round, then wait until its first bits appear.
        let mut seen = Vec::new();
        for _ in 0..line.len() * 2 {
            seen.push(line.pulse());
        }
        let start = seen
            .windows(pattern.len())
            .position(|w| w == pattern.as_slice())
            .expect("written pattern should circulate");
        assert_eq!(&seen[start..start + pattern.len()], pattern.as_slice());
    }

    proptest! {
        #[test]
        fn prop_refresh_preserves_content(
            raw in prop::collection::vec(0u8..2, 1..64),
            revolutions in 1usize..4,
        ) {
            let initial = bits(&raw);
            let mut line = BitChannel::from_bits(&initial);
            let mut emitted = Vec::new();
            for _ in 0..initial.len() * revolutions {
                emitted.push(line.pulse());
            }
            prop_assert_eq!(line.bits(), initial.clone());
            for chunk in emitted.chunks(initial.len()) {
                prop_assert_eq!(chunk, initial.as_slice());
            }
        }

        #[test]
        fn prop_length_is_invariant(
            len in 1usize..64,
            ops in prop::collection::vec((0u8..3, any::<bool>()), 0..200),
        ) {
            let mut line = BitChannel::new(len);
            for (op, refresh) in ops {
                line.set_refresh(refresh);
                if op < 2 {
                    line.schedule_write(op).unwrap();
                }
                line.pulse();
                prop_assert_eq!(line.len(), len);
            }
        }
    }
}
