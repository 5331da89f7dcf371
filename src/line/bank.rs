//! Banks of delay lines.
//!
//! A [`MemoryBank`] groups equal-length channels under one name. Each channel
//! stores a whole number of words back to back, streamed in the bank's
//! [`BitOrder`], and keeps its own rotational clock: the position of its head measured in
//! pulses since construction, modulo the channel length.
//!
//! Main memory is a bank with a single channel; the data store is a bank
//! with one channel per addressable bank.

use serde::Serialize;
use thiserror::Error;
use tracing::trace;
use crate::line::{align, Bit, BitChannel, BitOrder, Word, WORD_SIZE};

/// A named group of independently rotating channels.
#[derive(Clone, Serialize)]
pub struct MemoryBank {
    name: String,
    channels: Vec<BitChannel>,
    /// Head position of each channel, in pulses.
    positions: Vec<usize>,
    words_per_channel: usize,
    order: BitOrder,
}

impl MemoryBank {
    /// Create `channels` zeroed channels holding `words_per_channel` words each.
    ///
    /// # Panics
    /// Panics if either dimension is zero.
    pub fn new(
        name: impl Into<String>,
        channels: usize,
        words_per_channel: usize,
        order: BitOrder,
    ) -> Self {
        assert!(channels > 0, "a bank needs at least one channel");
        assert!(words_per_channel > 0, "a channel needs at least one word");
        Self {
            name: name.into(),
            channels: (0..channels)
                .map(|_| BitChannel::new(words_per_channel * WORD_SIZE))
                .collect(),
            positions: vec![0; channels],
            words_per_channel,
            order,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// The order words are streamed in.
    #[inline]
    pub fn order(&self) -> BitOrder {
        self.order
    }

    #[inline]
    pub fn words_per_channel(&self) -> usize {
        self.words_per_channel
    }

    /// Cells per channel.
    #[inline]
    pub fn channel_len(&self) -> usize {
        self.words_per_channel * WORD_SIZE
    }

    fn check(&self, channel: usize) -> Result<(), BankError> {
        if channel >= self.channels.len() {
            return Err(BankError::ChannelOutOfRange {
                bank: self.name.clone(),
                channel,
                channels: self.channels.len(),
            });
        }
        Ok(())
    }

    fn check_word(&self, channel: usize, word: usize) -> Result<(), BankError> {
        self.check(channel)?;
        if word >= self.words_per_channel {
            return Err(BankError::WordOutOfRange {
                bank: self.name.clone(),
                word,
                words: self.words_per_channel,
            });
        }
        Ok(())
    }

    /// Index of the word whose first bit is at (or has just passed) the head.
    pub fn clock(&self, channel: usize) -> Result<usize, BankError> {
        self.check(channel)?;
        Ok(self.positions[channel] / WORD_SIZE)
    }

    /// Pulse one channel, keeping its clock in step.
    pub fn pulse(&mut self, channel: usize) -> Result<Bit, BankError> {
        self.check(channel)?;
        Ok(self.pulse_unchecked(channel))
    }

    fn pulse_unchecked(&mut self, channel: usize) -> Bit {
        let len = self.channel_len();
        self.positions[channel] = (self.positions[channel] + 1) % len;
        self.channels[channel].pulse()
    }

    /// Issue the pulses that bring `word` to the head of `channel`.
    ///
    /// Returns the number of pulses issued. The wait is always shorter than
    /// one revolution.
    pub fn align(&mut self, channel: usize, word: usize) -> Result<usize, BankError> {
        self.check_word(channel, word)?;
        let len = self.channel_len();
        let target = word * WORD_SIZE;
        let position = self.positions[channel];
        let wait = if position % WORD_SIZE == 0 {
            align::wait_pulses(position / WORD_SIZE, word, self.words_per_channel, WORD_SIZE)
        } else {
            (target + len - position) % len
        };
        trace!(bank = %self.name, channel, word, wait, "aligning");
        for _ in 0..wait {
            self.pulse_unchecked(channel);
        }
        Ok(wait)
    }

    /// Schedule a write into the next pulse of `channel`.
    pub fn schedule(&mut self, channel: usize, bit: Bit) -> Result<(), BankError> {
        self.check(channel)?;
        self.channels[channel].schedule(bit);
        Ok(())
    }

    /// The bit at the head of `channel`.
    pub fn head(&self, channel: usize) -> Result<Bit, BankError> {
        self.check(channel)?;
        Ok(self.channels[channel].head())
    }

    pub fn set_refresh(&mut self, channel: usize, refresh: bool) -> Result<(), BankError> {
        self.check(channel)?;
        self.channels[channel].set_refresh(refresh);
        Ok(())
    }

    /// Borrow a channel for inspection.
    pub fn channel(&self, channel: usize) -> Result<&BitChannel, BankError> {
        self.check(channel)?;
        Ok(&self.channels[channel])
    }

    /// Align to `word` and read it out over one word time.
    pub fn read_word(&mut self, channel: usize, word: usize) -> Result<Word, BankError> {
        self.align(channel, word)?;
        let bits: Vec<Bit> = (0..WORD_SIZE).map(|_| self.pulse_unchecked(channel)).collect();
        Ok(self.order.collect(bits))
    }

    /// Align to `word` and overwrite it over one word time.
    pub fn write_word(&mut self, channel: usize, word: usize, value: Word) -> Result<(), BankError> {
        self.align(channel, word)?;
        for bit in self.order.bits(value) {
            self.channels[channel].schedule(bit);
            self.pulse_unchecked(channel);
        }
        Ok(())
    }

    /// The content of `word` without pulsing the channel.
    pub fn peek_word(&self, channel: usize, word: usize) -> Result<Word, BankError> {
        self.check_word(channel, word)?;
        let line = &self.channels[channel];
        let len = self.channel_len();
        // Cell k of the line holds the bit at position (head + k).
        let offset = (word * WORD_SIZE + len - self.positions[channel]) % len;
        Ok(self.order.collect((0..WORD_SIZE).map(|i| line.peek(offset + i))))
    }

    /// All words of a channel in address order, without pulsing.
    pub fn dump(&self, channel: usize) -> Result<Vec<Word>, BankError> {
        (0..self.words_per_channel)
            .map(|word| self.peek_word(channel, word))
            .collect()
    }

    /// Clear every channel and return every clock to zero.
    pub fn reset(&mut self) {
        for line in &mut self.channels {
            line.reset();
            line.set_refresh(true);
        }
        self.positions.iter_mut().for_each(|p| *p = 0);
    }
}

impl std::fmt::Debug for MemoryBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBank")
            .field("name", &self.name)
            .field("channels", &self.channels.len())
            .field("words_per_channel", &self.words_per_channel)
            .field("positions", &self.positions)
            .field("order", &self.order)
            .finish()
    }
}

/// Errors that can occur addressing a bank.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BankError {
    #[error("{bank}: channel {channel} out of range ({channels} channels)")]
    ChannelOutOfRange { bank: String, channel: usize, channels: usize },

    #[error("{bank}: word {word} out of range ({words} words per channel)")]
    WordOutOfRange { bank: String, word: usize, words: usize },
}
