//! Delay-line memory primitives.
//!
//! This module provides the storage medium the whole machine is built on:
//! - [`Bit`] - A single binary digit
//! - [`Word`] - A 40-bit word (8-bit opcode, 32-bit operand)
//! - [`BitChannel`] - One circulating delay line
//! - [`MemoryBank`] - A named group of channels with rotational clocks
//! - [`align`] - Rotational latency arithmetic

mod bit;
mod word;
mod channel;
mod bank;
pub mod align;

pub use bit::{Bit, InvalidBit};
pub use word::{BitOrder, Word, WORD_MASK, WORD_SIZE};
pub use channel::{next_cell, BitChannel, ChannelError};
pub use bank::{BankError, MemoryBank};
