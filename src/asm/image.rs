//! Program image format.
//!
//! An image is an assembled [`Program`] saved as JSON, so a program can be
//! assembled once and loaded many times without its source:
//!
//! ```json
//! {
//!   "format": 1,
//!   "main_words": 64,
//!   "program": { "base_address": 62, "words": [4294967316, 1095216660480], "labels": {} }
//! }
//! ```

use std::path::Path;
use serde::{Serialize, Deserialize};
use thiserror::Error;
use crate::asm::Program;

/// Current image format version.
pub const IMAGE_FORMAT: u32 = 1;

/// A serialized program together with the geometry it was assembled for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramImage {
    pub format: u32,
    /// Main memory size the base address was computed against.
    pub main_words: usize,
    pub program: Program,
}

impl ProgramImage {
    pub fn new(program: Program, main_words: usize) -> Self {
        Self { format: IMAGE_FORMAT, main_words, program }
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, ImageError> {
        serde_json::to_string_pretty(self).map_err(|e| ImageError::Parse(e.to_string()))
    }

    /// Parse and check an image.
    pub fn from_json(text: &str) -> Result<Self, ImageError> {
        let image: ProgramImage =
            serde_json::from_str(text).map_err(|e| ImageError::Parse(e.to_string()))?;
        image.check()?;
        Ok(image)
    }

    fn check(&self) -> Result<(), ImageError> {
        if self.format != IMAGE_FORMAT {
            return Err(ImageError::UnsupportedFormat(self.format));
        }
        let len = self.program.words.len();
        if len > self.main_words || self.program.base_address != self.main_words - len {
            return Err(ImageError::Inconsistent {
                base: self.program.base_address,
                len,
                main_words: self.main_words,
            });
        }
        Ok(())
    }
}

/// Load an image from disk.
pub fn load_image<P: AsRef<Path>>(path: P) -> Result<ProgramImage, ImageError> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|e| ImageError::Io(e.to_string()))?;
    ProgramImage::from_json(&text)
}

/// Save an image to disk.
pub fn save_image<P: AsRef<Path>>(path: P, image: &ProgramImage) -> Result<(), ImageError> {
    let text = image.to_json()?;
    std::fs::write(path.as_ref(), text).map_err(|e| ImageError::Io(e.to_string()))
}

/// Errors that can occur reading or writing an image.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error("I/O error: {0}")]
    Io(String),

    #[error("invalid image: {0}")]
    Parse(String),

    #[error("unsupported image format {0}")]
    UnsupportedFormat(u32),

    #[error("image base address {base} does not fit {len} words at the tail of {main_words}")]
    Inconsistent { base: usize, len: usize, main_words: usize },
}
