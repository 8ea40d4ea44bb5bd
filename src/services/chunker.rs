//! Text Chunker
//!
//! Splits extracted document text into overlapping windows sized for
//! embedding-model input limits. Windows are measured in characters (not
//! bytes) so multi-byte UTF-8 content never splits mid-character.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let chunker = SlidingWindowChunker::new(1000, 200);
//! let chunks = chunker.split("Long document text...");
//! ```

use serde::{Deserialize, Serialize};

/// Default window size in characters.
pub const DEFAULT_CHUNK_SIZE: usize = 1000;

/// Default number of characters shared between consecutive windows.
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

// ---------------------------------------------------------------------------
// Chunker trait
// ---------------------------------------------------------------------------

/// Trait for text chunking strategies.
pub trait Chunker: Send + Sync {
    /// Split text into ordered, possibly overlapping segments.
    ///
    /// Empty input yields an empty vector. Non-empty input always yields
    /// at least one segment.
    fn split(&self, text: &str) -> Vec<String>;
}

// ---------------------------------------------------------------------------
// ChunkerConfig
// ---------------------------------------------------------------------------

/// Configuration for the sliding-window chunking strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum characters per chunk.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_chunk_overlap() -> usize {
    DEFAULT_CHUNK_OVERLAP
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// Validate the configuration.
    ///
    /// Overlap larger than the window is clamped at build time rather than
    /// rejected here, so the only hard requirement is a non-zero window.
    pub fn validate(&self) -> Result<(), String> {
        if self.chunk_size == 0 {
            return Err("chunk_size must be at least 1".to_string());
        }
        Ok(())
    }

    /// Build a boxed Chunker from this configuration.
    pub fn build(&self) -> Box<dyn Chunker> {
        Box::new(SlidingWindowChunker::new(self.chunk_size, self.chunk_overlap))
    }
}

// ---------------------------------------------------------------------------
// SlidingWindowChunker
// ---------------------------------------------------------------------------

/// Splits text into fixed-size character windows with overlap.
///
/// Each window holds at most `chunk_size` characters and every consecutive
/// pair shares exactly `overlap` characters, so concatenating the first
/// chunk with each later chunk minus its leading `overlap` characters
/// reconstructs the source text. The final window always extends to the end
/// of the text and is never fully contained in the window before it.
pub struct SlidingWindowChunker {
    chunk_size: usize,
    overlap: usize,
}

impl SlidingWindowChunker {
    /// Create a chunker with the given window size and overlap.
    ///
    /// `chunk_size` is raised to at least 1 and `overlap` is clamped to
    /// `chunk_size - 1` so each window advances past the previous one.
    pub fn new(chunk_size: usize, overlap: usize) -> Self {
        let size = chunk_size.max(1);
        Self {
            chunk_size: size,
            overlap: overlap.min(size.saturating_sub(1)),
        }
    }

    /// Create a chunker from a configuration.
    pub fn from_config(config: &ChunkerConfig) -> Self {
        Self::new(config.chunk_size, config.chunk_overlap)
    }

    /// Effective window size after clamping.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Effective overlap after clamping.
    pub fn overlap(&self) -> usize {
        self.overlap
    }
}

impl Default for SlidingWindowChunker {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

impl Chunker for SlidingWindowChunker {
    fn split(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = text.chars().collect();
        if chars.len() <= self.chunk_size {
            return vec![text.to_string()];
        }

        // Guaranteed >= 1 by the constructor clamp.
        let step = self.chunk_size - self.overlap;
        let mut chunks = Vec::new();
        let mut start = 0usize;

        loop {
            let end = (start + self.chunk_size).min(chars.len());
            chunks.push(chars[start..end].iter().collect());
            if end == chars.len() {
                break;
            }
            start += step;
        }

        chunks
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
