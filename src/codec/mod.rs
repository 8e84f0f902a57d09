// Compression codecs for the Z80 sound-driver segment.
//
// Provides a pluggable `CompressBackend` trait with built-in implementations:
//   - Kosinski (always available; what the driver loader decompresses)
//   - Zlib/Deflate (via flate2, feature-gated `zlib-codec`)
//   - LZMA (via lzma-rs, feature-gated `lzma-codec`)
//
// Every backend produces a self-delimiting stream: the decompressor never
// needs the uncompressed length from outside.

pub mod kosinski;

use std::io;
use std::str::FromStr;

pub use kosinski::Kosinski;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("compressed stream truncated at offset {offset}")]
    Truncated { offset: usize },
    #[error("back-reference distance {distance} exceeds {available} decoded bytes")]
    InvalidReference { distance: usize, available: usize },
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unsupported codec: {0}")]
    Unsupported(String),
}

// ---------------------------------------------------------------------------
// CompressBackend trait
// ---------------------------------------------------------------------------

/// A byte-stream compressor used for the sound-driver segment.
///
/// `compress` must be deterministic and lossless, and its output must carry
/// its own end marker.
///
/// # Implementing a custom backend
///
/// ```no_run
/// use p2bin::codec::{CodecError, CompressBackend};
///
/// struct Stored;
///
/// impl CompressBackend for Stored {
///     fn name(&self) -> &'static str { "stored" }
///     fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
///         let mut out = (data.len() as u32).to_le_bytes().to_vec();
///         out.extend_from_slice(data);
///         Ok(out)
///     }
///     fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
///         Ok(data[4..].to_vec()) // placeholder
///     }
/// }
/// ```
pub trait CompressBackend {
    /// Short lowercase identifier, used in logs and stats.
    fn name(&self) -> &'static str;

    /// Compress a complete buffer.
    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>>;

    /// Decompress a buffer previously produced by `compress()`.
    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError>;
}

// ---------------------------------------------------------------------------
// Zlib backend
// ---------------------------------------------------------------------------

/// Zlib/Deflate compressor.
///
/// Uses zlib format (deflate + zlib header), not raw deflate,
/// so the stream is self-describing and includes a checksum.
#[cfg(feature = "zlib-codec")]
#[derive(Debug, Clone, Copy)]
pub struct ZlibBackend {
    level: flate2::Compression,
}

#[cfg(feature = "zlib-codec")]
impl ZlibBackend {
    /// Create a Zlib backend with the given compression level (0-9).
    pub fn new(level: u32) -> Self {
        Self {
            level: flate2::Compression::new(level.min(9)),
        }
    }
}

#[cfg(feature = "zlib-codec")]
impl Default for ZlibBackend {
    fn default() -> Self {
        Self::new(9)
    }
}

#[cfg(feature = "zlib-codec")]
impl CompressBackend for ZlibBackend {
    fn name(&self) -> &'static str {
        "zlib"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        use flate2::write::ZlibEncoder;
        use io::Write;

        let mut encoder = ZlibEncoder::new(Vec::new(), self.level);
        encoder.write_all(data)?;
        encoder.finish()
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        use flate2::read::ZlibDecoder;
        use io::Read;

        let mut decoder = ZlibDecoder::new(data);
        let mut output = Vec::new();
        decoder
            .read_to_end(&mut output)
            .map_err(|e| CodecError::InvalidInput(format!("zlib decompression failed: {e}")))?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// LZMA backend
// ---------------------------------------------------------------------------

/// LZMA compressor (`.lzma` container with end marker).
#[cfg(feature = "lzma-codec")]
#[derive(Debug, Clone, Copy, Default)]
pub struct LzmaBackend;

#[cfg(feature = "lzma-codec")]
impl CompressBackend for LzmaBackend {
    fn name(&self) -> &'static str {
        "lzma"
    }

    fn compress(&self, data: &[u8]) -> io::Result<Vec<u8>> {
        let mut input = io::Cursor::new(data);
        let mut output = Vec::new();
        lzma_rs::lzma_compress(&mut input, &mut output)?;
        Ok(output)
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        let mut input = io::BufReader::new(io::Cursor::new(data));
        let mut output = Vec::new();
        lzma_rs::lzma_decompress(&mut input, &mut output)
            .map_err(|e| CodecError::InvalidInput(format!("LZMA decompression failed: {e}")))?;
        Ok(output)
    }
}

// ---------------------------------------------------------------------------
// Codec selector
// ---------------------------------------------------------------------------

/// Which backend compresses the sound-driver segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// Kosinski, the format the driver loader expects.
    #[default]
    Kosinski,
    /// Zlib/Deflate at the given level (0-9).
    #[cfg(feature = "zlib-codec")]
    Zlib { level: u32 },
    /// LZMA.
    #[cfg(feature = "lzma-codec")]
    Lzma,
}

impl Codec {
    /// Return the backend implementation.
    pub fn backend(&self) -> Box<dyn CompressBackend> {
        match self {
            Self::Kosinski => Box::new(Kosinski),
            #[cfg(feature = "zlib-codec")]
            Self::Zlib { level } => Box::new(ZlibBackend::new(*level)),
            #[cfg(feature = "lzma-codec")]
            Self::Lzma => Box::new(LzmaBackend),
        }
    }

    /// Whether the sound driver loader can unpack this format. Only
    /// Kosinski can; the others are for size comparisons.
    pub fn is_bootable(&self) -> bool {
        matches!(self, Self::Kosinski)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Kosinski => "kosinski",
            #[cfg(feature = "zlib-codec")]
            Self::Zlib { .. } => "zlib",
            #[cfg(feature = "lzma-codec")]
            Self::Lzma => "lzma",
        }
    }
}

impl FromStr for Codec {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kosinski" | "kos" => Ok(Self::Kosinski),
            #[cfg(feature = "zlib-codec")]
            "zlib" => Ok(Self::Zlib { level: 9 }),
            #[cfg(feature = "lzma-codec")]
            "lzma" => Ok(Self::Lzma),
            other => Err(CodecError::Unsupported(other.to_string())),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
