// In-memory ROM build: magic check, segment decode loop, placement.
//
// `build_rom` is the single entry point used by the file driver and the
// CLI. It owns nothing across runs; every call starts from a fresh
// `PlacementState`.

use std::fmt;
use std::io::{self, Read};

use log::{debug, warn};

use crate::codec::Codec;
use crate::placement::{ImageBuildResult, PlacementEngine};
use crate::reader::{ByteReader, ReadError};
use crate::segment::{self, SegmentDecoder};

/// Default ceiling on the image size: the furthest any record can reach
/// (largest start address plus largest length).
pub const DEFAULT_MAX_IMAGE_SIZE: u64 = i32::MAX as u64 + u16::MAX as u64;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Fatal conditions. Any of these aborts the run and invalidates the image.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("unsupported granularity {granularity} (segment header at offset {offset:#X})")]
    UnsupportedGranularity { granularity: u8, offset: u64 },

    #[error("unsupported segment header ${header:02X} at offset {offset:#X}")]
    UnsupportedSegmentHeader { header: u8, offset: u64 },

    #[error("zero length segment (segment header at offset {offset:#X})")]
    ZeroLengthSegment { offset: u64 },

    #[error("negative start address ${start:X} (segment header at offset {offset:#X})")]
    NegativeStartAddress { start: i32, offset: u64 },

    #[error(
        "the compressed Z80 code must all be in one segment, so its size must be < 65535 bytes; \
         the offending new segment starts at ${start:X} relative to the start of the Z80 code"
    )]
    FragmentedCompressedSegment { start: i32 },

    #[error(
        "compressed sound driver might not fit: next segment starts at ${start:X} but the driver \
         ends at ${cursor:X}; reserve at least ${compressed_length:X} bytes for it"
    )]
    CompressedSegmentDoesNotFit {
        start: i32,
        cursor: u64,
        compressed_length: u32,
    },

    #[error("image would grow to {size:#X} bytes, above the {limit:#X} byte limit")]
    ImageTooLarge { size: u64, limit: u64 },

    #[error("unexpected end of input at offset {offset:#X}")]
    TruncatedInput { offset: u64 },

    #[error("{codec} compression failed: {source}")]
    Compression {
        codec: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ReadError> for BuildError {
    fn from(e: ReadError) -> Self {
        match e {
            ReadError::Truncated { offset, .. } => Self::TruncatedInput { offset },
            ReadError::Io(e) => Self::Io(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Warnings
// ---------------------------------------------------------------------------

/// Non-fatal diagnostics. The build still succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// One of the two leading magic bytes did not match (`found` is `None`
    /// when the input ended first).
    BadMagic {
        index: usize,
        expected: u8,
        found: Option<u8>,
    },
    /// An ordinary segment starts more than 3 bytes before the end of the
    /// previously written data.
    Overlap { start: i32, cursor: u64 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadMagic {
                index,
                expected,
                found,
            } => {
                let ordinal = if *index == 0 { "first" } else { "second" };
                write!(f, "{ordinal} byte of a .p file should be ${expected:02X}")?;
                match found {
                    Some(b) => write!(f, " (found ${b:02X})"),
                    None => write!(f, " (input ended)"),
                }
            }
            Self::Overlap { start, cursor } => {
                write!(f, "overlapping allocation detected! ${start:02X} < ${cursor:02X}")
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for one conversion run.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Codec for the Z80 sound-driver segment.
    pub codec: Codec,
    /// Byte used for gaps that no segment writes.
    pub fill: u8,
    /// Hard ceiling on the image size.
    pub max_image_size: u64,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            codec: Codec::Kosinski,
            fill: 0x00,
            max_image_size: DEFAULT_MAX_IMAGE_SIZE,
        }
    }
}

// ---------------------------------------------------------------------------
// build_rom
// ---------------------------------------------------------------------------

/// Convert a complete `.p` stream into a flat image.
///
/// The stream ends at a `0x00` header or at end of input, whichever comes
/// first; both are successful terminations.
///
/// # Example
/// ```
/// use p2bin::build::{build_rom, BuildOptions};
///
/// let input = [0x89, 0x14, 0x01, 0, 0, 0, 0, 0x02, 0x00, 0xAA, 0xBB, 0x00];
/// let result = build_rom(&input[..], &BuildOptions::default()).unwrap();
/// assert_eq!(result.image, vec![0xAA, 0xBB]);
/// assert_eq!(result.compressed_length, 0);
/// ```
pub fn build_rom<R: Read>(input: R, options: &BuildOptions) -> Result<ImageBuildResult, BuildError> {
    let mut reader = ByteReader::new(input);
    let backend = options.codec.backend();
    let mut engine = PlacementEngine::new(backend.as_ref(), options.fill)
        .with_max_image_size(options.max_image_size);

    let mut warnings = Vec::new();
    if segment::read_magic(&mut reader, &mut warnings)? {
        let mut decoder = SegmentDecoder::new();
        while let Some(record) = decoder.next_record(&mut reader)? {
            engine.process(&record, &mut reader)?;
        }
        debug!(
            "decoded {} segment records from {} input bytes",
            decoder.records_decoded(),
            reader.position()
        );
    }

    let mut result = engine.finish();
    if result.compressed_length > 0 && !options.codec.is_bootable() {
        warn!(
            "sound driver packed with {}; the driver loader only unpacks kosinski",
            options.codec
        );
    }
    warnings.append(&mut result.warnings);
    result.warnings = warnings;
    Ok(result)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
