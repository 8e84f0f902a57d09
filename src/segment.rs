// AS ".p" object file segment stream decoding.
//
// Layout after the two magic bytes ($89 $14):
//   $00                     end of stream
//   $80 + 3 bytes           entry point (ignored)
//   $81 cpu type gran       extended segment header
//   $01..$7F                legacy segment header (the byte is the cpu type)
// Segment headers are followed by a little-endian i32 start address, a
// little-endian u16 length and `length` payload bytes. The decoder stops
// before the payload; the placement engine consumes it.

use std::io::Read;

use log::{trace, warn};

use crate::build::{BuildError, Warning};
use crate::reader::ByteReader;

pub const MAGIC: [u8; 2] = [0x89, 0x14];

pub const HEADER_END: u8 = 0x00;
pub const HEADER_ENTRY_POINT: u8 = 0x80;
pub const HEADER_EXTENDED: u8 = 0x81;

/// Bytes following an entry-point header.
pub const ENTRY_POINT_LEN: u64 = 3;

/// CPU type of the 68000 family.
pub const CPU_68000: u8 = 0x01;
/// CPU type of the Z80 family; segments starting at 0 are compressed.
pub const CPU_Z80: u8 = 0x51;

/// The only supported addressing unit (bytes).
pub const BYTE_GRANULARITY: u8 = 1;

// ---------------------------------------------------------------------------
// Header tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentHeaderTag {
    EndOfStream,
    EntryPoint,
    ExtendedHeader,
    /// Old-style header; the byte is the CPU type.
    LegacyHeader(u8),
    Invalid(u8),
}

impl SegmentHeaderTag {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            HEADER_END => Self::EndOfStream,
            HEADER_ENTRY_POINT => Self::EntryPoint,
            HEADER_EXTENDED => Self::ExtendedHeader,
            b if b > HEADER_EXTENDED => Self::Invalid(b),
            cpu => Self::LegacyHeader(cpu),
        }
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A validated segment header. The payload is still in the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecord {
    pub cpu_type: u8,
    /// Only present for extended headers.
    pub segment_type: Option<u8>,
    /// Always >= 0.
    pub start_address: i32,
    /// Always > 0.
    pub length: u16,
    /// Input offset of the header byte.
    pub offset: u64,
}

impl SegmentRecord {
    pub fn is_sound_driver(&self) -> bool {
        self.cpu_type == CPU_Z80
    }

    /// The one segment that gets compressed instead of placed.
    pub fn is_compressed_driver(&self) -> bool {
        self.is_sound_driver() && self.start_address == 0
    }
}

// ---------------------------------------------------------------------------
// Magic
// ---------------------------------------------------------------------------

/// Consume and check the two magic bytes.
///
/// A mismatch only produces a warning. Returns `false` if the input ended
/// before both bytes were read, in which case there is nothing to decode.
pub fn read_magic<R: Read>(
    reader: &mut ByteReader<R>,
    warnings: &mut Vec<Warning>,
) -> Result<bool, BuildError> {
    for (index, &expected) in MAGIC.iter().enumerate() {
        let found = reader.try_read_u8()?;
        if found != Some(expected) {
            let warning = Warning::BadMagic {
                index,
                expected,
                found,
            };
            warn!("{warning}");
            warnings.push(warning);
        }
        if found.is_none() {
            return Ok(false);
        }
    }
    Ok(true)
}

// ---------------------------------------------------------------------------
// SegmentDecoder
// ---------------------------------------------------------------------------

/// Pulls one [`SegmentRecord`] at a time out of the stream.
///
/// The decoder does not hold the reader, because payload bytes must be
/// consumed by the caller between two `next_record` calls.
#[derive(Debug, Default)]
pub struct SegmentDecoder {
    records: u64,
    finished: bool,
}

impl SegmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records_decoded(&self) -> u64 {
        self.records
    }

    /// Decode the next segment header.
    ///
    /// Returns `Ok(None)` at an end-of-stream header or when the input runs
    /// out exactly at a header boundary. Entry-point records are skipped.
    pub fn next_record<R: Read>(
        &mut self,
        reader: &mut ByteReader<R>,
    ) -> Result<Option<SegmentRecord>, BuildError> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let offset = reader.position();
            let Some(byte) = reader.try_read_u8()? else {
                trace!("input ended at {offset:#X} without end marker");
                self.finished = true;
                return Ok(None);
            };

            let (cpu_type, segment_type) = match SegmentHeaderTag::from_byte(byte) {
                SegmentHeaderTag::EndOfStream => {
                    trace!("end marker at {offset:#X}");
                    self.finished = true;
                    return Ok(None);
                }
                SegmentHeaderTag::EntryPoint => {
                    trace!("entry point record at {offset:#X}");
                    // A cut-off entry point carries nothing to place, so it
                    // ends the stream like a clean EOF.
                    if reader.skip_up_to(ENTRY_POINT_LEN)? < ENTRY_POINT_LEN {
                        trace!("input ended inside entry point at {offset:#X}");
                        self.finished = true;
                        return Ok(None);
                    }
                    continue;
                }
                SegmentHeaderTag::ExtendedHeader => {
                    let cpu_type = reader.read_u8()?;
                    let segment_type = reader.read_u8()?;
                    let granularity = reader.read_u8()?;
                    if granularity != BYTE_GRANULARITY {
                        return Err(BuildError::UnsupportedGranularity {
                            granularity,
                            offset,
                        });
                    }
                    (cpu_type, Some(segment_type))
                }
                SegmentHeaderTag::LegacyHeader(cpu_type) => (cpu_type, None),
                SegmentHeaderTag::Invalid(header) => {
                    return Err(BuildError::UnsupportedSegmentHeader { header, offset });
                }
            };

            let start_address = reader.read_i32_le()?;
            let length = reader.read_u16_le()?;

            if length == 0 {
                return Err(BuildError::ZeroLengthSegment { offset });
            }
            if start_address < 0 {
                return Err(BuildError::NegativeStartAddress {
                    start: start_address,
                    offset,
                });
            }

            self.records += 1;
            trace!(
                "segment cpu=${cpu_type:02X} start=${start_address:X} len=${length:X} at {offset:#X}"
            );
            return Ok(Some(SegmentRecord {
                cpu_type,
                segment_type,
                start_address,
                length,
                offset,
            }));
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
