// Image placement engine.
//
// Places each decoded segment into the output image. Ordinary segments are
// written at their absolute start address; the Z80 sound driver (CPU $51,
// start 0) is compressed and appended at the current cursor instead.
//
// All adjacency and overlap checks use `PlacementState`, never the image
// contents. The compressed driver leaves `last_start` and
// `last_length` untouched.

use std::io::Read;

use log::{debug, info, warn};

use crate::build::{BuildError, Warning};
use crate::codec::CompressBackend;
use crate::reader::ByteReader;
use crate::report::BuildReport;
use crate::segment::SegmentRecord;

/// Bytes an ordinary segment may reach back over already-written data
/// without a warning (room for instruction patching).
pub const PATCH_SLACK: i64 = 3;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Mutable bookkeeping for one conversion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlacementState {
    /// Start address of the last ordinary segment.
    pub last_start: i64,
    /// Length of the last ordinary segment.
    pub last_length: u32,
    pub last_segment_was_compressed: bool,
    /// Next write position in the image.
    pub cursor: u64,
    /// Size of the compressed driver, 0 if none was emitted.
    pub compressed_length: u32,
}

// ---------------------------------------------------------------------------
// Output image
// ---------------------------------------------------------------------------

/// Growable image addressed by absolute offset. Its length is the
/// high-water mark of all writes; untouched gaps hold the fill byte.
#[derive(Debug, Clone)]
pub struct OutputImage {
    bytes: Vec<u8>,
    fill: u8,
}

impl OutputImage {
    pub fn new(fill: u8) -> Self {
        Self {
            bytes: Vec::new(),
            fill,
        }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Borrow `len` bytes at `offset`, growing the image as needed.
    pub fn region_mut(&mut self, offset: u64, len: usize) -> &mut [u8] {
        let start = offset as usize;
        let end = start + len;
        if end > self.bytes.len() {
            self.bytes.resize(end, self.fill);
        }
        &mut self.bytes[start..end]
    }

    pub fn write_at(&mut self, offset: u64, data: &[u8]) {
        self.region_mut(offset, data.len()).copy_from_slice(data);
    }
}

// ---------------------------------------------------------------------------
// Segment map
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Copied verbatim to its start address.
    Verbatim,
    /// Compressed sound driver. `context_address` is where the driver would
    /// sit if it were placed right after the previous ordinary segment.
    CompressedDriver { context_address: i64 },
}

/// One entry of the segment map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlacedSegment {
    pub cpu_type: u8,
    pub segment_type: Option<u8>,
    pub start_address: i32,
    /// Declared (uncompressed) length.
    pub length: u16,
    /// Where the bytes landed in the image.
    pub image_offset: u64,
    /// Bytes actually written.
    pub written: u64,
    pub kind: SegmentKind,
}

// ---------------------------------------------------------------------------
// Result
// ---------------------------------------------------------------------------

/// Everything a successful run produces.
#[derive(Debug, Clone)]
pub struct ImageBuildResult {
    pub image: Vec<u8>,
    /// Compressed driver size, 0 if no driver segment was present.
    pub compressed_length: u32,
    pub warnings: Vec<Warning>,
    pub segments: Vec<PlacedSegment>,
}

impl ImageBuildResult {
    pub fn report(&self) -> BuildReport {
        BuildReport::new(self.compressed_length)
    }
}

// ---------------------------------------------------------------------------
// PlacementEngine
// ---------------------------------------------------------------------------

/// Single-run placement engine.
///
/// # Example
/// ```
/// use p2bin::codec::Kosinski;
/// use p2bin::placement::PlacementEngine;
/// use p2bin::reader::ByteReader;
/// use p2bin::segment::SegmentRecord;
///
/// let record = SegmentRecord {
///     cpu_type: 0x01,
///     segment_type: None,
///     start_address: 2,
///     length: 2,
///     offset: 0,
/// };
/// let mut payload = ByteReader::new(&[0xAB, 0xCD][..]);
/// let mut engine = PlacementEngine::new(&Kosinski, 0x00);
/// engine.process(&record, &mut payload).unwrap();
/// assert_eq!(engine.finish().image, vec![0x00, 0x00, 0xAB, 0xCD]);
/// ```
pub struct PlacementEngine<'c> {
    codec: &'c dyn CompressBackend,
    state: PlacementState,
    image: OutputImage,
    max_image_size: u64,
    warnings: Vec<Warning>,
    segments: Vec<PlacedSegment>,
}

impl<'c> PlacementEngine<'c> {
    pub fn new(codec: &'c dyn CompressBackend, fill: u8) -> Self {
        Self {
            codec,
            state: PlacementState::default(),
            image: OutputImage::new(fill),
            max_image_size: crate::build::DEFAULT_MAX_IMAGE_SIZE,
            warnings: Vec::new(),
            segments: Vec::new(),
        }
    }

    pub fn with_max_image_size(mut self, limit: u64) -> Self {
        self.max_image_size = limit;
        self
    }

    pub fn state(&self) -> &PlacementState {
        &self.state
    }

    pub fn image(&self) -> &OutputImage {
        &self.image
    }

    /// Place one record, consuming its payload from `reader`.
    pub fn process<R: Read>(
        &mut self,
        record: &SegmentRecord,
        reader: &mut ByteReader<R>,
    ) -> Result<(), BuildError> {
        if record.is_sound_driver()
            && record.start_address != 0
            && self.state.last_segment_was_compressed
        {
            return Err(BuildError::FragmentedCompressedSegment {
                start: record.start_address,
            });
        }

        if record.is_compressed_driver() {
            self.place_compressed(record, reader)
        } else {
            self.place_verbatim(record, reader)
        }
    }

    fn check_extent(&self, offset: u64, len: u64) -> Result<(), BuildError> {
        let size = offset + len;
        if size > self.max_image_size {
            return Err(BuildError::ImageTooLarge {
                size,
                limit: self.max_image_size,
            });
        }
        Ok(())
    }

    fn place_compressed<R: Read>(
        &mut self,
        record: &SegmentRecord,
        reader: &mut ByteReader<R>,
    ) -> Result<(), BuildError> {
        let context_address = self.state.last_start + i64::from(self.state.last_length);

        let payload = reader.read_bytes(usize::from(record.length))?;
        let packed = self
            .codec
            .compress(&payload)
            .map_err(|source| BuildError::Compression {
                codec: self.codec.name(),
                source,
            })?;

        let offset = self.state.cursor;
        let written = packed.len() as u64;
        self.check_extent(offset, written)?;
        self.image.write_at(offset, &packed);

        self.state.cursor += written;
        self.state.compressed_length = packed.len() as u32;
        self.state.last_segment_was_compressed = true;

        debug!(
            "compressed Z80 segment: {:#X} -> {:#X} bytes ({}) at {offset:#X}, context address {context_address:#X}",
            record.length,
            written,
            self.codec.name()
        );

        self.segments.push(PlacedSegment {
            cpu_type: record.cpu_type,
            segment_type: record.segment_type,
            start_address: record.start_address,
            length: record.length,
            image_offset: offset,
            written,
            kind: SegmentKind::CompressedDriver { context_address },
        });
        Ok(())
    }

    fn place_verbatim<R: Read>(
        &mut self,
        record: &SegmentRecord,
        reader: &mut ByteReader<R>,
    ) -> Result<(), BuildError> {
        let start = i64::from(record.start_address);
        let cursor = self.state.cursor;

        if !self.state.last_segment_was_compressed {
            if start + PATCH_SLACK < cursor as i64 {
                let warning = Warning::Overlap {
                    start: record.start_address,
                    cursor,
                };
                warn!("{warning}");
                self.warnings.push(warning);
            }
        } else if (start as u64) < cursor {
            return Err(BuildError::CompressedSegmentDoesNotFit {
                start: record.start_address,
                cursor,
                compressed_length: self.state.compressed_length,
            });
        } else {
            info!("compressed driver size: {:#X}", self.state.compressed_length);
        }

        self.state.last_start = start;
        self.state.last_length = u32::from(record.length);
        self.state.last_segment_was_compressed = false;

        let offset = start as u64;
        let len = u64::from(record.length);
        self.check_extent(offset, len)?;
        reader.read_into(self.image.region_mut(offset, usize::from(record.length)))?;
        self.state.cursor = offset + len;

        self.segments.push(PlacedSegment {
            cpu_type: record.cpu_type,
            segment_type: record.segment_type,
            start_address: record.start_address,
            length: record.length,
            image_offset: offset,
            written: len,
            kind: SegmentKind::Verbatim,
        });
        Ok(())
    }

    /// Hand over the finished image.
    pub fn finish(self) -> ImageBuildResult {
        ImageBuildResult {
            image: self.image.into_bytes(),
            compressed_length: self.state.compressed_length,
            warnings: self.warnings,
            segments: self.segments,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
