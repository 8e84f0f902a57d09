// Kosinski LZSS codec, as understood by the Mega Drive sound driver loader.
//
// Stream layout:
//   - 16-bit little-endian descriptor words, consumed LSB first. The next
//     descriptor is loaded as soon as the 16th bit has been consumed, so it
//     precedes the data bytes belonging to that bit.
//   - `1`                  literal byte
//   - `0 0 h l` + 1 byte   inline copy, length `hl + 2` (2..=5),
//                          offset byte sign-extended (distance 1..=256)
//   - `0 1` + 2 bytes      separate copy, 13-bit distance (1..=8192);
//                          low 3 bits of the second byte hold `length - 2`
//                          (3..=9), or 0 meaning a third byte follows:
//                          0 = end of stream, 1 = no-op, n = length n + 1

use super::{CodecError, CompressBackend};

const WINDOW_SIZE: usize = 0x2000;
const MAX_MATCH: usize = 0x100;
const INLINE_MAX_DISTANCE: usize = 0x100;
const INLINE_MIN_LEN: usize = 2;
const INLINE_MAX_LEN: usize = 5;
const SEPARATE_MIN_LEN: usize = 3;
const SHORT_MAX_LEN: usize = 9;

/// Upper bound on hash-chain candidates examined per position.
const MAX_CHAIN: usize = 128;

const NIL: u32 = u32::MAX;

/// Terminator bytes following a `0 1` descriptor pair.
const END_MARKER: [u8; 3] = [0x00, 0xF0, 0x00];

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// Kosinski backend. Stateless; every call encodes a complete stream.
#[derive(Debug, Clone, Copy, Default)]
pub struct Kosinski;

impl CompressBackend for Kosinski {
    fn name(&self) -> &'static str {
        "kosinski"
    }

    fn compress(&self, data: &[u8]) -> std::io::Result<Vec<u8>> {
        Ok(compress(data))
    }

    fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        decompress(data)
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Descriptor-bit writer. Data bytes are held back until their descriptor
/// word is complete.
struct BitWriter {
    out: Vec<u8>,
    pending: Vec<u8>,
    descriptor: u16,
    bits: u32,
}

impl BitWriter {
    fn with_capacity(cap: usize) -> Self {
        Self {
            out: Vec::with_capacity(cap),
            pending: Vec::with_capacity(32),
            descriptor: 0,
            bits: 0,
        }
    }

    fn push_bit(&mut self, bit: bool) {
        if bit {
            self.descriptor |= 1 << self.bits;
        }
        self.bits += 1;
        if self.bits == 16 {
            self.flush();
        }
    }

    fn push_byte(&mut self, byte: u8) {
        self.pending.push(byte);
    }

    fn flush(&mut self) {
        self.out.extend_from_slice(&self.descriptor.to_le_bytes());
        self.out.append(&mut self.pending);
        self.descriptor = 0;
        self.bits = 0;
    }

    fn literal(&mut self, byte: u8) {
        self.push_bit(true);
        self.push_byte(byte);
    }

    fn inline_copy(&mut self, distance: usize, length: usize) {
        debug_assert!((INLINE_MIN_LEN..=INLINE_MAX_LEN).contains(&length));
        debug_assert!((1..=INLINE_MAX_DISTANCE).contains(&distance));
        let count = length - INLINE_MIN_LEN;
        self.push_bit(false);
        self.push_bit(false);
        self.push_bit(count & 2 != 0);
        self.push_bit(count & 1 != 0);
        self.push_byte((INLINE_MAX_DISTANCE - distance) as u8);
    }

    fn separate_copy(&mut self, distance: usize, length: usize) {
        debug_assert!((SEPARATE_MIN_LEN..=MAX_MATCH).contains(&length));
        debug_assert!((1..=WINDOW_SIZE).contains(&distance));
        let offset = (0x1_0000 - distance) as u16;
        let low = offset as u8;
        let high = ((offset >> 5) as u8) & 0xF8;
        self.push_bit(false);
        self.push_bit(true);
        self.push_byte(low);
        if length <= SHORT_MAX_LEN {
            self.push_byte(high | (length - 2) as u8);
        } else {
            self.push_byte(high);
            self.push_byte((length - 1) as u8);
        }
    }

    fn finish(mut self) -> Vec<u8> {
        self.push_bit(false);
        self.push_bit(true);
        for byte in END_MARKER {
            self.push_byte(byte);
        }
        // The decoder reloads eagerly, so the last descriptor is always
        // written even if it carries no bits.
        self.flush();
        self.out
    }
}

#[derive(Debug, Clone, Copy)]
struct Match {
    distance: usize,
    length: usize,
}

/// Hash chains keyed on two-byte prefixes, newest position first.
struct MatchFinder<'a> {
    data: &'a [u8],
    head: Vec<u32>,
    prev: Vec<u32>,
}

impl<'a> MatchFinder<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            head: vec![NIL; 1 << 16],
            prev: vec![NIL; data.len()],
        }
    }

    #[inline]
    fn key(&self, pos: usize) -> usize {
        (self.data[pos] as usize) << 8 | self.data[pos + 1] as usize
    }

    fn insert(&mut self, pos: usize) {
        if pos + 1 >= self.data.len() {
            return;
        }
        let key = self.key(pos);
        self.prev[pos] = self.head[key];
        self.head[key] = pos as u32;
    }

    fn longest_match(&self, pos: usize) -> Option<Match> {
        if pos + 1 >= self.data.len() {
            return None;
        }
        let max_len = (self.data.len() - pos).min(MAX_MATCH);
        let target = &self.data[pos..pos + max_len];

        let mut best: Option<Match> = None;
        let mut candidate = self.head[self.key(pos)];
        let mut steps = 0;
        while candidate != NIL && steps < MAX_CHAIN {
            let start = candidate as usize;
            let distance = pos - start;
            if distance > WINDOW_SIZE {
                break;
            }
            // Overlapping matches are fine: the decoder copies byte by byte.
            let length = self.data[start..]
                .iter()
                .zip(target)
                .take_while(|(a, b)| a == b)
                .count();
            if best.is_none_or(|b| length > b.length) {
                best = Some(Match { distance, length });
                if length == max_len {
                    break;
                }
            }
            candidate = self.prev[start];
            steps += 1;
        }
        best
    }
}

/// Compress `data` into a self-terminating Kosinski stream.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut writer = BitWriter::with_capacity(data.len() / 2 + 16);
    let mut finder = MatchFinder::new(data);

    let mut pos = 0;
    while pos < data.len() {
        let advance = match finder.longest_match(pos) {
            Some(Match { distance, length })
                if length >= INLINE_MIN_LEN
                    && length <= INLINE_MAX_LEN
                    && distance <= INLINE_MAX_DISTANCE =>
            {
                writer.inline_copy(distance, length);
                length
            }
            Some(Match { distance, length }) if length >= SEPARATE_MIN_LEN => {
                writer.separate_copy(distance, length);
                length
            }
            _ => {
                writer.literal(data[pos]);
                1
            }
        };
        for p in pos..pos + advance {
            finder.insert(p);
        }
        pos += advance;
    }

    writer.finish()
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    descriptor: u16,
    remaining: u32,
}

impl<'a> BitReader<'a> {
    fn new(data: &'a [u8]) -> Result<Self, CodecError> {
        let mut reader = Self {
            data,
            pos: 0,
            descriptor: 0,
            remaining: 16,
        };
        reader.descriptor = reader.read_word()?;
        Ok(reader)
    }

    fn read_byte(&mut self) -> Result<u8, CodecError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(CodecError::Truncated { offset: self.pos })?;
        self.pos += 1;
        Ok(byte)
    }

    fn read_word(&mut self) -> Result<u16, CodecError> {
        let low = self.read_byte()?;
        let high = self.read_byte()?;
        Ok(u16::from_le_bytes([low, high]))
    }

    fn read_bit(&mut self) -> Result<bool, CodecError> {
        let bit = self.descriptor & 1 != 0;
        self.descriptor >>= 1;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.descriptor = self.read_word()?;
            self.remaining = 16;
        }
        Ok(bit)
    }
}

fn copy_back(out: &mut Vec<u8>, distance: usize, length: usize) -> Result<(), CodecError> {
    if distance > out.len() {
        return Err(CodecError::InvalidReference {
            distance,
            available: out.len(),
        });
    }
    let start = out.len() - distance;
    for i in 0..length {
        let byte = out[start + i];
        out.push(byte);
    }
    Ok(())
}

/// Decompress a Kosinski stream. Bytes after the end marker are ignored.
pub fn decompress(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut reader = BitReader::new(data)?;
    let mut out = Vec::with_capacity(data.len() * 2);

    loop {
        if reader.read_bit()? {
            let byte = reader.read_byte()?;
            out.push(byte);
            continue;
        }

        if !reader.read_bit()? {
            let high = reader.read_bit()? as usize;
            let low = reader.read_bit()? as usize;
            let length = (high << 1 | low) + INLINE_MIN_LEN;
            let distance = INLINE_MAX_DISTANCE - reader.read_byte()? as usize;
            copy_back(&mut out, distance, length)?;
            continue;
        }

        let low = reader.read_byte()? as usize;
        let high = reader.read_byte()?;
        let distance = WINDOW_SIZE - (((high & 0xF8) as usize) << 5 | low);
        let length = match high & 0x07 {
            0 => match reader.read_byte()? {
                0 => break,
                1 => continue,
                n => n as usize + 1,
            },
            n => n as usize + 2,
        };
        copy_back(&mut out, distance, length)?;
    }

    Ok(out)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
