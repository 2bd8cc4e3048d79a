//! Block framing for the reference codec
//!
//! Every block is self-describing so a decoder can start, or resume after
//! corruption, at any block boundary:
//!
//! ```text
//! magic "rtsb" | kind | flags | channels | bits | bytes/sample | shift
//! sample rate (u32) | channel mask (u32) | index (u32) | frames (u32)
//! payload length (u32) | header check (u32)
//! payload ... | payload check (u32)
//! ```
//!
//! All integers are little-endian. Check words use the running checksum
//! `crc = crc * 3 + value`.

use super::ByteSource;

pub const MAGIC: [u8; 4] = *b"rtsb";

/// Header length in bytes, check word included
pub const HEADER_LEN: usize = 34;

/// Payloads larger than this are treated as a damaged header
pub const MAX_PAYLOAD: usize = 1 << 24;

/// Frame counts larger than this are treated as a damaged header
pub const MAX_FRAMES: u32 = 1 << 20;

pub const FLAG_FLOAT: u8 = 0x01;
pub const FLAG_HYBRID: u8 = 0x02;
pub const FLAG_HAS_CORRECTION: u8 = 0x04;
pub const FLAG_CORRECTION_BLOCK: u8 = 0x08;

/// Block type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Audio,
    Checksum,
}

impl BlockKind {
    fn code(&self) -> u8 {
        match self {
            BlockKind::Audio => 1,
            BlockKind::Checksum => 2,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(BlockKind::Audio),
            2 => Some(BlockKind::Checksum),
            _ => None,
        }
    }
}

/// Running checksum used for header and payload check words
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checksum(u32);

impl Default for Checksum {
    fn default() -> Self {
        Self(0xFFFF_FFFF)
    }
}

impl Checksum {
    pub fn update(&mut self, value: u32) {
        self.0 = self.0.wrapping_mul(3).wrapping_add(value);
    }

    pub fn update_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.update(b as u32);
        }
    }

    pub fn update_samples(&mut self, samples: &[i32]) {
        for &s in samples {
            self.update(s as u32);
        }
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

/// Decoded block header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockHeader {
    pub kind: BlockKind,
    pub flags: u8,
    pub channels: u8,
    pub bits: u8,
    pub bytes_per_sample: u8,
    pub shift: u8,
    pub sample_rate: u32,
    pub channel_mask: u32,
    pub index: u32,
    pub frames: u32,
    pub payload_len: u32,
}

impl BlockHeader {
    pub fn is_correction(&self) -> bool {
        self.flags & FLAG_CORRECTION_BLOCK != 0
    }

    pub fn is_hybrid(&self) -> bool {
        self.flags & FLAG_HYBRID != 0
    }

    pub fn has_correction(&self) -> bool {
        self.flags & FLAG_HAS_CORRECTION != 0
    }

    pub fn is_float(&self) -> bool {
        self.flags & FLAG_FLOAT != 0
    }

    /// Serialise, appending the header check word
    pub fn write(&self, out: &mut Vec<u8>) {
        let start = out.len();
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&[
            self.kind.code(),
            self.flags,
            self.channels,
            self.bits,
            self.bytes_per_sample,
            self.shift,
        ]);
        for word in [
            self.sample_rate,
            self.channel_mask,
            self.index,
            self.frames,
            self.payload_len,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }

        let mut check = Checksum::default();
        check.update_bytes(&out[start..]);
        out.extend_from_slice(&check.value().to_le_bytes());
    }

    /// Parse a header, rejecting bad magic, check words and impossible fields
    pub fn parse(bytes: &[u8; HEADER_LEN]) -> Option<Self> {
        if bytes[..4] != MAGIC {
            return None;
        }

        let mut check = Checksum::default();
        check.update_bytes(&bytes[..HEADER_LEN - 4]);
        if check.value() != read_u32(&bytes[HEADER_LEN - 4..]) {
            return None;
        }

        let header = Self {
            kind: BlockKind::from_code(bytes[4])?,
            flags: bytes[5],
            channels: bytes[6],
            bits: bytes[7],
            bytes_per_sample: bytes[8],
            shift: bytes[9],
            sample_rate: read_u32(&bytes[10..]),
            channel_mask: read_u32(&bytes[14..]),
            index: read_u32(&bytes[18..]),
            frames: read_u32(&bytes[22..]),
            payload_len: read_u32(&bytes[26..]),
        };

        let sane = header.channels > 0
            && (1..=4).contains(&header.bytes_per_sample)
            && header.bits > 0
            && header.bits <= header.bytes_per_sample * 8
            && header.shift < 32
            && header.frames <= MAX_FRAMES
            && (header.payload_len as usize) <= MAX_PAYLOAD;

        sane.then_some(header)
    }
}

/// A complete block as read from a source
#[derive(Debug, Clone)]
pub struct Block {
    pub header: BlockHeader,
    pub payload: Vec<u8>,
    pub check: u32,
}

/// Assemble a block from a header template and payload
pub fn frame(mut header: BlockHeader, payload: &[u8], check: u32) -> Vec<u8> {
    header.payload_len = payload.len() as u32;

    let mut out = Vec::with_capacity(HEADER_LEN + payload.len() + 4);
    header.write(&mut out);
    out.extend_from_slice(payload);
    out.extend_from_slice(&check.to_le_bytes());
    out
}

fn read_u32(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

// ============================================================================
// Variable-length integers
// ============================================================================

pub fn zigzag(value: i64) -> u64 {
    ((value << 1) ^ (value >> 63)) as u64
}

pub fn unzigzag(value: u64) -> i64 {
    ((value >> 1) as i64) ^ -((value & 1) as i64)
}

pub fn put_varint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Encoded length of a varint, without encoding it
pub fn varint_len(value: u64) -> usize {
    let bits = 64 - value.leading_zeros() as usize;
    bits.max(1).div_ceil(7)
}

/// Cursor over a payload
#[derive(Debug)]
pub struct PayloadReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> PayloadReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    pub fn byte(&mut self) -> Option<u8> {
        let b = *self.data.get(self.offset)?;
        self.offset += 1;
        Some(b)
    }

    pub fn varint(&mut self) -> Option<u64> {
        let mut value = 0u64;

        for shift in (0..64).step_by(7) {
            let b = self.byte()?;
            value |= ((b & 0x7F) as u64) << shift;
            if b & 0x80 == 0 {
                return Some(value);
            }
        }

        None
    }

    pub fn bytes(&mut self, count: usize) -> Option<&'a [u8]> {
        let end = self.offset.checked_add(count)?;
        let slice = self.data.get(self.offset..end)?;
        self.offset = end;
        Some(slice)
    }

    pub fn is_exhausted(&self) -> bool {
        self.offset == self.data.len()
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Outcome of looking for the next block
#[derive(Debug)]
pub enum NextBlock {
    Block(Block),
    /// Stream ended, possibly inside a damaged block
    End,
}

/// Pulls framed blocks out of a byte source, resynchronising on damage
pub struct BlockReader<'a> {
    source: &'a dyn ByteSource,
    window: Vec<u8>,
    errors: u32,
}

impl<'a> BlockReader<'a> {
    pub fn new(source: &'a dyn ByteSource) -> Self {
        Self {
            source,
            window: Vec::with_capacity(HEADER_LEN),
            errors: 0,
        }
    }

    /// Damaged or truncated blocks seen so far
    pub fn errors(&self) -> u32 {
        self.errors
    }

    fn fill_window(&mut self) -> bool {
        let have = self.window.len();
        if have == HEADER_LEN {
            return true;
        }

        self.window.resize(HEADER_LEN, 0);
        let got = self.source.read(&mut self.window[have..]);
        self.window.truncate(have + got);
        self.window.len() == HEADER_LEN
    }

    fn parse_window(&self) -> Option<BlockHeader> {
        let bytes: &[u8; HEADER_LEN] = self.window.as_slice().try_into().ok()?;
        BlockHeader::parse(bytes)
    }

    /// Read exactly one header at the current position without resyncing
    pub fn read_header(&mut self) -> Option<BlockHeader> {
        if !self.fill_window() {
            return None;
        }

        let header = self.parse_window();
        self.window.clear();
        header
    }

    /// Read the payload that follows `header`
    pub fn read_body(&mut self, header: BlockHeader) -> NextBlock {
        let mut body = vec![0u8; header.payload_len as usize + 4];

        if self.source.read(&mut body) < body.len() {
            self.errors += 1;
            return NextBlock::End;
        }

        let check_bytes = body.split_off(header.payload_len as usize);
        NextBlock::Block(Block {
            header,
            payload: body,
            check: read_u32(&check_bytes),
        })
    }

    /// Next intact header, scanning forward byte by byte past damage.
    /// One error is counted per damaged stretch.
    pub fn next_block(&mut self) -> NextBlock {
        let mut resyncing = false;

        loop {
            if !self.fill_window() {
                if !self.window.is_empty() {
                    self.errors += 1;
                    self.window.clear();
                }
                return NextBlock::End;
            }

            if let Some(header) = self.parse_window() {
                self.window.clear();
                return self.read_body(header);
            }

            if !resyncing {
                log::debug!("damaged block header, scanning for next block");
                self.errors += 1;
                resyncing = true;
            }

            let next = self.window[1..]
                .iter()
                .position(|&b| b == MAGIC[0])
                .map_or(self.window.len(), |p| p + 1);
            self.window.drain(..next);
        }
    }

    /// Consume and discard everything left in the source
    pub fn drain(&mut self) {
        self.window.clear();
        let mut scratch = [0u8; 4096];
        while self.source.read(&mut scratch) == scratch.len() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> BlockHeader {
        BlockHeader {
            kind: BlockKind::Audio,
            flags: FLAG_HYBRID,
            channels: 2,
            bits: 16,
            bytes_per_sample: 2,
            shift: 10,
            sample_rate: 44100,
            channel_mask: 3,
            index: 7,
            frames: 4096,
            payload_len: 0,
        }
    }

    #[test]
    fn test_header_layout() {
        let mut out = Vec::new();
        header().write(&mut out);
        assert_eq!(out.len(), HEADER_LEN);

        let bytes: [u8; HEADER_LEN] = out.as_slice().try_into().unwrap();
        assert_eq!(BlockHeader::parse(&bytes), Some(header()));
    }

    #[test]
    fn test_header_rejects_any_flip() {
        let mut out = Vec::new();
        header().write(&mut out);

        for i in 0..HEADER_LEN {
            let mut bytes: [u8; HEADER_LEN] = out.as_slice().try_into().unwrap();
            bytes[i] ^= 0x10;
            assert_eq!(BlockHeader::parse(&bytes), None, "flip at {}", i);
        }
    }

    #[test]
    fn test_zigzag() {
        for v in [0i64, 1, -1, 63, -64, i32::MAX as i64, i32::MIN as i64, i64::MIN] {
            assert_eq!(unzigzag(zigzag(v)), v);
        }
        assert_eq!(zigzag(-1), 1);
        assert_eq!(zigzag(1), 2);
    }

    #[test]
    fn test_varint_lengths() {
        for v in [0u64, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX] {
            let mut out = Vec::new();
            put_varint(&mut out, v);
            assert_eq!(out.len(), varint_len(v), "value {}", v);

            let mut reader = PayloadReader::new(&out);
            assert_eq!(reader.varint(), Some(v));
            assert!(reader.is_exhausted());
        }
    }

    #[test]
    fn test_truncated_varint() {
        let mut reader = PayloadReader::new(&[0x80, 0x80]);
        assert_eq!(reader.varint(), None);
    }

    #[test]
    fn test_checksum_recurrence() {
        let mut check = Checksum::default();
        check.update(5);
        assert_eq!(check.value(), 0xFFFF_FFFFu32.wrapping_mul(3).wrapping_add(5));
    }
}
