use crate::error::{Error, Result};

/// Signature of the single-shot container variant.
pub const SIMPLE_SIGNATURE: [u8; 4] = *b"xSmp";

/// Signature of the windowed, multi-block container variant.
pub const COMPLEX_SIGNATURE: [u8; 4] = *b"xCmp";

/// The only complex container version this crate reads or writes.
pub const FORMAT_VERSION: u32 = 1;

/// Fixed size of the simple header in bytes.
///   signature[4] + decompressed_size:u32 = 8
pub const SIMPLE_HEADER_SIZE: usize = 8;

/// Fixed size of the complex header in bytes.
///   signature[4] + version:u32 + decompressed_size:u32 + read_block_size:u32
///   + decompression_buffer_size:u32 + window_size:u32
///   = 4 + 4 + 4 + 4 + 4 + 4 = 24
pub const COMPLEX_HEADER_SIZE: usize = 24;

/// Byte offset of `decompression_buffer_size` from the start of the container.
/// The writer patches this field once the last block is closed.
pub const DECOMPRESSION_BUFFER_SIZE_OFFSET: u64 = 16;

/// Default raw bytes per window: 16 KB.
pub const WINDOW_SIZE: u32 = 16 * 1024;

/// Default read-block size: 64 KB. Also the alignment boundary of every block.
pub const READ_BLOCK_SIZE: u32 = 64 * 1024;

/// Slack added on top of the largest per-block decompressed total.
pub const DECOMPRESSION_BUFFER_MARGIN: u32 = 1024;

// ── Chunk records ──────────────────────────────────────────────────────────

/// Size of the `size-and-flag` field that prefixes every chunk record.
pub const RECORD_HEADER_SIZE: usize = 2;

/// Top bit of the record size: payload is literal bytes.
pub const RAW_FLAG: u16 = 0x8000;

/// Largest payload a record can describe.
pub const MAX_RECORD_LEN: u16 = 0x7FFF;

/// Tag of one chunk record, decoded from its `u16` size-and-flag field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkTag {
    /// `size == 0`: ends the current read-block.
    SectorClear,
    /// Literal window bytes of the given length.
    Raw(u16),
    /// Codec output of the given length.
    Compressed(u16),
}

impl ChunkTag {
    pub fn parse(field: u16) -> Self {
        if field == 0 {
            ChunkTag::SectorClear
        } else if field & RAW_FLAG != 0 {
            ChunkTag::Raw(field & MAX_RECORD_LEN)
        } else {
            ChunkTag::Compressed(field)
        }
    }

    pub fn to_u16(self) -> u16 {
        match self {
            ChunkTag::SectorClear => 0,
            ChunkTag::Raw(len) => RAW_FLAG | (len & MAX_RECORD_LEN),
            ChunkTag::Compressed(len) => len & MAX_RECORD_LEN,
        }
    }

    /// Payload bytes that follow the size field.
    pub fn payload_len(self) -> usize {
        match self {
            ChunkTag::SectorClear => 0,
            ChunkTag::Raw(len) | ChunkTag::Compressed(len) => len as usize,
        }
    }
}

// ── Headers ────────────────────────────────────────────────────────────────

/// Which of the two container layouts a file uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    Simple,
    Complex,
}

impl Variant {
    pub fn from_signature(signature: [u8; 4]) -> Result<Self> {
        match signature {
            SIMPLE_SIGNATURE => Ok(Variant::Simple),
            COMPLEX_SIGNATURE => Ok(Variant::Complex),
            found => Err(Error::UnknownSignature { found }),
        }
    }

    pub fn signature(self) -> [u8; 4] {
        match self {
            Variant::Simple => SIMPLE_SIGNATURE,
            Variant::Complex => COMPLEX_SIGNATURE,
        }
    }

    pub fn header_size(self) -> usize {
        match self {
            Variant::Simple => SIMPLE_HEADER_SIZE,
            Variant::Complex => COMPLEX_HEADER_SIZE,
        }
    }
}

/// Decoded representation of the 8-byte simple header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleHeader {
    pub decompressed_size: u32,
}

impl SimpleHeader {
    pub fn to_bytes(&self) -> [u8; SIMPLE_HEADER_SIZE] {
        let mut buf = [0u8; SIMPLE_HEADER_SIZE];
        buf[..4].copy_from_slice(&SIMPLE_SIGNATURE);
        buf[4..8].copy_from_slice(&self.decompressed_size.to_le_bytes());
        buf
    }

    /// Deserialize from `SIMPLE_HEADER_SIZE` bytes, checking the signature.
    pub fn from_bytes(buf: &[u8; SIMPLE_HEADER_SIZE]) -> Result<Self> {
        expect_signature(buf, SIMPLE_SIGNATURE)?;
        Ok(Self {
            decompressed_size: read_u32(buf, 4),
        })
    }
}

/// Decoded representation of the 24-byte complex header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComplexHeader {
    pub version: u32,
    /// Total raw bytes the container expands to. Fixed when encoding starts.
    pub decompressed_size: u32,
    /// Nominal bytes per read-block, header included for block 0.
    pub read_block_size: u32,
    /// Upper bound on any chunk's decompressed length. Zero until patched.
    pub decompression_buffer_size: u32,
    /// Raw bytes per window (the final window may be shorter).
    pub window_size: u32,
}

impl ComplexHeader {
    /// Serialize to exactly `COMPLEX_HEADER_SIZE` bytes.
    pub fn to_bytes(&self) -> [u8; COMPLEX_HEADER_SIZE] {
        let mut buf = [0u8; COMPLEX_HEADER_SIZE];
        buf[..4].copy_from_slice(&COMPLEX_SIGNATURE);
        buf[4..8].copy_from_slice(&self.version.to_le_bytes());
        buf[8..12].copy_from_slice(&self.decompressed_size.to_le_bytes());
        buf[12..16].copy_from_slice(&self.read_block_size.to_le_bytes());
        buf[16..20].copy_from_slice(&self.decompression_buffer_size.to_le_bytes());
        buf[20..24].copy_from_slice(&self.window_size.to_le_bytes());
        buf
    }

    /// Deserialize from `COMPLEX_HEADER_SIZE` bytes.
    ///
    /// Checks the signature and version only; geometry is checked by
    /// [`ComplexHeader::validate`].
    pub fn from_bytes(buf: &[u8; COMPLEX_HEADER_SIZE]) -> Result<Self> {
        expect_signature(buf, COMPLEX_SIGNATURE)?;
        let version = read_u32(buf, 4);
        if version != FORMAT_VERSION {
            return Err(Error::UnsupportedVersion { found: version });
        }
        Ok(Self {
            version,
            decompressed_size: read_u32(buf, 8),
            read_block_size: read_u32(buf, 12),
            decompression_buffer_size: read_u32(buf, 16),
            window_size: read_u32(buf, 20),
        })
    }

    /// Reject block and window geometry the reader cannot walk.
    pub fn validate(&self) -> Result<()> {
        if !self.read_block_size.is_power_of_two()
            || self.read_block_size as usize <= COMPLEX_HEADER_SIZE + RECORD_HEADER_SIZE
        {
            return Err(Error::Format {
                message: format!(
                    "read block size {} is not a power of two larger than the header",
                    self.read_block_size
                ),
            });
        }
        if self.window_size == 0 || self.window_size > MAX_RECORD_LEN as u32 {
            return Err(Error::Format {
                message: format!(
                    "window size {} outside 1..={}",
                    self.window_size, MAX_RECORD_LEN
                ),
            });
        }
        Ok(())
    }
}

/// Header of either variant, as returned by the reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainerHeader {
    Simple(SimpleHeader),
    Complex(ComplexHeader),
}

impl ContainerHeader {
    pub fn variant(&self) -> Variant {
        match self {
            ContainerHeader::Simple(_) => Variant::Simple,
            ContainerHeader::Complex(_) => Variant::Complex,
        }
    }

    pub fn decompressed_size(&self) -> u32 {
        match self {
            ContainerHeader::Simple(h) => h.decompressed_size,
            ContainerHeader::Complex(h) => h.decompressed_size,
        }
    }
}

// ── Block geometry ─────────────────────────────────────────────────────────

/// Bytes available to read-block `index`.
///
/// The header lives inside the nominal first block, so block 0 gets
/// `read_block_size - COMPLEX_HEADER_SIZE` and every later block the full size.
pub fn block_budget(read_block_size: u32, index: u64) -> usize {
    if index == 0 {
        (read_block_size as usize).saturating_sub(COMPLEX_HEADER_SIZE)
    } else {
        read_block_size as usize
    }
}

/// Zero bytes needed to move `offset` up to the next multiple of `alignment`.
/// `alignment` must be a power of two.
pub fn padding_for(offset: u64, alignment: u32) -> usize {
    let mask = alignment as u64 - 1;
    ((alignment as u64 - (offset & mask)) & mask) as usize
}

fn expect_signature(buf: &[u8], expected: [u8; 4]) -> Result<()> {
    let mut found = [0u8; 4];
    found.copy_from_slice(&buf[..4]);
    if found != expected {
        return Err(Error::UnknownSignature { found });
    }
    Ok(())
}

fn read_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}
