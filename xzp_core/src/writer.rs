use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{
    block_budget, padding_for, ChunkTag, ComplexHeader, SimpleHeader, Variant,
    COMPLEX_HEADER_SIZE, DECOMPRESSION_BUFFER_MARGIN, DECOMPRESSION_BUFFER_SIZE_OFFSET,
    FORMAT_VERSION, MAX_RECORD_LEN, READ_BLOCK_SIZE, RECORD_HEADER_SIZE, SIMPLE_HEADER_SIZE,
    WINDOW_SIZE,
};
use crate::progress::{BlockEvent, ChunkEvent, ChunkKind, Progress};

/// An output sink that can overwrite bytes it already emitted.
///
/// The writer appends strictly forward except for one call to [`patch_at`]
/// once the last block is closed.
///
/// [`patch_at`]: PatchWrite::patch_at
pub trait PatchWrite: Write {
    /// Current append position.
    fn append_position(&mut self) -> io::Result<u64>;

    /// Overwrite `bytes` at absolute `offset`, leaving the append position
    /// where it was.
    fn patch_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()>;
}

impl<T: Write + Seek> PatchWrite for T {
    fn append_position(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    fn patch_at(&mut self, offset: u64, bytes: &[u8]) -> io::Result<()> {
        let end = self.stream_position()?;
        self.seek(SeekFrom::Start(offset))?;
        self.write_all(bytes)?;
        self.seek(SeekFrom::Start(end))?;
        Ok(())
    }
}

/// Which container layout [`encode`] should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EncodeVariant {
    /// Windowed, multi-block container.
    #[default]
    Complex,
    /// Single codec invocation. Fails if the payload exceeds one window or
    /// the codec refuses it.
    Simple,
    /// Simple when the payload fits one window and compresses, else complex.
    Auto,
}

#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub window_size: u32,
    /// Must be a power of two; it is also the block alignment.
    pub read_block_size: u32,
    pub variant: EncodeVariant,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            window_size: WINDOW_SIZE,
            read_block_size: READ_BLOCK_SIZE,
            variant: EncodeVariant::Complex,
        }
    }
}

impl EncodeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 || self.window_size > MAX_RECORD_LEN as u32 {
            return Err(Error::InvalidOptions {
                message: format!(
                    "window size {} outside 1..={}",
                    self.window_size, MAX_RECORD_LEN
                ),
            });
        }
        if !self.read_block_size.is_power_of_two() {
            return Err(Error::InvalidOptions {
                message: format!(
                    "read block size {} is not a power of two",
                    self.read_block_size
                ),
            });
        }
        // Block 0 must hold one full raw record and its sector-clear.
        let needed = COMPLEX_HEADER_SIZE + 2 * RECORD_HEADER_SIZE + self.window_size as usize;
        if (self.read_block_size as usize) < needed {
            return Err(Error::InvalidOptions {
                message: format!(
                    "read block size {} cannot hold a {}-byte window (need at least {})",
                    self.read_block_size, self.window_size, needed
                ),
            });
        }
        Ok(())
    }
}

/// What an encode produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeSummary {
    pub variant: Variant,
    pub decompressed_size: u64,
    /// Bytes written to the sink, header and padding included.
    pub container_len: u64,
    pub windows: u64,
    pub raw_chunks: u64,
    pub compressed_chunks: u64,
    pub blocks: u64,
    /// Final value of the patched header field (zero for simple containers).
    pub decompression_buffer_size: u32,
}

/// Streaming writer for complex containers.
///
/// # Write contract
/// Call [`write`] any number of times with arbitrary-sized byte slices; the
/// total must equal the `decompressed_size` given to [`new`]. Full windows are
/// compressed and framed as soon as they are gathered. Call [`finish`] to
/// flush the final short window, close the last block, and patch the header.
///
/// # Format layout written
/// ```text
/// [HEADER: 24 bytes, decompression_buffer_size = 0]
/// [RECORD] [RECORD] ... [SECTOR-CLEAR] [zero padding]   ← block 0
/// [RECORD] ... [SECTOR-CLEAR] [zero padding]            ← block 1, at read_block_size
/// ...
/// ← patch decompression_buffer_size at offset 16
/// ```
///
/// [`write`]: Writer::write
/// [`new`]: Writer::new
/// [`finish`]: Writer::finish
pub struct Writer<'p, W: PatchWrite> {
    sink: W,
    codec: Arc<dyn Codec>,
    progress: &'p mut dyn Progress,
    window_size: usize,
    read_block_size: u32,
    decompressed_size: u64,
    /// Sink position of the header; block alignment is relative to it.
    base: u64,
    /// Bytes written since `base`.
    position: u64,
    /// Raw bytes not yet framed; always shorter than one window.
    pending: Vec<u8>,
    /// Raw bytes accepted through `write`.
    consumed: u64,
    /// Raw bytes already framed into records.
    emitted: u64,
    block_index: u64,
    block_used: usize,
    block_decompressed: u64,
    max_block_decompressed: u64,
    windows: u64,
    raw_chunks: u64,
    compressed_chunks: u64,
}

impl<'p, W: PatchWrite> Writer<'p, W> {
    /// Start a complex container at the sink's current position.
    ///
    /// Writes the header immediately with a zero placeholder for
    /// `decompression_buffer_size`.
    pub fn new(
        mut sink: W,
        codec: Arc<dyn Codec>,
        decompressed_size: u64,
        options: &EncodeOptions,
        progress: &'p mut dyn Progress,
    ) -> Result<Self> {
        options.validate()?;
        let declared = u32::try_from(decompressed_size).map_err(|_| Error::SizeViolation {
            what: "input size",
            limit: u32::MAX as u64,
            observed: decompressed_size,
        })?;

        let header = ComplexHeader {
            version: FORMAT_VERSION,
            decompressed_size: declared,
            read_block_size: options.read_block_size,
            decompression_buffer_size: 0,
            window_size: options.window_size,
        };
        let base = sink.append_position()?;
        sink.write_all(&header.to_bytes())?;
        debug!(
            codec = codec.name(),
            decompressed_size,
            window_size = options.window_size,
            read_block_size = options.read_block_size,
            "writing complex container header"
        );

        Ok(Self {
            sink,
            codec,
            progress,
            window_size: options.window_size as usize,
            read_block_size: options.read_block_size,
            decompressed_size,
            base,
            position: COMPLEX_HEADER_SIZE as u64,
            pending: Vec::with_capacity(options.window_size as usize),
            consumed: 0,
            emitted: 0,
            block_index: 0,
            block_used: 0,
            block_decompressed: 0,
            max_block_decompressed: 0,
            windows: 0,
            raw_chunks: 0,
            compressed_chunks: 0,
        })
    }

    /// Buffer `data` and frame every window that fills up.
    pub fn write(&mut self, mut data: &[u8]) -> Result<()> {
        let incoming = self.consumed + data.len() as u64;
        if incoming > self.decompressed_size {
            return Err(Error::SizeViolation {
                what: "input",
                limit: self.decompressed_size,
                observed: incoming,
            });
        }
        self.consumed = incoming;

        while !data.is_empty() {
            let take = (self.window_size - self.pending.len()).min(data.len());
            self.pending.extend_from_slice(&data[..take]);
            data = &data[take..];
            if self.pending.len() == self.window_size {
                let mut window = std::mem::take(&mut self.pending);
                self.emit_window(&window)?;
                window.clear();
                self.pending = window;
            }
        }
        Ok(())
    }

    /// Compress `window` and append it as one chunk record, opening a new
    /// read-block first if the record would not fit.
    fn emit_window(&mut self, window: &[u8]) -> Result<()> {
        self.windows += 1;
        let compressed = match self.codec.compress_window(window) {
            Ok(c) if !c.is_empty() && c.len() < window.len() => Some(c),
            Ok(c) => {
                trace!(window = window.len(), compressed = c.len(), "window did not shrink; storing raw");
                None
            }
            Err(e) => {
                trace!(window = window.len(), error = %e, "codec refused window; storing raw");
                None
            }
        };
        let (tag, payload, kind) = match &compressed {
            Some(c) => (
                ChunkTag::Compressed(c.len() as u16),
                c.as_slice(),
                ChunkKind::Compressed,
            ),
            None => (ChunkTag::Raw(window.len() as u16), window, ChunkKind::Raw),
        };

        let record_len = RECORD_HEADER_SIZE + payload.len();
        let budget = block_budget(self.read_block_size, self.block_index);
        if self.block_used + record_len + RECORD_HEADER_SIZE > budget {
            self.close_block()?;
        }

        self.put(&tag.to_u16().to_le_bytes())?;
        self.put(payload)?;
        self.block_used += record_len;
        self.block_decompressed += window.len() as u64;
        self.emitted += window.len() as u64;
        match kind {
            ChunkKind::Raw => self.raw_chunks += 1,
            ChunkKind::Compressed => self.compressed_chunks += 1,
        }

        self.progress.chunk(&ChunkEvent {
            block: self.block_index,
            kind,
            stored_len: payload.len(),
            decompressed_len: window.len(),
        });
        Ok(())
    }

    /// Terminate the current read-block with a sector-clear and pad up to the
    /// next alignment boundary.
    fn close_block(&mut self) -> Result<()> {
        self.put(&ChunkTag::SectorClear.to_u16().to_le_bytes())?;
        let padding = padding_for(self.position, self.read_block_size);
        self.put(&vec![0u8; padding])?;

        self.max_block_decompressed = self.max_block_decompressed.max(self.block_decompressed);
        debug!(
            block = self.block_index,
            used = self.block_used,
            padding,
            decompressed = self.block_decompressed,
            "closed read-block"
        );
        self.progress.block(&BlockEvent {
            index: self.block_index,
            processed: self.emitted,
            total: self.decompressed_size,
            terminated: true,
        });

        self.block_index += 1;
        self.block_used = 0;
        self.block_decompressed = 0;
        Ok(())
    }

    fn put(&mut self, bytes: &[u8]) -> Result<()> {
        self.sink.write_all(bytes)?;
        self.position += bytes.len() as u64;
        Ok(())
    }

    /// Frame the final short window, close the last block, and patch
    /// `decompression_buffer_size` into the header.
    pub fn finish(mut self) -> Result<EncodeSummary> {
        if self.consumed != self.decompressed_size {
            return Err(Error::TruncatedInput {
                what: "input",
                expected: self.decompressed_size,
                available: self.consumed,
            });
        }
        if !self.pending.is_empty() {
            let window = std::mem::take(&mut self.pending);
            self.emit_window(&window)?;
        }
        self.close_block()?;

        let buffer_size = (self.max_block_decompressed + DECOMPRESSION_BUFFER_MARGIN as u64)
            .min(u32::MAX as u64) as u32;
        self.sink.patch_at(
            self.base + DECOMPRESSION_BUFFER_SIZE_OFFSET,
            &buffer_size.to_le_bytes(),
        )?;
        self.sink.flush()?;

        debug!(
            blocks = self.block_index,
            windows = self.windows,
            raw = self.raw_chunks,
            decompression_buffer_size = buffer_size,
            "complex container finished"
        );

        Ok(EncodeSummary {
            variant: Variant::Complex,
            decompressed_size: self.decompressed_size,
            container_len: self.position,
            windows: self.windows,
            raw_chunks: self.raw_chunks,
            compressed_chunks: self.compressed_chunks,
            blocks: self.block_index,
            decompression_buffer_size: buffer_size,
        })
    }
}

/// Write `data` as a simple container with a single codec call.
///
/// Returns the stored blob length, or `None` without writing anything if the
/// codec refuses or the output would not be smaller than `data`.
pub fn write_simple<W: Write>(
    data: &[u8],
    codec: &dyn Codec,
    mut sink: W,
) -> Result<Option<usize>> {
    let declared = u32::try_from(data.len()).map_err(|_| Error::SizeViolation {
        what: "input size",
        limit: u32::MAX as u64,
        observed: data.len() as u64,
    })?;
    let compressed = match codec.compress_window(data) {
        Ok(c) if !c.is_empty() && c.len() < data.len() => c,
        _ => return Ok(None),
    };
    sink.write_all(
        &SimpleHeader {
            decompressed_size: declared,
        }
        .to_bytes(),
    )?;
    sink.write_all(&compressed)?;
    Ok(Some(compressed.len()))
}

/// Encode `decompressed_size` bytes from `input` into `sink`.
pub fn encode<R: Read, W: PatchWrite>(
    mut input: R,
    decompressed_size: u64,
    mut sink: W,
    codec: Arc<dyn Codec>,
    options: &EncodeOptions,
    progress: &mut dyn Progress,
) -> Result<EncodeSummary> {
    options.validate()?;
    let fits_window = decompressed_size <= options.window_size as u64;

    match options.variant {
        EncodeVariant::Complex => {}
        EncodeVariant::Simple if !fits_window => {
            return Err(Error::InvalidOptions {
                message: format!(
                    "a simple container holds at most one {}-byte window, input is {} bytes",
                    options.window_size, decompressed_size
                ),
            });
        }
        EncodeVariant::Simple | EncodeVariant::Auto if fits_window => {
            let mut data = Vec::with_capacity(decompressed_size as usize);
            (&mut input)
                .take(decompressed_size + 1)
                .read_to_end(&mut data)?;
            check_input_len(decompressed_size, data.len() as u64)?;

            if let Some(compressed_len) = write_simple(&data, codec.as_ref(), &mut sink)? {
                sink.flush()?;
                progress.chunk(&ChunkEvent {
                    block: 0,
                    kind: ChunkKind::Compressed,
                    stored_len: compressed_len,
                    decompressed_len: data.len(),
                });
                progress.block(&BlockEvent {
                    index: 0,
                    processed: decompressed_size,
                    total: decompressed_size,
                    terminated: true,
                });
                return Ok(EncodeSummary {
                    variant: Variant::Simple,
                    decompressed_size,
                    container_len: (SIMPLE_HEADER_SIZE + compressed_len) as u64,
                    windows: 1,
                    raw_chunks: 0,
                    compressed_chunks: 1,
                    blocks: 1,
                    decompression_buffer_size: 0,
                });
            }
            if options.variant == EncodeVariant::Simple {
                return Err(Error::InvalidOptions {
                    message: format!(
                        "codec {} did not shrink the payload; a simple container cannot store it raw",
                        codec.name()
                    ),
                });
            }
            debug!("payload did not compress; falling back to a complex container");
            return encode_complex(&data[..], decompressed_size, sink, codec, options, progress);
        }
        EncodeVariant::Auto | EncodeVariant::Simple => {}
    }
    encode_complex(input, decompressed_size, sink, codec, options, progress)
}

fn encode_complex<R: Read, W: PatchWrite>(
    mut input: R,
    decompressed_size: u64,
    sink: W,
    codec: Arc<dyn Codec>,
    options: &EncodeOptions,
    progress: &mut dyn Progress,
) -> Result<EncodeSummary> {
    let mut writer = Writer::new(sink, codec, decompressed_size, options, progress)?;
    let mut buf = vec![0u8; options.window_size as usize];
    loop {
        let n = match input.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        writer.write(&buf[..n])?;
    }
    writer.finish()
}

fn check_input_len(declared: u64, observed: u64) -> Result<()> {
    if observed > declared {
        return Err(Error::SizeViolation {
            what: "input",
            limit: declared,
            observed,
        });
    }
    if observed < declared {
        return Err(Error::TruncatedInput {
            what: "input",
            expected: declared,
            available: observed,
        });
    }
    Ok(())
}
