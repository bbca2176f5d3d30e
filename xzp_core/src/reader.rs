use std::io::{self, Read, Write};
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::format::{
    block_budget, ChunkTag, ComplexHeader, ContainerHeader, SimpleHeader, Variant,
    COMPLEX_HEADER_SIZE, RECORD_HEADER_SIZE, SIMPLE_HEADER_SIZE,
};
use crate::progress::{BlockEvent, ChunkEvent, ChunkKind, Progress};

/// What a decode consumed and produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeSummary {
    pub variant: Variant,
    pub decompressed_size: u64,
    pub blocks: u64,
    pub raw_chunks: u64,
    pub compressed_chunks: u64,
}

/// Streaming reader for both container variants.
///
/// # Open sequence
/// 1. Read the 4-byte signature and pick the variant.
/// 2. Read the rest of that variant's header; a complex header must be
///    version 1 with sane block and window geometry.
///
/// # Decode
/// [`decode_into`] walks read-blocks front to back, holding one block of
/// container bytes and one working buffer at a time. Nothing is seeked: block
/// `k` starts exactly where block `k - 1`'s budget ends, so padding is skipped
/// by construction rather than scanned.
///
/// [`decode_into`]: Reader::decode_into
pub struct Reader<R: Read> {
    source: R,
    codec: Arc<dyn Codec>,
    header: ContainerHeader,
}

impl<R: Read> Reader<R> {
    /// Parse the container header from `source`.
    ///
    /// The container does not record which codec produced it; `codec` must be
    /// the one used to encode.
    pub fn open(mut source: R, codec: Arc<dyn Codec>) -> Result<Self> {
        let mut signature = [0u8; 4];
        read_header_bytes(&mut source, &mut signature)?;

        let header = match Variant::from_signature(signature)? {
            Variant::Simple => {
                let mut buf = [0u8; SIMPLE_HEADER_SIZE];
                buf[..4].copy_from_slice(&signature);
                read_header_bytes(&mut source, &mut buf[4..])?;
                ContainerHeader::Simple(SimpleHeader::from_bytes(&buf)?)
            }
            Variant::Complex => {
                let mut buf = [0u8; COMPLEX_HEADER_SIZE];
                buf[..4].copy_from_slice(&signature);
                read_header_bytes(&mut source, &mut buf[4..])?;
                let header = ComplexHeader::from_bytes(&buf)?;
                header.validate()?;
                ContainerHeader::Complex(header)
            }
        };
        debug!(?header, codec = codec.name(), "opened container");

        Ok(Self {
            source,
            codec,
            header,
        })
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    /// Decode the whole container into `out`.
    ///
    /// Stops at the first structural violation; whatever was already written
    /// to `out` stays there.
    pub fn decode_into<W: Write>(
        self,
        mut out: W,
        progress: &mut dyn Progress,
    ) -> Result<DecodeSummary> {
        let Reader {
            source,
            codec,
            header,
        } = self;
        let summary = match header {
            ContainerHeader::Simple(h) => {
                decode_simple(source, &h, codec.as_ref(), &mut out, progress)?
            }
            ContainerHeader::Complex(h) => {
                decode_complex(source, &h, codec.as_ref(), &mut out, progress)?
            }
        };
        out.flush()?;
        Ok(summary)
    }
}

/// Open `source` and decode it into `out` in one call.
pub fn decode<R: Read, W: Write>(
    source: R,
    out: W,
    codec: Arc<dyn Codec>,
    progress: &mut dyn Progress,
) -> Result<DecodeSummary> {
    Reader::open(source, codec)?.decode_into(out, progress)
}

fn decode_simple<R: Read, W: Write>(
    mut source: R,
    header: &SimpleHeader,
    codec: &dyn Codec,
    out: &mut W,
    progress: &mut dyn Progress,
) -> Result<DecodeSummary> {
    let declared = header.decompressed_size as u64;
    let mut blob = Vec::new();
    source.read_to_end(&mut blob)?;

    let offset = SIMPLE_HEADER_SIZE as u64;
    let needed = codec
        .decompressed_len(&blob)
        .map_err(|e| codec_error(offset, e))?;
    if needed as u64 > declared {
        return Err(Error::SizeViolation {
            what: "simple payload",
            limit: declared,
            observed: needed as u64,
        });
    }

    let mut buf = vec![0u8; needed];
    let produced = codec
        .decompress_into(&blob, &mut buf)
        .map_err(|e| codec_error(offset, e))?;
    if produced > needed {
        return Err(Error::SizeViolation {
            what: "simple payload",
            limit: needed as u64,
            observed: produced as u64,
        });
    }
    if (produced as u64) < declared {
        return Err(Error::TruncatedInput {
            what: "simple payload",
            expected: declared,
            available: produced as u64,
        });
    }
    out.write_all(&buf[..produced])?;

    progress.chunk(&ChunkEvent {
        block: 0,
        kind: ChunkKind::Compressed,
        stored_len: blob.len(),
        decompressed_len: produced,
    });
    progress.block(&BlockEvent {
        index: 0,
        processed: declared,
        total: declared,
        terminated: true,
    });

    Ok(DecodeSummary {
        variant: Variant::Simple,
        decompressed_size: declared,
        blocks: 1,
        raw_chunks: 0,
        compressed_chunks: 1,
    })
}

fn decode_complex<R: Read, W: Write>(
    mut source: R,
    header: &ComplexHeader,
    codec: &dyn Codec,
    out: &mut W,
    progress: &mut dyn Progress,
) -> Result<DecodeSummary> {
    let declared = header.decompressed_size as u64;
    let bound = header.decompression_buffer_size as usize;

    let mut block = vec![0u8; header.read_block_size as usize];
    // Grown on demand, never past `bound`.
    let mut work: Vec<u8> = Vec::new();

    let mut written = 0u64;
    let mut index = 0u64;
    let mut block_start = COMPLEX_HEADER_SIZE as u64;
    let mut raw_chunks = 0u64;
    let mut compressed_chunks = 0u64;

    while written < declared {
        let budget = block_budget(header.read_block_size, index);
        let got = read_up_to(&mut source, &mut block[..budget])?;
        if got == 0 {
            return Err(Error::TruncatedInput {
                what: "decompressed output",
                expected: declared,
                available: written,
            });
        }
        if got < budget {
            debug!(block = index, got, budget, "short read-block");
        }

        let mut cursor = 0usize;
        let mut terminated = false;
        while cursor + RECORD_HEADER_SIZE <= got {
            let record_offset = block_start + cursor as u64;
            let field = u16::from_le_bytes([block[cursor], block[cursor + 1]]);
            cursor += RECORD_HEADER_SIZE;

            let (kind, len) = match ChunkTag::parse(field) {
                ChunkTag::SectorClear => {
                    trace!(block = index, "sector clear");
                    terminated = true;
                    break;
                }
                ChunkTag::Raw(len) => (ChunkKind::Raw, len as usize),
                ChunkTag::Compressed(len) => (ChunkKind::Compressed, len as usize),
            };
            if cursor + len > got {
                return Err(Error::TruncatedInput {
                    what: "chunk record",
                    expected: len as u64,
                    available: (got - cursor) as u64,
                });
            }
            let payload = &block[cursor..cursor + len];
            cursor += len;

            let produced = match kind {
                ChunkKind::Raw => {
                    out.write_all(payload)?;
                    raw_chunks += 1;
                    len
                }
                ChunkKind::Compressed => {
                    let needed = codec
                        .decompressed_len(payload)
                        .map_err(|e| codec_error(record_offset, e))?;
                    if needed > bound {
                        return Err(Error::SizeViolation {
                            what: "chunk decompressed length",
                            limit: bound as u64,
                            observed: needed as u64,
                        });
                    }
                    if work.len() < needed {
                        work.resize(needed, 0);
                    }
                    let produced = codec
                        .decompress_into(payload, &mut work[..needed])
                        .map_err(|e| codec_error(record_offset, e))?;
                    if produced > needed {
                        return Err(Error::SizeViolation {
                            what: "chunk decompressed length",
                            limit: needed as u64,
                            observed: produced as u64,
                        });
                    }
                    out.write_all(&work[..produced])?;
                    compressed_chunks += 1;
                    produced
                }
            };

            written += produced as u64;
            if written > declared {
                return Err(Error::SizeViolation {
                    what: "decompressed output",
                    limit: declared,
                    observed: written,
                });
            }
            trace!(block = index, ?kind, stored = len, produced, "chunk");
            progress.chunk(&ChunkEvent {
                block: index,
                kind,
                stored_len: len,
                decompressed_len: produced,
            });
        }

        if !terminated {
            warn!(block = index, "read-block ended without a sector clear");
        }
        progress.block(&BlockEvent {
            index,
            processed: written,
            total: declared,
            terminated,
        });
        block_start += got as u64;
        index += 1;
    }

    debug!(blocks = index, written, "complex container decoded");
    Ok(DecodeSummary {
        variant: Variant::Complex,
        decompressed_size: declared,
        blocks: index,
        raw_chunks,
        compressed_chunks,
    })
}

fn read_header_bytes<R: Read>(source: &mut R, buf: &mut [u8]) -> Result<()> {
    let got = read_up_to(source, buf)?;
    if got < buf.len() {
        return Err(Error::TruncatedInput {
            what: "container header",
            expected: buf.len() as u64,
            available: got as u64,
        });
    }
    Ok(())
}

/// Fill `buf` from `source`, stopping early only at end of input.
fn read_up_to<R: Read>(source: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match source.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

fn codec_error(offset: u64, err: anyhow::Error) -> Error {
    Error::Codec {
        offset,
        message: format!("{err:#}"),
    }
}
