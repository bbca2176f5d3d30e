/// Integration tests: encode with a real codec, decode it back, and poke at the
/// bytes in between to check the container layout directly.
use std::io::Cursor;
use std::sync::Arc;

use xzp_codecs::{DeflateCodec, Lz4Codec, PassThroughCodec, ZstdCodec};
use xzp_core::format::{
    block_budget, ChunkTag, ComplexHeader, SimpleHeader, COMPLEX_HEADER_SIZE,
    DECOMPRESSION_BUFFER_MARGIN, RECORD_HEADER_SIZE,
};
use xzp_core::{
    decode, encode, BlockEvent, ChunkEvent, Codec, EncodeOptions, EncodeSummary,
    EncodeVariant, ErrorKind, NoProgress, Progress, Reader, Variant, Writer, READ_BLOCK_SIZE,
    WINDOW_SIZE,
};

/// Generate `len` deterministic bytes using a simple LCG.
fn pseudo_random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = seed;
    (0..len)
        .map(|_| {
            rng = rng
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            (rng >> 56) as u8
        })
        .collect()
}

/// Generate `len` highly compressible bytes (repeating pattern).
fn compressible_bytes(len: usize) -> Vec<u8> {
    let pattern = b"the quick brown fox jumps over the lazy dog. ";
    (0..len).map(|i| pattern[i % pattern.len()]).collect()
}

/// Alternating compressible and random stretches, so blocks mix both record kinds.
fn mixed_bytes(len: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(len);
    let mut seed = 7;
    while data.len() < len {
        data.extend(compressible_bytes(3000));
        data.extend(pseudo_random_bytes(2000, seed));
        seed += 1;
    }
    data.truncate(len);
    data
}

/// Small geometry so modest inputs span many read-blocks.
fn small_blocks() -> EncodeOptions {
    EncodeOptions {
        window_size: 1024,
        read_block_size: 2048,
        variant: EncodeVariant::Complex,
    }
}

#[derive(Default)]
struct Recorder {
    chunks: Vec<ChunkEvent>,
    blocks: Vec<BlockEvent>,
}

impl Progress for Recorder {
    fn chunk(&mut self, event: &ChunkEvent) {
        self.chunks.push(event.clone());
    }

    fn block(&mut self, event: &BlockEvent) {
        self.blocks.push(event.clone());
    }
}

/// Codec that refuses every window.
struct RefusingCodec;

impl Codec for RefusingCodec {
    fn name(&self) -> &'static str {
        "refusing"
    }

    fn compress_window(&self, _window: &[u8]) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("refusing to compress")
    }

    fn decompressed_len(&self, _compressed: &[u8]) -> anyhow::Result<usize> {
        anyhow::bail!("refusing codec never produces compressed chunks")
    }

    fn decompress_into(&self, _compressed: &[u8], _out: &mut [u8]) -> anyhow::Result<usize> {
        anyhow::bail!("refusing codec never produces compressed chunks")
    }
}

// ── helpers ───────────────────────────────────────────────────────────────

fn encode_with(
    data: &[u8],
    codec: Arc<dyn Codec>,
    options: &EncodeOptions,
) -> (Vec<u8>, EncodeSummary) {
    let mut sink = Cursor::new(Vec::new());
    let summary = encode(
        data,
        data.len() as u64,
        &mut sink,
        codec,
        options,
        &mut NoProgress,
    )
    .unwrap();
    (sink.into_inner(), summary)
}

fn decode_with(container: &[u8], codec: Arc<dyn Codec>) -> xzp_core::Result<Vec<u8>> {
    let mut out = Vec::new();
    decode(container, &mut out, codec, &mut NoProgress)?;
    Ok(out)
}

fn complex_header(container: &[u8]) -> ComplexHeader {
    let bytes: [u8; COMPLEX_HEADER_SIZE] = container[..COMPLEX_HEADER_SIZE].try_into().unwrap();
    ComplexHeader::from_bytes(&bytes).unwrap()
}

/// One parsed record: block index, container offset of its payload, tag.
struct Record {
    block: u64,
    payload_offset: usize,
    tag: ChunkTag,
}

/// Walk every record of a complex container by block geometry alone.
fn walk_records(container: &[u8]) -> Vec<Record> {
    let header = complex_header(container);
    let mut records = Vec::new();
    let mut block_start = COMPLEX_HEADER_SIZE;
    let mut block = 0u64;
    while block_start < container.len() {
        let end = block_start + block_budget(header.read_block_size, block);
        let mut cursor = block_start;
        loop {
            let field = u16::from_le_bytes([container[cursor], container[cursor + 1]]);
            cursor += RECORD_HEADER_SIZE;
            let tag = ChunkTag::parse(field);
            if tag == ChunkTag::SectorClear {
                break;
            }
            records.push(Record {
                block,
                payload_offset: cursor,
                tag,
            });
            cursor += tag.payload_len();
        }
        assert!(cursor <= end, "block {block} overran its budget");
        block_start = end;
        block += 1;
    }
    records
}

// ── round trips ────────────────────────────────────────────────────────────

#[test]
fn test_roundtrip_empty_input() {
    let (container, summary) = encode_with(&[], Arc::new(Lz4Codec), &EncodeOptions::default());
    assert_eq!(summary.windows, 0);
    assert_eq!(summary.blocks, 1);
    assert_eq!(container.len(), READ_BLOCK_SIZE as usize);
    assert_eq!(complex_header(&container).decompressed_size, 0);

    let out = decode_with(&container, Arc::new(Lz4Codec)).unwrap();
    assert!(out.is_empty());
}

#[test]
fn test_roundtrip_exactly_one_window() {
    let data = compressible_bytes(WINDOW_SIZE as usize);
    let (container, summary) = encode_with(&data, Arc::new(Lz4Codec), &EncodeOptions::default());
    assert_eq!(summary.windows, 1);
    assert_eq!(summary.compressed_chunks, 1);

    let out = decode_with(&container, Arc::new(Lz4Codec)).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_roundtrip_many_blocks_every_codec() {
    let data = mixed_bytes(200_000);
    let codecs: Vec<Arc<dyn Codec>> = vec![
        Arc::new(Lz4Codec),
        Arc::new(ZstdCodec::default()),
        Arc::new(DeflateCodec::default()),
        Arc::new(PassThroughCodec),
    ];
    for codec in codecs {
        let (container, summary) = encode_with(&data, codec.clone(), &small_blocks());
        assert!(summary.blocks > 10, "{}: {} blocks", codec.name(), summary.blocks);

        let out = decode_with(&container, codec.clone()).unwrap();
        assert_eq!(out, data, "{} round-trip should be byte-exact", codec.name());
    }
}

#[test]
fn test_incompressible_input_only_costs_record_headers() {
    let data = pseudo_random_bytes(10 * WINDOW_SIZE as usize, 0x1234_5678);
    let (container, summary) = encode_with(&data, Arc::new(Lz4Codec), &EncodeOptions::default());
    assert_eq!(summary.raw_chunks, summary.windows);

    let stored: usize = walk_records(&container)
        .iter()
        .map(|r| RECORD_HEADER_SIZE + r.tag.payload_len())
        .sum();
    assert_eq!(stored, data.len() + 10 * RECORD_HEADER_SIZE);
}

#[test]
fn test_streaming_writes_match_one_shot_encode() {
    let data = mixed_bytes(50_000);
    let options = small_blocks();
    let (expected, _) = encode_with(&data, Arc::new(Lz4Codec), &options);

    let mut sink = Cursor::new(Vec::new());
    let mut progress = NoProgress;
    let mut writer = Writer::new(
        &mut sink,
        Arc::new(Lz4Codec),
        data.len() as u64,
        &options,
        &mut progress,
    )
    .unwrap();
    for piece in data.chunks(777) {
        writer.write(piece).unwrap();
    }
    writer.finish().unwrap();

    assert_eq!(sink.into_inner(), expected);
}

#[test]
fn test_container_can_start_mid_sink() {
    let data = mixed_bytes(30_000);
    let prefix = b"PREFIX!";
    let mut sink = Cursor::new(prefix.to_vec());
    sink.set_position(prefix.len() as u64);
    encode(
        &data[..],
        data.len() as u64,
        &mut sink,
        Arc::new(Lz4Codec),
        &small_blocks(),
        &mut NoProgress,
    )
    .unwrap();

    let bytes = sink.into_inner();
    assert_eq!(&bytes[..prefix.len()], prefix);
    let container = &bytes[prefix.len()..];
    assert_eq!(container.len() % 2048, 0);
    assert_ne!(complex_header(container).decompression_buffer_size, 0);
    assert_eq!(decode_with(container, Arc::new(Lz4Codec)).unwrap(), data);
}

// ── layout properties ──────────────────────────────────────────────────────

#[test]
fn test_buffer_size_covers_every_chunk() {
    let data = mixed_bytes(120_000);
    let codec = Lz4Codec;
    let (container, summary) = encode_with(&data, Arc::new(Lz4Codec), &small_blocks());
    let header = complex_header(&container);
    assert_eq!(header.decompression_buffer_size, summary.decompression_buffer_size);
    assert!(header.decompression_buffer_size >= DECOMPRESSION_BUFFER_MARGIN);

    let records = walk_records(&container);
    assert!(records.iter().any(|r| matches!(r.tag, ChunkTag::Compressed(_))));
    for record in &records {
        let decompressed = match record.tag {
            ChunkTag::Raw(len) => len as usize,
            ChunkTag::Compressed(len) => {
                let payload =
                    &container[record.payload_offset..record.payload_offset + len as usize];
                codec.decompressed_len(payload).unwrap()
            }
            ChunkTag::SectorClear => unreachable!(),
        };
        assert!(decompressed <= header.decompression_buffer_size as usize);
        assert!(decompressed <= header.window_size as usize);
    }
}

#[test]
fn test_blocks_start_on_alignment_boundary() {
    let data = pseudo_random_bytes(40_000, 99);
    let options = small_blocks();
    let (container, summary) = encode_with(&data, Arc::new(Lz4Codec), &options);
    let rbs = options.read_block_size as usize;

    assert_eq!(container.len(), summary.blocks as usize * rbs);
    assert_eq!(summary.container_len as usize, container.len());

    // Each block: records, then a sector-clear, then zeros up to the boundary.
    let records = walk_records(&container);
    for block in 0..summary.blocks {
        let start = if block == 0 { COMPLEX_HEADER_SIZE } else { block as usize * rbs };
        let in_block: Vec<&Record> = records.iter().filter(|r| r.block == block).collect();
        assert!(!in_block.is_empty(), "block {block} has no records");
        assert_eq!(in_block[0].payload_offset, start + RECORD_HEADER_SIZE);

        let last = in_block[in_block.len() - 1];
        let clear_at = last.payload_offset + last.tag.payload_len();
        assert_eq!(&container[clear_at..clear_at + 2], &[0, 0]);
        let end = (block as usize + 1) * rbs;
        assert!(container[clear_at..end].iter().all(|b| *b == 0));
    }
}

#[test]
fn test_refused_window_is_stored_verbatim() {
    let data = compressible_bytes(WINDOW_SIZE as usize + 500);
    let (container, summary) =
        encode_with(&data, Arc::new(RefusingCodec), &EncodeOptions::default());
    assert_eq!(summary.raw_chunks, 2);
    assert_eq!(summary.compressed_chunks, 0);

    let records = walk_records(&container);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].tag, ChunkTag::Raw(WINDOW_SIZE as u16));
    assert_eq!(records[1].tag, ChunkTag::Raw(500));
    let field = u16::from_le_bytes([container[24], container[25]]);
    assert_eq!(field, 0x8000 | WINDOW_SIZE as u16);
    assert_eq!(
        &container[records[0].payload_offset..records[0].payload_offset + WINDOW_SIZE as usize],
        &data[..WINDOW_SIZE as usize]
    );

    // Raw records decode without ever calling the codec.
    let out = decode_with(&container, Arc::new(RefusingCodec)).unwrap();
    assert_eq!(out, data);
}

/// 40,000 bytes with 16 KB windows: two full windows and one of 7,232 bytes,
/// all in a single 64 KB read-block.
#[test]
fn test_forty_thousand_byte_scenario() {
    let data = pseudo_random_bytes(40_000, 0xDEAD_BEEF);
    let mut sink = Cursor::new(Vec::new());
    let mut written = Recorder::default();
    let summary = encode(
        &data[..],
        data.len() as u64,
        &mut sink,
        Arc::new(Lz4Codec),
        &EncodeOptions::default(),
        &mut written,
    )
    .unwrap();
    assert_eq!(summary.windows, 3);
    let sizes: Vec<usize> = written.chunks.iter().map(|c| c.decompressed_len).collect();
    assert_eq!(sizes, vec![16_384, 16_384, 7_232]);

    let container = sink.into_inner();
    let mut out = Vec::new();
    let mut read = Recorder::default();
    let decoded = decode(&container[..], &mut out, Arc::new(Lz4Codec), &mut read).unwrap();
    assert_eq!(out, data);
    assert_eq!(decoded.blocks, 1);
    assert_eq!(read.chunks.len(), 3);
    assert_eq!(read.blocks.len(), 1);
    assert_eq!(read.blocks[0].processed, 40_000);
    assert!(read.blocks[0].terminated);
    assert_eq!(read.blocks[0].fraction(), 1.0);
}

#[test]
fn test_block_progress_is_monotonic() {
    let data = mixed_bytes(60_000);
    let (container, summary) = encode_with(&data, Arc::new(ZstdCodec::default()), &small_blocks());

    let mut read = Recorder::default();
    decode(&container[..], std::io::sink(), Arc::new(ZstdCodec::default()), &mut read).unwrap();
    assert_eq!(read.blocks.len() as u64, summary.blocks);
    for pair in read.blocks.windows(2) {
        assert!(pair[0].processed <= pair[1].processed);
        assert_eq!(pair[0].index + 1, pair[1].index);
    }
    assert_eq!(read.blocks.last().unwrap().processed, data.len() as u64);
}

// ── rejection ──────────────────────────────────────────────────────────────

#[test]
fn test_unknown_signature_is_format_error() {
    let data = compressible_bytes(5000);
    let (mut container, _) = encode_with(&data, Arc::new(Lz4Codec), &EncodeOptions::default());
    container[..4].copy_from_slice(b"PK\x03\x04");
    let err = decode_with(&container, Arc::new(Lz4Codec)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
    assert!(err.to_string().contains("signature"), "{err}");
}

#[test]
fn test_other_version_is_rejected() {
    let data = compressible_bytes(5000);
    let (mut container, _) = encode_with(&data, Arc::new(Lz4Codec), &EncodeOptions::default());
    container[4..8].copy_from_slice(&2u32.to_le_bytes());
    let err = Reader::open(&container[..], Arc::new(Lz4Codec)).err().unwrap();
    assert_eq!(err.kind(), ErrorKind::UnsupportedVersion);
}

#[test]
fn test_oversized_chunk_is_size_violation() {
    // A valid lz4 chunk declaring a full window, under a header that claims
    // chunks never exceed 100 bytes.
    let window = compressible_bytes(WINDOW_SIZE as usize);
    let payload = Lz4Codec.compress_window(&window).unwrap();
    let header = ComplexHeader {
        version: 1,
        decompressed_size: WINDOW_SIZE,
        read_block_size: READ_BLOCK_SIZE,
        decompression_buffer_size: 100,
        window_size: WINDOW_SIZE,
    };
    let mut container = header.to_bytes().to_vec();
    container.extend_from_slice(&(payload.len() as u16).to_le_bytes());
    container.extend_from_slice(&payload);
    container.extend_from_slice(&[0, 0]);
    container.resize(READ_BLOCK_SIZE as usize, 0);

    let mut out = Vec::new();
    let err = decode(&container[..], &mut out, Arc::new(Lz4Codec), &mut NoProgress).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeViolation);
    assert!(out.is_empty(), "nothing should be written for the oversized chunk");
    assert!(err.to_string().contains("16384"), "{err}");
}

#[test]
fn test_output_beyond_declared_size_is_size_violation() {
    let data = compressible_bytes(20_000);
    let (mut container, _) = encode_with(&data, Arc::new(Lz4Codec), &EncodeOptions::default());
    container[8..12].copy_from_slice(&10_000u32.to_le_bytes());
    let err = decode_with(&container, Arc::new(Lz4Codec)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeViolation);
}

#[test]
fn test_truncated_container_is_rejected() {
    let data = pseudo_random_bytes(30_000, 5);
    let (container, _) = encode_with(&data, Arc::new(Lz4Codec), &small_blocks());
    for cut in [10, COMPLEX_HEADER_SIZE, 2048, 5000, container.len() / 2] {
        let err = decode_with(&container[..cut], Arc::new(Lz4Codec)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TruncatedInput, "cut at {cut}: {err}");
    }
}

#[test]
fn test_writer_enforces_declared_input_size() {
    let mut sink = Cursor::new(Vec::new());
    let mut progress = NoProgress;
    let mut writer = Writer::new(
        &mut sink,
        Arc::new(Lz4Codec),
        100,
        &EncodeOptions::default(),
        &mut progress,
    )
    .unwrap();
    writer.write(&[1u8; 60]).unwrap();
    let err = writer.write(&[1u8; 60]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeViolation);

    let err = writer.finish().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TruncatedInput);
}

#[test]
fn test_invalid_geometry_is_rejected() {
    for (window_size, read_block_size) in [(0, 4096), (0x8000, 65_536), (1024, 3000), (4096, 4096)] {
        let options = EncodeOptions {
            window_size,
            read_block_size,
            variant: EncodeVariant::Complex,
        };
        let err = options.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOptions, "{window_size}/{read_block_size}");
    }
}

// ── simple variant ─────────────────────────────────────────────────────────

#[test]
fn test_auto_picks_simple_for_small_compressible_input() {
    let data = compressible_bytes(4000);
    let options = EncodeOptions {
        variant: EncodeVariant::Auto,
        ..EncodeOptions::default()
    };
    let (container, summary) = encode_with(&data, Arc::new(Lz4Codec), &options);
    assert_eq!(summary.variant, Variant::Simple);
    assert_eq!(&container[..4], b"xSmp");
    assert_eq!(summary.container_len as usize, container.len());

    let reader = Reader::open(&container[..], Arc::new(Lz4Codec)).unwrap();
    assert_eq!(reader.header().decompressed_size(), 4000);
    let mut out = Vec::new();
    reader.decode_into(&mut out, &mut NoProgress).unwrap();
    assert_eq!(out, data);
}

#[test]
fn test_auto_falls_back_to_complex() {
    let options = EncodeOptions {
        variant: EncodeVariant::Auto,
        ..EncodeOptions::default()
    };
    // Incompressible and small: the codec refuses, so the window goes raw.
    let noise = pseudo_random_bytes(4000, 11);
    let (container, summary) = encode_with(&noise, Arc::new(Lz4Codec), &options);
    assert_eq!(summary.variant, Variant::Complex);
    assert_eq!(decode_with(&container, Arc::new(Lz4Codec)).unwrap(), noise);

    // Larger than one window.
    let big = compressible_bytes(WINDOW_SIZE as usize + 1);
    let (_, summary) = encode_with(&big, Arc::new(Lz4Codec), &options);
    assert_eq!(summary.variant, Variant::Complex);
}

#[test]
fn test_forced_simple_rejects_what_it_cannot_hold() {
    let options = EncodeOptions {
        variant: EncodeVariant::Simple,
        ..EncodeOptions::default()
    };
    let big = compressible_bytes(WINDOW_SIZE as usize * 2);
    let mut sink = Cursor::new(Vec::new());
    let err = encode(
        &big[..],
        big.len() as u64,
        &mut sink,
        Arc::new(Lz4Codec),
        &options,
        &mut NoProgress,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);

    let small = compressible_bytes(1000);
    let err = encode(
        &small[..],
        small.len() as u64,
        &mut sink,
        Arc::new(PassThroughCodec),
        &options,
        &mut NoProgress,
    )
    .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidOptions);
}

#[test]
fn test_simple_payload_larger_than_declared_is_size_violation() {
    let data = compressible_bytes(4000);
    let mut container = SimpleHeader {
        decompressed_size: 100,
    }
    .to_bytes()
    .to_vec();
    container.extend(Lz4Codec.compress_window(&data).unwrap());
    let err = decode_with(&container, Arc::new(Lz4Codec)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SizeViolation);
}

#[test]
fn test_corrupt_chunk_reports_codec_failure() {
    let data = compressible_bytes(WINDOW_SIZE as usize);
    let (mut container, _) = encode_with(&data, Arc::new(ZstdCodec::default()), &EncodeOptions::default());
    let record = &walk_records(&container)[0];
    // Keep the length prefix, scramble the zstd frame magic.
    let frame = record.payload_offset + 4;
    container[frame..frame + 4].copy_from_slice(&[0xFF; 4]);
    let err = decode_with(&container, Arc::new(ZstdCodec::default())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Codec);
}
