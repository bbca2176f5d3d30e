use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use xzp_core::codec::{prefix_len, split_len_prefix, Codec};

/// Raw DEFLATE window codec.
///
/// Slower than lz4 and usually smaller; useful where only a zlib-class
/// decoder is available to consumers of the payload.
pub struct DeflateCodec {
    /// Compression level (0 = store, 9 = best).
    pub level: u32,
}

impl Default for DeflateCodec {
    fn default() -> Self {
        Self { level: 6 }
    }
}

impl DeflateCodec {
    pub fn new(level: u32) -> Self {
        Self { level: level.min(9) }
    }
}

impl Codec for DeflateCodec {
    fn name(&self) -> &'static str {
        "deflate"
    }

    fn compress_window(&self, window: &[u8]) -> anyhow::Result<Vec<u8>> {
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(self.level));
        encoder.write_all(window)?;
        let body = encoder.finish()?;
        prefix_len(window.len(), &body)
    }

    fn decompressed_len(&self, compressed: &[u8]) -> anyhow::Result<usize> {
        Ok(split_len_prefix(compressed)?.0)
    }

    fn decompress_into(&self, compressed: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
        let (raw_len, body) = split_len_prefix(compressed)?;
        if out.len() < raw_len {
            anyhow::bail!("deflate chunk needs {} bytes, buffer holds {}", raw_len, out.len());
        }
        let mut decoder = DeflateDecoder::new(body);
        decoder.read_exact(&mut out[..raw_len])?;
        Ok(raw_len)
    }
}
