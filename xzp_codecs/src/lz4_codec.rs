use lz4_flex::block::{compress_prepend_size, decompress_into};
use xzp_core::codec::{split_len_prefix, Codec};

/// LZ4 block codec, the default.
///
/// Fastest decompression of all bundled codecs. Each chunk is an LZ4 block
/// prefixed with its 4-byte decompressed length, so the reader can bound the
/// output before decoding.
///
/// Best for: game assets and other data that is read far more than written.
pub struct Lz4Codec;

impl Codec for Lz4Codec {
    fn name(&self) -> &'static str {
        "lz4"
    }

    fn compress_window(&self, window: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(compress_prepend_size(window))
    }

    fn decompressed_len(&self, compressed: &[u8]) -> anyhow::Result<usize> {
        Ok(split_len_prefix(compressed)?.0)
    }

    fn decompress_into(&self, compressed: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
        let (raw_len, body) = split_len_prefix(compressed)?;
        if out.len() < raw_len {
            anyhow::bail!("lz4 chunk needs {} bytes, buffer holds {}", raw_len, out.len());
        }
        let n = decompress_into(body, &mut out[..raw_len])
            .map_err(|e| anyhow::anyhow!("lz4 decompress error: {}", e))?;
        Ok(n)
    }
}
