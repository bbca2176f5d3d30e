use xzp_core::codec::{prefix_len, split_len_prefix, Codec};

/// Zstandard window codec.
///
/// Each window is compressed independently with `zstd` at the configured
/// level (default: 3) and prefixed with its decompressed length.
///
/// Best for: text, logs, and other data where size matters more than speed.
pub struct ZstdCodec {
    /// Compression level (1 = fast / larger, 22 = slow / smallest).
    pub level: i32,
}

impl Default for ZstdCodec {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl ZstdCodec {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Codec for ZstdCodec {
    fn name(&self) -> &'static str {
        "zstd"
    }

    fn compress_window(&self, window: &[u8]) -> anyhow::Result<Vec<u8>> {
        let body = zstd::bulk::compress(window, self.level)?;
        prefix_len(window.len(), &body)
    }

    fn decompressed_len(&self, compressed: &[u8]) -> anyhow::Result<usize> {
        Ok(split_len_prefix(compressed)?.0)
    }

    fn decompress_into(&self, compressed: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
        let (raw_len, body) = split_len_prefix(compressed)?;
        if out.len() < raw_len {
            anyhow::bail!("zstd chunk needs {} bytes, buffer holds {}", raw_len, out.len());
        }
        let n = zstd::bulk::decompress_to_buffer(body, &mut out[..raw_len])?;
        Ok(n)
    }
}
