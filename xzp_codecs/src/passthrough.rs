use xzp_core::codec::Codec;

/// No-op codec: never shrinks a window.
///
/// Every window therefore lands in the container as a raw record. Useful for:
/// - Verifying the container round-trip independently of any codec.
/// - Data that is already compressed, where trying again only costs time.
pub struct PassThroughCodec;

impl Codec for PassThroughCodec {
    fn name(&self) -> &'static str {
        "passthrough"
    }

    fn compress_window(&self, window: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(window.to_vec())
    }

    fn decompressed_len(&self, compressed: &[u8]) -> anyhow::Result<usize> {
        Ok(compressed.len())
    }

    fn decompress_into(&self, compressed: &[u8], out: &mut [u8]) -> anyhow::Result<usize> {
        if out.len() < compressed.len() {
            anyhow::bail!(
                "passthrough chunk needs {} bytes, buffer holds {}",
                compressed.len(),
                out.len()
            );
        }
        out[..compressed.len()].copy_from_slice(compressed);
        Ok(compressed.len())
    }
}
