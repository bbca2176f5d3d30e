/// Window compression abstraction.
///
/// Each `Codec` implementation:
/// - Compresses one window at a time with no state carried between windows.
///   The writer falls back to a raw record whenever `compress_window` errors
///   or returns at least as many bytes as it was given, so refusing is always
///   safe.
/// - Can report a chunk's decompressed length without decoding it, which lets
///   the reader check declared bounds before touching its working buffer.
/// - Decodes into a caller-provided buffer of known capacity.
pub trait Codec: Send + Sync {
    /// Human-readable codec name for CLI display.
    fn name(&self) -> &'static str;

    /// Compress a single window.
    ///
    /// An `Err` is a refusal, not a failure of the encode.
    fn compress_window(&self, window: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Decompressed length declared by `compressed`.
    fn decompressed_len(&self, compressed: &[u8]) -> anyhow::Result<usize>;

    /// Decompress `compressed` into `out` and return the bytes written.
    ///
    /// `out` is at least `decompressed_len(compressed)` bytes long.
    fn decompress_into(&self, compressed: &[u8], out: &mut [u8]) -> anyhow::Result<usize>;
}

/// Size of the little-endian length prefix used by [`prefix_len`].
pub const LEN_PREFIX_SIZE: usize = 4;

/// Prepend `raw_len` as a `u32` LE to `body`.
///
/// Codecs whose native stream does not carry its decompressed length use this
/// so that `decompressed_len` stays a constant-time lookup.
pub fn prefix_len(raw_len: usize, body: &[u8]) -> anyhow::Result<Vec<u8>> {
    let raw_len = u32::try_from(raw_len)
        .map_err(|_| anyhow::anyhow!("window of {} bytes is too large to prefix", raw_len))?;
    let mut out = Vec::with_capacity(LEN_PREFIX_SIZE + body.len());
    out.extend_from_slice(&raw_len.to_le_bytes());
    out.extend_from_slice(body);
    Ok(out)
}

/// Split a buffer produced by [`prefix_len`] into the length and the body.
pub fn split_len_prefix(compressed: &[u8]) -> anyhow::Result<(usize, &[u8])> {
    if compressed.len() < LEN_PREFIX_SIZE {
        anyhow::bail!(
            "compressed chunk of {} bytes is shorter than its length prefix",
            compressed.len()
        );
    }
    let (prefix, body) = compressed.split_at(LEN_PREFIX_SIZE);
    let raw_len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]);
    Ok((raw_len as usize, body))
}
