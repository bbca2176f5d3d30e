mod deflate_codec;
mod lz4_codec;
mod passthrough;
mod zstd_codec;

pub use deflate_codec::DeflateCodec;
pub use lz4_codec::Lz4Codec;
pub use passthrough::PassThroughCodec;
pub use zstd_codec::ZstdCodec;

use std::sync::Arc;
use xzp_core::Codec;

/// Names accepted by [`codec_by_name`], default first.
pub const CODEC_NAMES: &[&str] = &["lz4", "zstd", "deflate", "passthrough"];

/// Resolve a codec from its CLI name.
///
/// Containers do not record their codec, so the same name must be used to
/// encode and decode. `level` applies to zstd and deflate and is ignored
/// otherwise.
pub fn codec_by_name(name: &str, level: Option<i32>) -> anyhow::Result<Arc<dyn Codec>> {
    match name {
        "lz4" | "l" => Ok(Arc::new(Lz4Codec)),
        "zstd" | "z" => Ok(Arc::new(level.map(ZstdCodec::new).unwrap_or_default())),
        "deflate" | "d" => {
            let codec = match level {
                Some(level) => DeflateCodec::new(
                    u32::try_from(level)
                        .map_err(|_| anyhow::anyhow!("deflate level must be 0-9, got {}", level))?,
                ),
                None => DeflateCodec::default(),
            };
            Ok(Arc::new(codec))
        }
        "passthrough" | "pass" | "none" => Ok(Arc::new(PassThroughCodec)),
        other => anyhow::bail!(
            "unknown codec '{}'. Valid options: {}",
            other,
            CODEC_NAMES.join(", ")
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window() -> Vec<u8> {
        let pattern = b"sector data sector data sector data ";
        (0..16_384).map(|i| pattern[i % pattern.len()]).collect()
    }

    #[test]
    fn every_codec_decodes_its_own_window() {
        let raw = window();
        for name in CODEC_NAMES {
            let codec = codec_by_name(name, None).unwrap();
            let compressed = codec.compress_window(&raw).unwrap();
            assert_eq!(codec.decompressed_len(&compressed).unwrap(), raw.len(), "{name}");

            let mut out = vec![0u8; raw.len()];
            let n = codec.decompress_into(&compressed, &mut out).unwrap();
            assert_eq!(&out[..n], raw.as_slice(), "{name}");
        }
    }

    #[test]
    fn compressing_codecs_shrink_repetitive_windows() {
        let raw = window();
        for name in ["lz4", "zstd", "deflate"] {
            let codec = codec_by_name(name, None).unwrap();
            let compressed = codec.compress_window(&raw).unwrap();
            assert!(compressed.len() < raw.len() / 4, "{name}: {}", compressed.len());
        }
    }

    #[test]
    fn undersized_buffer_is_rejected() {
        let raw = window();
        let codec = Lz4Codec;
        let compressed = codec.compress_window(&raw).unwrap();
        let mut out = vec![0u8; 100];
        assert!(codec.decompress_into(&compressed, &mut out).is_err());
    }

    #[test]
    fn unknown_codec_name_lists_options() {
        let err = codec_by_name("jcalg1", None).err().unwrap().to_string();
        assert!(err.contains("lz4"), "{err}");
    }
}
