pub mod codec;
pub mod error;
pub mod format;
pub mod progress;
pub mod reader;
pub mod writer;

pub use codec::Codec;
pub use error::{Error, ErrorKind, Result};
pub use format::{
    ComplexHeader, ContainerHeader, SimpleHeader, Variant, COMPLEX_HEADER_SIZE, READ_BLOCK_SIZE,
    WINDOW_SIZE,
};
pub use progress::{BlockEvent, ChunkEvent, ChunkKind, NoProgress, Progress};
pub use reader::{decode, DecodeSummary, Reader};
pub use writer::{encode, EncodeOptions, EncodeSummary, EncodeVariant, PatchWrite, Writer};
