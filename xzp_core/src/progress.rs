/// Whether a chunk record carries codec output or literal bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkKind {
    Raw,
    Compressed,
}

/// One chunk record written or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEvent {
    /// Read-block the record belongs to.
    pub block: u64,
    pub kind: ChunkKind,
    /// Payload bytes as stored in the container.
    pub stored_len: usize,
    /// Raw bytes the record expands to.
    pub decompressed_len: usize,
}

/// A read-block closed (writer) or consumed (reader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub index: u64,
    /// Raw bytes processed so far, this block included.
    pub processed: u64,
    /// Declared decompressed size of the whole container.
    pub total: u64,
    /// False when the block ended without a sector-clear.
    pub terminated: bool,
}

impl BlockEvent {
    /// Completed fraction in `0.0..=1.0`. An empty container is complete.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        self.processed as f64 / self.total as f64
    }
}

/// Observer for encode and decode progress.
///
/// Purely observational: implementations cannot influence control flow.
/// Both methods default to doing nothing.
pub trait Progress {
    fn chunk(&mut self, _event: &ChunkEvent) {}

    fn block(&mut self, _event: &BlockEvent) {}
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl Progress for NoProgress {}
