//! Console reporting: progress bar, per-chunk logging, and byte formatting.

use std::io::{self, Write};

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use xxhash_rust::xxh3::Xxh3;
use xzp_core::{BlockEvent, ChunkEvent, ChunkKind, Progress};

/// Progress sink for the CLI.
///
/// Without `--verbose` a bar advances once per read-block. With it every chunk
/// and sector-clear is logged instead and the bar stays hidden.
pub struct ConsoleProgress {
    bar: ProgressBar,
    verbose: bool,
}

impl ConsoleProgress {
    pub fn new(total: u64, verbose: bool) -> Self {
        let bar = if verbose {
            ProgressBar::hidden()
        } else {
            let pb = ProgressBar::new(total);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {percent:>3}% {bytes}/{total_bytes}")
                    .expect("progress bar template is valid")
                    .progress_chars("█▓▒░ "),
            );
            pb
        };
        Self { bar, verbose }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Progress for ConsoleProgress {
    fn chunk(&mut self, event: &ChunkEvent) {
        if !self.verbose {
            return;
        }
        match event.kind {
            ChunkKind::Raw => info!(
                block = event.block,
                "uncompressed chunk of {} bytes", event.stored_len
            ),
            ChunkKind::Compressed => info!(
                block = event.block,
                "compressed chunk of {} bytes -> {} bytes",
                event.stored_len,
                event.decompressed_len
            ),
        }
    }

    fn block(&mut self, event: &BlockEvent) {
        if self.verbose {
            info!(
                block = event.index,
                "sector clear ({:.2}%)",
                event.fraction() * 100.0
            );
        } else {
            self.bar.set_position(event.processed);
        }
    }
}

/// Prints one table row per chunk for `inspect --chunks`.
#[derive(Default)]
pub struct ChunkTable {
    pub rows: u64,
}

impl ChunkTable {
    pub fn print_heading() {
        println!(
            "  {:>8}  {:>8}  {:>12}  {:>12}",
            "block", "kind", "stored", "decompressed"
        );
        println!("  {}", "-".repeat(46));
    }
}

impl Progress for ChunkTable {
    fn chunk(&mut self, event: &ChunkEvent) {
        let kind = match event.kind {
            ChunkKind::Raw => "raw",
            ChunkKind::Compressed => "codec",
        };
        println!(
            "  {:>8}  {:>8}  {:>12}  {:>12}",
            event.block, kind, event.stored_len, event.decompressed_len
        );
        self.rows += 1;
    }
}

/// A `Write` sink that only hashes what passes through it.
pub struct HashingWriter {
    hasher: Xxh3,
    pub len: u64,
}

impl HashingWriter {
    pub fn new() -> Self {
        Self {
            hasher: Xxh3::new(),
            len: 0,
        }
    }

    pub fn digest(&self) -> u64 {
        self.hasher.digest()
    }
}

impl Default for HashingWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl Write for HashingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.hasher.update(buf);
        self.len += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn human_bytes(n: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut v = n as f64;
    let mut unit = 0;
    while v >= 1024.0 && unit < UNITS.len() - 1 {
        v /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} B", n)
    } else {
        format!("{:.2} {}", v, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xxhash_rust::xxh3::xxh3_64;

    #[test]
    fn human_bytes_scales_units() {
        assert_eq!(human_bytes(512), "512 B");
        assert_eq!(human_bytes(40_000), "39.06 KB");
        assert_eq!(human_bytes(3 * 1024 * 1024), "3.00 MB");
    }

    #[test]
    fn hashing_writer_matches_one_shot_digest() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i * 7) as u8).collect();
        let mut w = HashingWriter::new();
        for piece in data.chunks(333) {
            w.write_all(piece).unwrap();
        }
        assert_eq!(w.len, 10_000);
        assert_eq!(w.digest(), xxh3_64(&data));
    }
}
