//! Streaming ZIP packaging of the finished crops.
//!
//! Two halves joined by a bounded channel of compressed chunks:
//!
//! ```text
//! ArchiveWriter ──writes──▶ ChunkSink ══chunk_queue══▶ ArchiveStream ──▶ consumer
//!  (zip, deflate 9)          (Write)                    (Iterator + Read)
//! ```
//!
//! The writer never seeks: entries are emitted with data descriptors as they
//! are added, so the consumer sees the first bytes long before the last crop
//! is finished. [`ArchiveWriter::finalize`] appends the manifest as the final
//! entry and writes the central directory.
//!
//! The stream ends in exactly one of three ways: [`StreamCloser::finish`]
//! (clean end), [`StreamCloser::fail`] (the error is the stream's last item),
//! or every sender being dropped without either, which the consumer sees as
//! `UnexpectedEof` so a truncated archive is never mistaken for a whole one.
//! Dropping the [`ArchiveStream`] early cancels the shared [`CancelToken`].

use crate::cancel::CancelToken;
use std::io::{self, Write};
use std::sync::mpsc::{Receiver, SyncSender, sync_channel};
use thiserror::Error;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::{SimpleFileOptions, StreamWriter, ZipWriter};

/// Name of the trailing manifest entry, at the archive root.
pub const MANIFEST_NAME: &str = "manifest.txt";

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A file destined for the archive. Handed over once, never mutated after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    pub path: String,
    pub bytes: Vec<u8>,
}

/// `<ratio>/<basename>_<ratio>_<label>_<dpi>dpi.jpg`
pub fn entry_path(ratio: &str, basename: &str, label: &str, dpi: u32) -> String {
    format!("{ratio}/{basename}_{ratio}_{label}_{dpi}dpi.jpg")
}

/// Append-only ZIP writer over a non-seekable sink.
pub struct ArchiveWriter<W: Write> {
    zip: ZipWriter<StreamWriter<W>>,
    options: SimpleFileOptions,
    entries: usize,
}

impl<W: Write> ArchiveWriter<W> {
    /// `compression_level` is the deflate level, 0..=9.
    pub fn new(sink: W, compression_level: u32) -> Self {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .compression_level(Some(compression_level.min(9) as i64));
        Self {
            zip: ZipWriter::new_stream(sink),
            options,
            entries: 0,
        }
    }

    /// Compress and emit one entry. Paths must be unique within the archive.
    pub fn add_entry(&mut self, entry: ArchiveEntry) -> Result<(), ArchiveError> {
        self.zip.start_file(entry.path.as_str(), self.options)?;
        self.zip.write_all(&entry.bytes)?;
        self.entries += 1;
        debug!(path = %entry.path, bytes = entry.bytes.len(), "archived entry");
        Ok(())
    }

    /// Entries added so far, not counting the manifest.
    pub fn entries_written(&self) -> usize {
        self.entries
    }

    /// Write the manifest as the last entry, then the central directory.
    ///
    /// Returns the total entry count including the manifest.
    pub fn finalize(mut self, manifest: &str) -> Result<usize, ArchiveError> {
        self.zip.start_file(MANIFEST_NAME, self.options)?;
        self.zip.write_all(manifest.as_bytes())?;
        let mut inner = self.zip.finish()?;
        inner.flush()?;
        Ok(self.entries + 1)
    }
}

/// Message on the chunk queue.
#[derive(Debug)]
pub enum Chunk {
    Bytes(Vec<u8>),
    End,
    Failed(io::Error),
}

/// Create the chunk queue between an [`ArchiveWriter`] and its consumer.
///
/// `capacity` bounds the number of in-flight chunks; a full queue blocks the
/// writer. `chunk_size` is the number of bytes batched per chunk.
pub fn archive_channel(
    capacity: usize,
    chunk_size: usize,
    token: CancelToken,
) -> (ChunkSink, ArchiveStream) {
    let (tx, rx) = sync_channel(capacity.max(1));
    let sink = ChunkSink {
        tx,
        buffer: Vec::with_capacity(chunk_size.max(1)),
        chunk_size: chunk_size.max(1),
        token: token.clone(),
    };
    let stream = ArchiveStream {
        rx,
        token,
        pending: Vec::new(),
        pos: 0,
        done: false,
    };
    (sink, stream)
}

/// Write end of the chunk queue.
pub struct ChunkSink {
    tx: SyncSender<Chunk>,
    buffer: Vec<u8>,
    chunk_size: usize,
    token: CancelToken,
}

impl ChunkSink {
    /// A handle that ends the stream once the writer is done with the sink.
    pub fn closer(&self) -> StreamCloser {
        StreamCloser {
            tx: self.tx.clone(),
        }
    }

    fn send(&mut self, bytes: Vec<u8>) -> io::Result<()> {
        self.tx.send(Chunk::Bytes(bytes)).map_err(|_| {
            self.token.cancel();
            io::Error::new(io::ErrorKind::BrokenPipe, "archive consumer disconnected")
        })
    }
}

impl Write for ChunkSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.token.is_cancelled() {
            return Err(io::Error::other("archive stream cancelled"));
        }
        self.buffer.extend_from_slice(buf);
        while self.buffer.len() >= self.chunk_size {
            let rest = self.buffer.split_off(self.chunk_size);
            let chunk = std::mem::replace(&mut self.buffer, rest);
            self.send(chunk)?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() || self.token.is_cancelled() {
            return Ok(());
        }
        let chunk = std::mem::take(&mut self.buffer);
        self.send(chunk)
    }
}

/// Ends the stream; consumes itself so it can be used only once.
pub struct StreamCloser {
    tx: SyncSender<Chunk>,
}

impl StreamCloser {
    pub fn finish(self) {
        // A consumer that already left needs no end marker.
        let _ = self.tx.send(Chunk::End);
    }

    pub fn fail(self, err: io::Error) {
        let _ = self.tx.send(Chunk::Failed(err));
    }
}

/// Read end of the chunk queue: compressed archive bytes as they are produced.
pub struct ArchiveStream {
    rx: Receiver<Chunk>,
    token: CancelToken,
    pending: Vec<u8>,
    pos: usize,
    done: bool,
}

impl ArchiveStream {
    /// True once the stream reached its end marker or an error.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

impl Iterator for ArchiveStream {
    type Item = io::Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.rx.recv() {
            Ok(Chunk::Bytes(bytes)) => Some(Ok(bytes)),
            Ok(Chunk::End) => {
                self.done = true;
                None
            }
            Ok(Chunk::Failed(err)) => {
                self.done = true;
                Some(Err(err))
            }
            Err(_) => {
                self.done = true;
                Some(Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "archive stream ended before the archive was finalized",
                )))
            }
        }
    }
}

impl io::Read for ArchiveStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.pos >= self.pending.len() {
            match self.next() {
                Some(Ok(bytes)) => {
                    self.pending = bytes;
                    self.pos = 0;
                }
                Some(Err(err)) => return Err(err),
                None => return Ok(0),
            }
        }
        let n = buf.len().min(self.pending.len() - self.pos);
        buf[..n].copy_from_slice(&self.pending[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

impl Drop for ArchiveStream {
    fn drop(&mut self) {
        if !self.done {
            self.token.cancel();
        }
    }
}
