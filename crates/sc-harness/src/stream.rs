//! Virtual streaming channel
//!
//! A bounded, blocking byte pipe that stands in for a file so an encoder and a
//! decoder can run at the same time. The producer calls [`VirtualStream::write`],
//! the consumer calls [`VirtualStream::read`] and [`VirtualStream::push_back`].
//! All shared state sits behind one mutex, and the two sides wake each other
//! through a pair of condition variables.
//!
//! A stream with zero capacity is a sink: writes are fuzzed, mirrored and
//! counted but the bytes go nowhere.

use crate::codec::{BlockSink, ByteSource, SeekFrom};
use crate::fuzz::FuzzInjector;
use crate::{HarnessError, Result};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default channel capacity in bytes
pub const DEFAULT_CAPACITY: usize = 1_000_000;

/// Smallest capacity that can hold a byte in flight
pub const MIN_CAPACITY: usize = 2;

/// Errors raised by channel operations that a byte source may refuse
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamError {
    #[error("push-back slot already holds a byte")]
    PushBackFull,

    #[error("stream is not seekable")]
    NotSeekable,
}

/// Counters describing what went through a channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamStats {
    pub capacity: usize,
    pub bytes_written: u64,
    pub bytes_read: u64,
    pub first_block_size: usize,
    pub empty_waits: u64,
    pub full_waits: u64,
    pub fuzz_hits: u64,
    pub capture_error: bool,
}

/// Cursor state shared by both sides
#[derive(Debug)]
struct Ring {
    buffer: Box<[u8]>,
    head: usize,
    tail: usize,
    push_back: Option<u8>,
    done: bool,
    bytes_read: u64,
    empty_waits: u64,
    full_waits: u64,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buffer: vec![0u8; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            push_back: None,
            done: false,
            bytes_read: 0,
            empty_waits: 0,
            full_waits: 0,
        }
    }

    fn size(&self) -> usize {
        self.buffer.len()
    }

    fn available(&self) -> usize {
        if self.head >= self.tail {
            self.head - self.tail
        } else {
            self.head + self.size() - self.tail
        }
    }

    /// One slot is always kept free so a full buffer is distinguishable from
    /// an empty one.
    fn free(&self) -> usize {
        self.size().saturating_sub(1) - self.available()
    }

    /// Copy as much of `data` as fits without wrapping
    fn put(&mut self, data: &[u8]) -> usize {
        if self.size() == 0 {
            return 0;
        }
        let count = data.len().min(self.free()).min(self.size() - self.head);
        self.buffer[self.head..self.head + count].copy_from_slice(&data[..count]);
        self.head = (self.head + count) % self.size();
        count
    }

    /// Copy out as much as is available without wrapping
    fn take(&mut self, data: &mut [u8]) -> usize {
        let count = data.len().min(self.available()).min(self.size() - self.tail);
        data[..count].copy_from_slice(&self.buffer[self.tail..self.tail + count]);
        self.tail = (self.tail + count) % self.size();
        self.bytes_read += count as u64;
        count
    }
}

/// Optional disk mirror of everything written
#[derive(Debug)]
struct Capture {
    path: PathBuf,
    file: BufWriter<File>,
}

/// Producer-only bookkeeping
#[derive(Debug, Default)]
struct WriterState {
    capture: Option<Capture>,
    bytes_written: u64,
    first_block_size: usize,
    fuzz_hits: u64,
    error: bool,
}

/// Blocking single-producer, single-consumer byte channel
#[derive(Debug)]
pub struct VirtualStream {
    capacity: usize,
    ring: Mutex<Ring>,
    data_available: Condvar,
    space_available: Condvar,
    writer: Mutex<WriterState>,
    fuzz: Option<FuzzInjector>,
}

impl VirtualStream {
    /// Create a channel holding up to `capacity - 1` bytes in flight.
    /// A capacity of zero creates a sink; a capacity of one is raised to
    /// [`MIN_CAPACITY`].
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 1 { MIN_CAPACITY } else { capacity };
        Self {
            capacity,
            ring: Mutex::new(Ring::new(capacity)),
            data_available: Condvar::new(),
            space_available: Condvar::new(),
            writer: Mutex::new(WriterState::default()),
            fuzz: None,
        }
    }

    /// A channel that swallows everything written to it
    pub fn sink() -> Self {
        Self::new(0)
    }

    /// Corrupt every written block with the given injector
    pub fn with_fuzz(mut self, injector: FuzzInjector) -> Self {
        self.fuzz = Some(injector);
        self
    }

    /// Mirror every written byte to a new file at `path`
    pub fn with_capture(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|source| HarnessError::Capture {
            path: path.clone(),
            source,
        })?;

        log::debug!("capturing stream to {}", path.display());
        self.writer.lock().capture = Some(Capture {
            path,
            file: BufWriter::new(file),
        });
        Ok(self)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_sink(&self) -> bool {
        self.capacity == 0
    }

    /// Path of the capture file, if one is open
    pub fn capture_path(&self) -> Option<PathBuf> {
        self.writer.lock().capture.as_ref().map(|c| c.path.clone())
    }

    /// Whether the producer has signalled the end of the stream
    pub fn is_done(&self) -> bool {
        self.ring.lock().done
    }

    /// Snapshot of the channel counters
    pub fn stats(&self) -> StreamStats {
        let writer = self.writer.lock();
        let ring = self.ring.lock();

        StreamStats {
            capacity: self.capacity,
            bytes_written: writer.bytes_written,
            bytes_read: ring.bytes_read,
            first_block_size: writer.first_block_size,
            empty_waits: ring.empty_waits,
            full_waits: ring.full_waits,
            fuzz_hits: writer.fuzz_hits,
            capture_error: writer.error,
        }
    }

    pub fn bytes_written(&self) -> u64 {
        self.writer.lock().bytes_written
    }

    /// Push a block into the channel, blocking while it is full.
    ///
    /// The block is fuzzed in place first when an injector is attached.
    /// Returns `false` for an empty block or a released channel; callers
    /// treat that like the end of the stream.
    pub fn write(&self, data: &mut [u8]) -> bool {
        if data.is_empty() {
            return false;
        }

        {
            let mut writer = self.writer.lock();

            if let Some(fuzz) = &self.fuzz {
                writer.fuzz_hits += fuzz.inject(data) as u64;
            }

            if writer.first_block_size == 0 {
                writer.first_block_size = data.len();
            }
            writer.bytes_written += data.len() as u64;

            if !writer.error {
                if let Some(capture) = writer.capture.as_mut() {
                    if let Err(e) = capture.file.write_all(data) {
                        log::warn!("capture write to {} failed: {}", capture.path.display(), e);
                        writer.error = true;
                        writer.capture = None;
                    }
                }
            }
        }

        if self.is_sink() {
            return true;
        }

        let mut ring = self.ring.lock();
        let mut remaining: &[u8] = data;

        while !remaining.is_empty() {
            if ring.size() == 0 {
                log::warn!("write of {} bytes to a released stream dropped", remaining.len());
                return false;
            }

            let copied = ring.put(remaining);

            if copied == 0 {
                ring.full_waits += 1;
                self.space_available.wait(&mut ring);
                continue;
            }

            remaining = &remaining[copied..];
            self.data_available.notify_one();
        }

        true
    }

    /// Fill `data` from the channel, blocking while it is empty.
    ///
    /// Returns fewer bytes than requested only once the producer has marked
    /// the stream done and everything buffered has been consumed.
    pub fn read(&self, data: &mut [u8]) -> usize {
        let mut ring = self.ring.lock();
        let mut filled = 0;

        while filled < data.len() {
            if let Some(byte) = ring.push_back.take() {
                data[filled] = byte;
                filled += 1;
            } else if ring.available() > 0 {
                filled += ring.take(&mut data[filled..]);
            } else if ring.done {
                break;
            } else {
                ring.empty_waits += 1;
                self.space_available.notify_one();
                self.data_available.wait(&mut ring);
            }
        }

        self.space_available.notify_one();
        filled
    }

    /// Return one byte to the front of the stream
    pub fn push_back(&self, byte: u8) -> std::result::Result<(), StreamError> {
        let mut ring = self.ring.lock();

        if ring.push_back.is_some() {
            return Err(StreamError::PushBackFull);
        }

        ring.push_back = Some(byte);
        Ok(())
    }

    /// Signal that no more data will be written. Safe to call repeatedly.
    pub fn mark_done(&self) {
        let mut ring = self.ring.lock();
        ring.done = true;
        self.data_available.notify_all();
    }

    /// Close the capture file and drop the buffer.
    ///
    /// Must only be called once the consumer has finished with the stream.
    pub fn release(&self) {
        let mut writer = self.writer.lock();

        if let Some(mut capture) = writer.capture.take() {
            if let Err(e) = capture.file.flush() {
                log::warn!("capture flush of {} failed: {}", capture.path.display(), e);
                writer.error = true;
            }
        }

        let mut ring = self.ring.lock();
        log::debug!(
            "releasing stream: {} bytes written, {} read, {} empty waits, {} full waits",
            writer.bytes_written,
            ring.bytes_read,
            ring.empty_waits,
            ring.full_waits
        );

        ring.buffer = Box::default();
        ring.head = 0;
        ring.tail = 0;
        ring.push_back = None;
        ring.done = true;
        self.data_available.notify_all();
    }
}

impl BlockSink for VirtualStream {
    fn write_block(&self, data: &mut [u8]) -> bool {
        self.write(data)
    }
}

impl ByteSource for VirtualStream {
    fn read(&self, data: &mut [u8]) -> usize {
        VirtualStream::read(self, data)
    }

    fn push_back(&self, byte: u8) -> std::result::Result<(), StreamError> {
        VirtualStream::push_back(self, byte)
    }

    fn position(&self) -> Option<u64> {
        None
    }

    fn len(&self) -> u64 {
        0
    }

    fn seek(&self, _pos: SeekFrom) -> std::result::Result<(), StreamError> {
        Err(StreamError::NotSeekable)
    }

    fn can_seek(&self) -> bool {
        false
    }

    fn is_done(&self) -> bool {
        VirtualStream::is_done(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SharedRandom;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_write_then_read() {
        let stream = VirtualStream::new(64);
        let mut data = b"hello".to_vec();
        assert!(stream.write(&mut data));

        let mut out = [0u8; 5];
        assert_eq!(stream.read(&mut out), 5);
        assert_eq!(&out, b"hello");
    }

    #[test]
    fn test_empty_write_fails() {
        let stream = VirtualStream::new(16);
        assert!(!stream.write(&mut []));
    }

    #[test]
    fn test_push_back_precedes_buffer() {
        let stream = VirtualStream::new(16);
        stream.write(&mut [1, 2, 3]);

        let mut first = [0u8; 1];
        assert_eq!(stream.read(&mut first), 1);
        stream.push_back(first[0]).unwrap();
        assert_eq!(stream.push_back(9), Err(StreamError::PushBackFull));

        let mut out = [0u8; 3];
        assert_eq!(stream.read(&mut out), 3);
        assert_eq!(out, [1, 2, 3]);
    }

    #[test]
    fn test_push_back_zero_byte() {
        let stream = VirtualStream::new(16);
        stream.mark_done();
        stream.push_back(0).unwrap();

        let mut out = [0xFFu8; 2];
        assert_eq!(stream.read(&mut out), 1);
        assert_eq!(out[0], 0);
    }

    #[test]
    fn test_short_read_after_done() {
        let stream = VirtualStream::new(16);
        stream.write(&mut [7, 7]);
        stream.mark_done();
        stream.mark_done();

        let mut out = [0u8; 8];
        assert_eq!(stream.read(&mut out), 2);
        assert_eq!(stream.read(&mut out), 0);
    }

    #[test]
    fn test_sink_counts_but_discards() {
        let stream = VirtualStream::sink();
        assert!(stream.write(&mut [1u8; 100]));
        assert!(stream.write(&mut [1u8; 50]));

        let stats = stream.stats();
        assert_eq!(stats.bytes_written, 150);
        assert_eq!(stats.first_block_size, 100);
        assert_eq!(stats.bytes_read, 0);
        stream.release();
    }

    #[test]
    fn test_blocked_reader_wakes_on_done() {
        let stream = Arc::new(VirtualStream::new(16));
        let reader = {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                let mut out = [0u8; 4];
                stream.read(&mut out)
            })
        };

        thread::sleep(std::time::Duration::from_millis(20));
        stream.mark_done();
        assert_eq!(reader.join().unwrap(), 0);
    }

    #[test]
    fn test_wraparound_preserves_order() {
        let stream = Arc::new(VirtualStream::new(7));
        let writer = {
            let stream = Arc::clone(&stream);
            thread::spawn(move || {
                let mut data: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
                stream.write(&mut data);
                stream.mark_done();
            })
        };

        let mut received = Vec::new();
        let mut chunk = [0u8; 5];
        loop {
            let n = stream.read(&mut chunk);
            received.extend_from_slice(&chunk[..n]);
            if n < chunk.len() {
                break;
            }
        }
        writer.join().unwrap();

        let expected: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
        assert_eq!(received, expected);
        assert!(stream.stats().full_waits > 0);
    }

    #[test]
    fn test_fuzzed_write_counts_hits() {
        let rng = SharedRandom::new(5);
        let stream = VirtualStream::new(1 << 16)
            .with_fuzz(FuzzInjector::new(10, rng.clone()).unwrap());
        let seed = rng.seed();

        let mut data = vec![0u8; 10_000];
        stream.write(&mut data);

        assert!(stream.stats().fuzz_hits > 0);
        assert_eq!(rng.seed(), seed);
        assert!(data.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_capture_mirrors_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture.bin");
        let stream = VirtualStream::sink().with_capture(&path).unwrap();

        stream.write(&mut [1, 2, 3]);
        stream.write(&mut [4]);
        assert_eq!(stream.capture_path(), Some(path.clone()));
        stream.release();

        assert_eq!(std::fs::read(&path).unwrap(), vec![1, 2, 3, 4]);
        assert!(stream.capture_path().is_none());
    }

    #[test]
    fn test_capture_open_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("capture.bin");
        let err = VirtualStream::sink().with_capture(&path).unwrap_err();
        assert!(err.is_setup_failure());
    }

    #[test]
    fn test_capacity_one_is_raised() {
        let stream = VirtualStream::new(1);
        assert_eq!(stream.capacity(), MIN_CAPACITY);

        let received = thread::scope(|scope| {
            let reader = scope.spawn(|| {
                let mut out = [0u8; 16];
                let n = stream.read(&mut out);
                out[..n].to_vec()
            });

            assert!(stream.write(&mut (0u8..10).collect::<Vec<_>>()));
            stream.mark_done();
            reader.join().unwrap()
        });

        assert_eq!(received, (0u8..10).collect::<Vec<_>>());
    }

    #[test]
    fn test_write_after_release_is_dropped() {
        let stream = VirtualStream::new(16);
        stream.release();

        assert!(!stream.write(&mut [1, 2, 3]));
        assert_eq!(stream.read(&mut [0u8; 4]), 0);
    }

    #[test]
    fn test_release_is_safe_on_sink() {
        let stream = VirtualStream::sink();
        stream.release();
        stream.release();
        assert!(stream.is_done());
    }

    #[test]
    fn test_not_seekable() {
        let stream = VirtualStream::new(8);
        let source: &dyn ByteSource = &stream;
        assert!(!source.can_seek());
        assert_eq!(source.position(), None);
        assert_eq!(source.len(), 0);
        assert_eq!(source.seek(SeekFrom::Start(0)), Err(StreamError::NotSeekable));
    }
}
