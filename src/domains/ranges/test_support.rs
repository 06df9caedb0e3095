//! Synthetic byte sources for exercising the streaming code without touching
//! the disk or holding large buffers.

use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncSeek, ReadBuf};

use super::stream::ByteSource;

/// A source whose byte at offset `n` is `n % 251`, generated on the fly.
///
/// Tracks how many readers were opened and how many are still alive.
#[derive(Debug)]
pub struct PatternSource {
    available: u64,
    live: Arc<AtomicUsize>,
    opened: AtomicUsize,
}

impl PatternSource {
    pub fn new(size: u64) -> Self {
        Self::truncated(size, size)
    }

    /// A source that claims `claimed` bytes but only has `available` of them.
    pub fn truncated(claimed: u64, available: u64) -> Self {
        assert!(available <= claimed);
        Self {
            available,
            live: Arc::new(AtomicUsize::new(0)),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn byte_at(offset: u64) -> u8 {
        (offset % 251) as u8
    }

    /// Content of `start..=end`, for comparing small slices in tests.
    pub fn slice(start: u64, end: u64) -> Vec<u8> {
        (start..=end).map(Self::byte_at).collect()
    }

    pub fn open_handles(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    pub fn total_opens(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ByteSource for PatternSource {
    type Reader = PatternReader;

    async fn open(&self) -> io::Result<PatternReader> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        Ok(PatternReader {
            position: 0,
            available: self.available,
            live: Arc::clone(&self.live),
        })
    }
}

pub struct PatternReader {
    position: u64,
    available: u64,
    live: Arc<AtomicUsize>,
}

impl Drop for PatternReader {
    fn drop(&mut self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

impl AsyncRead for PatternReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let left = self.available.saturating_sub(self.position);
        let count = left.min(buf.remaining() as u64) as usize;
        let start = self.position;
        let bytes: Vec<u8> = (start..start + count as u64).map(PatternSource::byte_at).collect();
        buf.put_slice(&bytes);
        self.position += count as u64;
        Poll::Ready(Ok(()))
    }
}

impl AsyncSeek for PatternReader {
    fn start_seek(mut self: Pin<&mut Self>, position: SeekFrom) -> io::Result<()> {
        match position {
            SeekFrom::Start(offset) => {
                self.position = offset;
                Ok(())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "only absolute seeks are supported",
            )),
        }
    }

    fn poll_complete(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<u64>> {
        Poll::Ready(Ok(self.position))
    }
}
