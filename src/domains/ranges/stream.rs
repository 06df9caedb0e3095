//! Lazy chunked delivery of byte ranges.
//!
//! Every stream built here owns its reader. The reader is opened on first
//! poll, read in chunks of at most `chunk_size` bytes and dropped as soon as
//! the range is exhausted, a read fails, or the stream itself is dropped
//! (which is what hyper does when the client goes away).

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use futures::{Stream, future};
use std::io::{self, SeekFrom};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

use super::parser::{ByteRange, RangeSet};

/// Reference chunk size for streamed bodies.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// A resource that can hand out fresh, seekable readers.
///
/// Each call to [`ByteSource::open`] must return an independent handle;
/// handles are never shared between responses or parts.
#[async_trait]
pub trait ByteSource: Send + Sync + 'static {
    type Reader: AsyncRead + AsyncSeek + Unpin + Send + 'static;

    async fn open(&self) -> io::Result<Self::Reader>;
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ByteSource for FileSource {
    type Reader = tokio::fs::File;

    async fn open(&self) -> io::Result<Self::Reader> {
        tokio::fs::File::open(&self.path).await
    }
}

enum ChunkState<R> {
    Unopened,
    Reading { reader: R, remaining: u64 },
    Done,
}

/// Stream the bytes of `range` from `source` in bounded chunks.
///
/// A source that runs dry before `range.end()` yields an
/// [`io::ErrorKind::UnexpectedEof`] error and ends the stream.
pub fn range_chunks<S: ByteSource>(
    source: Arc<S>,
    range: ByteRange,
    chunk_size: usize,
) -> impl Stream<Item = io::Result<Bytes>> + Send + 'static {
    let chunk_size = chunk_size.max(1) as u64;

    stream::try_unfold(ChunkState::Unopened, move |state| {
        let source = Arc::clone(&source);
        async move {
            let (mut reader, remaining) = match state {
                ChunkState::Unopened => {
                    let mut reader = source.open().await?;
                    reader.seek(SeekFrom::Start(range.start())).await?;
                    (reader, range.len())
                }
                ChunkState::Reading { reader, remaining } => (reader, remaining),
                ChunkState::Done => return Ok(None),
            };

            let wanted = remaining.min(chunk_size) as usize;
            let mut buf = vec![0u8; wanted];
            let read = reader.read(&mut buf).await?;
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    format!(
                        "source ended {} bytes before the end of range {}-{}",
                        remaining,
                        range.start(),
                        range.end()
                    ),
                ));
            }
            buf.truncate(read);

            let remaining = remaining - read as u64;
            let next = if remaining == 0 {
                ChunkState::Done
            } else {
                ChunkState::Reading { reader, remaining }
            };

            Ok(Some((Bytes::from(buf), next)))
        }
    })
}

/// Header block that opens one part of a `multipart/byteranges` body.
pub fn part_header(boundary: &str, mime_type: &str, range: ByteRange, size: u64) -> String {
    format!(
        "--{boundary}\r\nContent-Type: {mime_type}\r\nContent-Range: {}\r\n\r\n",
        range.content_range(size)
    )
}

/// Closing delimiter of a `multipart/byteranges` body.
pub fn closing_delimiter(boundary: &str) -> String {
    format!("--{boundary}--\r\n")
}

/// Stream a `multipart/byteranges` body, one part per range.
///
/// A fresh reader is opened for each part and released when that part is
/// done. The first I/O error ends the whole body.
pub fn multipart_chunks<S: ByteSource>(
    source: Arc<S>,
    ranges: RangeSet,
    boundary: String,
    mime_type: String,
    size: u64,
    chunk_size: usize,
) -> BoxStream<'static, io::Result<Bytes>> {
    let closing = Bytes::from(closing_delimiter(&boundary));

    let parts = stream::iter(ranges).flat_map(move |range| {
        let header = Bytes::from(part_header(&boundary, &mime_type, range, size));
        stream::once(future::ready(Ok(header)))
            .chain(range_chunks(Arc::clone(&source), range, chunk_size))
            .chain(stream::once(future::ready(Ok(Bytes::from_static(b"\r\n")))))
    });

    stop_after_error(parts.chain(stream::once(future::ready(Ok(closing)))))
}

/// End the stream right after the first error it yields.
pub fn stop_after_error<St>(inner: St) -> BoxStream<'static, io::Result<Bytes>>
where
    St: Stream<Item = io::Result<Bytes>> + Send + 'static,
{
    inner
        .scan(false, |failed, item| {
            if *failed {
                return future::ready(None);
            }
            *failed = item.is_err();
            future::ready(Some(item))
        })
        .boxed()
}
