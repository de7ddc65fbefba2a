//! Lazy archive streams.
//!
//! [`build_archive`] is a blocking iterator: each `next()` drains one entry's
//! producer, writes the member and yields the new bytes. [`stream_archive`]
//! does the same for async producers, running compression and spool I/O on
//! the blocking pool.
//!
//! Both yield the [`SENTINEL`] first, before touching any producer, and the
//! concatenation of every chunk is the complete archive. Neither is
//! restartable. A producer error ends the stream after yielding the error;
//! the bytes already sent form a truncated archive.

use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt, TryStreamExt};
use tracing::{debug, error};

use crate::builder::{ArchiveBuilder, SENTINEL};
use crate::error::ArchiveError;

type ChunkIter = Box<dyn Iterator<Item = Result<Bytes, ArchiveError>> + Send>;

/// A named member whose content is produced lazily, drained once.
pub struct ArchiveEntry {
    pub name: String,
    producer: ChunkIter,
}

impl ArchiveEntry {
    pub fn new<I>(name: impl Into<String>, producer: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes, ArchiveError>>,
        I::IntoIter: Send + 'static,
    {
        Self {
            name: name.into(),
            producer: Box::new(producer.into_iter()),
        }
    }

    /// Entry whose producer yields the given chunks.
    pub fn from_chunks<I, B>(name: impl Into<String>, chunks: I) -> Self
    where
        I: IntoIterator<Item = B>,
        I::IntoIter: Send + 'static,
        B: Into<Bytes>,
    {
        Self::new(name, chunks.into_iter().map(|c| Ok(c.into())))
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(name, std::iter::once(Ok(data.into())))
    }
}

impl std::fmt::Debug for ArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveEntry").field("name", &self.name).finish()
    }
}

enum State {
    Sentinel,
    Entries,
    Done,
}

/// Iterator over the chunks of an archive being built.
pub struct ArchiveStream<I> {
    entries: I,
    builder: Option<ArchiveBuilder>,
    state: State,
}

/// Build an archive from `entries` with the default spill threshold.
pub fn build_archive<I>(entries: I) -> ArchiveStream<I::IntoIter>
where
    I: IntoIterator<Item = ArchiveEntry>,
{
    build_archive_with(ArchiveBuilder::new(), entries)
}

/// Build an archive from `entries` into `builder`.
pub fn build_archive_with<I>(builder: ArchiveBuilder, entries: I) -> ArchiveStream<I::IntoIter>
where
    I: IntoIterator<Item = ArchiveEntry>,
{
    ArchiveStream {
        entries: entries.into_iter(),
        builder: Some(builder),
        state: State::Sentinel,
    }
}

impl<I> ArchiveStream<I> {
    /// Whether the archive spool has moved to disk. `false` once finished.
    pub fn is_spilled(&self) -> bool {
        self.builder.as_ref().map_or(false, ArchiveBuilder::is_spilled)
    }

    fn fail(&mut self, err: ArchiveError) -> Option<Result<Bytes, ArchiveError>> {
        error!(error = %err, "Archive stream aborted");
        self.state = State::Done;
        self.builder = None;
        Some(Err(err))
    }
}

impl<I> Iterator for ArchiveStream<I>
where
    I: Iterator<Item = ArchiveEntry>,
{
    type Item = Result<Bytes, ArchiveError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.state {
                State::Sentinel => {
                    self.state = State::Entries;
                    return Some(Ok(Bytes::from_static(SENTINEL)));
                }
                State::Entries => {
                    let builder = self.builder.as_mut()?;
                    match self.entries.next() {
                        Some(entry) => {
                            let ArchiveEntry { name, producer } = entry;
                            let chunk = builder
                                .add_entry(&name, producer)
                                .and_then(|_| builder.take_available());
                            match chunk {
                                Ok(chunk) if chunk.is_empty() => continue,
                                Ok(chunk) => return Some(Ok(chunk)),
                                Err(e) => return self.fail(e),
                            }
                        }
                        None => {
                            let tail = builder.finish().and_then(|_| builder.take_available());
                            self.state = State::Done;
                            self.builder = None;
                            return match tail {
                                Ok(chunk) => Some(Ok(chunk)),
                                Err(e) => self.fail(e),
                            };
                        }
                    }
                }
                State::Done => return None,
            }
        }
    }
}

/// A named member whose content comes from an async stream.
pub struct AsyncArchiveEntry {
    pub name: String,
    producer: BoxStream<'static, Result<Bytes, ArchiveError>>,
}

impl AsyncArchiveEntry {
    pub fn new<S>(name: impl Into<String>, producer: S) -> Self
    where
        S: Stream<Item = Result<Bytes, ArchiveError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            producer: producer.boxed(),
        }
    }

    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self::new(name, futures::stream::once(futures::future::ready(Ok(data.into()))))
    }
}

impl std::fmt::Debug for AsyncArchiveEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncArchiveEntry").field("name", &self.name).finish()
    }
}

/// Run `work` against the builder on the blocking pool and hand it back.
async fn on_blocking_pool<F>(
    mut builder: ArchiveBuilder,
    work: F,
) -> Result<(ArchiveBuilder, Bytes), ArchiveError>
where
    F: FnOnce(&mut ArchiveBuilder) -> Result<(), ArchiveError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || -> Result<(ArchiveBuilder, Bytes), ArchiveError> {
        work(&mut builder)?;
        let chunk = builder.take_available()?;
        Ok((builder, chunk))
    })
    .await
    .map_err(|e| ArchiveError::Task(e.to_string()))?
}

/// Async counterpart of [`build_archive`].
///
/// ```rust
/// use futures::StreamExt;
/// use zip_stream::{stream_archive, AsyncArchiveEntry};
///
/// # tokio_test::block_on(async {
/// let entries = futures::stream::iter(vec![AsyncArchiveEntry::from_bytes("a.txt", "hello")]);
/// let chunks: Vec<_> = stream_archive(entries).collect().await;
/// assert_eq!(&chunks[0].as_ref().unwrap()[..], b"PK");
/// assert_eq!(chunks.len(), 3);
/// # });
/// ```
pub fn stream_archive<S>(entries: S) -> impl Stream<Item = Result<Bytes, ArchiveError>> + Send
where
    S: Stream<Item = AsyncArchiveEntry> + Send + 'static,
{
    stream_archive_with(ArchiveBuilder::new(), entries)
}

/// Async counterpart of [`build_archive_with`].
pub fn stream_archive_with<S>(
    builder: ArchiveBuilder,
    entries: S,
) -> impl Stream<Item = Result<Bytes, ArchiveError>> + Send
where
    S: Stream<Item = AsyncArchiveEntry> + Send + 'static,
{
    async_stream::stream! {
        yield Ok(Bytes::from_static(SENTINEL));

        let mut builder = builder;
        let mut entries = Box::pin(entries);

        while let Some(entry) = entries.next().await {
            let AsyncArchiveEntry { name, producer } = entry;

            let chunks: Vec<Bytes> = match producer.try_collect().await {
                Ok(chunks) => chunks,
                Err(e) => {
                    error!(entry = %name, error = %e, "Archive entry producer failed");
                    yield Err(ArchiveError::Producer { name, message: e.to_string() });
                    return;
                }
            };

            match on_blocking_pool(builder, move |b| b.add_entry(&name, chunks.into_iter().map(Ok))).await {
                Ok((next, chunk)) => {
                    builder = next;
                    if !chunk.is_empty() {
                        yield Ok(chunk);
                    }
                }
                Err(e) => {
                    error!(error = %e, "Archive stream aborted");
                    yield Err(e);
                    return;
                }
            }
        }

        match on_blocking_pool(builder, |b| b.finish()).await {
            Ok((_, tail)) => {
                debug!(bytes = tail.len(), "Archive stream complete");
                yield Ok(tail);
            }
            Err(e) => {
                error!(error = %e, "Archive stream aborted");
                yield Err(e);
            }
        }
    }
}
