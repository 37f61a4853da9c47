//! Bounded look-ahead for batch preparation
//!
//! A producer thread drives a [`DatasetIterator`] and pushes finished
//! batches into a bounded channel. The consumer blocks when the channel is
//! empty and the producer blocks when it is full.

use corpus_core::{Error, Result};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::thread::JoinHandle;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;
use tokio_stream::Stream;
use tracing::{debug, error, info};

use crate::batch::Batch;
use crate::DatasetIterator;

/// Shutdown signal sender
pub type ShutdownSender = broadcast::Sender<()>;

/// Shutdown signal receiver
pub type ShutdownReceiver = broadcast::Receiver<()>;

/// Consumer side of a prefetching batch producer
///
/// Usable as a blocking [`Iterator`] from ordinary threads or as a
/// [`Stream`] from async code. Dropping it stops the producer and waits for
/// the producer thread to exit.
pub struct Prefetcher {
    /// Prepared batches
    rx: mpsc::Receiver<Result<Batch>>,

    /// Stop signal for the producer
    shutdown_tx: ShutdownSender,

    /// Producer thread, taken when joined
    handle: Option<JoinHandle<()>>,

    /// Channel capacity
    depth: usize,
}

impl Prefetcher {
    /// Start preparing up to `depth` batches ahead of consumption
    pub fn spawn(iter: DatasetIterator, depth: usize) -> Result<Self> {
        if depth == 0 {
            return Err(Error::config("prefetch_depth must be positive"));
        }

        let (tx, rx) = mpsc::channel(depth);
        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);

        let handle = std::thread::Builder::new()
            .name("batch-prefetch".to_string())
            .spawn(move || producer_loop(iter, tx, shutdown_rx))?;

        Ok(Self {
            rx,
            shutdown_tx,
            handle: Some(handle),
            depth,
        })
    }

    /// Channel capacity
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Ask the producer to stop; batches already queued stay readable
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Receive the next batch from async code
    pub async fn recv(&mut self) -> Option<Result<Batch>> {
        match self.rx.recv().await {
            Some(item) => Some(item),
            None => self.finish(),
        }
    }

    /// Join the producer once the channel is drained
    fn finish(&mut self) -> Option<Result<Batch>> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(()) => None,
            Err(_) => {
                error!("Prefetch producer panicked");
                Some(Err(Error::ChannelClosed {
                    channel: "prefetch".to_string(),
                }))
            }
        }
    }
}

impl Iterator for Prefetcher {
    type Item = Result<Batch>;

    /// Blocks the calling thread; must not be called from within an async runtime
    fn next(&mut self) -> Option<Self::Item> {
        match self.rx.blocking_recv() {
            Some(item) => Some(item),
            None => self.finish(),
        }
    }
}

impl Stream for Prefetcher {
    type Item = Result<Batch>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        match this.rx.poll_recv(cx) {
            Poll::Ready(None) => Poll::Ready(this.finish()),
            other => other,
        }
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.shutdown();
        // Wakes a producer blocked on a full channel
        self.rx.close();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for Prefetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Prefetcher")
            .field("depth", &self.depth)
            .field("running", &self.handle.is_some())
            .finish()
    }
}

fn producer_loop(
    mut iter: DatasetIterator,
    tx: mpsc::Sender<Result<Batch>>,
    mut shutdown_rx: ShutdownReceiver,
) {
    info!(depth = tx.max_capacity(), "Prefetch producer started");

    loop {
        if stop_requested(&mut shutdown_rx) {
            break;
        }

        let item = match iter.next_batch().transpose() {
            Some(item) => item,
            None => break,
        };

        if stop_requested(&mut shutdown_rx) {
            debug!("Discarding prepared batch after shutdown");
            break;
        }

        let failed = item.is_err();
        if tx.blocking_send(item).is_err() {
            debug!("Batch consumer went away");
            break;
        }

        if failed {
            break;
        }
    }

    info!(step = iter.state().step, "Prefetch producer stopped");
}

/// True once a stop was sent or the sender is gone
fn stop_requested(shutdown_rx: &mut ShutdownReceiver) -> bool {
    !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty))
}

/// Batch source honoring the configured prefetch depth
#[derive(Debug)]
pub enum BatchSource {
    /// Batches prepared on the consumer's thread
    Direct(DatasetIterator),

    /// Batches prepared ahead on a producer thread
    Prefetched(Prefetcher),
}

impl BatchSource {
    /// Wrap `iter`, spawning a producer if `prefetch_depth` is set
    pub fn from_iterator(iter: DatasetIterator) -> Result<Self> {
        match iter.config().prefetch_depth {
            Some(depth) => Ok(BatchSource::Prefetched(Prefetcher::spawn(iter, depth)?)),
            None => Ok(BatchSource::Direct(iter)),
        }
    }

    /// Returns true if batches are prepared on a separate thread
    pub fn is_prefetching(&self) -> bool {
        matches!(self, BatchSource::Prefetched(_))
    }
}

impl Iterator for BatchSource {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            BatchSource::Direct(iter) => iter.next(),
            BatchSource::Prefetched(prefetcher) => prefetcher.next(),
        }
    }
}
