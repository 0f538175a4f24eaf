//! Dedicated producer thread feeding a bounded queue.

use crate::{Error, ErrorContext, Result};
use futures::{Stream, StreamExt};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

use super::BridgeConfig;

/// Queue message. Exactly one terminal variant ends every healthy stream.
enum Envelope<T> {
    Chunk(T),
    Done,
    Failed(Error),
    Cancelled,
}

#[derive(Debug)]
struct State {
    /// Worker thread has not exited yet.
    alive: bool,
    stop_requested: bool,
    chunks_forwarded: u64,
}

/// State shared between the consumer, stop handles and the worker.
#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    /// Wakes the worker when a stop is requested, even mid-await.
    stop: Notify,
    /// Signalled by the consumer after taking a message off the queue.
    space: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn stop_requested(&self) -> bool {
        self.lock().stop_requested
    }

    fn request_stop(&self, id: Uuid) {
        let mut st = self.lock();
        if !st.stop_requested {
            st.stop_requested = true;
            if st.alive {
                tracing::debug!(bridge_id = %id, "stream bridge stop requested");
            }
        }
        drop(st);
        // A stored permit covers a worker that is not parked yet.
        self.stop.notify_one();
    }
}

/// Cloneable handle for stopping a bridge from another thread.
#[derive(Clone)]
pub struct StopHandle {
    id: Uuid,
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Ask the producer to stop. A producer parked on an await is woken.
    pub fn stop(&self) {
        self.shared.request_stop(self.id);
    }

    /// Whether the worker thread is still alive. Stays true after
    /// [`stop`](Self::stop) until the worker has actually exited.
    pub fn is_running(&self) -> bool {
        self.shared.lock().alive
    }
}

/// Clears `alive` however the worker exits, including by panic.
struct AliveGuard(Arc<Shared>);

impl Drop for AliveGuard {
    fn drop(&mut self) {
        self.0.lock().alive = false;
    }
}

/// Synchronous view over an asynchronous chunk producer.
///
/// The producer runs to completion on its own OS thread with a private
/// current-thread runtime. The consumer pulls chunks in emission order with
/// [`next_chunk`](Self::next_chunk), which blocks for at most
/// [`BridgeConfig::chunk_timeout`].
pub struct StreamBridge<T> {
    id: Uuid,
    rx: Receiver<Envelope<T>>,
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    chunk_timeout: Duration,
    finished: bool,
}

impl<T: Send + 'static> StreamBridge<T> {
    /// Start driving `producer` on a new worker thread.
    pub fn spawn<S>(producer: S, cfg: &BridgeConfig) -> Result<Self>
    where
        S: Stream<Item = Result<T>> + Send + 'static,
    {
        cfg.validate()?;
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::sync_channel(cfg.queue_capacity);
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                alive: true,
                stop_requested: false,
                chunks_forwarded: 0,
            }),
            stop: Notify::new(),
            space: Notify::new(),
        });

        let worker_shared = Arc::clone(&shared);
        let worker = std::thread::Builder::new()
            .name(format!("nt-bridge-{}", &id.simple().to_string()[..8]))
            .spawn(move || run_producer(id, producer, tx, worker_shared))?;

        tracing::debug!(
            bridge_id = %id,
            queue_capacity = cfg.queue_capacity,
            chunk_timeout_ms = cfg.chunk_timeout.as_millis() as u64,
            "stream bridge started"
        );

        Ok(Self {
            id,
            rx,
            shared,
            worker: Some(worker),
            chunk_timeout: cfg.chunk_timeout,
            finished: false,
        })
    }
}

impl<T> StreamBridge<T> {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Block until the next chunk arrives.
    ///
    /// - `Ok(Some(chunk))` for each produced chunk, in order
    /// - `Ok(None)` once the producer completed; also for every call after any terminal result
    /// - `Err(e)` with the producer's own error, [`Error::Cancelled`] after [`stop`](Self::stop),
    ///   [`Error::StreamTimeout`] if the producer stayed silent too long, or
    ///   [`Error::StreamInterrupted`] if it died without finishing
    pub fn next_chunk(&mut self) -> Result<Option<T>> {
        if self.finished {
            return Ok(None);
        }
        let received = self.rx.recv_timeout(self.chunk_timeout);
        if received.is_ok() {
            self.shared.space.notify_one();
        }
        match received {
            Ok(Envelope::Chunk(chunk)) => Ok(Some(chunk)),
            Ok(Envelope::Done) => {
                self.finished = true;
                Ok(None)
            }
            Ok(Envelope::Failed(e)) => {
                self.finished = true;
                Err(e)
            }
            Ok(Envelope::Cancelled) => {
                self.finished = true;
                Err(Error::Cancelled)
            }
            Err(RecvTimeoutError::Timeout) => {
                self.finished = true;
                self.stop();
                tracing::warn!(
                    bridge_id = %self.id,
                    waited_ms = self.chunk_timeout.as_millis() as u64,
                    "stream bridge timed out waiting for producer"
                );
                Err(Error::StreamTimeout {
                    waited: self.chunk_timeout,
                })
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.finished = true;
                tracing::error!(bridge_id = %self.id, "stream producer exited without a terminal message");
                Err(Error::StreamInterrupted)
            }
        }
    }

    /// Request cooperative cancellation. The worker is never killed.
    pub fn stop(&self) {
        self.stop_handle().stop();
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            id: self.id,
            shared: Arc::clone(&self.shared),
        }
    }

    /// Whether the producer thread is still alive.
    pub fn is_running(&self) -> bool {
        self.shared.lock().alive
    }

    pub fn chunks_forwarded(&self) -> u64 {
        self.shared.lock().chunks_forwarded
    }

    /// True once a terminal result has been returned to the consumer.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl<T> Iterator for StreamBridge<T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_chunk().transpose()
    }
}

impl<T> Drop for StreamBridge<T> {
    fn drop(&mut self) {
        self.stop();
        // Disconnect the queue now so a worker waiting for space sees it on wake-up.
        let (_, detached) = mpsc::sync_channel(0);
        drop(std::mem::replace(&mut self.rx, detached));
        self.shared.space.notify_one();
        if let Some(worker) = self.worker.take() {
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}

fn run_producer<T, S>(id: Uuid, producer: S, tx: SyncSender<Envelope<T>>, shared: Arc<Shared>)
where
    S: Stream<Item = Result<T>> + Send + 'static,
    T: Send + 'static,
{
    let _guard = AliveGuard(Arc::clone(&shared));

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            let _ = tx.send(Envelope::Failed(Error::runtime_with_context(
                "failed to build stream bridge runtime",
                ErrorContext::new()
                    .with_details(e.to_string())
                    .with_source("stream_bridge"),
            )));
            return;
        }
    };

    let terminal = rt.block_on(async {
        let mut producer = Box::pin(producer);
        loop {
            if shared.stop_requested() {
                return Some(Envelope::Cancelled);
            }
            let item = tokio::select! {
                biased;
                _ = shared.stop.notified() => return Some(Envelope::Cancelled),
                item = producer.next() => item,
            };
            match item {
                Some(Ok(chunk)) => {
                    if shared.stop_requested() {
                        return Some(Envelope::Cancelled);
                    }
                    match forward(&tx, &shared, Envelope::Chunk(chunk), true).await {
                        Forward::Sent => shared.lock().chunks_forwarded += 1,
                        Forward::Stopped => return Some(Envelope::Cancelled),
                        Forward::Disconnected => return None,
                    }
                }
                Some(Err(e)) => return Some(Envelope::Failed(e)),
                None => return Some(Envelope::Done),
            }
        }
    });

    let outcome = match &terminal {
        Some(Envelope::Done) => "completed",
        Some(Envelope::Failed(_)) => "failed",
        Some(Envelope::Cancelled) => "cancelled",
        _ => "consumer gone",
    };
    tracing::debug!(
        bridge_id = %id,
        chunks = shared.lock().chunks_forwarded,
        outcome,
        "stream producer finished"
    );

    if let Some(msg) = terminal {
        rt.block_on(forward(&tx, &shared, msg, false));
    }
}

enum Forward {
    Sent,
    Stopped,
    Disconnected,
}

/// Push into the bounded queue without parking the runtime thread.
///
/// On a full queue the worker sleeps until the consumer takes a message
/// (or drops the bridge). With `cancellable`, a stop request also ends the wait.
async fn forward<T>(
    tx: &SyncSender<Envelope<T>>,
    shared: &Shared,
    mut msg: Envelope<T>,
    cancellable: bool,
) -> Forward {
    loop {
        match tx.try_send(msg) {
            Ok(()) => return Forward::Sent,
            Err(TrySendError::Full(back)) => {
                msg = back;
                if cancellable {
                    tokio::select! {
                        biased;
                        _ = shared.stop.notified() => return Forward::Stopped,
                        _ = shared.space.notified() => {}
                    }
                } else {
                    shared.space.notified().await;
                }
            }
            Err(TrySendError::Disconnected(_)) => return Forward::Disconnected,
        }
    }
}
