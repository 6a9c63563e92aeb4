// exposed API of the queue

use super::{
    error::*,
    relay::Relay,
    spawn::{spawn_relay, spawn_relay_in},
};
use crate::util::atomic_take::AtomicTake;
use std::sync::Arc;
use tokio::{
    runtime::Handle,
    sync::{
        mpsc::{self, error::TryRecvError},
        oneshot,
    },
};


// capacity of the input and output handoff slots. a tuning constant, not a bound on how many
// values the queue holds.
const SLOT_CAPACITY: usize = 16;


// state shared between producers and the closer.
struct Shared {
    // sender half of the single-use close signal. taken by whoever closes the queue.
    close: AtomicTake<oneshot::Sender<()>>,
}

impl Shared {
    // whether close has been requested.
    fn close_requested(&self) -> bool {
        !self.close.is_some()
    }
}

// report a submit after close and abort the calling path.
fn submit_after_close() -> ! {
    error!("submit called after the queue was closed");
    panic!("relay_queue: misuse of unbounded queue, submit after close");
}


// ==== the exposed API ====


/// Unbounded multi-producer, single-consumer FIFO queue
///
/// Producers never wait for the queue to have room. A background relay task owns the growable
/// buffer and moves values from producers to the consumer through two small handoff slots. Values
/// come out in the order their submission completed, across all producers.
///
/// The relay starts on construction. [`close`](Self::close) stops intake and flushes buffered
/// values to the consumer on a best-effort basis: whatever does not fit into the output slot at
/// that moment is dropped. After that, [`receive`](Self::receive) returns `None` forever.
///
/// Dropping the queue has the same effect as closing it.
pub struct UnboundedQueue<T> {
    producer: Producer<T>,
    consumer: Consumer<T>,
    closer: Closer,
}

impl<T: Send + 'static> UnboundedQueue<T> {
    /// Create a queue and start its relay
    ///
    /// The relay is spawned onto the current tokio runtime if there is one. Otherwise it runs on a
    /// dedicated thread with its own single-threaded runtime.
    pub fn new() -> Self {
        let (queue, relay) = Self::unstarted();
        spawn_relay(relay);
        queue
    }

    /// Create a queue and start its relay on the given tokio runtime
    pub fn new_in(handle: &Handle) -> Self {
        let (queue, relay) = Self::unstarted();
        spawn_relay_in(relay, handle);
        queue
    }

    // construct the handles and the relay that serves them.
    fn unstarted() -> (Self, Relay<T>) {
        let (in_send, in_recv) = mpsc::channel(SLOT_CAPACITY);
        let (out_send, out_recv) = mpsc::channel(SLOT_CAPACITY);
        let (close_send, close_recv) = oneshot::channel();

        let shared = Arc::new(Shared { close: AtomicTake::some(close_send) });
        let queue = UnboundedQueue {
            producer: Producer { input: in_send, shared: Arc::clone(&shared) },
            consumer: Consumer { output: out_recv, finished: false },
            closer: Closer { shared },
        };
        let relay = Relay::new(in_recv, out_send, close_recv);
        (queue, relay)
    }
}

impl<T> UnboundedQueue<T> {
    /// Create another producer handle for this queue
    pub fn producer(&self) -> Producer<T> {
        self.producer.clone()
    }

    /// Split into the producer, consumer, and closer halves
    pub fn into_parts(self) -> (Producer<T>, Consumer<T>, Closer) {
        (self.producer, self.consumer, self.closer)
    }

    /// See [`Producer::submit`]
    pub fn submit(&self, value: T) {
        self.producer.submit(value)
    }

    /// See [`Producer::submit_async`]
    pub async fn submit_async(&self, value: T) {
        self.producer.submit_async(value).await
    }

    /// See [`Producer::try_submit`]
    pub fn try_submit(&self, value: T) -> Result<(), SubmitError<T>> {
        self.producer.try_submit(value)
    }

    /// See [`Consumer::receive`]
    pub fn receive(&mut self) -> Option<T> {
        self.consumer.receive()
    }

    /// See [`Consumer::receive_async`]
    pub async fn receive_async(&mut self) -> Option<T> {
        self.consumer.receive_async().await
    }

    /// See [`Consumer::try_receive`]
    pub fn try_receive(&mut self) -> Result<Option<T>, WouldBlockError> {
        self.consumer.try_receive()
    }

    /// See [`Closer::close`]
    pub fn close(&self) {
        self.closer.close()
    }

    /// Whether this queue has been closed
    pub fn is_closed(&self) -> bool {
        self.producer.is_closed()
    }
}

impl<T: Send + 'static> Default for UnboundedQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}


/// Producer handle to an [`UnboundedQueue`]
///
/// Cheap to clone. Any number of producers may submit concurrently.
pub struct Producer<T> {
    input: mpsc::Sender<T>,
    shared: Arc<Shared>,
}

impl<T> Producer<T> {
    /// Submit a value, blocking the calling thread only while the input slot is momentarily full
    ///
    /// The queue itself never runs out of room.
    ///
    /// # Panics
    ///
    /// Panics if the queue has been closed. Racing `submit` against `close` without external
    /// coordination is a usage error. Use [`try_submit`](Self::try_submit) to find out about
    /// closure without panicking.
    ///
    /// Also panics if called from within an asynchronous execution context. Use
    /// [`submit_async`](Self::submit_async) there.
    pub fn submit(&self, value: T) {
        if self.try_submit(value).is_err() {
            submit_after_close();
        }
    }

    /// Submit a value, waiting asynchronously while the input slot is momentarily full
    ///
    /// # Panics
    ///
    /// Panics if the queue has been closed, like [`submit`](Self::submit).
    pub async fn submit_async(&self, value: T) {
        if self.shared.close_requested() || self.input.send(value).await.is_err() {
            submit_after_close();
        }
    }

    /// Submit a value, or give it back if the queue has been closed
    ///
    /// Blocks like [`submit`](Self::submit).
    pub fn try_submit(&self, value: T) -> Result<(), SubmitError<T>> {
        if self.shared.close_requested() {
            return Err(SubmitError::closed(value));
        }
        self.input
            .blocking_send(value)
            .map_err(|mpsc::error::SendError(value)| SubmitError::closed(value))
    }

    /// Whether the queue has been closed
    ///
    /// Once this returns true, it never returns false again.
    pub fn is_closed(&self) -> bool {
        self.shared.close_requested() || self.input.is_closed()
    }
}

impl<T> Clone for Producer<T> {
    fn clone(&self) -> Self {
        Producer {
            input: self.input.clone(),
            shared: Arc::clone(&self.shared),
        }
    }
}


/// Consumer handle to an [`UnboundedQueue`]
///
/// There is exactly one consumer per queue. Receiving takes `&mut self`, so it cannot be shared
/// between concurrent receivers without external synchronization.
pub struct Consumer<T> {
    output: mpsc::Receiver<T>,
    // once true, the queue is closed and drained, and every receive returns none.
    finished: bool,
}

impl<T> Consumer<T> {
    // record the terminal state if reached.
    fn observe(&mut self, opt_value: Option<T>) -> Option<T> {
        if opt_value.is_none() {
            self.finished = true;
        }
        opt_value
    }

    /// Block until a value is available, or return `None` if the queue is closed and drained
    ///
    /// Once this returns `None`, it returns `None` forever.
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context. Use
    /// [`receive_async`](Self::receive_async) there.
    pub fn receive(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        let opt_value = self.output.blocking_recv();
        self.observe(opt_value)
    }

    /// Wait until a value is available, or return `None` if the queue is closed and drained
    ///
    /// Cancel safe. To receive with a timeout, race this against a timer.
    pub async fn receive_async(&mut self) -> Option<T> {
        if self.finished {
            return None;
        }
        let opt_value = self.output.recv().await;
        self.observe(opt_value)
    }

    /// Receive a value if one is available immediately
    ///
    /// Returns `Ok(None)` if the queue is closed and drained.
    pub fn try_receive(&mut self) -> Result<Option<T>, WouldBlockError> {
        if self.finished {
            return Ok(None);
        }
        match self.output.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(TryRecvError::Empty) => Err(WouldBlockError),
            Err(TryRecvError::Disconnected) => Ok(self.observe(None)),
        }
    }

    /// Whether the queue has been closed and drained
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

#[cfg(feature = "futures")]
impl<T> futures::stream::Stream for Consumer<T> {
    type Item = T;

    fn poll_next(
        self: std::pin::Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Option<T>> {
        let this = self.get_mut();
        if this.finished {
            return std::task::Poll::Ready(None);
        }
        this.output.poll_recv(cx).map(|opt_value| this.observe(opt_value))
    }
}

#[cfg(feature = "futures")]
impl<T> futures::stream::FusedStream for Consumer<T> {
    fn is_terminated(&self) -> bool {
        self.finished
    }
}


/// Handle for closing an [`UnboundedQueue`]
///
/// Closing is single-use. Dropping the closer without calling [`close`](Self::close) closes the
/// queue too.
pub struct Closer {
    shared: Arc<Shared>,
}

impl Closer {
    /// Close the queue
    ///
    /// Stops intake and flushes buffered values to the consumer. Returns once shutdown has been
    /// requested, without waiting for the flush. Values that do not fit into the output slot at
    /// flush time are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the queue has already been closed.
    pub fn close(&self) {
        let Some(signal) = self.shared.close.take() else {
            error!("close called on an already closed queue");
            panic!("relay_queue: misuse of unbounded queue, close called more than once");
        };
        // err means the relay already stopped because every producer was dropped
        let _ = signal.send(());
    }

    /// Whether the queue has been closed
    pub fn is_closed(&self) -> bool {
        self.shared.close_requested()
    }
}

impl Drop for Closer {
    fn drop(&mut self) {
        if let Some(signal) = self.shared.close.take() {
            trace!("closer dropped, closing queue");
            let _ = signal.send(());
        }
    }
}


// ==== tests ====
