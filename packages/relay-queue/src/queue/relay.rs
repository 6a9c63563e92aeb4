// the relay task.
//
// the relay owns the growable buffer and bridges the bounded input slot to the bounded output
// slot. it is the only writer of queue state, which is why the buffer is not behind a lock.

use super::buffer::RelayBuffer;
use tokio::{
    select,
    sync::{mpsc, oneshot},
};


// relay task state.
pub(crate) struct Relay<T> {
    // receiving end of the input slot.
    input: mpsc::Receiver<T>,
    // sending end of the output slot.
    output: mpsc::Sender<T>,
    // single-use close signal. resolves with err if the closer was dropped, which also counts.
    close: oneshot::Receiver<()>,
    // elements accepted from input and not yet handed to output.
    buf: RelayBuffer<T>,
    // whether the consumer was dropped while the queue was still active. once true, buf stays
    // empty and input is discarded as it arrives.
    consumer_gone: bool,
}

// something the relay loop woke up for.
enum Event<T> {
    // an element arrived, or none if every producer is gone.
    Input(Option<T>),
    // the front element was handed to output.
    Delivered,
    // the consumer was dropped.
    ConsumerGone,
    // close was requested, or the closer was dropped.
    Close,
}

impl<T> Relay<T> {
    pub(crate) fn new(
        input: mpsc::Receiver<T>,
        output: mpsc::Sender<T>,
        close: oneshot::Receiver<()>,
    ) -> Self {
        Relay {
            input,
            output,
            close,
            buf: RelayBuffer::new(),
            consumer_gone: false,
        }
    }

    // run the relay loop until closed, then run the close protocol.
    pub(crate) async fn run(mut self) {
        trace!("relay started");
        loop {
            let event = if self.buf.is_empty() {
                // nothing to deliver, so only input or close can make progress
                select! {
                    opt_elem = self.input.recv() => Event::Input(opt_elem),
                    _ = &mut self.close => Event::Close,
                }
            } else {
                // deliver the front, accept more, or close. whichever is ready first.
                //
                // the front element is only removed once an output permit is held, so losing
                // the race against another branch never loses an element.
                select! {
                    res = self.output.reserve() => match res {
                        Ok(permit) => {
                            if let Some(elem) = self.buf.pop_front() {
                                permit.send(elem);
                            }
                            Event::Delivered
                        }
                        Err(_) => Event::ConsumerGone,
                    },
                    opt_elem = self.input.recv() => Event::Input(opt_elem),
                    _ = &mut self.close => Event::Close,
                }
            };

            match event {
                Event::Input(Some(elem)) => self.accept(elem),
                Event::Input(None) => {
                    debug!("all producers dropped, finishing queue");
                    self.finish().await;
                    break;
                }
                Event::Delivered => {
                    if self.buf.maybe_realloc() {
                        trace!("reallocated relay buffer");
                    }
                }
                Event::ConsumerGone => self.on_consumer_gone(),
                Event::Close => {
                    debug!("close requested");
                    break;
                }
            }
        }
        self.shutdown().await;
    }

    // no more input can arrive. the queue is still open, so everything buffered is delivered,
    // waiting on the consumer as long as it takes. a close request arriving meanwhile cuts this
    // short and leaves the rest to the close protocol.
    async fn finish(&mut self) {
        while !self.buf.is_empty() {
            let consumer_gone = select! {
                res = self.output.reserve() => match res {
                    Ok(permit) => {
                        if let Some(elem) = self.buf.pop_front() {
                            permit.send(elem);
                        }
                        false
                    }
                    Err(_) => true,
                },
                _ = &mut self.close => {
                    debug!("close requested while finishing");
                    return;
                }
            };
            if consumer_gone {
                self.on_consumer_gone();
                return;
            }
        }
    }

    // take an element from input.
    fn accept(&mut self, elem: T) {
        if self.consumer_gone {
            drop(elem);
        } else {
            self.buf.push_back(elem);
        }
    }

    // the output slot's receiver was dropped.
    fn on_consumer_gone(&mut self) {
        let discarded = self.buf.drain().count();
        debug!(discarded, "consumer dropped, discarding buffered values");
        self.consumer_gone = true;
    }

    // the close protocol. consumes the relay, so it can only ever run once.
    //
    // 1. the close signal is consumed (and released when this returns).
    // 2. input is closed. producers blocked on a full input slot wake up and observe closure.
    // 3. elements already in flight are drained into buf.
    // 4. buf is flushed to output without blocking. the first element that cannot be delivered
    //    ends the flush, and it and everything behind it is discarded. delivered elements are
    //    always a prefix of buf.
    // 5. output is dropped, so the consumer sees the end once it drains the output slot.
    async fn shutdown(self) {
        let Relay { mut input, output, close: _close, mut buf, consumer_gone } = self;

        input.close();
        while let Some(elem) = input.recv().await {
            if !consumer_gone {
                buf.push_back(elem);
            }
        }

        let mut delivered = 0usize;
        let mut discarded = 0usize;
        let mut elems = buf.drain();
        for elem in elems.by_ref() {
            match output.try_send(elem) {
                Ok(()) => delivered += 1,
                Err(_) => {
                    discarded += 1;
                    break;
                }
            }
        }
        discarded += elems.count();
        drop(output);

        if discarded > 0 {
            debug!(delivered, discarded, "discarded undelivered values on close");
        } else {
            trace!(delivered, "flushed all values on close");
        }
        trace!("relay stopped");
    }
}
