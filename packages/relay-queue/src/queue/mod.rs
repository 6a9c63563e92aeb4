// implementation of the unbounded queue.
//
// the architecture is a single-writer relay rather than a locked shared buffer:
//
//     Producer --\
//     Producer ---+--> input slot --> Relay --> output slot --> Consumer
//     Producer --/    (mpsc, 16)        |       (mpsc, 16)
//                                       |
//                                  RelayBuffer
//
// - the two slots are small bounded tokio mpsc channels. they synchronize, they do not store
//   backlog.
// - the relay task is the only thing that ever touches the RelayBuffer, so the buffer needs no
//   lock. that buffer is where the unboundedness lives.
// - closing is a oneshot signal whose sender sits in an AtomicTake, so it can fire at most once.
//   when the relay observes it, it runs the close protocol, which consumes the relay.
//
// the organization of these modules is as such:
//
//      buffer<----relay<----spawn<----api: handles exposed publically. the crate re-exports
//                   ^                  |   this API.
//                   \------------------/
//
// there is also the error module, which contains the relevant error types, which is also
// re-exported publically.

pub(crate) mod error;
pub(crate) mod api;

mod buffer;
mod relay;
mod spawn;
