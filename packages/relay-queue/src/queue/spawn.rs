// deciding where the relay task runs.

use super::relay::Relay;
use tokio::runtime::{Builder, Handle};
use std::thread;


// name of the dedicated thread used when no runtime is available.
const RELAY_THREAD_NAME: &str = "relay-queue";


// spawn the relay onto the current tokio runtime if there is one, or onto a dedicated thread
// otherwise.
pub(crate) fn spawn_relay<T: Send + 'static>(relay: Relay<T>) {
    match Handle::try_current() {
        Ok(handle) => spawn_relay_in(relay, &handle),
        Err(_) => spawn_relay_thread(relay),
    }
}

// spawn the relay onto the given tokio runtime.
pub(crate) fn spawn_relay_in<T: Send + 'static>(relay: Relay<T>, handle: &Handle) {
    // detached. the relay ends on its own once closed.
    drop(handle.spawn(relay.run()));
}

// spawn the relay onto a dedicated thread running a single-threaded tokio runtime.
//
// both the runtime and the thread are set up before returning, so a failure surfaces at
// construction rather than as a closed queue later.
fn spawn_relay_thread<T: Send + 'static>(relay: Relay<T>) {
    let rt = match Builder::new_current_thread().build() {
        Ok(rt) => rt,
        Err(e) => {
            // same footing as a failed allocation
            error!(%e, "failed to build relay runtime");
            panic!("relay_queue: failed to build relay runtime: {}", e);
        }
    };
    let spawned = thread::Builder::new()
        .name(RELAY_THREAD_NAME.into())
        .spawn(move || rt.block_on(relay.run()));
    if let Err(e) = spawned {
        error!(%e, "failed to spawn relay thread");
        panic!("relay_queue: failed to spawn relay thread: {}", e);
    }
}
