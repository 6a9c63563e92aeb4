//! Unbounded multi-producer, single-consumer FIFO queue.
//!
//! See [`UnboundedQueue`].

#[macro_use]
extern crate tracing;

mod queue;
mod util;
mod cache;

pub use crate::{
    queue::api::*,
    cache::MemoCache,
};

/// Error types
pub mod error {
    pub use crate::queue::error::*;
}
