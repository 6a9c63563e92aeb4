//! Low-level concurrency utility.

use std::{
    cell::UnsafeCell,
    mem::MaybeUninit,
    sync::atomic::{
        Ordering::{Acquire, AcqRel},
        AtomicBool,
    },
};

/// Like an atomic `Option<T>` that can be `take`n once.
///
/// Used to make a single-use signal out of something that could otherwise be fired twice.
pub(crate) struct AtomicTake<T> {
    // val is initialized if is_some is true. the thread that transitions it from true to false
    // claims the right to read it and take ownership of it.
    is_some: AtomicBool,
    val: UnsafeCell<MaybeUninit<T>>,
}

impl<T> AtomicTake<T> {
    /// Construct with a value.
    pub(crate) const fn some(val: T) -> Self {
        AtomicTake {
            is_some: AtomicBool::new(true),
            val: UnsafeCell::new(MaybeUninit::new(val)),
        }
    }

    /// Try to atomically take the value.
    ///
    /// Returns `Some` for exactly one caller over the lifetime of the cell.
    pub(crate) fn take(&self) -> Option<T> {
        if self.is_some.swap(false, AcqRel) {
            // safety: we won the swap, so nobody else will ever read val.
            Some(unsafe { (*self.val.get()).as_ptr().read() })
        } else {
            None
        }
    }

    /// Whether the value has not been taken yet.
    pub(crate) fn is_some(&self) -> bool {
        self.is_some.load(Acquire)
    }
}

impl<T> Drop for AtomicTake<T> {
    fn drop(&mut self) {
        // make sure the value gets dropped if not yet taken
        drop(self.take());
    }
}

// safety: access to val is serialized by the is_some swap, and the value only ever moves out.
unsafe impl<T: Send> Send for AtomicTake<T> {}
unsafe impl<T: Send> Sync for AtomicTake<T> {}


#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        sync::{Arc, atomic::{AtomicUsize, Ordering::Relaxed}},
        thread,
    };

    #[test]
    fn take_once_across_threads() {
        let cell = Arc::new(AtomicTake::some(7u32));
        let wins = Arc::new(AtomicUsize::new(0));
        let joins = (0..8)
            .map(|_| {
                let cell = Arc::clone(&cell);
                let wins = Arc::clone(&wins);
                thread::spawn(move || {
                    if let Some(n) = cell.take() {
                        assert_eq!(n, 7);
                        wins.fetch_add(1, Relaxed);
                    }
                })
            })
            .collect::<Vec<_>>();
        for join in joins {
            join.join().unwrap();
        }
        assert_eq!(wins.load(Relaxed), 1);
        assert!(!cell.is_some());
    }

    #[test]
    fn drops_untaken_value() {
        let marker = Arc::new(());
        let cell = AtomicTake::some(Arc::clone(&marker));
        assert_eq!(Arc::strong_count(&marker), 2);
        drop(cell);
        assert_eq!(Arc::strong_count(&marker), 1);
    }
}
