use std::sync::{Mutex, MutexGuard, PoisonError};

/// Append-only accumulator shared between producers and a single drainer.
#[derive(Debug)]
pub struct SampleBuffer<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for SampleBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SampleBuffer<T> {
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }

    pub fn append(&self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        self.lock().extend(items);
    }

    /// Detaches everything appended so far and leaves the buffer empty.
    pub fn drain(&self) -> Vec<T> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // A producer panicking mid-append cannot leave the Vec half-written,
    // so a poisoned lock still guards consistent data.
    fn lock(&self) -> MutexGuard<'_, Vec<T>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
