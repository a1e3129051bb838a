use parking_lot::Mutex;
use std::mem;

/// Accumulates items produced by a running operation until a poller drains
/// them with [`DeltaBuffer::flush`].
#[derive(Debug)]
pub struct DeltaBuffer<T> {
    items: Mutex<Vec<T>>,
}

impl<T> Default for DeltaBuffer<T> {
    fn default() -> Self {
        Self {
            items: Mutex::new(Vec::new()),
        }
    }
}

impl<T> DeltaBuffer<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, item: T) {
        self.items.lock().push(item);
    }

    pub fn extend(&self, items: impl IntoIterator<Item = T>) {
        self.items.lock().extend(items);
    }

    /// Take everything accumulated since the previous flush.
    pub fn flush(&self) -> Vec<T> {
        mem::take(&mut *self.items.lock())
    }

    pub fn len(&self) -> usize {
        self.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.lock().is_empty()
    }
}
