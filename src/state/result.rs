use crate::error::Result;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::Duration;

/// Write-once result of a background operation that any number of callers
/// can wait on.
#[derive(Debug)]
pub struct OperationResult<T> {
    shared: Arc<Shared<T>>,
}

#[derive(Debug)]
struct Shared<T> {
    value: Mutex<Option<Result<T>>>,
    ready: Condvar,
}

impl<T> Clone for OperationResult<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone> Default for OperationResult<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> OperationResult<T> {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                value: Mutex::new(None),
                ready: Condvar::new(),
            }),
        }
    }

    pub(crate) fn resolved(value: Result<T>) -> Self {
        let result = Self::new();
        result.resolve(value);
        result
    }

    /// Store the outcome. Only the first call has an effect.
    pub(crate) fn resolve(&self, value: Result<T>) -> bool {
        let mut slot = self.shared.value.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        self.shared.ready.notify_all();
        true
    }

    /// Block until the operation resolves.
    pub fn wait(&self) -> Result<T> {
        let mut slot = self.shared.value.lock();
        loop {
            if let Some(value) = slot.as_ref() {
                return value.clone();
            }
            self.shared.ready.wait(&mut slot);
        }
    }

    /// Block for at most `timeout`; `None` if still unresolved.
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<T>> {
        let mut slot = self.shared.value.lock();
        if slot.is_none() {
            self.shared.ready.wait_while_for(&mut slot, |v| v.is_none(), timeout);
        }
        slot.clone()
    }

    pub fn try_get(&self) -> Option<Result<T>> {
        self.shared.value.lock().clone()
    }

    pub fn is_resolved(&self) -> bool {
        self.shared.value.lock().is_some()
    }
}
