//! A mutex-guarded double-ended queue: the sole synchronization surface
//! between the host's I/O threads, the interpreter thread, and the callback
//! thread for one interpreter's traffic.

use std::collections::VecDeque;
use std::sync::Mutex;

pub struct MutexLockQueue<T> {
    inner: Mutex<VecDeque<T>>,
    closed: Mutex<bool>,
}

impl<T> MutexLockQueue<T> {
    pub fn new() -> MutexLockQueue<T> {
        MutexLockQueue {
            inner: Mutex::new(VecDeque::new()),
            closed: Mutex::new(false),
        }
    }

    pub fn push_back(&self, item: T) {
        self.inner.lock().unwrap().push_back(item);
    }

    pub fn pop_front(&self) -> Option<T> {
        self.inner.lock().unwrap().pop_front()
    }

    pub fn push_front(&self, item: T) {
        self.inner.lock().unwrap().push_front(item);
    }

    pub fn drain_all(&self) -> Vec<T> {
        self.inner.lock().unwrap().drain(..).collect()
    }

    pub fn extend_back(&self, items: impl IntoIterator<Item = T>) {
        self.inner.lock().unwrap().extend(items);
    }

    pub fn extend_front(&self, items: impl IntoIterator<Item = T>) {
        let mut guard = self.inner.lock().unwrap();
        let mut rebuilt: VecDeque<T> = items.into_iter().collect();
        rebuilt.extend(guard.drain(..));
        *guard = rebuilt;
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().is_empty()
    }

    /// Marks no further items will ever be pushed (e.g. the peer half-closed).
    pub fn close(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock().unwrap()
    }
}

impl<T> Default for MutexLockQueue<T> {
    fn default() -> Self {
        MutexLockQueue::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order() {
        let q: MutexLockQueue<i32> = MutexLockQueue::new();
        q.push_back(1);
        q.push_back(2);
        assert_eq!(q.pop_front(), Some(1));
        assert_eq!(q.pop_front(), Some(2));
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn push_front_reinserts_unconsumed_head() {
        let q: MutexLockQueue<u8> = MutexLockQueue::new();
        q.extend_back([1u8, 2, 3]);
        let drained = q.drain_all();
        assert_eq!(drained, vec![1, 2, 3]);
        q.extend_front(drained[1..].iter().copied());
        assert_eq!(q.drain_all(), vec![2, 3]);
    }
}
