use arc_swap::ArcSwap;
use std::sync::Arc;

/// Latest-value cell shared between threads.
///
/// Writers replace the whole value; readers get an `Arc` to whichever
/// complete value was current at load time, never a partial update.
pub struct LatestCell<T> {
    inner: Arc<ArcSwap<T>>,
}

impl<T> Clone for LatestCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> LatestCell<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(value)),
        }
    }

    pub fn load(&self) -> Arc<T> {
        self.inner.load_full()
    }

    pub fn store(&self, value: T) {
        self.inner.store(Arc::new(value));
    }

    /// Store a value and return the one it replaced
    pub fn replace(&self, value: T) -> Arc<T> {
        self.inner.swap(Arc::new(value))
    }
}

impl<T: Copy> LatestCell<T> {
    pub fn get(&self) -> T {
        **self.inner.load()
    }
}

impl<T: Default> Default for LatestCell<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_readers_keep_their_snapshot() {
        let cell = LatestCell::new(vec![1, 2, 3]);
        let snapshot = cell.load();

        cell.store(vec![4]);

        assert_eq!(*snapshot, vec![1, 2, 3]);
        assert_eq!(*cell.load(), vec![4]);
    }

    #[test]
    fn test_replace_returns_previous() {
        let cell = LatestCell::new(1u8);
        assert_eq!(*cell.replace(2), 1);
        assert_eq!(cell.get(), 2);
    }

    #[test]
    fn test_whole_value_swaps_across_threads() {
        let cell: LatestCell<Vec<u32>> = LatestCell::default();
        let writer = cell.clone();

        let handle = thread::spawn(move || {
            for n in 1..200u32 {
                writer.store((0..n).collect());
            }
        });

        // Every observed list is complete: 0..n with no gaps
        for _ in 0..200 {
            let list = cell.load();
            assert!(list.iter().enumerate().all(|(i, v)| i as u32 == *v));
        }
        handle.join().unwrap();
        assert_eq!(cell.load().len(), 199);
    }
}
