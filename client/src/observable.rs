use tokio::sync::watch;

/// A value that changes over time.
///
/// Readers get the latest value synchronously with [`Observable::get`];
/// observers created with [`Observable::watch`] are woken on every
/// update. Dropping the `Observable` closes it: pending observers see
/// the last value and then learn the stream has ended.
#[derive(Debug)]
pub struct Observable<T> {
    tx: watch::Sender<T>,
}

impl<T: Clone> Observable<T> {
    pub fn new(initial: T) -> Self {
        let (tx, _) = watch::channel(initial);
        Self { tx }
    }

    pub fn get(&self) -> T {
        self.tx.borrow().clone()
    }

    /// Publish a new value, even when nobody is observing
    pub fn set(&self, value: T) {
        self.tx.send_replace(value);
    }

    /// Publish only when `value` differs from the current one.
    /// Returns whether observers were notified.
    pub fn set_if_changed(&self, value: T) -> bool
    where
        T: PartialEq,
    {
        self.tx.send_if_modified(|current| {
            if *current == value {
                return false;
            }
            *current = value;
            true
        })
    }

    pub fn watch(&self) -> watch::Receiver<T> {
        self.tx.subscribe()
    }

    pub fn observer_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
