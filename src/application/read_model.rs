use std::future::Future;
use tokio::sync::RwLock;

/// A value fetched from a remote source on first use and kept until
/// explicitly invalidated.
#[derive(Debug, Default)]
pub struct ReadThrough<T> {
    value: RwLock<Option<T>>,
}

impl<T: Clone> ReadThrough<T> {
    pub fn new() -> Self {
        Self {
            value: RwLock::new(None),
        }
    }

    /// Returns the cached value, fetching it with `fetch` when empty.
    ///
    /// A failed fetch leaves the cache empty.
    pub async fn get_or_fetch<F, Fut, E>(&self, fetch: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if let Some(value) = self.value.read().await.as_ref() {
            return Ok(value.clone());
        }

        let mut slot = self.value.write().await;
        // Another reader may have filled it while we waited for the lock.
        if let Some(value) = slot.as_ref() {
            return Ok(value.clone());
        }
        let value = fetch().await?;
        *slot = Some(value.clone());
        Ok(value)
    }

    pub async fn invalidate(&self) {
        self.value.write().await.take();
    }
}
