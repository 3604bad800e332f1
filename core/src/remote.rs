//! Client-side contract for the remote document store.

use std::future::Future;
use std::sync::Arc;

use crate::models::Snapshot;

/// Every user shares this one document.
pub const DOCUMENT_ID: &str = "user_1";

/// Whole-document read and replace against remote storage. Neither method
/// retries; failures are reported through the return value, never raised.
pub trait RemoteStore: Send + Sync + 'static {
    /// `None` means "no remote data", including any failure to fetch it.
    fn fetch_remote(&self) -> impl Future<Output = Option<Snapshot>> + Send;

    /// `true` only when the store acknowledged the write.
    fn push_remote(&self, snapshot: &Snapshot) -> impl Future<Output = bool> + Send;
}

impl<R: RemoteStore> RemoteStore for Arc<R> {
    fn fetch_remote(&self) -> impl Future<Output = Option<Snapshot>> + Send {
        (**self).fetch_remote()
    }

    fn push_remote(&self, snapshot: &Snapshot) -> impl Future<Output = bool> + Send {
        (**self).push_remote(snapshot)
    }
}


#[cfg(test)]
pub(crate) use memory::MemoryRemote;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DailyLog, History, parse_date_key};

    fn snapshot(water: u32) -> Snapshot {
        Snapshot {
            history: History::new().with_log(
                parse_date_key("2024-04-01").unwrap(),
                DailyLog {
                    water_intake: water,
                    ..DailyLog::default()
                },
            ),
            ..Snapshot::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_empty_store_is_none() {
        let remote = MemoryRemote::new();
        assert!(remote.fetch_remote().await.is_none());
    }

    #[tokio::test]
    async fn test_push_replaces_document() {
        let remote = MemoryRemote::with_document(snapshot(100));
        assert!(remote.push_remote(&snapshot(200)).await);
        assert!(remote.push_remote(&snapshot(300)).await);
        assert_eq!(remote.fetch_remote().await, Some(snapshot(300)));
        assert_eq!(remote.push_count(), 2);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let remote = MemoryRemote::with_document(snapshot(100));
        remote.set_failing(true);
        assert!(!remote.push_remote(&snapshot(200)).await);
        assert!(remote.fetch_remote().await.is_none());
        assert_eq!(remote.push_count(), 1);
        assert!(remote.pushes().is_empty());

        remote.set_failing(false);
        assert_eq!(remote.fetch_remote().await, Some(snapshot(100)));
    }
}
