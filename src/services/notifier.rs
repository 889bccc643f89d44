use async_trait::async_trait;

use crate::error::Result;

/// Outbound delivery of reminder text to a subscriber.
///
/// Any error, including a timeout, means the reminder is retried on the
/// next scan.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, subscriber: i64, text: &str) -> Result<()>;
}
