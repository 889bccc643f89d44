use std::sync::Arc;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::lineup::Lineup;
use crate::models::{LeadTime, NewSubscription};

/// Applies enable/disable intents for one (subscriber, performance, lead time).
#[derive(Clone)]
pub struct AlertService {
    repository: Repository,
    lineup: Arc<Lineup>,
}

impl AlertService {
    pub fn new(repository: Repository, lineup: Arc<Lineup>) -> Self {
        Self { repository, lineup }
    }

    /// Enables or disables one reminder and returns every lead time the
    /// subscriber now holds for the performance, as read back from the store.
    pub async fn set_reminder(
        &self,
        subscriber: i64,
        performance: &str,
        lead: LeadTime,
        enable: bool,
    ) -> Result<Vec<LeadTime>> {
        if enable {
            let due_at = self
                .lineup
                .resolve(performance)
                .ok_or_else(|| AppError::UnknownPerformance(performance.to_string()))?;

            self.repository
                .create_subscription(NewSubscription {
                    subscriber,
                    performance: performance.to_string(),
                    lead,
                    due_at,
                })
                .await?;
            tracing::debug!("{} enabled {:?} reminder for {:?}", subscriber, lead, performance);
        } else {
            let removed = self
                .repository
                .delete_subscription(subscriber, performance, lead)
                .await?;
            tracing::debug!(
                "{} disabled {:?} reminder for {:?} ({} removed)",
                subscriber,
                lead,
                performance,
                removed
            );
        }

        self.current_reminders(subscriber, performance).await
    }

    pub async fn current_reminders(&self, subscriber: i64, performance: &str) -> Result<Vec<LeadTime>> {
        self.repository
            .find_by_subscriber_and_performance(subscriber, performance)
            .await
    }
}
