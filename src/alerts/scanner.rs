use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use tokio::time::MissedTickBehavior;

use crate::db::Repository;
use crate::error::{AppError, Result};
use crate::models::Subscription;
use crate::services::Notifier;

#[derive(Debug, Clone)]
pub struct ScannerSettings {
    pub interval: Duration,
    pub delivery_timeout: Duration,
    pub max_concurrent_deliveries: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub ready: usize,
    pub delivered: usize,
    pub failed: usize,
}

enum Outcome {
    Delivered,
    Failed,
}

/// Periodically delivers ready reminders and removes the delivered ones.
///
/// A reminder whose delivery fails stays in the store and is picked up again
/// by the next tick. There is no retry cap.
pub struct ReminderScanner {
    repository: Repository,
    notifier: Arc<dyn Notifier>,
    settings: ScannerSettings,
}

impl ReminderScanner {
    pub fn new(repository: Repository, notifier: Arc<dyn Notifier>, settings: ScannerSettings) -> Self {
        Self {
            repository,
            notifier,
            settings,
        }
    }

    /// Start the scan loop. Each tick runs to completion before the next one
    /// is scheduled, so ticks never overlap.
    pub fn run(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            tracing::info!(
                "Reminder scanner started (every {:?})",
                self.settings.interval
            );
            let mut interval = tokio::time::interval(self.settings.interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;
                match self.tick(Utc::now()).await {
                    Ok(report) if report.ready > 0 => tracing::info!(
                        "Reminder tick: {} ready, {} delivered, {} failed",
                        report.ready,
                        report.delivered,
                        report.failed
                    ),
                    Ok(_) => tracing::debug!("Reminder tick: nothing ready"),
                    Err(e) => tracing::error!("Failed to query ready reminders: {}", e),
                }
            }
        })
    }

    /// One scan: deliver everything ready at `now`.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let ready = self.repository.find_ready(now).await?;
        let mut report = TickReport {
            ready: ready.len(),
            ..TickReport::default()
        };

        let outcomes: Vec<Outcome> = stream::iter(ready)
            .map(|sub| self.process(sub))
            .buffer_unordered(self.settings.max_concurrent_deliveries.max(1))
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Delivered => report.delivered += 1,
                Outcome::Failed => report.failed += 1,
            }
        }
        Ok(report)
    }

    async fn process(&self, sub: Subscription) -> Outcome {
        if let Err(e) = self.deliver(&sub).await {
            tracing::warn!(
                "Failed to send {} reminder for {:?} to {}, retrying next tick: {}",
                sub.lead.label(),
                sub.performance,
                sub.subscriber,
                e
            );
            return Outcome::Failed;
        }

        match self
            .repository
            .delete_subscription(sub.subscriber, &sub.performance, sub.lead)
            .await
        {
            Ok(_) => tracing::info!(
                "{} reminder for {:?} sent to {}",
                sub.lead.label(),
                sub.performance,
                sub.subscriber
            ),
            // The message went out; the row stays and will be sent again next tick
            Err(e) => tracing::error!(
                "Sent {} reminder #{} for {:?} to {} but could not remove it: {}",
                sub.lead.label(),
                sub.id,
                sub.performance,
                sub.subscriber,
                e
            ),
        }
        Outcome::Delivered
    }

    async fn deliver(&self, sub: &Subscription) -> Result<()> {
        let timeout = self.settings.delivery_timeout;
        let text = sub.message();
        tokio::time::timeout(timeout, self.notifier.send(sub.subscriber, &text))
            .await
            .map_err(|_| AppError::DeliveryTimeout(timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use tempfile::TempDir;

    use crate::models::{LeadTime, NewSubscription};

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(i64, String)>>,
        failing: Mutex<HashSet<i64>>,
    }

    impl RecordingNotifier {
        fn set_failing(&self, subscriber: i64, failing: bool) {
            let mut set = self.failing.lock().unwrap();
            if failing {
                set.insert(subscriber);
            } else {
                set.remove(&subscriber);
            }
        }

        fn sent(&self) -> Vec<(i64, String)> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, subscriber: i64, text: &str) -> Result<()> {
            if self.failing.lock().unwrap().contains(&subscriber) {
                return Err(AppError::Telegram("Forbidden: bot was blocked by the user".to_string()));
            }
            self.sent.lock().unwrap().push((subscriber, text.to_string()));
            Ok(())
        }
    }

    struct HangingNotifier;

    #[async_trait]
    impl Notifier for HangingNotifier {
        async fn send(&self, _subscriber: i64, _text: &str) -> Result<()> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        }
    }

    fn settings() -> ScannerSettings {
        ScannerSettings {
            interval: Duration::from_secs(180),
            delivery_timeout: Duration::from_millis(100),
            max_concurrent_deliveries: 5,
        }
    }

    fn at(hour: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 15, hour, min, 0).unwrap()
    }

    async fn repository_with_alpha(subscribers: &[i64]) -> (Repository, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new(dir.path().join("alerts.db").to_str().unwrap())
            .await
            .unwrap();
        for &subscriber in subscribers {
            repo.create_subscription(NewSubscription {
                subscriber,
                performance: "Alpha".to_string(),
                lead: LeadTime::Min30,
                due_at: at(20, 0),
            })
            .await
            .unwrap();
        }
        (repo, dir)
    }

    #[tokio::test]
    async fn delivered_reminder_is_consumed_once() {
        let (repo, _dir) = repository_with_alpha(&[42]).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = ReminderScanner::new(repo.clone(), notifier.clone(), settings());

        let early = scanner.tick(at(19, 29)).await.unwrap();
        assert_eq!(early, TickReport::default());

        let report = scanner.tick(at(19, 31)).await.unwrap();
        assert_eq!(report, TickReport { ready: 1, delivered: 1, failed: 0 });
        assert_eq!(repo.count().await.unwrap(), 0);

        let again = scanner.tick(at(19, 32)).await.unwrap();
        assert_eq!(again.ready, 0);
        assert_eq!(
            notifier.sent(),
            vec![(42, "🔔 30 minutes until \"Alpha\"".to_string())]
        );
    }

    #[tokio::test]
    async fn failed_delivery_is_retried_next_tick() {
        let (repo, _dir) = repository_with_alpha(&[42]).await;
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = ReminderScanner::new(repo.clone(), notifier.clone(), settings());

        notifier.set_failing(42, true);
        let report = scanner.tick(at(19, 31)).await.unwrap();
        assert_eq!(report, TickReport { ready: 1, delivered: 0, failed: 1 });
        assert_eq!(repo.find_ready(at(19, 31)).await.unwrap().len(), 1);

        notifier.set_failing(42, false);
        let report = scanner.tick(at(19, 34)).await.unwrap();
        assert_eq!(report.delivered, 1);
        assert_eq!(repo.count().await.unwrap(), 0);
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn one_failure_does_not_block_others() {
        let (repo, _dir) = repository_with_alpha(&[1, 2, 3, 4, 5, 6, 7]).await;
        let notifier = Arc::new(RecordingNotifier::default());
        notifier.set_failing(4, true);
        let scanner = ReminderScanner::new(repo.clone(), notifier.clone(), settings());

        let report = scanner.tick(at(19, 45)).await.unwrap();

        assert_eq!(report, TickReport { ready: 7, delivered: 6, failed: 1 });
        let remaining = repo.find_ready(at(19, 45)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].subscriber, 4);
    }

    #[tokio::test]
    async fn malformed_row_does_not_block_others() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alerts.db");
        let repo = Repository::new(path.to_str().unwrap()).await.unwrap();
        repo.create_subscription(NewSubscription {
            subscriber: 42,
            performance: "Alpha".to_string(),
            lead: LeadTime::Min30,
            due_at: at(20, 0),
        })
        .await
        .unwrap();
        // 10 minutes is not a lead time the bot offers
        rusqlite::Connection::open(&path)
            .unwrap()
            .execute(
                "INSERT INTO alerts (band, time, min, telegramid) VALUES ('Beta', '2024-08-15 18:00:00', 10, 7)",
                [],
            )
            .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());
        let scanner = ReminderScanner::new(repo.clone(), notifier.clone(), settings());

        let report = scanner.tick(at(19, 31)).await.unwrap();

        assert_eq!(report, TickReport { ready: 1, delivered: 1, failed: 0 });
        assert_eq!(
            notifier.sent(),
            vec![(42, "🔔 30 minutes until \"Alpha\"".to_string())]
        );
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn hung_delivery_times_out_and_is_kept() {
        let (repo, _dir) = repository_with_alpha(&[42]).await;
        let scanner = ReminderScanner::new(repo.clone(), Arc::new(HangingNotifier), settings());

        let report = tokio::time::timeout(Duration::from_secs(5), scanner.tick(at(19, 31)))
            .await
            .expect("tick should not hang")
            .unwrap();

        assert_eq!(report.failed, 1);
        assert_eq!(repo.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn run_delivers_on_first_tick() {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::new(dir.path().join("alerts.db").to_str().unwrap())
            .await
            .unwrap();
        // already due in wall-clock time
        repo.create_subscription(NewSubscription {
            subscriber: 42,
            performance: "Alpha".to_string(),
            lead: LeadTime::Min5,
            due_at: Utc::now() - chrono::Duration::minutes(1),
        })
        .await
        .unwrap();
        let notifier = Arc::new(RecordingNotifier::default());

        let handle = ReminderScanner::new(repo.clone(), notifier.clone(), settings()).run();

        let mut delivered = false;
        for _ in 0..50 {
            if repo.count().await.unwrap() == 0 {
                delivered = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        handle.abort();

        assert!(delivered);
        assert_eq!(notifier.sent(), vec![(42, "🔔 5 minutes until \"Alpha\"".to_string())]);
    }
}
