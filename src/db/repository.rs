use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{LeadTime, NewSubscription, Subscription};

use super::schema::SCHEMA;

/// UTC timestamps are stored as text with millisecond precision.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Durable store for reminder subscriptions.
///
/// Every call runs as a single closure on the connection's worker thread, so
/// each operation is atomic with respect to concurrent callers.
#[derive(Clone)]
pub struct Repository {
    conn: Connection,
}

impl Repository {
    pub async fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        Ok(Self { conn })
    }

    /// Inserts a subscription; an existing row with the same natural key is kept as is.
    pub async fn create_subscription(&self, sub: NewSubscription) -> Result<()> {
        self.conn
            .call(move |conn| {
                conn.execute(
                    r#"INSERT INTO alerts (band, time, min, telegramid)
                       VALUES (?1, ?2, ?3, ?4)
                       ON CONFLICT(telegramid, band, min) DO NOTHING"#,
                    params![
                        sub.performance,
                        format_timestamp(sub.due_at),
                        sub.lead,
                        sub.subscriber,
                    ],
                )?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    /// Returns the number of rows removed; zero is not an error.
    pub async fn delete_subscription(
        &self,
        subscriber: i64,
        performance: &str,
        lead: LeadTime,
    ) -> Result<usize> {
        let performance = performance.to_string();
        let removed = self
            .conn
            .call(move |conn| {
                let removed = conn.execute(
                    "DELETE FROM alerts WHERE telegramid = ?1 AND band = ?2 AND min = ?3",
                    params![subscriber, performance, lead],
                )?;
                Ok(removed)
            })
            .await?;
        Ok(removed)
    }

    pub async fn find_by_subscriber_and_performance(
        &self,
        subscriber: i64,
        performance: &str,
    ) -> Result<Vec<LeadTime>> {
        let performance = performance.to_string();
        let leads = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT min FROM alerts WHERE telegramid = ?1 AND band = ?2 ORDER BY min",
                )?;
                let leads = stmt
                    .query_map(params![subscriber, performance], |row| row.get(0))?
                    .collect::<std::result::Result<Vec<LeadTime>, _>>()?;
                Ok(leads)
            })
            .await?;
        Ok(leads)
    }

    /// Every subscription where `now >= time - min minutes`.
    pub async fn find_ready(&self, now: DateTime<Utc>) -> Result<Vec<Subscription>> {
        let now = format_timestamp(now);
        let subs = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, telegramid, band, min, time
                       FROM alerts
                       WHERE strftime('%Y-%m-%d %H:%M:%f', time, '-' || min || ' minutes') <= ?1
                       ORDER BY time, min DESC"#,
                )?;
                let mut subs = Vec::new();
                for row in stmt.query_map(params![now], subscription_from_row)? {
                    // A malformed row must not hold back every other reminder
                    match row {
                        Ok(sub) => subs.push(sub),
                        Err(e) => tracing::warn!("Skipping unreadable reminder row: {}", e),
                    }
                }
                Ok(subs)
            })
            .await?;
        Ok(subs)
    }

    pub async fn count(&self) -> Result<i64> {
        let count = self
            .conn
            .call(|conn| {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
                Ok(count)
            })
            .await?;
        Ok(count)
    }
}

fn format_timestamp(dt: DateTime<Utc>) -> String {
    dt.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // SQLite datetime text, with or without fractional seconds
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    // Try RFC3339 (e.g., "2024-08-15T18:00:00+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    None
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let time: String = row.get(4)?;
    let due_at = parse_datetime(&time).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            4,
            Type::Text,
            format!("invalid timestamp {time:?}").into(),
        )
    })?;

    Ok(Subscription {
        id: row.get(0)?,
        subscriber: row.get(1)?,
        performance: row.get(2)?,
        lead: row.get(3)?,
        due_at,
    })
}
