pub const SCHEMA: &str = r#"
-- alerts table (one row per subscriber, performance and lead time)
CREATE TABLE IF NOT EXISTS alerts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    band TEXT NOT NULL,
    time DATETIME NOT NULL,
    min INTEGER NOT NULL,
    telegramid INTEGER NOT NULL
);

-- older databases have no natural key; keep the first row of each duplicate set
DELETE FROM alerts
WHERE id NOT IN (SELECT MIN(id) FROM alerts GROUP BY telegramid, band, min);

CREATE UNIQUE INDEX IF NOT EXISTS idx_alerts_natural_key ON alerts(telegramid, band, min);
CREATE INDEX IF NOT EXISTS idx_alerts_time ON alerts(time);
"#;
