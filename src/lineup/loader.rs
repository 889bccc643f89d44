use std::path::Path;

use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};

use crate::error::{AppError, Result};
use crate::models::{LineupEntry, Performance};

use super::Lineup;

/// Reads a schedule file and builds the day-grouped lineup.
///
/// Entries carry only a month/day and a wall-clock time, so the festival year
/// and UTC offset come from configuration.
pub fn load_lineup_file(path: &Path, year: i32, offset: FixedOffset) -> Result<Lineup> {
    let content = std::fs::read_to_string(path)?;
    let entries: Vec<LineupEntry> = serde_json::from_str(&content)?;
    let lineup = parse_entries(entries, year, offset)?;

    tracing::info!(
        "Loaded {} performances over {} days from {:?}",
        lineup.len(),
        lineup.days().len(),
        path
    );
    Ok(lineup)
}

pub fn parse_entries(entries: Vec<LineupEntry>, year: i32, offset: FixedOffset) -> Result<Lineup> {
    if entries.is_empty() {
        return Err(AppError::Lineup("lineup contains no performances".to_string()));
    }

    let performances = entries
        .into_iter()
        .map(|entry| {
            let raw = format!("{} {} {}", year, entry.date.trim(), entry.time.trim());
            let naive = NaiveDateTime::parse_from_str(&raw, "%Y %B %d %H:%M").map_err(|e| {
                AppError::Lineup(format!("invalid start time for {:?} ({raw}): {e}", entry.band))
            })?;
            let start = offset
                .from_local_datetime(&naive)
                .single()
                .ok_or_else(|| AppError::Lineup(format!("ambiguous start time {raw}")))?
                .with_timezone(&Utc);

            Ok(Performance {
                id: 0,
                name: entry.band,
                start,
                stage: entry.stage,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Lineup::new(performances, offset))
}
