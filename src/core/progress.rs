//! Progress Tracker: the single mutable pointer per (profile, plan).
//!
//! Completion bookkeeping and pointer movement are separate steps on purpose:
//! `mark_completed` only stamps the timestamp, advancement happens either via
//! `auto_advance_if_stale` on the next workout date or explicitly through the
//! day-change flow.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use sqlx::{SqliteConnection, SqlitePool};

use crate::core::dates::{next_day_index, workout_date};
use crate::models::PlanProgress;

pub async fn get_or_create(
    pool: &SqlitePool,
    profile_id: &str,
    plan_id: &str,
) -> Result<PlanProgress> {
    sqlx::query(
        "INSERT OR IGNORE INTO plan_progress (profile_id, plan_id, current_day_index) VALUES (?, ?, 1)",
    )
    .bind(profile_id)
    .bind(plan_id)
    .execute(pool)
    .await?;

    let progress = sqlx::query_as::<_, PlanProgress>(
        "SELECT * FROM plan_progress WHERE profile_id = ? AND plan_id = ?",
    )
    .bind(profile_id)
    .bind(plan_id)
    .fetch_one(pool)
    .await?;

    Ok(progress)
}

pub async fn get(
    pool: &SqlitePool,
    profile_id: &str,
    plan_id: &str,
) -> Result<Option<PlanProgress>> {
    let progress = sqlx::query_as::<_, PlanProgress>(
        "SELECT * FROM plan_progress WHERE profile_id = ? AND plan_id = ?",
    )
    .bind(profile_id)
    .bind(plan_id)
    .fetch_optional(pool)
    .await?;

    Ok(progress)
}

/// Stamp the completion time. Does not move the pointer.
pub async fn mark_completed(
    pool: &SqlitePool,
    profile_id: &str,
    plan_id: &str,
    now: DateTime<Local>,
) -> Result<()> {
    sqlx::query(
        "UPDATE plan_progress SET last_completed_at = ? WHERE profile_id = ? AND plan_id = ?",
    )
    .bind(now)
    .bind(profile_id)
    .bind(plan_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// One-step advance with 1-based wrap-around. Returns the new index.
pub async fn advance_day_index(
    pool: &SqlitePool,
    profile_id: &str,
    plan_id: &str,
    day_count: i64,
) -> Result<i64> {
    let progress = get_or_create(pool, profile_id, plan_id).await?;
    let next = next_day_index(progress.current_day_index, day_count);

    sqlx::query(
        "UPDATE plan_progress SET current_day_index = ? WHERE profile_id = ? AND plan_id = ?",
    )
    .bind(next)
    .bind(profile_id)
    .bind(plan_id)
    .execute(pool)
    .await?;

    Ok(next)
}

/// Point the pointer at an explicit day, stamping the guard date so the
/// pointer is anchored to `today`. Runs inside the caller's transaction;
/// used by the skip-and-advance day change.
pub async fn set_day_index(
    conn: &mut SqliteConnection,
    profile_id: &str,
    plan_id: &str,
    day_index: i64,
    today: NaiveDate,
) -> Result<()> {
    sqlx::query(
        "UPDATE plan_progress SET current_day_index = ?, last_advanced_for_date = ? \
         WHERE profile_id = ? AND plan_id = ?",
    )
    .bind(day_index)
    .bind(today)
    .bind(profile_id)
    .bind(plan_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// The workout date the pointer currently "belongs to". Projections and the
/// staleness check share this definition so they cannot disagree.
pub fn reference_date(
    last_completed_at: Option<DateTime<Local>>,
    last_advanced_for_date: Option<NaiveDate>,
    transition_hour: u8,
    today: NaiveDate,
) -> NaiveDate {
    last_advanced_for_date
        .or_else(|| last_completed_at.map(|t| workout_date(t, transition_hour)))
        .unwrap_or(today)
}

/// Advance the pointer once when a completed day lies behind today's workout
/// date. Guarded by `last_advanced_for_date`: repeated calls within the same
/// workout date (or on later dates without a new completion) are no-ops.
/// Returns true when an advance happened.
pub async fn auto_advance_if_stale(
    pool: &SqlitePool,
    profile_id: &str,
    plan_id: &str,
    day_count: i64,
    transition_hour: u8,
    today: NaiveDate,
) -> Result<bool> {
    let progress = get_or_create(pool, profile_id, plan_id).await?;

    let Some(completed_at) = progress.last_completed_at else {
        return Ok(false);
    };
    let completed_date = workout_date(completed_at, transition_hour);
    if completed_date >= today {
        return Ok(false);
    }

    // Already advanced since that completion.
    if let Some(advanced_for) = progress.last_advanced_for_date {
        if advanced_for > completed_date {
            return Ok(false);
        }
    }

    let next = next_day_index(progress.current_day_index, day_count);
    sqlx::query(
        "UPDATE plan_progress SET current_day_index = ?, last_advanced_for_date = ? \
         WHERE profile_id = ? AND plan_id = ?",
    )
    .bind(next)
    .bind(today)
    .bind(profile_id)
    .bind(plan_id)
    .execute(pool)
    .await?;

    Ok(true)
}
