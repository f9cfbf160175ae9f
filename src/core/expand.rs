//! Plan Expander: one-shot materialization of a plan-day template into a
//! workout day's entries and pending sets.

use anyhow::Result;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::models::PlanExercise;
use crate::types::Source;

/// Materialize `plan_day_id` into `workout_day_id` within an open
/// transaction. Returns false without touching anything when the day already
/// has entries — the emptiness precondition is what makes re-entry from the
/// resolver (e.g. a second `day show` on the same date) harmless.
pub async fn expand_into(
    conn: &mut SqliteConnection,
    plan_day_id: &str,
    workout_day_id: &str,
) -> Result<bool> {
    let existing: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM workout_entries WHERE workout_day_id = ?")
            .bind(workout_day_id)
            .fetch_one(&mut *conn)
            .await?;

    if existing > 0 {
        return Ok(false);
    }

    // Template order; grouped exercises are already contiguous blocks there.
    let template = sqlx::query_as::<_, PlanExercise>(
        "SELECT * FROM plan_exercises WHERE plan_day_id = ? ORDER BY order_index",
    )
    .bind(plan_day_id)
    .fetch_all(&mut *conn)
    .await?;

    for planned in &template {
        let entry_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO workout_entries (id, workout_day_id, exercise_id, order_index, source, planned_sets) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry_id)
        .bind(workout_day_id)
        .bind(&planned.exercise_id)
        .bind(planned.order_index)
        .bind(Source::Routine)
        .bind(planned.sets)
        .execute(&mut *conn)
        .await?;

        for set_index in 1..=planned.sets {
            sqlx::query(
                "INSERT INTO workout_sets \
                   (id, entry_id, set_index, weight, reps, duration_secs, distance_m, completed, deleted) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, 0, 0)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&entry_id)
            .bind(set_index)
            .bind(planned.target_weight)
            .bind(planned.target_reps)
            .bind(planned.target_duration_secs)
            .bind(planned.target_distance_m)
            .execute(&mut *conn)
            .await?;
        }
    }

    Ok(true)
}

/// Standalone expansion in its own transaction.
pub async fn expand(pool: &SqlitePool, plan_day_id: &str, workout_day_id: &str) -> Result<bool> {
    let mut tx = pool.begin().await?;
    let expanded = expand_into(&mut tx, plan_day_id, workout_day_id).await?;
    tx.commit().await?;
    Ok(expanded)
}
