//! Day-Change Transactor: user-initiated jump to a different day of the
//! current plan, with full undo.
//!
//! The change snapshots the workout day (routine pointers, every entry, every
//! set) into `day_change_undo` before re-pointing and re-expanding, all in one
//! transaction. Undo replays the snapshot atomically; entries whose exercise
//! has vanished in the meantime are skipped so the day never ends up with
//! dangling references.

use anyhow::Result;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::core::{expand, progress, rotate};
use crate::models::{Plan, PlanDay, Profile, WorkoutDay, WorkoutEntry, WorkoutSet};
use crate::types::{ExecutionMode, Source};

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotSet {
    set_index: i64,
    weight: Option<f64>,
    reps: Option<i64>,
    duration_secs: Option<i64>,
    distance_m: Option<f64>,
    completed: bool,
    deleted: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SnapshotEntry {
    exercise_id: String,
    order_index: i64,
    source: Source,
    planned_sets: i64,
    sets: Vec<SnapshotSet>,
}

/// Progress pointer as it stood before a skip-and-advance.
#[derive(Debug, Serialize, Deserialize)]
enum SnapshotPointer {
    Single {
        profile_id: String,
        plan_id: String,
        day_index: i64,
        last_advanced_for_date: Option<NaiveDate>,
    },
    Cycle {
        cycle_id: String,
        item_index: i64,
        day_index: i64,
        last_advanced_for_date: Option<NaiveDate>,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    prev_mode: Source,
    prev_routine_plan_id: Option<String>,
    prev_routine_day_id: Option<String>,
    prev_pointer: Option<SnapshotPointer>,
    entries: Vec<SnapshotEntry>,
}

/// The plan the profile is currently training under, with its cycle handle
/// when in cycle mode.
enum PlanContext {
    Single(Plan),
    Cycle { cycle_id: String, plan: Plan },
}

impl PlanContext {
    fn plan(&self) -> &Plan {
        match self {
            Self::Single(plan) => plan,
            Self::Cycle { plan, .. } => plan,
        }
    }
}

async fn plan_context(pool: &SqlitePool, profile: &Profile) -> Result<Option<PlanContext>> {
    match profile.execution_mode {
        ExecutionMode::Single => {
            let Some(plan_id) = &profile.active_plan_id else {
                return Ok(None);
            };
            let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ?")
                .bind(plan_id)
                .fetch_optional(pool)
                .await?;
            Ok(plan.map(PlanContext::Single))
        }
        ExecutionMode::Cycle => {
            let Some(cycle) = rotate::get_active_cycle(pool, &profile.id).await? else {
                return Ok(None);
            };
            let items = rotate::items(pool, &cycle.id).await?;
            if items.is_empty() {
                return Ok(None);
            }
            let p = rotate::get_or_create_progress(pool, &cycle.id).await?;
            let idx = p.current_item_index.rem_euclid(items.len() as i64) as usize;
            let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ?")
                .bind(&items[idx].plan_id)
                .fetch_optional(pool)
                .await?;
            Ok(plan.map(|plan| PlanContext::Cycle {
                cycle_id: cycle.id,
                plan,
            }))
        }
    }
}

async fn plan_total_days(pool: &SqlitePool, plan_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_days WHERE plan_id = ?")
        .bind(plan_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

async fn completed_set_count(pool: &SqlitePool, workout_day_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM workout_sets s \
         JOIN workout_entries e ON e.id = s.entry_id \
         WHERE e.workout_day_id = ? AND s.completed = 1 AND s.deleted = 0",
    )
    .bind(workout_day_id)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// A day change is permitted only when the active plan has somewhere to go
/// (more than one day) and the target workout day carries no completed work.
/// A date with no workout day yet is always changeable.
pub async fn can_change_day(
    pool: &SqlitePool,
    profile: &Profile,
    date: NaiveDate,
) -> Result<bool> {
    let Some(ctx) = plan_context(pool, profile).await? else {
        return Ok(false);
    };
    if plan_total_days(pool, &ctx.plan().id).await? <= 1 {
        return Ok(false);
    }

    match crate::core::resolver::get_workout_day(pool, &profile.id, date).await? {
        Some(day) => Ok(completed_set_count(pool, &day.id).await? == 0),
        None => Ok(true),
    }
}

async fn snapshot_entries(pool: &SqlitePool, workout_day_id: &str) -> Result<Vec<SnapshotEntry>> {
    let entries = sqlx::query_as::<_, WorkoutEntry>(
        "SELECT * FROM workout_entries WHERE workout_day_id = ? ORDER BY order_index",
    )
    .bind(workout_day_id)
    .fetch_all(pool)
    .await?;

    let mut snapped = Vec::with_capacity(entries.len());
    for entry in entries {
        let sets = sqlx::query_as::<_, WorkoutSet>(
            "SELECT * FROM workout_sets WHERE entry_id = ? ORDER BY set_index",
        )
        .bind(&entry.id)
        .fetch_all(pool)
        .await?;

        snapped.push(SnapshotEntry {
            exercise_id: entry.exercise_id,
            order_index: entry.order_index,
            source: entry.source,
            planned_sets: entry.planned_sets,
            sets: sets
                .into_iter()
                .map(|s| SnapshotSet {
                    set_index: s.set_index,
                    weight: s.weight,
                    reps: s.reps,
                    duration_secs: s.duration_secs,
                    distance_m: s.distance_m,
                    completed: s.completed,
                    deleted: s.deleted,
                })
                .collect(),
        });
    }

    Ok(snapped)
}

/// Re-point `date`'s workout day at `new_day_index` of the current plan,
/// replacing its entries with a fresh expansion. With `skip_and_advance` the
/// progress pointer is moved to the target day as well. Returns false (and
/// changes nothing) when there is no plan context, the index is out of range,
/// or completed work would be discarded.
pub async fn change_day(
    pool: &SqlitePool,
    profile: &Profile,
    date: NaiveDate,
    today: NaiveDate,
    new_day_index: i64,
    skip_and_advance: bool,
) -> Result<bool> {
    let Some(ctx) = plan_context(pool, profile).await? else {
        return Ok(false);
    };
    let plan = ctx.plan().clone();

    let total = plan_total_days(pool, &plan.id).await?;
    if total <= 1 || new_day_index < 1 || new_day_index > total {
        return Ok(false);
    }

    let target_day = sqlx::query_as::<_, PlanDay>(
        "SELECT * FROM plan_days WHERE plan_id = ? AND day_index = ?",
    )
    .bind(&plan.id)
    .bind(new_day_index)
    .fetch_optional(pool)
    .await?;
    let Some(target_day) = target_day else {
        return Ok(false);
    };

    let workout =
        crate::core::resolver::get_or_create_workout_day(pool, profile, date, today).await?;
    if completed_set_count(pool, &workout.id).await? > 0 {
        return Ok(false);
    }

    let prev_pointer = if skip_and_advance {
        match &ctx {
            PlanContext::Single(plan) => {
                let p = progress::get_or_create(pool, &profile.id, &plan.id).await?;
                Some(SnapshotPointer::Single {
                    profile_id: profile.id.clone(),
                    plan_id: plan.id.clone(),
                    day_index: p.current_day_index,
                    last_advanced_for_date: p.last_advanced_for_date,
                })
            }
            PlanContext::Cycle { cycle_id, .. } => {
                let p = rotate::get_or_create_progress(pool, cycle_id).await?;
                Some(SnapshotPointer::Cycle {
                    cycle_id: cycle_id.clone(),
                    item_index: p.current_item_index,
                    day_index: p.current_day_index,
                    last_advanced_for_date: p.last_advanced_for_date,
                })
            }
        }
    } else {
        None
    };

    let snapshot = Snapshot {
        prev_mode: workout.mode,
        prev_routine_plan_id: workout.routine_plan_id.clone(),
        prev_routine_day_id: workout.routine_day_id.clone(),
        prev_pointer,
        entries: snapshot_entries(pool, &workout.id).await?,
    };
    let payload = serde_json::to_string(&snapshot)?;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO day_change_undo (id, workout_day_id, payload) VALUES (?, ?, ?)")
        .bind(Uuid::new_v4().to_string())
        .bind(&workout.id)
        .bind(&payload)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM workout_entries WHERE workout_day_id = ?")
        .bind(&workout.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE workout_days SET mode = ?, routine_plan_id = ?, routine_day_id = ? WHERE id = ?",
    )
    .bind(Source::Routine)
    .bind(&plan.id)
    .bind(&target_day.id)
    .bind(&workout.id)
    .execute(&mut *tx)
    .await?;

    expand::expand_into(&mut tx, &target_day.id, &workout.id).await?;

    // A day change never leaves the current plan, so the cycle's item index
    // is carried over from the snapshot unchanged.
    match &snapshot.prev_pointer {
        Some(SnapshotPointer::Single { plan_id, .. }) => {
            progress::set_day_index(&mut tx, &profile.id, plan_id, new_day_index, today).await?;
        }
        Some(SnapshotPointer::Cycle {
            cycle_id,
            item_index,
            ..
        }) => {
            rotate::set_position(&mut tx, cycle_id, *item_index, new_day_index, today).await?;
        }
        None => {}
    }

    tx.commit().await?;
    Ok(true)
}

/// Replay the newest snapshot for `workout_day_id`: previous routine
/// pointers, entries and sets exactly as they were (completion flags
/// included), and the progress pointer when skip-and-advance was used.
/// Atomic; returns false when there is nothing to undo.
pub async fn undo(pool: &SqlitePool, workout_day_id: &str) -> Result<bool> {
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT id, payload FROM day_change_undo WHERE workout_day_id = ? \
         ORDER BY created_at DESC, rowid DESC LIMIT 1",
    )
    .bind(workout_day_id)
    .fetch_optional(pool)
    .await?;
    let Some((undo_id, payload)) = row else {
        return Ok(false);
    };

    let Ok(snapshot) = serde_json::from_str::<Snapshot>(&payload) else {
        // Corrupt payload: leave the day untouched rather than half-restore.
        return Ok(false);
    };

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM workout_entries WHERE workout_day_id = ?")
        .bind(workout_day_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE workout_days SET mode = ?, routine_plan_id = ?, routine_day_id = ? WHERE id = ?",
    )
    .bind(snapshot.prev_mode)
    .bind(&snapshot.prev_routine_plan_id)
    .bind(&snapshot.prev_routine_day_id)
    .bind(workout_day_id)
    .execute(&mut *tx)
    .await?;

    for entry in &snapshot.entries {
        // Best effort: an exercise deleted since the snapshot is skipped so
        // the restored day never references a missing row.
        let exists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM exercises WHERE id = ?")
            .bind(&entry.exercise_id)
            .fetch_one(&mut *tx)
            .await?;
        if exists == 0 {
            continue;
        }

        let entry_id = Uuid::new_v4().to_string();
        sqlx::query(
            "INSERT INTO workout_entries (id, workout_day_id, exercise_id, order_index, source, planned_sets) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&entry_id)
        .bind(workout_day_id)
        .bind(&entry.exercise_id)
        .bind(entry.order_index)
        .bind(entry.source)
        .bind(entry.planned_sets)
        .execute(&mut *tx)
        .await?;

        for set in &entry.sets {
            sqlx::query(
                "INSERT INTO workout_sets \
                   (id, entry_id, set_index, weight, reps, duration_secs, distance_m, completed, deleted) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&entry_id)
            .bind(set.set_index)
            .bind(set.weight)
            .bind(set.reps)
            .bind(set.duration_secs)
            .bind(set.distance_m)
            .bind(set.completed)
            .bind(set.deleted)
            .execute(&mut *tx)
            .await?;
        }
    }

    match &snapshot.prev_pointer {
        Some(SnapshotPointer::Single {
            profile_id,
            plan_id,
            day_index,
            last_advanced_for_date,
        }) => {
            sqlx::query(
                "UPDATE plan_progress SET current_day_index = ?, last_advanced_for_date = ? \
                 WHERE profile_id = ? AND plan_id = ?",
            )
            .bind(day_index)
            .bind(last_advanced_for_date)
            .bind(profile_id)
            .bind(plan_id)
            .execute(&mut *tx)
            .await?;
        }
        Some(SnapshotPointer::Cycle {
            cycle_id,
            item_index,
            day_index,
            last_advanced_for_date,
        }) => {
            sqlx::query(
                "UPDATE cycle_progress SET current_item_index = ?, current_day_index = ?, \
                 last_advanced_for_date = ? WHERE cycle_id = ?",
            )
            .bind(item_index)
            .bind(day_index)
            .bind(last_advanced_for_date)
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;
        }
        None => {}
    }

    sqlx::query("DELETE FROM day_change_undo WHERE id = ?")
        .bind(&undo_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::*;
    use crate::db;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn single_mode_profile(pool: &SqlitePool, plan_id: &str) -> Profile {
        let mut profile = seed_profile(pool).await;
        sqlx::query("UPDATE profile SET active_plan_id = ? WHERE id = ?")
            .bind(plan_id)
            .bind(&profile.id)
            .execute(pool)
            .await
            .unwrap();
        profile.active_plan_id = Some(plan_id.to_string());
        profile
    }

    async fn day_snapshot(pool: &SqlitePool, workout_day_id: &str) -> Vec<(String, i64, f64, bool)> {
        sqlx::query_as(
            "SELECT e.exercise_id, s.set_index, COALESCE(s.weight, 0.0), s.completed \
             FROM workout_sets s JOIN workout_entries e ON e.id = s.entry_id \
             WHERE e.workout_day_id = ? ORDER BY e.order_index, s.set_index",
        )
        .bind(workout_day_id)
        .fetch_all(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn change_blocked_by_completed_sets_then_round_trips() {
        let pool = db::open_test().await;
        let plan = seed_simple_plan(&pool, "ul", 4).await;
        let profile = single_mode_profile(&pool, &plan).await;
        let today = date(2025, 6, 10);

        // Day 2 of the plan, expanded, with two sets already completed.
        progress::get_or_create(&pool, &profile.id, &plan).await.unwrap();
        sqlx::query("UPDATE plan_progress SET current_day_index = 2")
            .execute(&pool)
            .await
            .unwrap();

        let workout = crate::core::resolver::get_or_create_workout_day(&pool, &profile, today, today)
            .await
            .unwrap();
        sqlx::query(
            "UPDATE workout_sets SET completed = 1 WHERE set_index <= 2 AND entry_id IN \
             (SELECT id FROM workout_entries WHERE workout_day_id = ?)",
        )
        .bind(&workout.id)
        .execute(&pool)
        .await
        .unwrap();

        assert!(!can_change_day(&pool, &profile, today).await.unwrap());
        assert!(!change_day(&pool, &profile, today, today, 4, false).await.unwrap());

        // Clear the completions; now the change goes through.
        sqlx::query("UPDATE workout_sets SET completed = 0")
            .execute(&pool)
            .await
            .unwrap();
        assert!(can_change_day(&pool, &profile, today).await.unwrap());

        let before = day_snapshot(&pool, &workout.id).await;
        let pointer_before: i64 =
            sqlx::query_scalar("SELECT current_day_index FROM plan_progress")
                .fetch_one(&pool)
                .await
                .unwrap();

        assert!(change_day(&pool, &profile, today, today, 4, false).await.unwrap());

        let changed = crate::core::resolver::get_workout_day(&pool, &profile.id, today)
            .await
            .unwrap()
            .unwrap();
        let day4: String =
            sqlx::query_scalar("SELECT id FROM plan_days WHERE plan_id = ? AND day_index = 4")
                .bind(&plan)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(changed.routine_day_id.as_deref(), Some(day4.as_str()));

        assert!(undo(&pool, &workout.id).await.unwrap());

        let after = day_snapshot(&pool, &workout.id).await;
        assert_eq!(before, after);

        let restored = crate::core::resolver::get_workout_day(&pool, &profile.id, today)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(restored.routine_day_id, workout.routine_day_id);

        let pointer_after: i64 =
            sqlx::query_scalar("SELECT current_day_index FROM plan_progress")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(pointer_before, pointer_after);
    }

    #[tokio::test]
    async fn skip_and_advance_round_trip() {
        let pool = db::open_test().await;
        let plan = seed_simple_plan(&pool, "ul", 4).await;
        let profile = single_mode_profile(&pool, &plan).await;
        let today = date(2025, 6, 10);

        progress::get_or_create(&pool, &profile.id, &plan).await.unwrap();

        let workout = crate::core::resolver::get_or_create_workout_day(&pool, &profile, today, today)
            .await
            .unwrap();
        let before = day_snapshot(&pool, &workout.id).await;

        assert!(change_day(&pool, &profile, today, today, 3, true).await.unwrap());

        let pointer: i64 = sqlx::query_scalar("SELECT current_day_index FROM plan_progress")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(pointer, 3);

        assert!(undo(&pool, &workout.id).await.unwrap());

        let pointer: i64 = sqlx::query_scalar("SELECT current_day_index FROM plan_progress")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(pointer, 1);
        assert_eq!(day_snapshot(&pool, &workout.id).await, before);

        // Snapshot consumed; nothing further to undo.
        assert!(!undo(&pool, &workout.id).await.unwrap());
    }

    #[tokio::test]
    async fn soft_deleted_sets_do_not_block_day_change() {
        let pool = db::open_test().await;
        let plan = seed_simple_plan(&pool, "ul", 3).await;
        let profile = single_mode_profile(&pool, &plan).await;
        let today = date(2025, 6, 10);

        let workout = crate::core::resolver::get_or_create_workout_day(&pool, &profile, today, today)
            .await
            .unwrap();

        // A completed set blocks the change until it is soft-deleted; removed
        // work no longer counts as in-progress.
        sqlx::query(
            "UPDATE workout_sets SET completed = 1 WHERE set_index = 1 AND entry_id IN \
             (SELECT id FROM workout_entries WHERE workout_day_id = ?)",
        )
        .bind(&workout.id)
        .execute(&pool)
        .await
        .unwrap();
        assert!(!can_change_day(&pool, &profile, today).await.unwrap());

        sqlx::query("UPDATE workout_sets SET deleted = 1 WHERE completed = 1")
            .execute(&pool)
            .await
            .unwrap();
        assert!(can_change_day(&pool, &profile, today).await.unwrap());
        assert!(change_day(&pool, &profile, today, today, 2, false).await.unwrap());
    }

    #[tokio::test]
    async fn undo_restores_only_the_owning_profiles_pointer() {
        let pool = db::open_test().await;
        let plan = seed_simple_plan(&pool, "ul", 4).await;
        let profile = single_mode_profile(&pool, &plan).await;
        let today = date(2025, 6, 10);

        // A second profile tracking the same plan, parked at day 2.
        let other = seed_profile(&pool).await;
        progress::get_or_create(&pool, &other.id, &plan).await.unwrap();
        sqlx::query("UPDATE plan_progress SET current_day_index = 2 WHERE profile_id = ?")
            .bind(&other.id)
            .execute(&pool)
            .await
            .unwrap();

        let workout = crate::core::resolver::get_or_create_workout_day(&pool, &profile, today, today)
            .await
            .unwrap();

        assert!(change_day(&pool, &profile, today, today, 3, true).await.unwrap());
        assert!(undo(&pool, &workout.id).await.unwrap());

        let own: i64 = sqlx::query_scalar(
            "SELECT current_day_index FROM plan_progress WHERE profile_id = ?",
        )
        .bind(&profile.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(own, 1);

        let others: i64 = sqlx::query_scalar(
            "SELECT current_day_index FROM plan_progress WHERE profile_id = ?",
        )
        .bind(&other.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(others, 2);
    }

    #[tokio::test]
    async fn change_is_inert_without_plan_context() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;
        let today = date(2025, 6, 10);

        assert!(!can_change_day(&pool, &profile, today).await.unwrap());
        assert!(!change_day(&pool, &profile, today, today, 2, false).await.unwrap());
    }

    #[tokio::test]
    async fn undo_skips_entries_for_deleted_exercises() {
        let pool = db::open_test().await;
        let plan = seed_simple_plan(&pool, "ul", 2).await;
        let profile = single_mode_profile(&pool, &plan).await;
        let today = date(2025, 6, 10);

        let workout = crate::core::resolver::get_or_create_workout_day(&pool, &profile, today, today)
            .await
            .unwrap();
        let snapped_exercise: String = sqlx::query_scalar(
            "SELECT exercise_id FROM workout_entries WHERE workout_day_id = ?",
        )
        .bind(&workout.id)
        .fetch_one(&pool)
        .await
        .unwrap();

        assert!(change_day(&pool, &profile, today, today, 2, false).await.unwrap());

        // Exercise from the snapshot disappears before the undo. The foreign
        // key is enforced via the explicit existence check.
        sqlx::query("DELETE FROM plan_exercises WHERE exercise_id = ?")
            .bind(&snapped_exercise)
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("DELETE FROM exercises WHERE id = ?")
            .bind(&snapped_exercise)
            .execute(&pool)
            .await
            .unwrap();

        assert!(undo(&pool, &workout.id).await.unwrap());

        let dangling: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM workout_entries e \
             LEFT JOIN exercises x ON x.id = e.exercise_id \
             WHERE e.workout_day_id = ? AND x.id IS NULL",
        )
        .bind(&workout.id)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(dangling, 0);
    }
}
