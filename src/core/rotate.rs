//! Cycle Rotator: sequences plans within the active cycle.
//!
//! State is the (item index, day index) pair on `cycle_progress`; the only
//! transition is `advance`, which walks days within the current plan and
//! wraps to the next plan when they run out. There is no terminal state.

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate};
use sqlx::{SqliteConnection, SqlitePool};

use crate::core::dates::workout_date;
use crate::models::{Cycle, CycleItem, CycleProgress, Plan, PlanDay};

pub async fn get_active_cycle(pool: &SqlitePool, profile_id: &str) -> Result<Option<Cycle>> {
    let cycle = sqlx::query_as::<_, Cycle>(
        "SELECT * FROM cycles WHERE profile_id = ? AND is_active = 1 LIMIT 1",
    )
    .bind(profile_id)
    .fetch_optional(pool)
    .await?;

    Ok(cycle)
}

pub async fn get_cycle(pool: &SqlitePool, cycle_id: &str) -> Result<Option<Cycle>> {
    let cycle = sqlx::query_as::<_, Cycle>("SELECT * FROM cycles WHERE id = ?")
        .bind(cycle_id)
        .fetch_optional(pool)
        .await?;

    Ok(cycle)
}

pub async fn items(pool: &SqlitePool, cycle_id: &str) -> Result<Vec<CycleItem>> {
    let items = sqlx::query_as::<_, CycleItem>(
        "SELECT * FROM cycle_items WHERE cycle_id = ? ORDER BY order_index",
    )
    .bind(cycle_id)
    .fetch_all(pool)
    .await?;

    Ok(items)
}

pub async fn get_progress(pool: &SqlitePool, cycle_id: &str) -> Result<Option<CycleProgress>> {
    let progress =
        sqlx::query_as::<_, CycleProgress>("SELECT * FROM cycle_progress WHERE cycle_id = ?")
            .bind(cycle_id)
            .fetch_optional(pool)
            .await?;

    Ok(progress)
}

pub async fn get_or_create_progress(pool: &SqlitePool, cycle_id: &str) -> Result<CycleProgress> {
    sqlx::query(
        "INSERT OR IGNORE INTO cycle_progress (cycle_id, current_item_index, current_day_index) \
         VALUES (?, 0, 1)",
    )
    .bind(cycle_id)
    .execute(pool)
    .await?;

    let progress =
        sqlx::query_as::<_, CycleProgress>("SELECT * FROM cycle_progress WHERE cycle_id = ?")
            .bind(cycle_id)
            .fetch_one(pool)
            .await?;

    Ok(progress)
}

/// Activate a cycle, deactivating any sibling. Progress is seeded at (0, 1)
/// only if the cycle never ran before; a reactivated cycle resumes where it
/// left off.
pub async fn activate(pool: &SqlitePool, profile_id: &str, cycle_id: &str) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE cycles SET is_active = 0 WHERE profile_id = ?")
        .bind(profile_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE cycles SET is_active = 1 WHERE id = ?")
        .bind(cycle_id)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT OR IGNORE INTO cycle_progress (cycle_id, current_item_index, current_day_index) \
         VALUES (?, 0, 1)",
    )
    .bind(cycle_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(())
}

/// Clear the active flag. Progress is deliberately kept.
pub async fn deactivate(pool: &SqlitePool, cycle_id: &str) -> Result<()> {
    sqlx::query("UPDATE cycles SET is_active = 0 WHERE id = ?")
        .bind(cycle_id)
        .execute(pool)
        .await?;

    Ok(())
}

async fn plan_day_count(pool: &SqlitePool, plan_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_days WHERE plan_id = ?")
        .bind(plan_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

/// The plan and plan day the cycle currently points at, or None when the
/// cycle is empty or the referenced plan/day no longer exists — callers fall
/// back to free mode.
pub async fn current_plan_day(
    pool: &SqlitePool,
    cycle_id: &str,
) -> Result<Option<(Plan, PlanDay, i64)>> {
    let cycle_items = items(pool, cycle_id).await?;
    if cycle_items.is_empty() {
        return Ok(None);
    }

    let progress = get_or_create_progress(pool, cycle_id).await?;
    let idx = progress.current_item_index.rem_euclid(cycle_items.len() as i64) as usize;

    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ?")
        .bind(&cycle_items[idx].plan_id)
        .fetch_optional(pool)
        .await?;
    let Some(plan) = plan else {
        return Ok(None);
    };

    let total = plan_day_count(pool, &plan.id).await?;
    if total == 0 {
        return Ok(None);
    }

    let day = sqlx::query_as::<_, PlanDay>(
        "SELECT * FROM plan_days WHERE plan_id = ? AND day_index = ?",
    )
    .bind(&plan.id)
    .bind(progress.current_day_index)
    .fetch_optional(pool)
    .await?;

    Ok(day.map(|d| (plan, d, total)))
}

/// The core transition: stay on the current plan while it has days left,
/// otherwise reset to day 1 of the next plan, wrapping after the last one.
pub async fn advance(pool: &SqlitePool, cycle_id: &str) -> Result<()> {
    let cycle_items = items(pool, cycle_id).await?;
    if cycle_items.is_empty() {
        return Ok(());
    }

    let progress = get_or_create_progress(pool, cycle_id).await?;
    let item_count = cycle_items.len() as i64;
    let idx = progress.current_item_index.rem_euclid(item_count);

    let day_count = plan_day_count(pool, &cycle_items[idx as usize].plan_id).await?;

    let (next_item, next_day) = if progress.current_day_index < day_count {
        (idx, progress.current_day_index + 1)
    } else {
        ((idx + 1) % item_count, 1)
    };

    sqlx::query(
        "UPDATE cycle_progress SET current_item_index = ?, current_day_index = ? WHERE cycle_id = ?",
    )
    .bind(next_item)
    .bind(next_day)
    .bind(cycle_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Stamp completion time; the pointer moves separately.
pub async fn mark_completed(
    pool: &SqlitePool,
    cycle_id: &str,
    now: DateTime<Local>,
) -> Result<()> {
    sqlx::query("UPDATE cycle_progress SET last_completed_at = ? WHERE cycle_id = ?")
        .bind(now)
        .bind(cycle_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Point the cycle at an explicit (item, day) position and anchor it to
/// `today`. Runs inside the caller's transaction; used by the
/// skip-and-advance day change.
pub async fn set_position(
    conn: &mut SqliteConnection,
    cycle_id: &str,
    item_index: i64,
    day_index: i64,
    today: NaiveDate,
) -> Result<()> {
    sqlx::query(
        "UPDATE cycle_progress SET current_item_index = ?, current_day_index = ?, \
         last_advanced_for_date = ? WHERE cycle_id = ?",
    )
    .bind(item_index)
    .bind(day_index)
    .bind(today)
    .bind(cycle_id)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Advance once when the last completion lies behind today's workout date.
/// Guarded like the single-plan tracker: at most one advance per transition.
pub async fn auto_advance_if_stale(
    pool: &SqlitePool,
    cycle_id: &str,
    transition_hour: u8,
    today: NaiveDate,
) -> Result<bool> {
    let progress = get_or_create_progress(pool, cycle_id).await?;

    let Some(completed_at) = progress.last_completed_at else {
        return Ok(false);
    };
    let completed_date = workout_date(completed_at, transition_hour);
    if completed_date >= today {
        return Ok(false);
    }

    if let Some(advanced_for) = progress.last_advanced_for_date {
        if advanced_for > completed_date {
            return Ok(false);
        }
    }

    advance(pool, cycle_id).await?;
    sqlx::query("UPDATE cycle_progress SET last_advanced_for_date = ? WHERE cycle_id = ?")
        .bind(today)
        .bind(cycle_id)
        .execute(pool)
        .await?;

    Ok(true)
}

/// Remove every cycle item referencing a deleted plan and close the order
/// gaps, keeping each cycle's order_index contiguous 0..N-1 so advance's
/// modulo arithmetic stays correct. Progress item pointers are re-anchored
/// onto the shrunken list.
pub async fn detach_plan(pool: &SqlitePool, plan_id: &str) -> Result<()> {
    let affected: Vec<String> =
        sqlx::query_scalar("SELECT DISTINCT cycle_id FROM cycle_items WHERE plan_id = ?")
            .bind(plan_id)
            .fetch_all(pool)
            .await?;

    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM cycle_items WHERE plan_id = ?")
        .bind(plan_id)
        .execute(&mut *tx)
        .await?;

    for cycle_id in &affected {
        let remaining = sqlx::query_as::<_, CycleItem>(
            "SELECT * FROM cycle_items WHERE cycle_id = ? ORDER BY order_index",
        )
        .bind(cycle_id)
        .fetch_all(&mut *tx)
        .await?;

        for (new_order, item) in remaining.iter().enumerate() {
            sqlx::query("UPDATE cycle_items SET order_index = ? WHERE id = ?")
                .bind(new_order as i64)
                .bind(&item.id)
                .execute(&mut *tx)
                .await?;
        }

        let item_count = remaining.len() as i64;
        if item_count == 0 {
            sqlx::query(
                "UPDATE cycle_progress SET current_item_index = 0, current_day_index = 1 \
                 WHERE cycle_id = ?",
            )
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;
        } else {
            sqlx::query(
                "UPDATE cycle_progress SET current_item_index = current_item_index % ? \
                 WHERE cycle_id = ?",
            )
            .bind(item_count)
            .bind(cycle_id)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::*;
    use crate::db;

    async fn position(pool: &SqlitePool, cycle_id: &str) -> (i64, i64) {
        let p = get_progress(pool, cycle_id).await.unwrap().unwrap();
        (p.current_item_index, p.current_day_index)
    }

    #[tokio::test]
    async fn advance_walks_days_then_rotates_plans() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let a = seed_simple_plan(&pool, "a", 3).await;
        let b = seed_simple_plan(&pool, "b", 1).await;
        let c = seed_simple_plan(&pool, "c", 2).await;
        let cycle = seed_cycle(&pool, &profile.id, "block", &[&a, &b, &c]).await;

        // Start at the last day of the first plan.
        get_or_create_progress(&pool, &cycle).await.unwrap();
        sqlx::query("UPDATE cycle_progress SET current_item_index = 0, current_day_index = 3")
            .execute(&pool)
            .await
            .unwrap();

        advance(&pool, &cycle).await.unwrap();
        assert_eq!(position(&pool, &cycle).await, (1, 1));

        // Plan b has a single day, so the next advance rotates again.
        advance(&pool, &cycle).await.unwrap();
        assert_eq!(position(&pool, &cycle).await, (2, 1));

        advance(&pool, &cycle).await.unwrap();
        assert_eq!(position(&pool, &cycle).await, (2, 2));

        advance(&pool, &cycle).await.unwrap();
        assert_eq!(position(&pool, &cycle).await, (0, 1));
    }

    #[tokio::test]
    async fn six_advances_loop_the_whole_cycle() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let a = seed_simple_plan(&pool, "a", 3).await;
        let b = seed_simple_plan(&pool, "b", 1).await;
        let c = seed_simple_plan(&pool, "c", 2).await;
        let cycle = seed_cycle(&pool, &profile.id, "block", &[&a, &b, &c]).await;
        get_or_create_progress(&pool, &cycle).await.unwrap();

        // 3 + 1 + 2 training days: a full loop returns to the start.
        for _ in 0..6 {
            advance(&pool, &cycle).await.unwrap();
        }
        assert_eq!(position(&pool, &cycle).await, (0, 1));
    }

    #[tokio::test]
    async fn at_most_one_active_cycle() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let a = seed_simple_plan(&pool, "a", 2).await;
        let first = seed_cycle(&pool, &profile.id, "first", &[&a]).await;
        let second = seed_cycle(&pool, &profile.id, "second", &[&a]).await;

        activate(&pool, &profile.id, &first).await.unwrap();
        activate(&pool, &profile.id, &second).await.unwrap();

        let active = get_active_cycle(&pool, &profile.id).await.unwrap().unwrap();
        assert_eq!(active.id, second);

        let active_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM cycles WHERE is_active = 1")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(active_count, 1);
    }

    #[tokio::test]
    async fn reactivation_resumes_prior_position() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let a = seed_simple_plan(&pool, "a", 3).await;
        let cycle = seed_cycle(&pool, &profile.id, "block", &[&a]).await;

        activate(&pool, &profile.id, &cycle).await.unwrap();
        advance(&pool, &cycle).await.unwrap();
        assert_eq!(position(&pool, &cycle).await, (0, 2));

        deactivate(&pool, &cycle).await.unwrap();
        assert!(get_active_cycle(&pool, &profile.id).await.unwrap().is_none());

        activate(&pool, &profile.id, &cycle).await.unwrap();
        assert_eq!(position(&pool, &cycle).await, (0, 2));
    }

    #[tokio::test]
    async fn current_plan_day_degrades_to_none() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let empty = seed_cycle(&pool, &profile.id, "empty", &[]).await;
        assert!(current_plan_day(&pool, &empty).await.unwrap().is_none());

        let a = seed_simple_plan(&pool, "a", 2).await;
        let cycle = seed_cycle(&pool, &profile.id, "block", &[&a]).await;
        assert!(current_plan_day(&pool, &cycle).await.unwrap().is_some());

        // Delete the plan out from under the cycle item.
        sqlx::query("DELETE FROM plans WHERE id = ?")
            .bind(&a)
            .execute(&pool)
            .await
            .unwrap();
        assert!(current_plan_day(&pool, &cycle).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn detach_plan_reindexes_contiguously() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let a = seed_simple_plan(&pool, "a", 2).await;
        let b = seed_simple_plan(&pool, "b", 2).await;
        let c = seed_simple_plan(&pool, "c", 2).await;
        let cycle = seed_cycle(&pool, &profile.id, "block", &[&a, &b, &c]).await;
        get_or_create_progress(&pool, &cycle).await.unwrap();

        detach_plan(&pool, &b).await.unwrap();

        let orders: Vec<i64> = sqlx::query_scalar(
            "SELECT order_index FROM cycle_items WHERE cycle_id = ? ORDER BY order_index",
        )
        .bind(&cycle)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(orders, vec![0, 1]);

        let plans: Vec<String> = sqlx::query_scalar(
            "SELECT plan_id FROM cycle_items WHERE cycle_id = ? ORDER BY order_index",
        )
        .bind(&cycle)
        .fetch_all(&pool)
        .await
        .unwrap();
        assert_eq!(plans, vec![a, c]);
    }

    #[tokio::test]
    async fn cycle_auto_advance_is_guarded() {
        let pool = db::open_test().await;
        let profile = seed_profile(&pool).await;

        let a = seed_simple_plan(&pool, "a", 3).await;
        let cycle = seed_cycle(&pool, &profile.id, "block", &[&a]).await;
        activate(&pool, &profile.id, &cycle).await.unwrap();

        let yesterday = Local::now() - chrono::Duration::days(1);
        mark_completed(&pool, &cycle, yesterday).await.unwrap();

        let today = workout_date(Local::now(), 0);
        assert!(auto_advance_if_stale(&pool, &cycle, 0, today).await.unwrap());
        assert!(!auto_advance_if_stale(&pool, &cycle, 0, today).await.unwrap());
        assert_eq!(position(&pool, &cycle).await, (0, 2));
    }
}
