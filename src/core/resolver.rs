//! Day Resolver: maps workout dates to the applicable plan day.
//!
//! Two paths: an existing workout day resolves from its own recorded
//! `routine_day_id` (authoritative, immune to later pointer movement), while
//! dates without a record get a read-only projection from the progress
//! pointer. "No plan" is an expected steady state and surfaces as None.

use anyhow::Result;
use chrono::NaiveDate;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::core::dates::wrap_day_index;
use crate::core::{expand, progress, rotate};
use crate::models::{DayInfo, Plan, PlanDay, Profile, WorkoutDay};
use crate::types::{ExecutionMode, Source};

async fn plan_by_id(pool: &SqlitePool, plan_id: &str) -> Result<Option<Plan>> {
    let plan = sqlx::query_as::<_, Plan>("SELECT * FROM plans WHERE id = ?")
        .bind(plan_id)
        .fetch_optional(pool)
        .await?;

    Ok(plan)
}

async fn plan_day_at(
    pool: &SqlitePool,
    plan_id: &str,
    day_index: i64,
) -> Result<Option<PlanDay>> {
    let day = sqlx::query_as::<_, PlanDay>(
        "SELECT * FROM plan_days WHERE plan_id = ? AND day_index = ?",
    )
    .bind(plan_id)
    .bind(day_index)
    .fetch_optional(pool)
    .await?;

    Ok(day)
}

async fn day_count(pool: &SqlitePool, plan_id: &str) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_days WHERE plan_id = ?")
        .bind(plan_id)
        .fetch_one(pool)
        .await?;

    Ok(count)
}

fn day_info(plan: &Plan, day: &PlanDay, total: i64) -> DayInfo {
    DayInfo {
        plan_id: plan.id.clone(),
        plan_name: plan.name.clone(),
        plan_day_id: day.id.clone(),
        day_index: day.day_index,
        total_days: total,
        day_name: day.display_name(),
    }
}

/// Resolve a persisted workout day from its recorded routine references.
/// Dangling references (plan or day deleted since) degrade to None rather
/// than erroring; the caller treats the day as free-form.
pub async fn resolve_existing(pool: &SqlitePool, day: &WorkoutDay) -> Result<Option<DayInfo>> {
    let Some(routine_day_id) = &day.routine_day_id else {
        return Ok(None);
    };

    let plan_day = sqlx::query_as::<_, PlanDay>("SELECT * FROM plan_days WHERE id = ?")
        .bind(routine_day_id)
        .fetch_optional(pool)
        .await?;
    let Some(plan_day) = plan_day else {
        return Ok(None);
    };

    let Some(plan) = plan_by_id(pool, &plan_day.plan_id).await? else {
        return Ok(None);
    };

    let total = day_count(pool, &plan.id).await?;
    Ok(Some(day_info(&plan, &plan_day, total)))
}

/// Project which plan day applies to `target` without touching any state:
/// pointer index plus the signed day difference from the pointer's reference
/// date, wrapped 1-based into the plan. Repeated calls are side-effect-free.
pub async fn preview(
    pool: &SqlitePool,
    profile: &Profile,
    target: NaiveDate,
    today: NaiveDate,
) -> Result<Option<DayInfo>> {
    let hour = profile.day_transition_hour as u8;

    let (plan, pointer_index, reference) = match profile.execution_mode {
        ExecutionMode::Single => {
            let Some(plan_id) = &profile.active_plan_id else {
                return Ok(None);
            };
            let Some(plan) = plan_by_id(pool, plan_id).await? else {
                return Ok(None);
            };

            match progress::get(pool, &profile.id, plan_id).await? {
                Some(p) => {
                    let reference = progress::reference_date(
                        p.last_completed_at,
                        p.last_advanced_for_date,
                        hour,
                        today,
                    );
                    (plan, p.current_day_index, reference)
                }
                None => (plan, 1, today),
            }
        }
        ExecutionMode::Cycle => {
            let Some(cycle) = rotate::get_active_cycle(pool, &profile.id).await? else {
                return Ok(None);
            };

            let items = rotate::items(pool, cycle.id.as_str()).await?;
            if items.is_empty() {
                return Ok(None);
            }

            let (item_index, pointer_index, reference) =
                match rotate::get_progress(pool, &cycle.id).await? {
                    Some(p) => {
                        let reference = progress::reference_date(
                            p.last_completed_at,
                            p.last_advanced_for_date,
                            hour,
                            today,
                        );
                        (
                            p.current_item_index.rem_euclid(items.len() as i64),
                            p.current_day_index,
                            reference,
                        )
                    }
                    None => (0, 1, today),
                };

            let Some(plan) = plan_by_id(pool, &items[item_index as usize].plan_id).await? else {
                return Ok(None);
            };
            (plan, pointer_index, reference)
        }
    };

    let total = day_count(pool, &plan.id).await?;
    if total == 0 {
        return Ok(None);
    }

    let offset = (target - reference).num_days();
    let projected = wrap_day_index(pointer_index + offset, total);

    let Some(plan_day) = plan_day_at(pool, &plan.id, projected).await? else {
        return Ok(None);
    };

    Ok(Some(day_info(&plan, &plan_day, total)))
}

/// Run the stale-completion auto-advance for whichever pointer is active.
/// Idempotent within one workout date; called on every CLI entry that looks
/// at today (the app-foreground hook of the mobile original).
pub async fn sync(pool: &SqlitePool, profile: &Profile, today: NaiveDate) -> Result<()> {
    let hour = profile.day_transition_hour as u8;

    match profile.execution_mode {
        ExecutionMode::Single => {
            if let Some(plan_id) = &profile.active_plan_id {
                let total = day_count(pool, plan_id).await?;
                if total > 0 {
                    progress::auto_advance_if_stale(pool, &profile.id, plan_id, total, hour, today)
                        .await?;
                }
            }
        }
        ExecutionMode::Cycle => {
            if let Some(cycle) = rotate::get_active_cycle(pool, &profile.id).await? {
                rotate::auto_advance_if_stale(pool, &cycle.id, hour, today).await?;
            }
        }
    }

    Ok(())
}

pub async fn get_workout_day(
    pool: &SqlitePool,
    profile_id: &str,
    date: NaiveDate,
) -> Result<Option<WorkoutDay>> {
    let day = sqlx::query_as::<_, WorkoutDay>(
        "SELECT * FROM workout_days WHERE profile_id = ? AND workout_date = ?",
    )
    .bind(profile_id)
    .bind(date)
    .fetch_optional(pool)
    .await?;

    Ok(day)
}

/// Fetch the workout day for `date`, creating it on first access. A date
/// that resolves to a plan day is created in routine mode and expanded
/// exactly once; anything else starts as a free day.
pub async fn get_or_create_workout_day(
    pool: &SqlitePool,
    profile: &Profile,
    date: NaiveDate,
    today: NaiveDate,
) -> Result<WorkoutDay> {
    if let Some(existing) = get_workout_day(pool, &profile.id, date).await? {
        return Ok(existing);
    }

    let info = preview(pool, profile, date, today).await?;

    let id = Uuid::new_v4().to_string();
    match &info {
        Some(info) => {
            sqlx::query(
                "INSERT INTO workout_days (id, profile_id, workout_date, mode, routine_plan_id, routine_day_id) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&profile.id)
            .bind(date)
            .bind(Source::Routine)
            .bind(&info.plan_id)
            .bind(&info.plan_day_id)
            .execute(pool)
            .await?;

            expand::expand(pool, &info.plan_day_id, &id).await?;
        }
        None => {
            sqlx::query(
                "INSERT INTO workout_days (id, profile_id, workout_date, mode) VALUES (?, ?, ?, ?)",
            )
            .bind(&id)
            .bind(&profile.id)
            .bind(date)
            .bind(Source::Free)
            .execute(pool)
            .await?;
        }
    }

    let day = sqlx::query_as::<_, WorkoutDay>("SELECT * FROM workout_days WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;

    Ok(day)
}
