//! Seed helpers shared by the core test modules.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::{Profile, WorkoutDay};
use crate::types::{ExecutionMode, Source};

pub async fn seed_profile(pool: &SqlitePool) -> Profile {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO profile (id, execution_mode, day_transition_hour) VALUES (?, 'single', 0)",
    )
    .bind(&id)
    .execute(pool)
    .await
    .expect("failed to seed profile");

    Profile {
        id,
        execution_mode: ExecutionMode::Single,
        active_plan_id: None,
        day_transition_hour: 0,
    }
}

pub async fn seed_exercise(pool: &SqlitePool, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO exercises (id, name, primary_muscle) VALUES (?, ?, 'chest')")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await
        .expect("failed to seed exercise");
    id
}

pub async fn seed_plan(pool: &SqlitePool, name: &str) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO plans (id, name) VALUES (?, ?)")
        .bind(&id)
        .bind(name)
        .execute(pool)
        .await
        .expect("failed to seed plan");
    id
}

pub async fn seed_plan_day(
    pool: &SqlitePool,
    plan_id: &str,
    day_index: i64,
    name: Option<&str>,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO plan_days (id, plan_id, day_index, name) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(plan_id)
        .bind(day_index)
        .bind(name)
        .execute(pool)
        .await
        .expect("failed to seed plan day");
    id
}

pub async fn seed_plan_exercise(
    pool: &SqlitePool,
    plan_day_id: &str,
    exercise_id: &str,
    order_index: i64,
    sets: i64,
    target_weight: Option<f64>,
    target_reps: Option<i64>,
) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO plan_exercises \
           (id, plan_day_id, exercise_id, order_index, sets, metric, target_weight, target_reps) \
         VALUES (?, ?, ?, ?, ?, 'weight', ?, ?)",
    )
    .bind(&id)
    .bind(plan_day_id)
    .bind(exercise_id)
    .bind(order_index)
    .bind(sets)
    .bind(target_weight)
    .bind(target_reps)
    .execute(pool)
    .await
    .expect("failed to seed plan exercise");
    id
}

/// A plan with `day_count` days, each holding one 3x5 exercise.
pub async fn seed_simple_plan(pool: &SqlitePool, name: &str, day_count: i64) -> String {
    let plan_id = seed_plan(pool, name).await;
    for day in 1..=day_count {
        let day_id = seed_plan_day(pool, &plan_id, day, None).await;
        let ex = seed_exercise(pool, &format!("{} ex {}", name, day)).await;
        seed_plan_exercise(pool, &day_id, &ex, 0, 3, Some(80.0), Some(5)).await;
    }
    plan_id
}

pub async fn seed_workout_day(
    pool: &SqlitePool,
    profile_id: &str,
    date: &str,
    routine_plan_id: Option<&str>,
    routine_day_id: Option<&str>,
) -> WorkoutDay {
    let id = Uuid::new_v4().to_string();
    let mode = if routine_day_id.is_some() {
        Source::Routine
    } else {
        Source::Free
    };
    sqlx::query(
        "INSERT INTO workout_days (id, profile_id, workout_date, mode, routine_plan_id, routine_day_id) \
         VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(profile_id)
    .bind(date)
    .bind(mode)
    .bind(routine_plan_id)
    .bind(routine_day_id)
    .execute(pool)
    .await
    .expect("failed to seed workout day");

    sqlx::query_as::<_, WorkoutDay>("SELECT * FROM workout_days WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await
        .expect("failed to read back workout day")
}

pub async fn seed_cycle(pool: &SqlitePool, profile_id: &str, name: &str, plan_ids: &[&str]) -> String {
    let id = Uuid::new_v4().to_string();
    sqlx::query("INSERT INTO cycles (id, profile_id, name, is_active) VALUES (?, ?, ?, 0)")
        .bind(&id)
        .bind(profile_id)
        .bind(name)
        .execute(pool)
        .await
        .expect("failed to seed cycle");

    for (order, plan_id) in plan_ids.iter().enumerate() {
        sqlx::query("INSERT INTO cycle_items (id, cycle_id, plan_id, order_index) VALUES (?, ?, ?, ?)")
            .bind(Uuid::new_v4().to_string())
            .bind(&id)
            .bind(plan_id)
            .bind(order as i64)
            .execute(pool)
            .await
            .expect("failed to seed cycle item");
    }

    id
}
