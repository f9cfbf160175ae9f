use std::str::FromStr;

use anyhow::Result;
use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};

pub type DB = SqlitePool;

/// Everything is keyed by TEXT uuids; children carry their owner's id rather
/// than live back-references, so rows cascade cleanly.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS profile (
    id                  TEXT PRIMARY KEY,
    execution_mode      TEXT NOT NULL DEFAULT 'single',
    active_plan_id      TEXT,
    day_transition_hour INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS exercises (
    id             TEXT PRIMARY KEY,
    name           TEXT NOT NULL UNIQUE,
    description    TEXT,
    primary_muscle TEXT NOT NULL,
    created_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS plans (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE TABLE IF NOT EXISTS plan_days (
    id        TEXT PRIMARY KEY,
    plan_id   TEXT NOT NULL REFERENCES plans(id) ON DELETE CASCADE,
    day_index INTEGER NOT NULL,
    name      TEXT,
    UNIQUE(plan_id, day_index)
);

CREATE TABLE IF NOT EXISTS plan_exercises (
    id                   TEXT PRIMARY KEY,
    plan_day_id          TEXT NOT NULL REFERENCES plan_days(id) ON DELETE CASCADE,
    exercise_id          TEXT NOT NULL REFERENCES exercises(id),
    order_index          INTEGER NOT NULL,
    group_index          INTEGER,
    sets                 INTEGER NOT NULL,
    metric               TEXT NOT NULL DEFAULT 'weight',
    target_weight        REAL,
    target_reps          INTEGER,
    target_duration_secs INTEGER,
    target_distance_m    REAL
);

CREATE TABLE IF NOT EXISTS cycles (
    id         TEXT PRIMARY KEY,
    profile_id TEXT NOT NULL REFERENCES profile(id),
    name       TEXT NOT NULL,
    is_active  INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    UNIQUE(profile_id, name)
);

CREATE TABLE IF NOT EXISTS cycle_items (
    id          TEXT PRIMARY KEY,
    cycle_id    TEXT NOT NULL REFERENCES cycles(id) ON DELETE CASCADE,
    plan_id     TEXT NOT NULL,
    order_index INTEGER NOT NULL,
    UNIQUE(cycle_id, order_index)
);

CREATE TABLE IF NOT EXISTS cycle_progress (
    cycle_id               TEXT PRIMARY KEY REFERENCES cycles(id) ON DELETE CASCADE,
    current_item_index     INTEGER NOT NULL DEFAULT 0,
    current_day_index      INTEGER NOT NULL DEFAULT 1,
    last_completed_at      TEXT,
    last_advanced_for_date TEXT
);

CREATE TABLE IF NOT EXISTS plan_progress (
    profile_id             TEXT NOT NULL,
    plan_id                TEXT NOT NULL,
    current_day_index      INTEGER NOT NULL DEFAULT 1,
    last_completed_at      TEXT,
    last_advanced_for_date TEXT,
    PRIMARY KEY(profile_id, plan_id)
);

CREATE TABLE IF NOT EXISTS workout_days (
    id              TEXT PRIMARY KEY,
    profile_id      TEXT NOT NULL,
    workout_date    TEXT NOT NULL,
    mode            TEXT NOT NULL DEFAULT 'free',
    routine_plan_id TEXT,
    routine_day_id  TEXT,
    UNIQUE(profile_id, workout_date)
);

CREATE TABLE IF NOT EXISTS workout_entries (
    id             TEXT PRIMARY KEY,
    workout_day_id TEXT NOT NULL REFERENCES workout_days(id) ON DELETE CASCADE,
    exercise_id    TEXT NOT NULL,
    order_index    INTEGER NOT NULL,
    source         TEXT NOT NULL DEFAULT 'free',
    planned_sets   INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS workout_sets (
    id            TEXT PRIMARY KEY,
    entry_id      TEXT NOT NULL REFERENCES workout_entries(id) ON DELETE CASCADE,
    set_index     INTEGER NOT NULL,
    weight        REAL,
    reps          INTEGER,
    duration_secs INTEGER,
    distance_m    REAL,
    completed     INTEGER NOT NULL DEFAULT 0,
    deleted       INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS day_change_undo (
    id             TEXT PRIMARY KEY,
    workout_day_id TEXT NOT NULL,
    created_at     TEXT NOT NULL DEFAULT (datetime('now')),
    payload        TEXT NOT NULL
);
"#;

pub async fn open(path: &str) -> Result<DB> {
    let opts = SqliteConnectOptions::from_str(path)?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(opts)
        .await?;

    sqlx::raw_sql(SCHEMA).execute(&pool).await?;

    Ok(pool)
}

/// In-memory database for tests. A single connection, otherwise each pool
/// checkout would see its own empty `:memory:` database.
#[cfg(test)]
pub async fn open_test() -> DB {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("failed to open in-memory database");

    sqlx::raw_sql(SCHEMA)
        .execute(&pool)
        .await
        .expect("failed to create schema");

    pool
}
