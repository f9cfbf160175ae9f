//! Profile settings: one row per installation, created lazily.

use anyhow::Result;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::models::Profile;
use crate::types::ExecutionMode;

pub async fn get_or_create(pool: &SqlitePool) -> Result<Profile> {
    if let Some(profile) = sqlx::query_as::<_, Profile>("SELECT * FROM profile LIMIT 1")
        .fetch_optional(pool)
        .await?
    {
        return Ok(profile);
    }

    let id = Uuid::new_v4().to_string();
    sqlx::query(
        "INSERT INTO profile (id, execution_mode, day_transition_hour) VALUES (?, 'single', 0)",
    )
    .bind(&id)
    .execute(pool)
    .await?;

    let profile = sqlx::query_as::<_, Profile>("SELECT * FROM profile WHERE id = ?")
        .bind(&id)
        .fetch_one(pool)
        .await?;

    Ok(profile)
}

pub async fn set_mode(pool: &SqlitePool, profile_id: &str, mode: ExecutionMode) -> Result<()> {
    sqlx::query("UPDATE profile SET execution_mode = ? WHERE id = ?")
        .bind(mode)
        .bind(profile_id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn set_active_plan(
    pool: &SqlitePool,
    profile_id: &str,
    plan_id: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE profile SET active_plan_id = ? WHERE id = ?")
        .bind(plan_id)
        .bind(profile_id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Hour must already be validated to [0, 23] by the caller.
pub async fn set_transition_hour(pool: &SqlitePool, profile_id: &str, hour: u8) -> Result<()> {
    sqlx::query("UPDATE profile SET day_transition_hour = ? WHERE id = ?")
        .bind(hour as i64)
        .bind(profile_id)
        .execute(pool)
        .await?;

    Ok(())
}
