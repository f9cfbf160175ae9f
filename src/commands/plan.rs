use std::{collections::HashSet, fs::read_to_string};

use anyhow::{Context, Result};
use colored::Colorize;
use itertools::Itertools;
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{
    cli::PlanCmd,
    core::rotate,
    models::{PlanDay, PlanExercise},
    types::{OutputFmt, emit},
};

#[derive(Debug, Deserialize)]
struct PlanToml {
    name: String,
    days: Vec<DayToml>,
}

#[derive(Debug, Deserialize)]
struct DayToml {
    name: Option<String>,
    exercises: Vec<DayExerciseToml>,
}

#[derive(Debug, Deserialize)]
struct DayExerciseToml {
    name: String,
    sets: u32,
    metric: Option<String>,
    weight: Option<f64>,
    reps: Option<i64>,
    duration_secs: Option<i64>,
    distance_m: Option<f64>,
    group: Option<u32>,
}

#[derive(serde::Serialize)]
struct PlanJson {
    idx: i64,
    name: String,
    days: i64,
    created_at: String,
}

/// Resolve a plan argument (row number from `p list`, or exact name) to its
/// id. Prints its own error and returns None when nothing matches.
pub(crate) async fn resolve_plan_id(pool: &SqlitePool, arg: &str) -> Result<Option<String>> {
    let id: Option<String> = if let Ok(idx) = arg.parse::<i64>() {
        sqlx::query_scalar(
            r#"
            SELECT id
            FROM (
              SELECT id, ROW_NUMBER() OVER (ORDER BY name) AS rn
              FROM plans
            ) t
            WHERE t.rn = ?
            "#,
        )
        .bind(idx)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_scalar("SELECT id FROM plans WHERE name = ?")
            .bind(arg)
            .fetch_optional(pool)
            .await?
    };

    if id.is_none() {
        println!("{} no plan matching `{}`", "error:".red().bold(), arg);
    }

    Ok(id)
}

pub async fn handle(cmd: PlanCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    match cmd {
        PlanCmd::Import { files } => {
            if files.is_empty() {
                println!("{} no plan file provided", "warning:".yellow().bold());
            }
            for f in files {
                import_single_plan(pool, &f).await?;
            }
            Ok(())
        }

        PlanCmd::List => {
            let rows = sqlx::query(
                r#"
                SELECT ROW_NUMBER() OVER (ORDER BY name) AS idx,
                       id, name, created_at,
                       (SELECT COUNT(*) FROM plan_days pd WHERE pd.plan_id = plans.id) AS days
                FROM   plans
                ORDER  BY idx
                "#,
            )
            .fetch_all(pool)
            .await?;

            let plans: Vec<PlanJson> = rows
                .iter()
                .map(|r| PlanJson {
                    idx: r.get("idx"),
                    name: r.get("name"),
                    days: r.get("days"),
                    created_at: r.get("created_at"),
                })
                .collect();

            emit(fmt, &plans, || {
                if plans.is_empty() {
                    println!("{}", "  (no plans found)".dimmed());
                    return;
                }
                println!("{}", "Plans:".cyan().bold());
                for p in &plans {
                    let idx = format!("{}", p.idx).yellow();
                    println!(
                        " {} • {} — {} days {}",
                        idx,
                        p.name.bold(),
                        p.days,
                        format!("| added {}", &p.created_at[..10.min(p.created_at.len())]).dimmed()
                    );
                }
            });

            Ok(())
        }

        PlanCmd::Show { plan } => {
            let Some(plan_id) = resolve_plan_id(pool, &plan).await? else {
                return Ok(());
            };

            let name: String = sqlx::query_scalar("SELECT name FROM plans WHERE id = ?")
                .bind(&plan_id)
                .fetch_one(pool)
                .await?;

            let days = sqlx::query_as::<_, PlanDay>(
                "SELECT * FROM plan_days WHERE plan_id = ? ORDER BY day_index",
            )
            .bind(&plan_id)
            .fetch_all(pool)
            .await?;

            println!("{} {}", "Plan:".cyan().bold(), name.bold());

            for day in &days {
                println!("\n{} {}", format!("{}.", day.day_index).yellow(), day.display_name().bold());

                let exercises = sqlx::query_as::<_, PlanExercise>(
                    "SELECT * FROM plan_exercises WHERE plan_day_id = ? ORDER BY order_index",
                )
                .bind(&day.id)
                .fetch_all(pool)
                .await?;

                // Grouped exercises (supersets) render as one indented block.
                for (group, members) in &exercises.iter().chunk_by(|e| e.group_index) {
                    let members: Vec<_> = members.collect();
                    let indent = if group.is_some() { "    " } else { "  " };
                    if let Some(g) = group {
                        println!("  {}", format!("group {}", g).dimmed());
                    }
                    for ex in members {
                        let ex_name: String =
                            sqlx::query_scalar("SELECT name FROM exercises WHERE id = ?")
                                .bind(&ex.exercise_id)
                                .fetch_one(pool)
                                .await?;

                        let target = match (ex.target_weight, ex.target_reps) {
                            (Some(w), Some(r)) => format!(" @ {}kg × {}", w, r),
                            (None, Some(r)) => format!(" @ bw × {}", r),
                            _ => String::new(),
                        };
                        println!(
                            "{}• {} — {} sets{}",
                            indent,
                            ex_name.bold(),
                            ex.sets,
                            target.dimmed()
                        );
                    }
                }
            }

            Ok(())
        }

        PlanCmd::Delete { plan } => {
            let Some(plan_id) = resolve_plan_id(pool, &plan).await? else {
                return Ok(());
            };

            let name: String = sqlx::query_scalar("SELECT name FROM plans WHERE id = ?")
                .bind(&plan_id)
                .fetch_one(pool)
                .await?;

            // Keep cycle item ordering contiguous before the plan row goes.
            rotate::detach_plan(pool, &plan_id).await?;

            let mut tx = pool.begin().await?;
            sqlx::query("UPDATE profile SET active_plan_id = NULL WHERE active_plan_id = ?")
                .bind(&plan_id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM plans WHERE id = ?")
                .bind(&plan_id)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;

            println!("{} deleted plan `{}`", "ok:".green().bold(), name);
            Ok(())
        }
    }
}

async fn import_single_plan(pool: &SqlitePool, file: &str) -> Result<()> {
    let toml_str = match read_to_string(file) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            println!(
                "{} cannot open file `{}` – file not found",
                "error:".red().bold(),
                file
            );
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("reading `{file}`")),
    };

    let plan: PlanToml = toml::from_str(&toml_str).with_context(|| format!("parsing `{file}`"))?;

    if plan.days.is_empty() {
        println!(
            "{} plan `{}` has no days – skipped",
            "warning:".yellow().bold(),
            plan.name
        );
        return Ok(());
    }

    // Check all exercises exist before writing anything.
    let mut all_ex = HashSet::<&str>::new();
    for d in &plan.days {
        for e in &d.exercises {
            all_ex.insert(&e.name);
        }
    }

    if !all_ex.is_empty() {
        let q_marks = std::iter::repeat("?")
            .take(all_ex.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!("SELECT name FROM exercises WHERE name IN ({})", q_marks);
        let mut q = sqlx::query_as::<_, (String,)>(&sql);
        for n in &all_ex {
            q = q.bind(n);
        }
        let present: HashSet<_> = q.fetch_all(pool).await?.into_iter().map(|(n,)| n).collect();
        let missing: Vec<_> = all_ex
            .into_iter()
            .filter(|n| !present.contains(*n))
            .collect();
        if !missing.is_empty() {
            println!(
                "{} cannot import plan `{}` – missing exercises: {}",
                "warning:".yellow().bold(),
                plan.name,
                missing.join(", ")
            );
            return Ok(());
        }
    }

    let mut tx = pool.begin().await?;

    let plan_id = Uuid::new_v4().to_string();
    let res = sqlx::query("INSERT INTO plans (id, name, created_at) VALUES (?, ?, datetime('now'))")
        .bind(&plan_id)
        .bind(&plan.name)
        .execute(&mut *tx)
        .await;

    if let Err(sqlx::Error::Database(db_err)) = &res {
        if db_err.code() == Some("2067".into()) {
            println!(
                "{} plan `{}` already exists – skipping",
                "warning:".yellow().bold(),
                plan.name
            );
            tx.rollback().await?;
            return Ok(());
        }
    }
    res?;

    // Day indices come from file order, so they are contiguous 1..N by
    // construction.
    for (day_offset, day) in plan.days.iter().enumerate() {
        let mut seen = HashSet::new();
        let mut dup = Vec::<&str>::new();
        for e in &day.exercises {
            if !seen.insert(e.name.as_str()) {
                dup.push(&e.name);
            }
        }
        if !dup.is_empty() {
            println!(
                "{} day {} of plan `{}` has duplicates: {} – import aborted",
                "warning:".yellow().bold(),
                day_offset + 1,
                plan.name,
                dup.join(", ")
            );
            tx.rollback().await?;
            return Ok(());
        }

        let day_id = Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO plan_days (id, plan_id, day_index, name) VALUES (?, ?, ?, ?)")
            .bind(&day_id)
            .bind(&plan_id)
            .bind((day_offset + 1) as i64)
            .bind(day.name.as_deref())
            .execute(&mut *tx)
            .await?;

        for (order_idx, ex) in day.exercises.iter().enumerate() {
            let ex_id: String = sqlx::query_scalar("SELECT id FROM exercises WHERE name = ?")
                .bind(&ex.name)
                .fetch_one(&mut *tx)
                .await?;

            let metric = ex.metric.as_deref().unwrap_or("weight");
            if !["weight", "reps", "time", "completion"].contains(&metric) {
                println!(
                    "{} unknown metric `{}` for `{}` – import aborted",
                    "warning:".yellow().bold(),
                    metric,
                    ex.name
                );
                tx.rollback().await?;
                return Ok(());
            }

            sqlx::query(
                r#"INSERT INTO plan_exercises
                     (id, plan_day_id, exercise_id, order_index, group_index, sets,
                      metric, target_weight, target_reps, target_duration_secs, target_distance_m)
                   VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&day_id)
            .bind(&ex_id)
            .bind(order_idx as i64)
            .bind(ex.group.map(|g| g as i64))
            .bind(ex.sets as i64)
            .bind(metric)
            .bind(ex.weight)
            .bind(ex.reps)
            .bind(ex.duration_secs)
            .bind(ex.distance_m)
            .execute(&mut *tx)
            .await?;
        }
    }

    tx.commit().await?;
    println!("{} `{}`", "ok:".green().bold(), plan.name);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::testutil::*;
    use crate::db;

    fn write_plan_toml(content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("repcycle-plan-{}.toml", Uuid::new_v4()));
        std::fs::write(&path, content).expect("failed to write plan fixture");
        path
    }

    async fn table_counts(pool: &SqlitePool) -> (i64, i64, i64) {
        let plans: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plans")
            .fetch_one(pool)
            .await
            .unwrap();
        let days: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_days")
            .fetch_one(pool)
            .await
            .unwrap();
        let exercises: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM plan_exercises")
            .fetch_one(pool)
            .await
            .unwrap();
        (plans, days, exercises)
    }

    #[tokio::test]
    async fn import_rejects_unknown_exercises_without_writing() {
        let pool = db::open_test().await;
        seed_exercise(&pool, "squat").await;

        let file = write_plan_toml(
            r#"
            name = "ul"

            [[days]]
            name = "Lower"
            exercises = [
                { name = "squat", sets = 3 },
                { name = "leg press", sets = 3 },
            ]
            "#,
        );

        import_single_plan(&pool, file.to_str().unwrap()).await.unwrap();
        assert_eq!(table_counts(&pool).await, (0, 0, 0));
    }

    #[tokio::test]
    async fn import_aborts_on_duplicate_exercise_in_a_day() {
        let pool = db::open_test().await;
        seed_exercise(&pool, "squat").await;
        seed_exercise(&pool, "deadlift").await;

        // Day 1 is valid; the duplicate sits on day 2. The whole import must
        // roll back, leaving no partial plan behind.
        let file = write_plan_toml(
            r#"
            name = "ul"

            [[days]]
            exercises = [{ name = "deadlift", sets = 3 }]

            [[days]]
            exercises = [
                { name = "squat", sets = 3 },
                { name = "squat", sets = 5 },
            ]
            "#,
        );

        import_single_plan(&pool, file.to_str().unwrap()).await.unwrap();
        assert_eq!(table_counts(&pool).await, (0, 0, 0));
    }

    #[tokio::test]
    async fn import_builds_contiguous_days_from_file_order() {
        let pool = db::open_test().await;
        seed_exercise(&pool, "squat").await;
        seed_exercise(&pool, "bench press").await;

        let file = write_plan_toml(
            r#"
            name = "ul"

            [[days]]
            name = "Lower"
            exercises = [{ name = "squat", sets = 3, weight = 100.0, reps = 5 }]

            [[days]]
            name = "Upper"
            exercises = [{ name = "bench press", sets = 3, group = 1 }]
            "#,
        );

        import_single_plan(&pool, file.to_str().unwrap()).await.unwrap();
        assert_eq!(table_counts(&pool).await, (1, 2, 2));

        let indices: Vec<i64> =
            sqlx::query_scalar("SELECT day_index FROM plan_days ORDER BY day_index")
                .fetch_all(&pool)
                .await
                .unwrap();
        assert_eq!(indices, vec![1, 2]);

        // Importing the same name again is a skip, not a second plan.
        import_single_plan(&pool, file.to_str().unwrap()).await.unwrap();
        let (plans, _, _) = table_counts(&pool).await;
        assert_eq!(plans, 1);
    }
}
