use std::fs::read_to_string;

use anyhow::{Context, Result};
use colored::Colorize;
use serde::Deserialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{
    cli::ExerciseCmd,
    types::{OutputFmt, canonical_muscle, emit, suggest_muscle},
};

#[derive(Debug, Deserialize)]
struct ExercisesToml {
    exercises: Vec<ExerciseToml>,
}

#[derive(Debug, Deserialize)]
struct ExerciseToml {
    name: String,
    muscle: String,
    description: Option<String>,
}

pub async fn handle(cmd: ExerciseCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    match cmd {
        ExerciseCmd::Add { name, muscle, desc } => {
            let Some(muscle) = check_muscle(&muscle) else {
                return Ok(());
            };

            insert_exercise(pool, &name, &muscle, desc.as_deref()).await
        }

        ExerciseCmd::Import { file } => {
            let toml_str = match read_to_string(&file) {
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

            let parsed: ExercisesToml =
                toml::from_str(&toml_str).with_context(|| format!("parsing `{file}`"))?;

            for ex in parsed.exercises {
                let Some(muscle) = check_muscle(&ex.muscle) else {
                    continue;
                };
                insert_exercise(pool, &ex.name, &muscle, ex.description.as_deref()).await?;
            }

            Ok(())
        }

        ExerciseCmd::List { muscle } => {
            let filter = match muscle {
                Some(m) => match check_muscle(&m) {
                    Some(canonical) => Some(canonical),
                    None => return Ok(()),
                },
                None => None,
            };

            let rows = match &filter {
                Some(m) => {
                    sqlx::query(
                        r#"
                        SELECT ROW_NUMBER() OVER (ORDER BY name) AS idx,
                               name, primary_muscle AS muscle, description
                        FROM   exercises
                        WHERE  primary_muscle = ?
                        ORDER  BY idx
                        "#,
                    )
                    .bind(m)
                    .fetch_all(pool)
                    .await?
                }
                None => {
                    sqlx::query(
                        r#"
                        SELECT ROW_NUMBER() OVER (ORDER BY name) AS idx,
                               name, primary_muscle AS muscle, description
                        FROM   exercises
                        ORDER  BY idx
                        "#,
                    )
                    .fetch_all(pool)
                    .await?
                }
            };

            #[derive(serde::Serialize)]
            struct ExerciseJson {
                idx: i64,
                name: String,
                muscle: String,
                description: Option<String>,
            }

            let exercises: Vec<ExerciseJson> = rows
                .iter()
                .map(|r| ExerciseJson {
                    idx: r.get("idx"),
                    name: r.get("name"),
                    muscle: r.get("muscle"),
                    description: r.get("description"),
                })
                .collect();

            emit(fmt, &exercises, || {
                if exercises.is_empty() {
                    println!("{}", "  (no exercises found)".dimmed());
                    return;
                }
                println!("{}", "Exercises:".cyan().bold());
                for ex in &exercises {
                    let idx = format!("{}", ex.idx).yellow();
                    let desc = ex
                        .description
                        .as_deref()
                        .map(|d| format!(" — {}", d))
                        .unwrap_or_default();
                    println!(
                        " {} • {} {}{}",
                        idx,
                        ex.name.bold(),
                        format!("[{}]", ex.muscle).dimmed(),
                        desc.dimmed()
                    );
                }
            });

            Ok(())
        }

        ExerciseCmd::Delete { exercise } => {
            let Some(ex_id) = resolve_exercise_id(pool, &exercise).await? else {
                println!("{} no exercise matching `{}`", "error:".red().bold(), exercise);
                return Ok(());
            };

            // Refuse while a plan still references it; past workout entries
            // keep the dangling id and render as "(deleted exercise)".
            let referencing: Vec<String> = sqlx::query_scalar(
                r#"
                SELECT DISTINCT p.name
                FROM plan_exercises pe
                JOIN plan_days pd ON pd.id = pe.plan_day_id
                JOIN plans p      ON p.id = pd.plan_id
                WHERE pe.exercise_id = ?
                "#,
            )
            .bind(&ex_id)
            .fetch_all(pool)
            .await?;

            if !referencing.is_empty() {
                println!(
                    "{} `{}` is used by plans: {} – delete or edit those first",
                    "error:".red().bold(),
                    exercise,
                    referencing.join(", ")
                );
                return Ok(());
            }

            sqlx::query("DELETE FROM exercises WHERE id = ?")
                .bind(&ex_id)
                .execute(pool)
                .await?;

            println!("{} deleted `{}`", "ok:".green().bold(), exercise);
            Ok(())
        }
    }
}

/// Validate a muscle argument, printing the error (with a fuzzy suggestion
/// when one is convincing) on failure.
fn check_muscle(input: &str) -> Option<String> {
    if let Some(canonical) = canonical_muscle(input) {
        return Some(canonical);
    }

    match suggest_muscle(input) {
        Some(s) => println!(
            "{} unknown muscle `{}` – did you mean `{}`?",
            "error:".red().bold(),
            input,
            s.green()
        ),
        None => println!("{} unknown muscle `{}`", "error:".red().bold(), input),
    }
    None
}

async fn insert_exercise(
    pool: &SqlitePool,
    name: &str,
    muscle: &str,
    description: Option<&str>,
) -> Result<()> {
    let res = sqlx::query(
        "INSERT INTO exercises (id, name, primary_muscle, description) VALUES (?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(name)
    .bind(muscle)
    .bind(description)
    .execute(pool)
    .await;

    if let Err(sqlx::Error::Database(db_err)) = &res {
        if db_err.code() == Some("2067".into()) {
            println!(
                "{} exercise `{}` already exists – skipping",
                "warning:".yellow().bold(),
                name
            );
            return Ok(());
        }
    }
    res?;

    println!("{} `{}`", "ok:".green().bold(), name);
    Ok(())
}

async fn resolve_exercise_id(pool: &SqlitePool, arg: &str) -> Result<Option<String>> {
    let id: Option<String> = if let Ok(idx) = arg.parse::<i64>() {
        sqlx::query_scalar(
            r#"
            SELECT id
            FROM (
              SELECT id, ROW_NUMBER() OVER (ORDER BY name) AS rn
              FROM exercises
            ) t
            WHERE t.rn = ?
            "#,
        )
        .bind(idx)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_scalar("SELECT id FROM exercises WHERE name = ?")
            .bind(arg)
            .fetch_optional(pool)
            .await?
    };

    Ok(id)
}
