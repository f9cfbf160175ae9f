use anyhow::Result;
use chrono::NaiveDate;
use colored::Colorize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    cli::DayCmd,
    core::{daychange, dates, profile, progress, resolver, rotate},
    models::{Profile, WorkoutDay, WorkoutEntry, WorkoutSet},
    types::{Config, ExecutionMode, OutputFmt, Source, WeightUnit, emit},
};

pub async fn handle(cmd: DayCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    let profile = profile::get_or_create(pool).await?;
    let hour = profile.day_transition_hour as u8;
    let today = dates::today_workout_date(hour);
    let unit = Config::load(&Config::default_path()?)?.weight_unit();

    // The CLI-entry equivalent of the app coming to the foreground: catch up
    // the progress pointer if a completed day slipped behind today.
    resolver::sync(pool, &profile, today).await?;

    match cmd {
        DayCmd::Show { date } => {
            let target = match parse_date_arg(date.as_deref(), today) {
                Some(d) => d,
                None => return Ok(()),
            };

            let day = resolver::get_or_create_workout_day(pool, &profile, target, today).await?;
            show_day(pool, &day, unit, fmt).await
        }

        DayCmd::Log {
            exercise,
            weight,
            reps,
            set,
        } => {
            let day = resolver::get_or_create_workout_day(pool, &profile, today, today).await?;

            let Some(entry) = entry_at(pool, &day.id, exercise).await? else {
                println!("{} no exercise at index {}", "error:".red().bold(), exercise);
                return Ok(());
            };

            // "bw" logs a bodyweight set.
            let parsed_weight = if weight.eq_ignore_ascii_case("bw") {
                None
            } else {
                match weight.parse::<f64>() {
                    Ok(w) => Some(w),
                    Err(_) => {
                        println!("{} invalid weight: {}", "error:".red().bold(), weight);
                        return Ok(());
                    }
                }
            };

            let sets = entry_sets(pool, &entry.id).await?;
            let target_set = match set {
                Some(s) => sets.iter().find(|x| x.set_index == s as i64).cloned(),
                None => sets.iter().find(|x| !x.completed).cloned(),
            };

            let set_index = match target_set {
                Some(s) => {
                    sqlx::query(
                        "UPDATE workout_sets SET weight = ?, reps = ?, completed = 1 WHERE id = ?",
                    )
                    .bind(parsed_weight)
                    .bind(reps)
                    .bind(&s.id)
                    .execute(pool)
                    .await?;
                    s.set_index
                }
                None => {
                    // All planned sets are done (or an explicit index beyond
                    // them was given): append a new set.
                    let next_index = set
                        .map(|s| s as i64)
                        .unwrap_or_else(|| sets.iter().map(|x| x.set_index).max().unwrap_or(0) + 1);
                    sqlx::query(
                        "INSERT INTO workout_sets (id, entry_id, set_index, weight, reps, completed, deleted) \
                         VALUES (?, ?, ?, ?, ?, 1, 0)",
                    )
                    .bind(Uuid::new_v4().to_string())
                    .bind(&entry.id)
                    .bind(next_index)
                    .bind(parsed_weight)
                    .bind(reps)
                    .execute(pool)
                    .await?;
                    next_index
                }
            };

            let weight_display = match parsed_weight {
                Some(w) => unit.format(w),
                None => "bw".to_string(),
            };
            println!(
                "{} logged set {} for exercise {} ({} × {})",
                "ok:".green().bold(),
                set_index,
                exercise,
                weight_display,
                reps
            );
            Ok(())
        }

        DayCmd::Unlog { exercise, set } => {
            let Some(day) = resolver::get_workout_day(pool, &profile.id, today).await? else {
                println!("{} nothing logged today", "error:".red().bold());
                return Ok(());
            };

            let Some(entry) = entry_at(pool, &day.id, exercise).await? else {
                println!("{} no exercise at index {}", "error:".red().bold(), exercise);
                return Ok(());
            };

            let affected = sqlx::query(
                "UPDATE workout_sets SET deleted = 1 WHERE entry_id = ? AND set_index = ? AND deleted = 0",
            )
            .bind(&entry.id)
            .bind(set as i64)
            .execute(pool)
            .await?
            .rows_affected();

            if affected == 0 {
                println!("{} no set at index {}", "error:".red().bold(), set);
            } else {
                println!("{} removed set {}-{}", "ok:".green().bold(), exercise, set);
            }
            Ok(())
        }

        DayCmd::AddEx { exercise, sets } => {
            let Some(ex_id) = resolve_exercise_id(pool, &exercise).await? else {
                println!("{} no exercise matching `{}`", "error:".red().bold(), exercise);
                return Ok(());
            };

            let day = resolver::get_or_create_workout_day(pool, &profile, today, today).await?;

            let next_order: i64 = sqlx::query_scalar(
                "SELECT COALESCE(MAX(order_index) + 1, 0) FROM workout_entries WHERE workout_day_id = ?",
            )
            .bind(&day.id)
            .fetch_one(pool)
            .await?;

            let mut tx = pool.begin().await?;
            let entry_id = Uuid::new_v4().to_string();
            sqlx::query(
                "INSERT INTO workout_entries (id, workout_day_id, exercise_id, order_index, source, planned_sets) \
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(&entry_id)
            .bind(&day.id)
            .bind(&ex_id)
            .bind(next_order)
            .bind(Source::Free)
            .bind(sets)
            .execute(&mut *tx)
            .await?;

            for set_index in 1..=sets {
                sqlx::query(
                    "INSERT INTO workout_sets (id, entry_id, set_index, completed, deleted) VALUES (?, ?, ?, 0, 0)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&entry_id)
                .bind(set_index)
                .execute(&mut *tx)
                .await?;
            }
            tx.commit().await?;

            println!("{} added `{}` with {} sets", "ok:".green().bold(), exercise, sets);
            Ok(())
        }

        DayCmd::Done => {
            match plan_context_label(pool, &profile).await? {
                Some(label) => {
                    match profile.execution_mode {
                        ExecutionMode::Single => {
                            // plan_context_label guarantees an active plan here.
                            let plan_id = profile.active_plan_id.clone().unwrap_or_default();
                            progress::get_or_create(pool, &profile.id, &plan_id).await?;
                            progress::mark_completed(pool, &profile.id, &plan_id, chrono::Local::now())
                                .await?;
                        }
                        ExecutionMode::Cycle => {
                            if let Some(cycle) = rotate::get_active_cycle(pool, &profile.id).await? {
                                rotate::mark_completed(pool, &cycle.id, chrono::Local::now()).await?;
                            }
                        }
                    }
                    println!(
                        "{} {} completed – next day unlocks after {}",
                        "ok:".green().bold(),
                        label.bold(),
                        "the day rolls over".dimmed()
                    );
                }
                None => {
                    println!("{} no active plan or cycle", "error:".red().bold());
                }
            }
            Ok(())
        }

        DayCmd::Preview { date } => {
            let Some(target) = parse_date_arg(Some(&date), today) else {
                return Ok(());
            };

            match resolver::preview(pool, &profile, target, today).await? {
                Some(info) => {
                    emit(fmt, &info, || {
                        println!(
                            "{} {} — {} ({} of {})",
                            target.format("%Y-%m-%d").to_string().green(),
                            info.plan_name.bold(),
                            info.day_name,
                            info.day_index,
                            info.total_days
                        );
                    });
                }
                None => {
                    println!("{} free day (no active plan or cycle)", target.format("%Y-%m-%d"));
                }
            }
            Ok(())
        }

        DayCmd::Change { day, skip } => {
            if !daychange::can_change_day(pool, &profile, today).await? {
                println!(
                    "{} cannot change day – no multi-day plan active, or completed sets exist today",
                    "error:".red().bold()
                );
                return Ok(());
            }

            if daychange::change_day(pool, &profile, today, today, day, skip).await? {
                let skip_note = if skip { " (pointer moved)" } else { "" };
                println!(
                    "{} switched today to day {}{}",
                    "ok:".green().bold(),
                    day,
                    skip_note
                );
            } else {
                println!("{} day {} is out of range", "error:".red().bold(), day);
            }
            Ok(())
        }

        DayCmd::Undo => {
            let Some(day) = resolver::get_workout_day(pool, &profile.id, today).await? else {
                println!("{} nothing to undo today", "error:".red().bold());
                return Ok(());
            };

            if daychange::undo(pool, &day.id).await? {
                println!("{} day change undone", "ok:".green().bold());
            } else {
                println!("{} no day change to undo", "error:".red().bold());
            }
            Ok(())
        }
    }
}

fn parse_date_arg(arg: Option<&str>, today: NaiveDate) -> Option<NaiveDate> {
    match arg {
        None => Some(today),
        Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            Ok(d) => Some(d),
            Err(_) => {
                println!(
                    "{} invalid date `{}` (expected YYYY-MM-DD)",
                    "error:".red().bold(),
                    s
                );
                None
            }
        },
    }
}

async fn entry_at(
    pool: &SqlitePool,
    workout_day_id: &str,
    index: usize,
) -> Result<Option<WorkoutEntry>> {
    let Some(offset) = index.checked_sub(1) else {
        return Ok(None);
    };

    let entry = sqlx::query_as::<_, WorkoutEntry>(
        "SELECT * FROM workout_entries WHERE workout_day_id = ? ORDER BY order_index LIMIT 1 OFFSET ?",
    )
    .bind(workout_day_id)
    .bind(offset as i64)
    .fetch_optional(pool)
    .await?;

    Ok(entry)
}

async fn entry_sets(pool: &SqlitePool, entry_id: &str) -> Result<Vec<WorkoutSet>> {
    let sets = sqlx::query_as::<_, WorkoutSet>(
        "SELECT * FROM workout_sets WHERE entry_id = ? AND deleted = 0 ORDER BY set_index",
    )
    .bind(entry_id)
    .fetch_all(pool)
    .await?;

    Ok(sets)
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

async fn plan_context_label(pool: &SqlitePool, profile: &Profile) -> Result<Option<String>> {
    match profile.execution_mode {
        ExecutionMode::Single => {
            let Some(plan_id) = &profile.active_plan_id else {
                return Ok(None);
            };
            let name: Option<String> = sqlx::query_scalar("SELECT name FROM plans WHERE id = ?")
                .bind(plan_id)
                .fetch_optional(pool)
                .await?;
            Ok(name)
        }
        ExecutionMode::Cycle => {
            let Some(cycle) = rotate::get_active_cycle(pool, &profile.id).await? else {
                return Ok(None);
            };
            Ok(rotate::current_plan_day(pool, &cycle.id)
                .await?
                .map(|(plan, day, _)| format!("{} / {}", plan.name, day.display_name())))
        }
    }
}

async fn show_day(
    pool: &SqlitePool,
    day: &WorkoutDay,
    unit: WeightUnit,
    fmt: OutputFmt,
) -> Result<()> {
    let info = resolver::resolve_existing(pool, day).await?;

    let entries = sqlx::query_as::<_, WorkoutEntry>(
        "SELECT * FROM workout_entries WHERE workout_day_id = ? ORDER BY order_index",
    )
    .bind(&day.id)
    .fetch_all(pool)
    .await?;

    #[derive(serde::Serialize)]
    struct DayJson {
        date: NaiveDate,
        mode: Source,
        plan: Option<crate::models::DayInfo>,
        exercises: Vec<ExerciseJson>,
    }
    #[derive(serde::Serialize)]
    struct ExerciseJson {
        name: String,
        planned_sets: i64,
        sets: Vec<WorkoutSet>,
    }

    let mut rendered = Vec::new();
    for entry in &entries {
        let name: String = sqlx::query_scalar("SELECT name FROM exercises WHERE id = ?")
            .bind(&entry.exercise_id)
            .fetch_optional(pool)
            .await?
            .unwrap_or_else(|| "(deleted exercise)".to_string());
        rendered.push(ExerciseJson {
            name,
            planned_sets: entry.planned_sets,
            sets: entry_sets(pool, &entry.id).await?,
        });
    }

    let out = DayJson {
        date: day.workout_date,
        mode: day.mode,
        plan: info,
        exercises: rendered,
    };

    emit(fmt, &out, || {
        let header = match &out.plan {
            Some(info) => format!(
                "{} — {} ({} of {})",
                info.plan_name, info.day_name, info.day_index, info.total_days
            ),
            None => "free day".to_string(),
        };
        println!(
            "{} {} | {}",
            "Workout:".cyan().bold(),
            out.date.format("%Y-%m-%d").to_string().bold(),
            header
        );

        if out.exercises.is_empty() {
            println!("{}", "  (no exercises – `day add-ex` to log freely)".dimmed());
            return;
        }

        for (i, ex) in out.exercises.iter().enumerate() {
            let idx = format!("{}", i + 1).yellow();
            println!("\n{} • {}", idx, ex.name.bold());

            for set in &ex.sets {
                let mark = if set.completed {
                    "✓".green().to_string()
                } else {
                    "·".dimmed().to_string()
                };
                let detail = match (set.weight, set.reps) {
                    (Some(w), Some(r)) => format!("{} × {}", unit.format(w), r),
                    (None, Some(r)) => format!("bw × {}", r),
                    _ => match set.duration_secs {
                        Some(secs) => format!("{}:{:02}", secs / 60, secs % 60),
                        None => "—".to_string(),
                    },
                };
                println!("    {} {} {}", format!("{}", set.set_index).yellow(), mark, detail);
            }
        }
        println!();
    });

    Ok(())
}
