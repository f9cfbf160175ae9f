use anyhow::Result;
use colored::Colorize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::{
    cli::CycleCmd,
    commands::plan::resolve_plan_id,
    core::rotate,
    types::{OutputFmt, emit},
};

async fn resolve_cycle_id(pool: &SqlitePool, arg: &str) -> Result<Option<String>> {
    let id: Option<String> = if let Ok(idx) = arg.parse::<i64>() {
        sqlx::query_scalar(
            r#"
            SELECT id
            FROM (
              SELECT id, ROW_NUMBER() OVER (ORDER BY name) AS rn
              FROM cycles
            ) t
            WHERE t.rn = ?
            "#,
        )
        .bind(idx)
        .fetch_optional(pool)
        .await?
    } else {
        sqlx::query_scalar("SELECT id FROM cycles WHERE name = ?")
            .bind(arg)
            .fetch_optional(pool)
            .await?
    };

    if id.is_none() {
        println!("{} no cycle matching `{}`", "error:".red().bold(), arg);
    }

    Ok(id)
}

pub async fn handle(cmd: CycleCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    let profile = crate::core::profile::get_or_create(pool).await?;

    match cmd {
        CycleCmd::Create { name, plans } => {
            // Resolve every plan before writing anything.
            let mut plan_ids = Vec::with_capacity(plans.len());
            for p in &plans {
                let Some(id) = resolve_plan_id(pool, p).await? else {
                    return Ok(());
                };
                plan_ids.push(id);
            }

            let mut tx = pool.begin().await?;

            let cycle_id = Uuid::new_v4().to_string();
            let res = sqlx::query(
                "INSERT INTO cycles (id, profile_id, name, is_active, created_at) \
                 VALUES (?, ?, ?, 0, datetime('now'))",
            )
            .bind(&cycle_id)
            .bind(&profile.id)
            .bind(&name)
            .execute(&mut *tx)
            .await;

            if let Err(sqlx::Error::Database(db_err)) = &res {
                if db_err.code() == Some("2067".into()) {
                    println!(
                        "{} cycle `{}` already exists",
                        "error:".red().bold(),
                        name
                    );
                    tx.rollback().await?;
                    return Ok(());
                }
            }
            res?;

            for (order_idx, plan_id) in plan_ids.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO cycle_items (id, cycle_id, plan_id, order_index) VALUES (?, ?, ?, ?)",
                )
                .bind(Uuid::new_v4().to_string())
                .bind(&cycle_id)
                .bind(plan_id)
                .bind(order_idx as i64)
                .execute(&mut *tx)
                .await?;
            }

            tx.commit().await?;
            println!(
                "{} created cycle `{}` with {} plans",
                "ok:".green().bold(),
                name,
                plan_ids.len()
            );
            Ok(())
        }

        CycleCmd::List => {
            let rows = sqlx::query(
                r#"
                SELECT ROW_NUMBER() OVER (ORDER BY name) AS idx,
                       id, name, is_active,
                       (SELECT COUNT(*) FROM cycle_items ci WHERE ci.cycle_id = cycles.id) AS plans
                FROM   cycles
                WHERE  profile_id = ?
                ORDER  BY idx
                "#,
            )
            .bind(&profile.id)
            .fetch_all(pool)
            .await?;

            #[derive(serde::Serialize)]
            struct CycleJson {
                idx: i64,
                name: String,
                plans: i64,
                active: bool,
            }

            let cycles: Vec<CycleJson> = rows
                .iter()
                .map(|r| CycleJson {
                    idx: r.get("idx"),
                    name: r.get("name"),
                    plans: r.get("plans"),
                    active: r.get::<i64, _>("is_active") != 0,
                })
                .collect();

            emit(fmt, &cycles, || {
                if cycles.is_empty() {
                    println!("{}", "  (no cycles found)".dimmed());
                    return;
                }
                println!("{}", "Cycles:".cyan().bold());
                for c in &cycles {
                    let idx = format!("{}", c.idx).yellow();
                    let marker = if c.active { " ← active".green().to_string() } else { String::new() };
                    println!(" {} • {} — {} plans{}", idx, c.name.bold(), c.plans, marker);
                }
            });

            Ok(())
        }

        CycleCmd::Activate { cycle } => {
            let Some(cycle_id) = resolve_cycle_id(pool, &cycle).await? else {
                return Ok(());
            };

            rotate::activate(pool, &profile.id, &cycle_id).await?;
            println!("{} activated `{}`", "ok:".green().bold(), cycle);
            Ok(())
        }

        CycleCmd::Deactivate { cycle } => {
            let Some(cycle_id) = resolve_cycle_id(pool, &cycle).await? else {
                return Ok(());
            };

            rotate::deactivate(pool, &cycle_id).await?;
            println!(
                "{} deactivated `{}` (progress kept)",
                "ok:".green().bold(),
                cycle
            );
            Ok(())
        }

        CycleCmd::Show { cycle } => {
            let Some(cycle_id) = resolve_cycle_id(pool, &cycle).await? else {
                return Ok(());
            };

            let Some(c) = rotate::get_cycle(pool, &cycle_id).await? else {
                return Ok(());
            };

            let items = rotate::items(pool, &cycle_id).await?;
            let progress = rotate::get_progress(pool, &cycle_id).await?;

            let active = if c.is_active { " (active)".green().to_string() } else { String::new() };
            println!("{} {}{}", "Cycle:".cyan().bold(), c.name.bold(), active);

            for (i, item) in items.iter().enumerate() {
                let plan_name: Option<String> =
                    sqlx::query_scalar("SELECT name FROM plans WHERE id = ?")
                        .bind(&item.plan_id)
                        .fetch_optional(pool)
                        .await?;
                let plan_name = plan_name.unwrap_or_else(|| "(missing plan)".to_string());

                let pointer = match &progress {
                    Some(p) if p.current_item_index == i as i64 => {
                        format!(" ← day {}", p.current_day_index).green().to_string()
                    }
                    _ => String::new(),
                };
                println!(
                    " {} • {}{}",
                    format!("{}", i + 1).yellow(),
                    plan_name.bold(),
                    pointer
                );
            }

            if items.is_empty() {
                println!("{}", "  (empty cycle)".dimmed());
            }

            Ok(())
        }
    }
}
