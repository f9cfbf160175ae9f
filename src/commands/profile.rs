use anyhow::Result;
use colored::Colorize;
use sqlx::SqlitePool;

use crate::{
    cli::ProfileCmd,
    commands::plan::resolve_plan_id,
    core::profile,
    types::{ExecutionMode, OutputFmt, emit},
};

pub async fn handle(cmd: ProfileCmd, pool: &SqlitePool, fmt: OutputFmt) -> Result<()> {
    let p = profile::get_or_create(pool).await?;

    match cmd {
        ProfileCmd::Show => {
            let plan_name: Option<String> = match &p.active_plan_id {
                Some(id) => {
                    sqlx::query_scalar("SELECT name FROM plans WHERE id = ?")
                        .bind(id)
                        .fetch_optional(pool)
                        .await?
                }
                None => None,
            };

            #[derive(serde::Serialize)]
            struct ProfileJson {
                execution_mode: ExecutionMode,
                active_plan: Option<String>,
                day_transition_hour: i64,
            }

            let out = ProfileJson {
                execution_mode: p.execution_mode,
                active_plan: plan_name,
                day_transition_hour: p.day_transition_hour,
            };

            emit(fmt, &out, || {
                println!("{}", "Profile:".cyan().bold());
                println!("  mode            {}", out.execution_mode.to_string().bold());
                println!(
                    "  active plan     {}",
                    out.active_plan
                        .as_deref()
                        .map(|n| n.bold().to_string())
                        .unwrap_or_else(|| "(none)".dimmed().to_string())
                );
                println!(
                    "  day starts at   {}",
                    format!("{:02}:00", out.day_transition_hour).bold()
                );
            });

            Ok(())
        }

        ProfileCmd::Mode { mode } => {
            profile::set_mode(pool, &p.id, mode).await?;
            println!("{} execution mode set to {}", "ok:".green().bold(), mode);
            Ok(())
        }

        ProfileCmd::Plan { plan } => {
            let Some(plan_id) = resolve_plan_id(pool, &plan).await? else {
                return Ok(());
            };

            profile::set_active_plan(pool, &p.id, Some(&plan_id)).await?;
            println!("{} active plan set to `{}`", "ok:".green().bold(), plan);
            Ok(())
        }

        ProfileCmd::TransitionHour { hour } => {
            if hour > 23 {
                println!("{} hour must be between 0 and 23", "error:".red().bold());
                return Ok(());
            }

            profile::set_transition_hour(pool, &p.id, hour).await?;
            println!(
                "{} new workout days now begin at {:02}:00",
                "ok:".green().bold(),
                hour
            );
            Ok(())
        }
    }
}
