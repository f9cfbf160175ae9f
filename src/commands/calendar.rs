use anyhow::Result;
use chrono::{Datelike, NaiveDate};
use colored::Colorize;
use sqlx::SqlitePool;

use crate::core::{dates, profile};

pub async fn handle(pool: &SqlitePool, year: Option<i32>, month: Option<u32>) -> Result<()> {
    let p = profile::get_or_create(pool).await?;
    let today = dates::today_workout_date(p.day_transition_hour as u8);

    let year = year.unwrap_or(today.year());
    let month = month.unwrap_or(today.month());

    if !(1..=12).contains(&month) {
        println!("{} month must be between 1 and 12", "error:".red().bold());
        return Ok(());
    }

    let first_day = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let last_day = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    }
    .pred_opt()
    .unwrap();

    // Days with at least one completed set count as trained; empty shells
    // created by `day show` alone do not light up.
    let trained: Vec<(NaiveDate, Option<String>, i64)> = sqlx::query_as(
        r#"
        SELECT wd.workout_date, p.name,
               COUNT(*) AS sets
        FROM workout_days wd
        JOIN workout_entries we ON we.workout_day_id = wd.id
        JOIN workout_sets ws    ON ws.entry_id = we.id AND ws.completed = 1 AND ws.deleted = 0
        LEFT JOIN plans p       ON p.id = wd.routine_plan_id
        WHERE wd.profile_id = ? AND wd.workout_date BETWEEN ? AND ?
        GROUP BY wd.id
        ORDER BY wd.workout_date
        "#,
    )
    .bind(&p.id)
    .bind(first_day)
    .bind(last_day)
    .fetch_all(pool)
    .await?;

    let month_name = first_day.format("%B %Y").to_string();
    println!("\n{}", month_name.bold().cyan());
    println!("{}", "Su Mo Tu We Th Fr Sa".dimmed());

    let first_weekday = first_day.weekday().num_days_from_sunday() as usize;
    print!("{}", "   ".repeat(first_weekday));

    let trained_days: std::collections::HashSet<u32> =
        trained.iter().map(|(d, _, _)| d.day()).collect();

    for day in 1..=last_day.day() {
        if trained_days.contains(&day) {
            print!("{:>2} ", day.to_string().green().bold());
        } else if day == today.day() && year == today.year() && month == today.month() {
            print!("{:>2} ", day.to_string().yellow());
        } else {
            print!("{:2} ", day);
        }

        if (first_weekday + day as usize) % 7 == 0 {
            println!();
        }
    }
    println!("\n");

    if !trained.is_empty() {
        println!("{}", "Workouts:".bold().cyan());
        for (date, plan_name, sets) in &trained {
            let label = plan_name.as_deref().unwrap_or("free workout");
            println!(
                "  {} | {} {}",
                date.format("%a %b %d").to_string().green(),
                label.bold(),
                format!("({} sets)", sets).dimmed()
            );
        }
    }

    Ok(())
}
