use chrono::{DateTime, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::types::{ExecutionMode, Metric, Source};

/// One row per installation, created lazily on first use.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Profile {
    pub id: String,
    pub execution_mode: ExecutionMode,
    pub active_plan_id: Option<String>,
    /// Hour [0,23] at which a new workout day begins. A 1 AM session with
    /// `day_transition_hour = 3` still belongs to the previous day.
    pub day_transition_hour: i64,
}

/// Ordered template of training days. Read-mostly; never mutated by the
/// resolution logic.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanDay {
    pub id: String,
    pub plan_id: String,
    /// 1-based, contiguous within the plan.
    pub day_index: i64,
    pub name: Option<String>,
}

impl PlanDay {
    /// Display name, falling back to "Day N".
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("Day {}", self.day_index))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanExercise {
    pub id: String,
    pub plan_day_id: String,
    pub exercise_id: String,
    pub order_index: i64,
    /// Exercises sharing a group index form a contiguous block (superset).
    pub group_index: Option<i64>,
    pub sets: i64,
    pub metric: Metric,
    pub target_weight: Option<f64>,
    pub target_reps: Option<i64>,
    pub target_duration_secs: Option<i64>,
    pub target_distance_m: Option<f64>,
}

/// Ordered, looping sequence of plans. At most one active per profile.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Cycle {
    pub id: String,
    pub profile_id: String,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CycleItem {
    pub id: String,
    pub cycle_id: String,
    pub plan_id: String,
    /// 0-based, contiguous. Kept gap-free so advance's modulo stays correct.
    pub order_index: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CycleProgress {
    pub cycle_id: String,
    pub current_item_index: i64,
    pub current_day_index: i64,
    pub last_completed_at: Option<DateTime<Local>>,
    /// Guard against double auto-advance within one workout date.
    pub last_advanced_for_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PlanProgress {
    pub profile_id: String,
    pub plan_id: String,
    pub current_day_index: i64,
    pub last_completed_at: Option<DateTime<Local>>,
    pub last_advanced_for_date: Option<NaiveDate>,
}

/// Concrete record of what was trained on one workout date. At most one per
/// (profile, workout date); created on first access, never auto-deleted.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutDay {
    pub id: String,
    pub profile_id: String,
    pub workout_date: NaiveDate,
    pub mode: Source,
    pub routine_plan_id: Option<String>,
    pub routine_day_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutEntry {
    pub id: String,
    pub workout_day_id: String,
    pub exercise_id: String,
    pub order_index: i64,
    pub source: Source,
    pub planned_sets: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WorkoutSet {
    pub id: String,
    pub entry_id: String,
    pub set_index: i64,
    pub weight: Option<f64>,
    pub reps: Option<i64>,
    pub duration_secs: Option<i64>,
    pub distance_m: Option<f64>,
    pub completed: bool,
    /// Soft delete: excluded from every count, restorable by undo.
    pub deleted: bool,
}

/// Resolved plan context for one workout date.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayInfo {
    pub plan_id: String,
    pub plan_name: String,
    pub plan_day_id: String,
    pub day_index: i64,
    pub total_days: i64,
    pub day_name: String,
}
