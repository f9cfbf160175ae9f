use clap::{Parser, Subcommand};

use crate::types::ExecutionMode;

#[derive(Parser)]
#[command(name = "repcycle", version, about = "CLI workout log with rotating plans")]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Emit machine-readable JSON instead of colorful text.
    #[arg(global = true, long)]
    pub json: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Today's (or any date's) workout
    #[command(subcommand, visible_alias = "d")]
    Day(DayCmd),

    /// Plan management
    #[command(subcommand, visible_alias = "p")]
    Plan(PlanCmd),

    /// Cycle management
    #[command(subcommand, visible_alias = "c")]
    Cycle(CycleCmd),

    /// Exercise catalog
    #[command(subcommand, visible_alias = "ex")]
    Exercise(ExerciseCmd),

    /// Profile settings
    #[command(subcommand)]
    Profile(ProfileCmd),

    /// Show logged workouts in a calendar view
    #[command(visible_alias = "cal")]
    Calendar {
        /// Year to show (defaults to current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Month to show (1-12, defaults to current month)
        #[arg(short, long)]
        month: Option<u32>,
    },

    /// View or edit repcycle config
    #[command(subcommand)]
    Config(ConfigCmd),
}

//
// Commands
//

#[derive(Subcommand)]
pub enum DayCmd {
    /// Show the workout for a date (creates today's on first access)
    #[command(visible_alias = "s")]
    Show {
        /// Date in YYYY-MM-DD format (defaults to today's workout date)
        #[arg(short, long)]
        date: Option<String>,
    },

    /// Log a set - Usage: day log EXERCISE WEIGHT REPS
    #[command(visible_alias = "l")]
    #[command(override_usage = "day log <EXERCISE> <WEIGHT> <REPS>")]
    Log {
        /// Exercise index (same order shown in `day show`)
        #[arg(value_name = "EXERCISE")]
        exercise: usize,

        /// Weight in kg (use "bw" for bodyweight exercises)
        #[arg(value_name = "WEIGHT")]
        weight: String,

        /// Number of reps
        #[arg(value_name = "REPS")]
        reps: i64,

        /// Specific set index to log (defaults to next pending set)
        #[arg(long, short = 's')]
        set: Option<usize>,
    },

    /// Remove a logged set (soft delete) - Usage: day unlog EXERCISE SET
    Unlog {
        /// Exercise index
        #[arg(value_name = "EXERCISE")]
        exercise: usize,

        /// Set index
        #[arg(value_name = "SET")]
        set: usize,
    },

    /// Add a free exercise to a day's workout
    AddEx {
        /// Exercise index or name
        exercise: String,

        /// Number of sets to pre-create
        #[arg(default_value = "3")]
        sets: i64,
    },

    /// Mark today's plan day as completed
    Done,

    /// Preview which plan day applies to a date, without logging anything
    Preview {
        /// Date in YYYY-MM-DD format
        date: String,
    },

    /// Switch today to a different day of the current plan
    Change {
        /// Target day index (1-based)
        day: i64,

        /// Also move the progress pointer to the target day
        #[arg(long)]
        skip: bool,
    },

    /// Undo the last day change for today
    Undo,
}

#[derive(Subcommand)]
pub enum PlanCmd {
    /// Import one or more plans from TOML files
    #[command(visible_alias = "i")]
    Import { files: Vec<String> },

    /// List plans
    #[command(visible_alias = "l")]
    List,

    /// Show a single plan in detail
    #[command(visible_alias = "s")]
    Show {
        /// Plan index (from `p list`) or exact name
        plan: String,
    },

    /// Delete a plan (detaches it from any cycles)
    #[command(visible_alias = "d")]
    Delete {
        /// Plan index (from `p list`) or exact name
        plan: String,
    },
}

#[derive(Subcommand)]
pub enum CycleCmd {
    /// Create a cycle from an ordered list of plans
    Create {
        /// Cycle name
        name: String,

        /// Plan indices or names, in rotation order
        #[arg(required = true)]
        plans: Vec<String>,
    },

    /// List cycles
    #[command(visible_alias = "l")]
    List,

    /// Activate a cycle (deactivates any other)
    Activate {
        /// Cycle index (from `c list`) or exact name
        cycle: String,
    },

    /// Deactivate a cycle, keeping its progress for later
    Deactivate {
        /// Cycle index (from `c list`) or exact name
        cycle: String,
    },

    /// Show a cycle's plans and current position
    #[command(visible_alias = "s")]
    Show {
        /// Cycle index (from `c list`) or exact name
        cycle: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum ExerciseCmd {
    /// Add a new exercise
    #[command(visible_alias = "a")]
    Add {
        /// Exercise name
        name: String,

        /// Primary muscle group
        #[arg(short, long)]
        muscle: String,

        /// Exercise description
        #[arg(short, long)]
        desc: Option<String>,
    },

    /// Import exercises from a TOML file
    #[command(visible_alias = "i")]
    Import {
        /// Path to TOML file
        file: String,
    },

    /// List all exercises
    #[command(visible_alias = "l")]
    List {
        /// Filter by muscle group
        #[arg(short, long)]
        muscle: Option<String>,
    },

    /// Delete an exercise
    #[command(visible_alias = "d")]
    Delete {
        /// Exercise index or name
        exercise: String,
    },
}

#[derive(Subcommand)]
pub enum ProfileCmd {
    /// Show profile settings
    Show,

    /// Set the execution mode
    Mode {
        #[arg(value_enum)]
        mode: ExecutionMode,
    },

    /// Set the active plan (single mode)
    Plan {
        /// Plan index (from `p list`) or exact name
        plan: String,
    },

    /// Set the hour at which a new workout day begins (0-23)
    TransitionHour { hour: u8 },
}

#[derive(Subcommand)]
pub enum ConfigCmd {
    /// Show all config keys
    List,

    /// Get the value of a key
    Get { key: String },

    /// Set or override a key
    Set { key: String, val: String },

    /// Remove a key
    Unset { key: String },
}
