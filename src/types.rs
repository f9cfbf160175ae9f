use std::{
    collections::BTreeMap,
    fmt::Display,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::ValueEnum;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use sqlx::prelude::Type;
use strsim::jaro_winkler;

/// How the profile picks the day to train: a single active plan, or a
/// rotating cycle of plans.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Single,
    Cycle,
}

impl Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Single => write!(f, "single"),
            Self::Cycle => write!(f, "cycle"),
        }
    }
}

/// What a set measures.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// weight × reps
    Weight,
    /// bodyweight reps
    Reps,
    /// duration and optional distance
    Time,
    /// done / not done
    Completion,
}

impl Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Weight => write!(f, "weight"),
            Self::Reps => write!(f, "reps"),
            Self::Time => write!(f, "time"),
            Self::Completion => write!(f, "completion"),
        }
    }
}

/// Where a workout day or entry came from: logged freely, or materialized
/// from a plan-day template.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Free,
    Routine,
}

impl Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Free => write!(f, "free"),
            Self::Routine => write!(f, "routine"),
        }
    }
}

#[derive(Clone, Debug, ValueEnum, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT")]
#[serde(rename_all = "kebab-case")]
pub enum Muscle {
    Biceps,
    Triceps,
    Forearms,
    Chest,
    Shoulders,
    Back,
    Quads,
    Hamstrings,
    Glutes,
    Calves,
    Abs,
}

pub static ALLOWED_MUSCLES: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "biceps",
        "triceps",
        "forearms",
        "chest",
        "shoulders",
        "back",
        "quads",
        "hamstrings",
        "glutes",
        "calves",
        "abs",
    ]
});

/// Returns the canonical lowercase muscle name, or `None` if unknown.
pub fn canonical_muscle<S: AsRef<str>>(m: S) -> Option<String> {
    let lowered = m.as_ref().trim().to_ascii_lowercase();
    ALLOWED_MUSCLES
        .iter()
        .find(|allowed| **allowed == lowered)
        .map(|allowed| allowed.to_string())
}

/// Closest allowed muscle for a typo, if the match is convincing enough to
/// suggest without being noise.
pub fn suggest_muscle(input: &str) -> Option<&'static str> {
    const MIN_SCORE: f64 = 0.80;

    let lowered = input.trim().to_ascii_lowercase();
    if lowered.is_empty() {
        return None;
    }

    ALLOWED_MUSCLES
        .iter()
        .map(|m| (*m, jaro_winkler(&lowered, m)))
        .filter(|(_, score)| *score >= MIN_SCORE)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(m, _)| m)
}

//
// Output format
//

#[derive(Clone, Copy, Debug)]
pub enum OutputFmt {
    Pretty,
    Json,
}

/// Print `val` as JSON, or run the pretty printer.
pub fn emit<T: Serialize>(fmt: OutputFmt, val: &T, pretty: impl FnOnce()) {
    match fmt {
        OutputFmt::Json => match serde_json::to_string_pretty(val) {
            Ok(s) => println!("{}", s),
            Err(e) => eprintln!("error: failed to encode JSON: {}", e),
        },
        OutputFmt::Pretty => pretty(),
    }
}

//
// Config file
//

/// Display unit for loads. Stored values are always kilograms; conversion is
/// presentation-only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WeightUnit {
    Kg,
    Lb,
}

impl WeightUnit {
    const KG_PER_LB: f64 = 0.453_592_37;

    pub fn format(self, kg: f64) -> String {
        match self {
            Self::Kg => format!("{}kg", kg),
            Self::Lb => format!("{:.1}lb", kg / Self::KG_PER_LB),
        }
    }
}

/// Flat key/value config persisted as TOML under the user config dir.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(flatten)]
    pub map: BTreeMap<String, String>,
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|d| d.join("repcycle").join("config.toml"))
            .context("could not determine config directory")
    }

    /// `weight_unit` key, defaulting to kilograms. Unrecognized values fall
    /// back to the default rather than erroring; `config set` validates on
    /// the way in.
    pub fn weight_unit(&self) -> WeightUnit {
        match self.map.get("weight_unit").map(String::as_str) {
            Some("lb") => WeightUnit::Lb,
            _ => WeightUnit::Kg,
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config `{}`", path.display()))?;
        toml::from_str(&content).with_context(|| format!("parsing config `{}`", path.display()))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating config dir `{}`", dir.display()))?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("writing config `{}`", path.display()))
    }
}
