use anyhow::Result;
use colored::Colorize;

use crate::{cli::ConfigCmd, types::Config};

/// Keys the app actually reads; anything else is a typo until a feature
/// claims it.
const KNOWN_KEYS: &[(&str, &[&str])] = &[("weight_unit", &["kg", "lb"])];

pub async fn handle(cmd: ConfigCmd) -> Result<()> {
    let config_path = Config::default_path()?;
    let mut cfg = Config::load(&config_path)?;

    match cmd {
        ConfigCmd::List => {
            if cfg.map.is_empty() {
                println!("{}", "(no config set)".dimmed());
            } else {
                println!("{}", "Config:".cyan().bold());
                for (k, v) in &cfg.map {
                    println!("  {} = {}", k.green(), v);
                }
            }
        }

        ConfigCmd::Get { key } => match cfg.map.get(&key) {
            Some(val) => println!("{}", val),
            None => println!("{} key `{}` not found", "warning:".yellow().bold(), key),
        },

        ConfigCmd::Set { key, val } => {
            let Some((_, allowed)) = KNOWN_KEYS.iter().find(|(k, _)| *k == key) else {
                let known: Vec<_> = KNOWN_KEYS.iter().map(|(k, _)| *k).collect();
                println!(
                    "{} unknown key `{}` (known keys: {})",
                    "error:".red().bold(),
                    key,
                    known.join(", ")
                );
                return Ok(());
            };
            if !allowed.contains(&val.as_str()) {
                println!(
                    "{} `{}` must be one of: {}",
                    "error:".red().bold(),
                    key,
                    allowed.join(", ")
                );
                return Ok(());
            }

            cfg.map.insert(key.clone(), val.clone());
            cfg.save(&config_path)?;
            println!("{} set `{}` = `{}`", "info:".blue().bold(), key.green(), val);
        }

        ConfigCmd::Unset { key } => {
            if cfg.map.remove(&key).is_some() {
                cfg.save(&config_path)?;
                println!("{} removed `{}`", "info:".blue().bold(), key.green());
            } else {
                println!("{} key `{}` not found", "warning:".yellow().bold(), key);
            }
        }
    }

    Ok(())
}
