pub mod calendar;
pub mod config;
pub mod cycle;
pub mod day;
pub mod exercise;
pub mod plan;
pub mod profile;
