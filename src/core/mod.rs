//! The progression core: workout-date math, plan/cycle pointers, template
//! expansion, day resolution, and the day-change transaction. Everything in
//! here is synchronous with respect to its own callers (one mutation flow at
//! a time over the local database); the command layer never mutates these
//! tables except through this module.

pub mod dates;
pub mod daychange;
pub mod expand;
pub mod profile;
pub mod progress;
pub mod resolver;
pub mod rotate;

#[cfg(test)]
pub mod testutil;
