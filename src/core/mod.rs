//! Decision core: configuration, memory accounting, and the policy loop

pub mod config;
pub mod memlist;
pub mod monitor;
pub mod sink;
