//! Spawns a child process per relayed message (spec §4.6). A single bound
//! listener accumulates frames into complete messages, which a pool of
//! spawner threads then feeds to [`runner::WorkerRunner`] as child processes.

pub mod pool;
pub mod runner;

pub use runner::{Message, RunnerError, WorkerRunner};
