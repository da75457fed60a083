// src/exec/mod.rs

//! Local process execution layer.
//!
//! - [`command`] holds the `CommandSpec` / `CommandOutput` value types.
//! - [`backend`] provides the `CommandRunner` trait and the
//!   `TokioCommandRunner` used in production, which tests replace with a
//!   scripted fake.

pub mod backend;
pub mod command;

pub use backend::{CommandRunner, TokioCommandRunner};
pub use command::{CommandOutput, CommandSpec};
