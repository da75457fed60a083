// src/output.rs

//! Printing command results and failures, for people or for `--json`.

use serde::Serialize;

use crate::errors::{ErrorReport, Result};

/// Print the outcome of a command and return the process exit status.
///
/// Successes go to stdout (`human` text or the JSON-serialized value).
/// Failures go to stderr as text, or to stdout as an [`ErrorReport`] when
/// `json` is set so automation reads one stream.
pub fn emit<T, F>(command: &str, json: bool, result: Result<T>, human: F) -> i32
where
    T: Serialize,
    F: FnOnce(&T) -> String,
{
    match result {
        Ok(value) => {
            if json {
                match serde_json::to_string_pretty(&value) {
                    Ok(text) => println!("{text}"),
                    Err(e) => {
                        eprintln!("{command} error: serializing result: {e}");
                        return 1;
                    }
                }
            } else {
                println!("{}", human(&value));
            }
            0
        }
        Err(err) => {
            if json {
                let report = ErrorReport::from(&err);
                match serde_json::to_string_pretty(&report) {
                    Ok(text) => println!("{text}"),
                    Err(_) => eprintln!("{command} error: {err}"),
                }
            } else {
                match err.stage() {
                    Some(stage) => eprintln!("{command} failed at {stage}: {err}"),
                    None => eprintln!("{command} failed: {err}"),
                }
            }
            err.exit_code()
        }
    }
}
