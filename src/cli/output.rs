//! Output formatting utilities for the CLI.

use serde::Serialize;

use crate::domain::models::RunRecord;

pub trait CommandOutput: Serialize {
    fn to_human(&self) -> String;
    fn to_json(&self) -> serde_json::Value;
}

/// Print to stdout; logs go to stderr.
pub fn output<T: CommandOutput>(result: &T, json_mode: bool) {
    if json_mode {
        println!("{}", serde_json::to_string_pretty(&result.to_json()).unwrap_or_default());
    } else {
        println!("{}", result.to_human());
    }
}

/// One `column: value` line per record column.
pub fn format_record(record: &RunRecord) -> String {
    let values = [
        record.exec_time.to_string(),
        record.avg_cpu.to_string(),
        record.avg_mem.to_string(),
        record.energy_usage.to_string(),
        record.accuracy.clone(),
    ];
    RunRecord::COLUMNS
        .iter()
        .zip(values)
        .map(|(column, value)| format!("  {column:<13} {value}"))
        .collect::<Vec<_>>()
        .join("\n")
}
