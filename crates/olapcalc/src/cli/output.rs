//! Output formatting utilities

use anyhow::{Context, Result};
use colored::Colorize;
use olapcalc_eval::{EvalError, FunctionTable, QueryResult};
use olapcalc_types::Tuple;
use serde_json::{Value, json};
use std::fs::File;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

#[cfg(feature = "cli")]
use tabled::{Table, Tabled, builder::Builder, settings::Style};

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    JsonPretty,
    Table,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "json" => Self::Json,
            "pretty" | "json-pretty" => Self::JsonPretty,
            _ => Self::Table,
        }
    }
}

/// Set up color output based on user preference
pub fn setup_colors(mode: &str) {
    match mode.to_lowercase().as_str() {
        "always" => colored::control::set_override(true),
        "never" => colored::control::set_override(false),
        _ => colored::control::set_override(io::stdout().is_terminal()),
    }
}

/// Format an error for display, with its code when it is an engine error
pub fn format_error(error: &anyhow::Error) -> String {
    match error.downcast_ref::<EvalError>() {
        Some(e) => format!("{} [{}] {:#}", "Error:".red().bold(), e.code(), error),
        None => format!("{} {:#}", "Error:".red().bold(), error),
    }
}

pub fn format_warning(warning: &str) -> String {
    format!("{} {}", "Warning:".yellow().bold(), warning)
}

pub fn format_success(message: &str) -> String {
    format!("{} {}", "Success:".green().bold(), message)
}

/// Write output to a file or stdout
pub fn write_output(content: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        let mut file = File::create(path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write to output file: {}", path.display()))?;
        eprintln!(
            "{}",
            format_success(&format!("Output written to {}", path.display()))
        );
    } else {
        println!("{content}");
    }
    Ok(())
}

pub fn format_json(value: &Value, pretty: bool) -> Result<String> {
    if pretty {
        serde_json::to_string_pretty(value).context("Failed to serialize JSON")
    } else {
        serde_json::to_string(value).context("Failed to serialize JSON")
    }
}

/// Member captions of a tuple
fn caption(tuple: &Tuple) -> String {
    tuple
        .iter()
        .map(|m| m.name().to_string())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Unique names of the tuples of every axis, with cells in axis-0-fastest
/// order
pub fn result_to_json(result: &QueryResult) -> Value {
    let axes: Vec<Value> = result
        .axes
        .iter()
        .map(|axis| {
            axis.iter()
                .map(|t| json!(t.iter().map(|m| m.unique_name().to_string()).collect::<Vec<_>>()))
                .collect()
        })
        .collect();
    let cells: Vec<Value> = result.cells.iter().map(|c| json!(c.to_string())).collect();
    json!({ "axes": axes, "cells": cells })
}

/// Grid rendering of a result with up to two axes: axis 0 across, axis 1
/// down
#[cfg(feature = "cli")]
pub fn format_result_table(result: &QueryResult) -> Option<String> {
    let mut builder = Builder::default();
    match result.axes.as_slice() {
        [] => {
            builder.push_record(["Value".to_string()]);
            builder.push_record([result.cells.first()?.to_string()]);
        }
        [columns] => {
            builder.push_record(["Member".to_string(), "Value".to_string()]);
            for (tuple, cell) in columns.iter().zip(&result.cells) {
                builder.push_record([caption(tuple), cell.to_string()]);
            }
        }
        [columns, rows] => {
            let header = std::iter::once(String::new()).chain(columns.iter().map(caption));
            builder.push_record(header);
            for (r, row) in rows.iter().enumerate() {
                let cells = (0..columns.len()).map(|c| {
                    result
                        .cell(&[c, r])
                        .map_or_else(String::new, ToString::to_string)
                });
                builder.push_record(std::iter::once(caption(row)).chain(cells));
            }
        }
        _ => return None,
    }
    Some(builder.build().with(Style::modern()).to_string())
}

#[cfg(feature = "cli")]
#[derive(Tabled)]
struct FunctionRow {
    #[tabled(rename = "Function")]
    call: String,
    #[tabled(rename = "Description")]
    description: String,
}

pub fn functions_to_json(table: &FunctionTable) -> Value {
    table
        .definitions()
        .map(|def| {
            json!({
                "name": def.name,
                "syntax": format!("{:?}", def.syntax),
                "signature": def.describe(),
                "description": def.description,
            })
        })
        .collect()
}

#[cfg(feature = "cli")]
pub fn format_functions_table(table: &FunctionTable) -> String {
    let rows: Vec<FunctionRow> = table
        .definitions()
        .map(|def| FunctionRow {
            call: def.describe(),
            description: def.description.clone(),
        })
        .collect();
    Table::new(rows).with(Style::modern()).to_string()
}

/// Print a JSON value, or a pre-rendered table when the format asks for
/// one and rendering succeeded
pub fn print_output(
    value: &Value,
    table: Option<String>,
    format: OutputFormat,
    output_file: Option<&Path>,
) -> Result<()> {
    let content = match (format, table) {
        (OutputFormat::Table, Some(table)) => table,
        (OutputFormat::Json, _) => format_json(value, false)?,
        _ => format_json(value, true)?,
    };
    write_output(&content, output_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!(OutputFormat::parse("JSON"), OutputFormat::Json);
        assert_eq!(OutputFormat::parse("pretty"), OutputFormat::JsonPretty);
        assert_eq!(OutputFormat::parse("table"), OutputFormat::Table);
        assert_eq!(OutputFormat::parse("anything"), OutputFormat::Table);
    }

    #[test]
    fn test_format_error_includes_code() {
        colored::control::set_override(false);
        let error = anyhow::Error::new(EvalError::Cancelled);
        assert_eq!(format_error(&error), "Error: [OLAP0201] Execution cancelled");
    }

    #[test]
    fn test_functions_listed() {
        let table = FunctionTable::standard().unwrap();
        let json = functions_to_json(&table);
        let names: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|f| f["name"].as_str())
            .collect();
        assert!(names.contains(&"NonEmptyCrossJoin"));
        assert!(names.contains(&"Order"));
    }
}
