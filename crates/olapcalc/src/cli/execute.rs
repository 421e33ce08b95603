//! Command implementations: eval, explain and functions

use super::output::{self, OutputFormat};
use anyhow::{Context, Result};
use log::{debug, info};
use olapcalc_ast::Query;
use olapcalc_eval::{EngineConfig, FunctionTable, Statement};
use olapcalc_model::{CubeSchema, InMemoryCatalog, InMemoryCellReader};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Inputs shared by the `eval` and `explain` commands
pub struct ExecuteConfig {
    pub cube: PathBuf,
    pub query: PathBuf,
    pub config: Option<PathBuf>,
    pub output_format: OutputFormat,
    pub output_file: Option<PathBuf>,
}

/// Build a statement over an in-memory cube loaded from a schema file
pub fn load_statement(cube: &Path, config: Option<&Path>) -> Result<Statement> {
    let schema = CubeSchema::from_json_file(cube)
        .with_context(|| format!("Failed to load cube: {}", cube.display()))?;
    let catalog = Arc::new(
        InMemoryCatalog::from_schema(&schema)
            .with_context(|| format!("Invalid cube schema: {}", cube.display()))?,
    );
    let reader = Arc::new(InMemoryCellReader::from_schema(&schema, &catalog)?);
    info!(
        "Loaded cube {} with {} facts",
        schema.name,
        schema.facts.len()
    );

    let engine = match config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            EngineConfig::from_json(&text)
                .with_context(|| format!("Invalid engine config: {}", path.display()))?
        }
        None => EngineConfig::default(),
    };
    debug!("Engine config: {engine:?}");

    Ok(Statement::new(catalog, reader)?.with_config(engine))
}

pub fn load_query(path: &Path) -> Result<Query> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read query file: {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("Invalid query: {}", path.display()))
}

/// Execute a query and print its axes and cells
pub fn eval(config: &ExecuteConfig) -> Result<()> {
    let statement = load_statement(&config.cube, config.config.as_deref())?;
    let query = load_query(&config.query)?;
    let result = statement.execute(&query)?;
    info!(
        "Query returned {} axes and {} cells",
        result.axes.len(),
        result.cells.len()
    );

    let table = match config.output_format {
        OutputFormat::Table => {
            let table = output::format_result_table(&result);
            if table.is_none() {
                eprintln!(
                    "{}",
                    output::format_warning("Only results with up to two axes render as a table")
                );
            }
            table
        }
        _ => None,
    };
    output::print_output(
        &output::result_to_json(&result),
        table,
        config.output_format,
        config.output_file.as_deref(),
    )
}

/// Compile a query and print its plan tree
pub fn explain(config: &ExecuteConfig) -> Result<()> {
    let statement = load_statement(&config.cube, config.config.as_deref())?;
    let query = load_query(&config.query)?;
    let plan = statement.explain(&query)?;
    let value = serde_json::to_value(&plan).context("Failed to serialize plan")?;
    output::print_output(
        &value,
        Some(plan.render()),
        config.output_format,
        config.output_file.as_deref(),
    )
}

/// List the built-in function table
pub fn functions(output_format: OutputFormat, output_file: Option<&Path>) -> Result<()> {
    let table = FunctionTable::standard()?;
    output::print_output(
        &output::functions_to_json(&table),
        Some(output::format_functions_table(&table)),
        output_format,
        output_file,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use olapcalc_ast::{Axis, Exp};
    use pretty_assertions::assert_eq;

    fn data(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
    }

    #[test]
    fn test_load_sample_cube() {
        let statement =
            load_statement(&data("sales_cube.json"), Some(&data("engine.json"))).unwrap();
        assert_eq!(statement.config().result_limit, 10000);

        let query = Query::new(vec![Axis::non_empty(Exp::property(
            Exp::id("[Store].[Shop]"),
            "Members",
        ))]);
        let result = statement.execute(&query).unwrap();
        let json = output::result_to_json(&result);
        assert_eq!(
            json["axes"][0],
            serde_json::json!([["[Store].[A]"], ["[Store].[C]"]])
        );
        assert_eq!(json["cells"], serde_json::json!(["3", "2"]));
    }

    #[test]
    fn test_sample_query_parses_and_runs() {
        let statement = load_statement(&data("sales_cube.json"), None).unwrap();
        let query = load_query(&data("top_items.json")).unwrap();
        assert_eq!(query.axes.len(), 2);
        assert!(query.slicer.is_some());

        let result = statement.execute(&query).unwrap();
        assert_eq!(result.axes.len(), 2);
        let table = output::format_result_table(&result).unwrap();
        assert!(table.contains("Beer"));

        let plan = statement.explain(&query).unwrap().render();
        assert!(plan.contains("Axis 1:"));
        assert!(plan.contains("Slicer:"));
    }

    #[test]
    fn test_missing_cube_reports_path() {
        let err = load_statement(&data("missing.json"), None).err().expect("expected load failure");
        assert!(format!("{err:#}").contains("missing.json"));
    }
}
