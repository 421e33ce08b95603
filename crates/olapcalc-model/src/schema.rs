//! JSON cube schema
//!
//! A schema describes the dimensions of one cube, its measures, calculated
//! members and the fact rows backing the in-memory cell reader.

use indexmap::IndexMap;
use olapcalc_ast::Exp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::catalog::{ModelError, ModelResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CubeSchema {
    pub name: String,
    pub dimensions: Vec<DimensionSchema>,
    pub measures: Vec<MeasureSchema>,
    #[serde(default)]
    pub calculated_members: Vec<CalculatedMemberSchema>,
    #[serde(default)]
    pub facts: Vec<FactRow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DimensionSchema {
    pub name: String,
    pub hierarchies: Vec<HierarchySchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HierarchySchema {
    /// Defaults to the dimension name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_true")]
    pub has_all: bool,
    #[serde(default = "default_all_name")]
    pub all_member_name: String,
    /// Level names, top first
    pub levels: Vec<String>,
    pub members: Vec<MemberSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSchema {
    pub name: String,
    #[serde(default)]
    pub children: Vec<MemberSchema>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeasureSchema {
    pub name: String,
}

/// A calculated member. Without a hierarchy it is a calculated measure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculatedMemberSchema {
    pub name: String,
    #[serde(default)]
    pub hierarchy: Option<String>,
    /// Unique name of the parent member
    #[serde(default)]
    pub parent: Option<String>,
    pub formula: Exp,
    #[serde(default)]
    pub solve_order: i32,
}

/// One fact row: a leaf member name per hierarchy and a value per measure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FactRow {
    pub coordinates: IndexMap<String, String>,
    pub measures: IndexMap<String, Decimal>,
}

fn default_true() -> bool {
    true
}

fn default_all_name() -> String {
    "All".to_string()
}

impl CubeSchema {
    pub fn from_json(json: &str) -> ModelResult<Self> {
        serde_json::from_str(json).map_err(|e| ModelError::ParseError(e.to_string()))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| ModelError::IoError(e.to_string()))?;
        Self::from_json(&json)
    }
}

impl HierarchySchema {
    pub fn name_or<'a>(&'a self, dimension: &'a str) -> &'a str {
        self.name.as_deref().unwrap_or(dimension)
    }
}
