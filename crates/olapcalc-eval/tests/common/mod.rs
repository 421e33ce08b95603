//! Shared fixture for the evaluation tests: a small sales cube

#![allow(dead_code)]

use olapcalc_ast::{Axis, Exp, Query};
use olapcalc_eval::{EngineConfig, Statement};
use olapcalc_model::{CubeSchema, InMemoryCatalog, InMemoryCellReader};
use olapcalc_types::{TupleList, Value};
use std::sync::Arc;

/// Sales by store: A = 3, B = 1, C = 2. Bread only has a cost, Cheese has
/// no facts at all. The Channel hierarchy has no All member.
pub const SALES_CUBE: &str = r#"{
    "name": "Sales",
    "dimensions": [
        {"name": "Product", "hierarchies": [{
            "levels": ["Family", "Item"],
            "members": [
                {"name": "Drink", "children": [{"name": "Beer"}, {"name": "Wine"}]},
                {"name": "Food", "children": [{"name": "Bread"}, {"name": "Cheese"}]}
            ]
        }]},
        {"name": "Store", "hierarchies": [{
            "levels": ["Shop"],
            "members": [{"name": "A"}, {"name": "B"}, {"name": "C"}]
        }]},
        {"name": "Channel", "hierarchies": [{
            "has_all": false,
            "levels": ["Channel"],
            "members": [{"name": "Retail"}, {"name": "Online"}]
        }]}
    ],
    "measures": [{"name": "Sales"}, {"name": "Cost"}],
    "calculated_members": [
        {"name": "Profit", "formula": {"call": {"name": "-", "syntax": "Infix",
            "args": [{"id": "[Measures].[Sales]"}, {"id": "[Measures].[Cost]"}]}}},
        {"name": "Loop", "formula": {"call": {"name": "+", "syntax": "Infix",
            "args": [{"id": "[Measures].[Loop]"}, {"literal": {"integer": 1}}]}}}
    ],
    "facts": [
        {"coordinates": {"Product": "Beer", "Store": "A", "Channel": "Retail"},
            "measures": {"Sales": 3, "Cost": 1}},
        {"coordinates": {"Product": "Beer", "Store": "B", "Channel": "Online"},
            "measures": {"Sales": 1, "Cost": 1}},
        {"coordinates": {"Product": "Wine", "Store": "C", "Channel": "Retail"},
            "measures": {"Sales": 2, "Cost": 1}},
        {"coordinates": {"Product": "Bread", "Store": "A", "Channel": "Retail"},
            "measures": {"Cost": 2}}
    ]
}"#;

pub struct Fixture {
    pub catalog: Arc<InMemoryCatalog>,
    pub reader: Arc<InMemoryCellReader>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::from_json(SALES_CUBE)
    }

    pub fn from_json(json: &str) -> Self {
        let schema = CubeSchema::from_json(json).unwrap();
        let catalog = Arc::new(InMemoryCatalog::from_schema(&schema).unwrap());
        let reader = Arc::new(InMemoryCellReader::from_schema(&schema, &catalog).unwrap());
        Self { catalog, reader }
    }

    pub fn statement(&self) -> Statement {
        Statement::new(self.catalog.clone(), self.reader.clone()).unwrap()
    }

    pub fn statement_with(&self, config: EngineConfig) -> Statement {
        self.statement().with_config(config)
    }
}

pub fn statement() -> Statement {
    Fixture::new().statement()
}

/// `<level>.Members`
pub fn members(level: &str) -> Exp {
    Exp::property(Exp::id(level), "Members")
}

pub fn items() -> Exp {
    members("[Product].[Item]")
}

pub fn shops() -> Exp {
    members("[Store].[Shop]")
}

pub fn one_axis(set: Exp) -> Query {
    Query::new(vec![Axis::new(set)])
}

/// Member names of every tuple, joined with `/`
pub fn names(list: &TupleList) -> Vec<String> {
    list.iter()
        .map(|t| t.iter().map(|m| m.name().to_string()).collect::<Vec<_>>().join("/"))
        .collect()
}

/// Evaluate a set expression on a single axis and return its tuple names
pub fn axis_names(statement: &Statement, set: Exp) -> Vec<String> {
    let result = statement.execute(&one_axis(set)).unwrap();
    names(&result.axes[0])
}

pub fn int(v: i64) -> Value {
    Value::Integer(v)
}

pub fn num(v: i64) -> Value {
    Value::Numeric(v.into())
}
