//! Query statements

use serde::{Deserialize, Serialize};

use crate::Exp;

/// One axis of a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Axis {
    /// Whether empty rows are removed from the axis
    #[serde(default)]
    pub non_empty: bool,
    pub set: Exp,
}

/// A query: axes, plus an optional slicer fixing the remaining coordinates
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub axes: Vec<Axis>,
    #[serde(default)]
    pub slicer: Option<Exp>,
}

impl Query {
    pub fn new(axes: Vec<Axis>) -> Self {
        Self { axes, slicer: None }
    }

    pub fn with_slicer(mut self, slicer: Exp) -> Self {
        self.slicer = Some(slicer);
        self
    }

    /// All expressions of the query, axes first
    pub fn expressions(&self) -> impl Iterator<Item = &Exp> {
        self.axes.iter().map(|a| &a.set).chain(self.slicer.iter())
    }
}

impl Axis {
    pub fn new(set: Exp) -> Self {
        Self {
            non_empty: false,
            set,
        }
    }

    pub fn non_empty(set: Exp) -> Self {
        Self {
            non_empty: true,
            set,
        }
    }
}
