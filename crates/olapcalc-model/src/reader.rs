//! Cell reader trait

use olapcalc_types::{Member, Value};

/// Answer of a cell read
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    /// The cell is loaded; the value may be null or an error
    Value(Value),
    /// The cell is not loaded yet; the request was recorded for the next
    /// batch load
    NotReady,
}

/// Source of stored cell values.
///
/// `coordinates` holds one member per hierarchy, indexed by hierarchy id.
/// Calculated members are resolved by the evaluator before a read.
pub trait CellReader: Send + Sync {
    fn get(&self, coordinates: &[Member]) -> CellValue;

    /// Number of reads answered with [`CellValue::NotReady`] so far
    fn miss_count(&self) -> usize;
}
