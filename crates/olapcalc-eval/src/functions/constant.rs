//! Context-independent nodes

use olapcalc_types::{DataType, HierarchyId, Value};

use crate::calc::{Calc, ResultShape};
use crate::error::EvalResult;
use crate::evaluator::Evaluator;

/// A literal, member, level, hierarchy, dimension or symbol
#[derive(Debug)]
pub struct ConstantCalc {
    value: Value,
    data_type: DataType,
}

impl ConstantCalc {
    pub fn new(value: Value, data_type: DataType) -> Self {
        Self { value, data_type }
    }
}

impl Calc for ConstantCalc {
    fn name(&self) -> &str {
        "Literal"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        match &self.value {
            Value::Member(_) => ResultShape::Member,
            Value::Tuple(_) => ResultShape::Tuple,
            Value::Set(_) => ResultShape::List,
            Value::Level(_) | Value::Hierarchy(_) | Value::Dimension(_) | Value::Symbol(_) => {
                ResultShape::Element
            }
            _ => ResultShape::Scalar,
        }
    }

    fn evaluate(&self, _ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(self.value.clone())
    }

    fn depends_on(&self, _hierarchy: HierarchyId) -> bool {
        false
    }

    fn constant_value(&self) -> Option<&Value> {
        Some(&self.value)
    }
}
