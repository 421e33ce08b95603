//! Arithmetic and comparison operators
//!
//! Null handling follows cell semantics: `+` and `-` treat a null operand as
//! zero unless both are null, `*` and `/` are null when either operand is.
//! Error values propagate; faults become error values instead of failing
//! the evaluation.

use olapcalc_diagnostics::{OLAP0100, OLAP0101};
use olapcalc_types::{DataType, Value, compare_values};
use rust_decimal::Decimal;
use std::cmp::Ordering;

use crate::calc::{Calc, CalcRef, ResultShape};
use crate::error::EvalResult;
use crate::evaluator::Evaluator;
use crate::registry::{ArithmeticOp, CompareOp};

#[derive(Debug)]
pub struct ArithmeticCalc {
    op: ArithmeticOp,
    left: CalcRef,
    right: CalcRef,
    data_type: DataType,
}

impl ArithmeticCalc {
    pub fn new(op: ArithmeticOp, left: CalcRef, right: CalcRef, data_type: DataType) -> Self {
        Self {
            op,
            left,
            right,
            data_type,
        }
    }
}

fn not_a_number(v: &Value) -> Value {
    Value::error(OLAP0101, format!("Cannot convert '{v}' to a number"))
}

fn overflow() -> Value {
    Value::error(OLAP0100, "Arithmetic overflow")
}

/// Apply a binary arithmetic operator to two cell values
pub fn apply(op: ArithmeticOp, left: &Value, right: &Value) -> Value {
    if let Value::Error(_) = left {
        return left.clone();
    }
    if let Value::Error(_) = right {
        return right.clone();
    }
    match (left.is_null(), right.is_null()) {
        (true, true) => return Value::Null,
        (true, false) | (false, true)
            if matches!(op, ArithmeticOp::Multiply | ArithmeticOp::Divide) =>
        {
            return Value::Null;
        }
        _ => {}
    }

    if let (Some(a), Some(b)) = (int_operand(left), int_operand(right)) {
        if op != ArithmeticOp::Divide {
            let result = match op {
                ArithmeticOp::Add => a.checked_add(b),
                ArithmeticOp::Subtract => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            if let Some(r) = result {
                return Value::Integer(r);
            }
        }
    }

    let Some(a) = decimal_operand(left) else {
        return not_a_number(left);
    };
    let Some(b) = decimal_operand(right) else {
        return not_a_number(right);
    };
    let result = match op {
        ArithmeticOp::Add => a.checked_add(b),
        ArithmeticOp::Subtract => a.checked_sub(b),
        ArithmeticOp::Multiply => a.checked_mul(b),
        ArithmeticOp::Divide => {
            if b.is_zero() {
                return Value::error(OLAP0100, "Division by zero");
            }
            a.checked_div(b)
        }
    };
    result.map_or_else(overflow, Value::Numeric)
}

fn int_operand(v: &Value) -> Option<i64> {
    match v {
        Value::Integer(i) => Some(*i),
        Value::Null => Some(0),
        _ => None,
    }
}

fn decimal_operand(v: &Value) -> Option<Decimal> {
    match v {
        Value::Null => Some(Decimal::ZERO),
        Value::String(_) => None,
        other => other.as_decimal(),
    }
}

impl Calc for ArithmeticCalc {
    fn name(&self) -> &str {
        match self.op {
            ArithmeticOp::Add => "+",
            ArithmeticOp::Subtract => "-",
            ArithmeticOp::Multiply => "*",
            ArithmeticOp::Divide => "/",
        }
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.left.clone(), self.right.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        let left = self.left.evaluate(ev)?;
        let right = self.right.evaluate(ev)?;
        Ok(apply(self.op, &left, &right))
    }
}

/// Prefix `-`
#[derive(Debug)]
pub struct NegateCalc {
    operand: CalcRef,
    data_type: DataType,
}

impl NegateCalc {
    pub fn new(operand: CalcRef, data_type: DataType) -> Self {
        Self { operand, data_type }
    }
}

impl Calc for NegateCalc {
    fn name(&self) -> &str {
        "-"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.operand.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(match self.operand.evaluate(ev)? {
            v @ (Value::Null | Value::Error(_)) => v,
            Value::Integer(i) => i.checked_neg().map_or_else(overflow, Value::Integer),
            v => match decimal_operand(&v) {
                Some(d) => Value::Numeric(-d),
                None => not_a_number(&v),
            },
        })
    }
}

#[derive(Debug)]
pub struct ComparisonCalc {
    op: CompareOp,
    left: CalcRef,
    right: CalcRef,
    data_type: DataType,
}

impl ComparisonCalc {
    pub fn new(op: CompareOp, left: CalcRef, right: CalcRef) -> Self {
        Self {
            op,
            left,
            right,
            data_type: DataType::Logical,
        }
    }
}

/// Compare two cell values; a null operand compares as zero or the empty
/// string
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Value {
    if let Value::Error(_) = left {
        return left.clone();
    }
    if let Value::Error(_) = right {
        return right.clone();
    }
    let normalize = |v: &Value, other: &Value| match (v, other) {
        (Value::Null, Value::String(_)) => Value::String(String::new()),
        (Value::Null, _) => Value::Integer(0),
        _ => v.clone(),
    };
    let (l, r) = (normalize(left, right), normalize(right, left));
    let ordering = compare_values(&l, &r);
    let result = match op {
        CompareOp::Less => ordering == Ordering::Less,
        CompareOp::LessOrEqual => ordering != Ordering::Greater,
        CompareOp::Greater => ordering == Ordering::Greater,
        CompareOp::GreaterOrEqual => ordering != Ordering::Less,
        CompareOp::Equal => ordering == Ordering::Equal,
        CompareOp::NotEqual => ordering != Ordering::Equal,
    };
    Value::Logical(result)
}

impl Calc for ComparisonCalc {
    fn name(&self) -> &str {
        match self.op {
            CompareOp::Less => "<",
            CompareOp::LessOrEqual => "<=",
            CompareOp::Greater => ">",
            CompareOp::GreaterOrEqual => ">=",
            CompareOp::Equal => "=",
            CompareOp::NotEqual => "<>",
        }
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Scalar
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.left.clone(), self.right.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        let left = self.left.evaluate(ev)?;
        let right = self.right.evaluate(ev)?;
        Ok(compare(self.op, &left, &right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn dec(s: &str) -> Value {
        Value::Numeric(s.parse().unwrap())
    }

    #[rstest]
    #[case(ArithmeticOp::Add, Value::Integer(2), Value::Integer(3), Value::Integer(5))]
    #[case(ArithmeticOp::Add, Value::Null, Value::Integer(3), Value::Integer(3))]
    #[case(ArithmeticOp::Add, Value::Null, Value::Null, Value::Null)]
    #[case(ArithmeticOp::Subtract, Value::Integer(2), Value::Null, Value::Integer(2))]
    #[case(ArithmeticOp::Multiply, Value::Integer(2), Value::Null, Value::Null)]
    #[case(ArithmeticOp::Multiply, dec("1.5"), Value::Integer(2), dec("3.0"))]
    #[case(ArithmeticOp::Divide, Value::Integer(7), Value::Integer(2), dec("3.5"))]
    #[case(ArithmeticOp::Divide, Value::Null, Value::Integer(2), Value::Null)]
    fn test_apply(#[case] op: ArithmeticOp, #[case] l: Value, #[case] r: Value, #[case] expected: Value) {
        let result = apply(op, &l, &r);
        match (&result, &expected) {
            (Value::Numeric(a), Value::Numeric(b)) => assert_eq!(a.normalize(), b.normalize()),
            _ => assert_eq!(result, expected),
        }
    }

    #[test]
    fn test_faults_become_error_values() {
        let zero = apply(ArithmeticOp::Divide, &Value::Integer(1), &Value::Integer(0));
        assert!(zero.is_error());
        let text = apply(ArithmeticOp::Add, &Value::String("x".into()), &Value::Integer(1));
        assert!(matches!(text, Value::Error(ref e) if e.code == OLAP0101));
        let overflow = apply(ArithmeticOp::Multiply, &Value::Integer(i64::MAX), &Value::Integer(2));
        assert!(matches!(overflow, Value::Numeric(_)));
    }

    #[test]
    fn test_error_propagates_through_comparison() {
        let err = Value::error(OLAP0100, "boom");
        assert_eq!(compare(CompareOp::Less, &err, &Value::Integer(1)), err);
        assert_eq!(
            compare(CompareOp::Greater, &Value::Integer(2), &Value::Null),
            Value::Logical(true)
        );
        assert_eq!(
            compare(CompareOp::Equal, &Value::String("a".into()), &Value::String("a".into())),
            Value::Logical(true)
        );
    }
}
