//! Member navigation and tuple construction

use olapcalc_types::{DataType, Member, Tuple, TupleList, Value};

use crate::calc::{Calc, CalcRef, ResultShape};
use crate::error::{EvalError, EvalResult};
use crate::evaluator::Evaluator;

/// `<hierarchy>.Members`: every stored member in hierarchical pre-order
#[derive(Debug)]
pub struct HierarchyMembersCalc {
    hierarchy: CalcRef,
    data_type: DataType,
}

impl HierarchyMembersCalc {
    pub fn new(hierarchy: CalcRef, data_type: DataType) -> Self {
        Self {
            hierarchy,
            data_type,
        }
    }
}

impl Calc for HierarchyMembersCalc {
    fn name(&self) -> &str {
        "Members"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.hierarchy.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        let Value::Hierarchy(h) = self.hierarchy.evaluate(ev)? else {
            return Err(EvalError::type_mismatch("Hierarchy", "non-hierarchy value"));
        };
        let catalog = ev.catalog();
        let mut out = Vec::new();
        let mut stack: Vec<Member> = catalog.root_members(h).into_iter().rev().collect();
        while let Some(member) = stack.pop() {
            ev.check()?;
            stack.extend(catalog.children(&member).into_iter().rev());
            out.push(member);
        }
        Ok(TupleList::from_members(out))
    }
}

#[derive(Debug)]
pub struct ChildrenCalc {
    member: CalcRef,
    data_type: DataType,
}

impl ChildrenCalc {
    pub fn new(member: CalcRef, data_type: DataType) -> Self {
        Self { member, data_type }
    }
}

impl Calc for ChildrenCalc {
    fn name(&self) -> &str {
        "Children"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::List
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.member.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        Ok(Value::Set(self.evaluate_list(ev)?))
    }

    fn evaluate_list(&self, ev: &mut Evaluator<'_>) -> EvalResult<TupleList> {
        match self.member.evaluate(ev)? {
            Value::Member(m) => Ok(TupleList::from_members(ev.catalog().children(&m))),
            Value::Null => Ok(TupleList::new(1)),
            other => Err(EvalError::type_mismatch("Member", other.category().name())),
        }
    }
}

#[derive(Debug)]
pub struct ParentCalc {
    member: CalcRef,
    data_type: DataType,
}

impl ParentCalc {
    pub fn new(member: CalcRef, data_type: DataType) -> Self {
        Self { member, data_type }
    }
}

impl Calc for ParentCalc {
    fn name(&self) -> &str {
        "Parent"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Member
    }

    fn children(&self) -> Vec<CalcRef> {
        vec![self.member.clone()]
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        match self.member.evaluate(ev)? {
            Value::Member(m) => Ok(ev.catalog().parent(&m).map_or(Value::Null, Value::Member)),
            Value::Null => Ok(Value::Null),
            other => Err(EvalError::type_mismatch("Member", other.category().name())),
        }
    }
}

/// `(m1, m2, ...)`
#[derive(Debug)]
pub struct TupleCalc {
    members: Vec<CalcRef>,
    data_type: DataType,
}

impl TupleCalc {
    pub fn new(members: Vec<CalcRef>, data_type: DataType) -> Self {
        Self { members, data_type }
    }
}

impl Calc for TupleCalc {
    fn name(&self) -> &str {
        "Tuple"
    }

    fn data_type(&self) -> &DataType {
        &self.data_type
    }

    fn shape(&self) -> ResultShape {
        ResultShape::Tuple
    }

    fn children(&self) -> Vec<CalcRef> {
        self.members.clone()
    }

    fn evaluate(&self, ev: &mut Evaluator<'_>) -> EvalResult<Value> {
        let mut members = Vec::with_capacity(self.members.len());
        for calc in &self.members {
            match calc.evaluate(ev)? {
                Value::Member(m) => {
                    if members.iter().any(|o: &Member| o.hierarchy() == m.hierarchy()) {
                        return Err(EvalError::hierarchy_mismatch(format!(
                            "tuple contains two members of the hierarchy of {m}"
                        )));
                    }
                    members.push(m);
                }
                Value::Null => return Ok(Value::Null),
                other => return Err(EvalError::type_mismatch("Member", other.category().name())),
            }
        }
        Ok(Value::Tuple(Tuple::from(members)))
    }
}
