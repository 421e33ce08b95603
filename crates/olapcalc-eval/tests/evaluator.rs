//! Evaluation context and savepoints

mod common;

use common::{Fixture, num};
use olapcalc_eval::{
    CallIdGen, EngineConfig, EvalError, EvalResult, Evaluator, FunctionTable, QueryScope,
};
use olapcalc_model::CellValue;
use olapcalc_types::{HierarchyId, Member, Value};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

const PRODUCT: HierarchyId = HierarchyId(1);
const STORE: HierarchyId = HierarchyId(2);

fn scope(fixture: &Fixture, config: EngineConfig) -> QueryScope {
    QueryScope::new(
        fixture.catalog.clone(),
        fixture.reader.clone(),
        config,
        FunctionTable::standard().unwrap(),
        Arc::new(CallIdGen::new()),
        Arc::new(AtomicBool::new(false)),
    )
}

fn member(fixture: &Fixture, name: &str) -> Member {
    fixture.catalog.member_by_name(name).unwrap()
}

fn current(ev: &Evaluator<'_>, hierarchy: HierarchyId) -> String {
    ev.current_member(hierarchy).unwrap().name().to_string()
}

#[test]
fn test_starts_on_default_members() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let ev = Evaluator::new(&scope).unwrap();
    assert_eq!(ev.coordinates().len(), 4);
    assert_eq!(current(&ev, HierarchyId(0)), "Sales");
    assert_eq!(current(&ev, PRODUCT), "All");
    assert_eq!(current(&ev, HierarchyId(3)), "Retail");
}

#[test]
fn test_restore_unwinds_in_reverse() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();

    ev.set_context(&member(&fixture, "[Product].[Beer]"));
    let outer = ev.savepoint();
    ev.set_context(&member(&fixture, "[Store].[A]"));
    ev.set_context(&member(&fixture, "[Store].[B]"));
    ev.set_non_empty(true);
    assert_eq!(current(&ev, STORE), "B");

    ev.restore(outer).unwrap();
    assert_eq!(current(&ev, STORE), "All");
    assert_eq!(current(&ev, PRODUCT), "Beer");
    assert!(!ev.is_non_empty());
}

#[test]
fn test_stale_savepoint_rejected() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();

    let start = ev.savepoint();
    ev.set_context(&member(&fixture, "[Store].[A]"));
    let inner = ev.savepoint();
    ev.restore(start).unwrap();
    assert!(matches!(
        ev.restore(inner),
        Err(EvalError::UnbalancedSavepoint { token: 1, depth: 0 })
    ));
}

fn fail_inside(ev: &mut Evaluator<'_>, store: &Member) -> EvalResult<()> {
    let mut ev = ev.scoped();
    ev.set_context(store);
    ev.set_non_empty(true);
    Err(EvalError::invalid_argument("test", "failure inside a scope"))
}

#[test]
fn test_scoped_guard_restores_on_error() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();
    let before = ev.coordinates().to_vec();

    let result = fail_inside(&mut ev, &member(&fixture, "[Store].[C]"));
    assert!(result.is_err());
    assert_eq!(ev.coordinates(), before.as_slice());
    assert!(!ev.is_non_empty());
}

#[test]
fn test_cell_reads_current_coordinates() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();
    {
        let mut ev = ev.scoped();
        ev.set_context_tuple(&[
            member(&fixture, "[Product].[Beer]"),
            member(&fixture, "[Store].[A]"),
        ]);
        assert_eq!(ev.evaluate_current().unwrap(), num(3));
    }
    assert_eq!(ev.evaluate_current().unwrap(), num(5));
}

#[test]
fn test_calculated_member_expanded() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();
    ev.set_context(&member(&fixture, "[Measures].[Profit]"));
    // retail: sales 5, cost 4
    assert_eq!(ev.evaluate_current().unwrap(), num(1));
    assert_eq!(current(&ev, HierarchyId(0)), "Profit");
}

#[test]
fn test_cycle_gives_error_value() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();
    ev.set_context(&member(&fixture, "[Measures].[Loop]"));
    let value = ev.evaluate_current().unwrap();
    let Value::Error(error) = value else {
        panic!("expected an error value, got {value:?}");
    };
    assert_eq!(error.code.to_string(), "OLAP0102");
}

#[test]
fn test_recursion_limit() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default().with_max_recursion_depth(0));
    let mut ev = Evaluator::new(&scope).unwrap();
    ev.set_context(&member(&fixture, "[Measures].[Profit]"));
    assert!(matches!(
        ev.evaluate_cell(),
        Err(EvalError::RecursionLimit { depth: 0 })
    ));
}

#[test]
fn test_not_ready_reads_as_null() {
    let fixture = Fixture::new();
    fixture.reader.set_batch_mode(true);
    let scope = scope(&fixture, EngineConfig::default());
    let mut ev = Evaluator::new(&scope).unwrap();
    assert_eq!(ev.evaluate_cell().unwrap(), CellValue::NotReady);
    assert_eq!(ev.evaluate_current().unwrap(), Value::Null);

    ev.set_context(&member(&fixture, "[Measures].[Profit]"));
    // a formula over unloaded cells is not ready either
    assert_eq!(ev.evaluate_cell().unwrap(), CellValue::NotReady);
}

#[test]
fn test_cancel_flag_stops_checks() {
    let fixture = Fixture::new();
    let scope = scope(&fixture, EngineConfig::default());
    let ev = Evaluator::new(&scope).unwrap();
    assert!(ev.check().is_ok());
    scope.execution().cancel();
    assert!(matches!(ev.check(), Err(EvalError::Cancelled)));
}

#[test]
fn test_shared_cancel_handle() {
    let fixture = Fixture::new();
    let flag = Arc::new(AtomicBool::new(false));
    let scope = QueryScope::new(
        fixture.catalog.clone(),
        fixture.reader.clone(),
        EngineConfig::default(),
        FunctionTable::standard().unwrap(),
        Arc::new(CallIdGen::new()),
        flag.clone(),
    );
    let ev = Evaluator::new(&scope).unwrap();
    flag.store(true, Ordering::Relaxed);
    assert!(matches!(ev.check(), Err(EvalError::Cancelled)));
}
