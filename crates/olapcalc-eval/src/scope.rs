//! Per-query execution scope
//!
//! Everything that lives exactly as long as one statement execution: the
//! collaborators, the execution budget, the evaluation cache and the
//! compiled formulas of calculated members. A scope is shared read-only by
//! the evaluators of the statement; caches are written at most once per key.

use indexmap::IndexSet;
use log::debug;
use once_cell::sync::OnceCell;
use olapcalc_model::{Catalog, CellReader};
use olapcalc_types::{Category, Member, MemberId};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::cache::{CacheEntry, CacheKey};
use crate::calc::CalcRef;
use crate::compiler::Compiler;
use crate::config::EngineConfig;
use crate::error::{EvalError, EvalResult};
use crate::registry::FunctionTable;
use crate::validator::{CallIdGen, Validator};

/// Execution budget of one statement
#[derive(Debug)]
pub struct Execution {
    start: Instant,
    timeout: Option<Duration>,
    max_iterations: Option<u64>,
    iterations: AtomicU64,
    cancelled: Arc<AtomicBool>,
    /// Elapsed milliseconds when the timeout first fired
    timed_out: OnceCell<u128>,
}

impl Execution {
    pub fn new(config: &EngineConfig, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            start: Instant::now(),
            timeout: config.timeout,
            max_iterations: config.max_iterations,
            iterations: AtomicU64::new(0),
            cancelled,
            timed_out: OnceCell::new(),
        }
    }

    /// Count one iteration and fail once the budget is spent. Both budgets
    /// latch: every later check fails the same way.
    pub fn check(&self) -> EvalResult<()> {
        let n = self.iterations.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(millis) = self.timed_out.get() {
            return Err(EvalError::Timeout { millis: *millis });
        }
        if self.cancelled.load(Ordering::Relaxed) {
            return Err(EvalError::Cancelled);
        }
        if let Some(max) = self.max_iterations {
            if n > max {
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(EvalError::Cancelled);
            }
        }
        if let Some(timeout) = self.timeout {
            let elapsed = self.start.elapsed();
            if elapsed > timeout {
                let millis = *self.timed_out.get_or_init(|| elapsed.as_millis());
                self.cancelled.store(true, Ordering::Relaxed);
                return Err(EvalError::Timeout { millis });
            }
        }
        Ok(())
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Relaxed)
    }
}

pub struct QueryScope {
    catalog: Arc<dyn Catalog>,
    reader: Arc<dyn CellReader>,
    config: EngineConfig,
    table: Arc<FunctionTable>,
    ids: Arc<CallIdGen>,
    execution: Execution,
    measures: IndexSet<Member>,
    cache: RwLock<HashMap<CacheKey, CacheEntry>>,
    formulas: RwLock<HashMap<MemberId, CalcRef>>,
}

impl QueryScope {
    pub fn new(
        catalog: Arc<dyn Catalog>,
        reader: Arc<dyn CellReader>,
        config: EngineConfig,
        table: Arc<FunctionTable>,
        ids: Arc<CallIdGen>,
        cancelled: Arc<AtomicBool>,
    ) -> Self {
        let execution = Execution::new(&config, cancelled);
        Self {
            catalog,
            reader,
            config,
            table,
            ids,
            execution,
            measures: IndexSet::new(),
            cache: RwLock::new(HashMap::new()),
            formulas: RwLock::new(HashMap::new()),
        }
    }

    /// Record the measures validation found in the query
    pub fn with_measures(mut self, measures: IndexSet<Member>) -> Self {
        self.measures = measures;
        self
    }

    pub fn catalog(&self) -> &dyn Catalog {
        self.catalog.as_ref()
    }

    pub fn reader(&self) -> &dyn CellReader {
        self.reader.as_ref()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn table(&self) -> &FunctionTable {
        &self.table
    }

    pub fn ids(&self) -> &CallIdGen {
        &self.ids
    }

    pub fn execution(&self) -> &Execution {
        &self.execution
    }

    /// Measures referenced by the query
    pub fn measures(&self) -> &IndexSet<Member> {
        &self.measures
    }

    pub fn cached(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.cache.read().get(key).cloned()
    }

    /// Store an entry unless one is already present; the stored entry is
    /// returned either way
    pub fn store(&self, key: CacheKey, entry: CacheEntry) -> CacheEntry {
        self.cache.write().entry(key).or_insert(entry).clone()
    }

    pub fn cache_len(&self) -> usize {
        self.cache.read().len()
    }

    /// Compiled formula of a calculated member, compiled on first use
    pub fn formula_calc(&self, member: &Member) -> EvalResult<CalcRef> {
        if let Some(calc) = self.formulas.read().get(&member.id()) {
            return Ok(calc.clone());
        }
        let formula = self.catalog.formula(member).ok_or_else(|| {
            EvalError::internal(format!("calculated member {member} has no formula"))
        })?;
        let expr = Validator::new(self.catalog(), &self.table, &self.ids).resolve(&formula.formula)?;
        let calc = Compiler::new(self.catalog()).compile_as(&expr, Category::Value)?;
        debug!("compiled formula of {member}");
        Ok(self
            .formulas
            .write()
            .entry(member.id())
            .or_insert(calc)
            .clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_iteration_budget_cancels() {
        let config = EngineConfig::default().with_max_iterations(3);
        let execution = Execution::new(&config, Arc::new(AtomicBool::new(false)));
        for _ in 0..3 {
            execution.check().unwrap();
        }
        assert!(matches!(execution.check(), Err(EvalError::Cancelled)));
        // stays cancelled
        assert!(matches!(execution.check(), Err(EvalError::Cancelled)));
    }

    #[test]
    fn test_timeout_latches() {
        let flag = Arc::new(AtomicBool::new(false));
        let config = EngineConfig::default().with_timeout(Duration::from_millis(1));
        let execution = Execution::new(&config, flag.clone());
        std::thread::sleep(Duration::from_millis(5));
        let Err(EvalError::Timeout { millis }) = execution.check() else {
            panic!("expected a timeout");
        };
        assert!(millis >= 1);
        assert!(matches!(
            execution.check(),
            Err(EvalError::Timeout { millis: m }) if m == millis
        ));
        assert!(flag.load(Ordering::Relaxed));
    }

    #[test]
    fn test_external_cancel() {
        let flag = Arc::new(AtomicBool::new(false));
        let execution = Execution::new(&EngineConfig::default(), flag.clone());
        execution.check().unwrap();
        flag.store(true, Ordering::Relaxed);
        assert!(matches!(execution.check(), Err(EvalError::Cancelled)));
    }
}
