//! Typed keys and entries of the query-scoped evaluation cache

use olapcalc_types::{HierarchyId, Member, MemberId, Value};
use std::sync::Arc;

use crate::rank::Ranking;
use crate::validator::CallId;

/// What a cache entry holds for its call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKind {
    /// Result of the expression itself
    Result,
    /// Sort snapshot of a rank call
    Ranking,
    /// Measures reachable from the query
    MeasureSet,
    /// Non-measure members referenced by measure formulas
    MeasureMembers,
    /// All-members neutralizing the hierarchies outside cross join operand `n`
    AllMembers(usize),
    /// Top-level members of hierarchies without an All member, for operand `n`
    NonAllRoots(usize),
}

/// Describes a cacheable computation: which call, what kind of result, and
/// which hierarchies of the context the result depends on
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheDescriptor {
    pub call: CallId,
    pub kind: CacheKind,
    pub dependencies: Vec<HierarchyId>,
}

impl CacheDescriptor {
    pub fn new(call: CallId, kind: CacheKind, dependencies: Vec<HierarchyId>) -> Self {
        Self {
            call,
            kind,
            dependencies,
        }
    }

    /// A descriptor for results that do not depend on the context
    pub fn query_scoped(call: CallId, kind: CacheKind) -> Self {
        Self::new(call, kind, Vec::new())
    }
}

/// Full cache key: descriptor identity plus the evaluator state it was
/// computed in
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub call: CallId,
    pub kind: CacheKind,
    pub state: Vec<MemberId>,
    pub non_empty: bool,
}

#[derive(Debug, Clone)]
pub enum CacheEntry {
    Value(Value),
    Ranking(Arc<Ranking>),
    Members(Arc<Vec<Member>>),
    MemberLists(Arc<Vec<Vec<Member>>>),
}

impl CacheEntry {
    pub fn into_members(self) -> Option<Arc<Vec<Member>>> {
        match self {
            Self::Members(m) => Some(m),
            _ => None,
        }
    }

    pub fn into_member_lists(self) -> Option<Arc<Vec<Vec<Member>>>> {
        match self {
            Self::MemberLists(m) => Some(m),
            _ => None,
        }
    }
}
