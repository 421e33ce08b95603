//! Catalog identifiers and member handles
//!
//! Members are created by the metadata catalog and handed around by the
//! engine as cheap reference-counted handles. Equality and hashing use the
//! member id only.

use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Ordinal of a hierarchy within its cube.
///
/// Hierarchy ids are dense: the evaluator keeps one current member per
/// hierarchy in a vector indexed by this id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HierarchyId(pub u32);

impl HierarchyId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Ordinal of a dimension within its cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DimensionId(pub u32);

/// Ordinal of a level within its cube
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LevelId(pub u32);

/// Catalog-wide member identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MemberId(pub u32);

/// Kind of member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemberKind {
    /// Ordinary stored member
    Regular,
    /// The grand-total member of a hierarchy
    All,
    /// A member of the measures dimension
    Measure,
    /// The null member (e.g. the parent of a root member)
    Null,
}

/// Everything the catalog knows about a member when it creates it
#[derive(Debug, Clone)]
pub struct MemberSpec {
    pub id: MemberId,
    pub name: String,
    pub unique_name: String,
    pub kind: MemberKind,
    pub calculated: bool,
    pub hierarchy: HierarchyId,
    pub dimension: DimensionId,
    pub level: LevelId,
    pub depth: u32,
    /// Position of the member in a pre-order walk of its hierarchy
    pub ordinal: u32,
    pub parent: Option<Member>,
    pub solve_order: i32,
    pub visible: bool,
}

/// Reference-counted member handle
#[derive(Clone)]
pub struct Member(Arc<MemberSpec>);

impl Member {
    /// Wrap a member description
    pub fn new(spec: MemberSpec) -> Self {
        Self(Arc::new(spec))
    }

    pub fn id(&self) -> MemberId {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn unique_name(&self) -> &str {
        &self.0.unique_name
    }

    pub fn kind(&self) -> MemberKind {
        self.0.kind
    }

    pub fn hierarchy(&self) -> HierarchyId {
        self.0.hierarchy
    }

    pub fn dimension(&self) -> DimensionId {
        self.0.dimension
    }

    pub fn level(&self) -> LevelId {
        self.0.level
    }

    pub fn depth(&self) -> u32 {
        self.0.depth
    }

    pub fn ordinal(&self) -> u32 {
        self.0.ordinal
    }

    pub fn parent(&self) -> Option<&Member> {
        self.0.parent.as_ref()
    }

    pub fn solve_order(&self) -> i32 {
        self.0.solve_order
    }

    pub fn is_visible(&self) -> bool {
        self.0.visible
    }

    pub fn is_all(&self) -> bool {
        self.0.kind == MemberKind::All
    }

    pub fn is_measure(&self) -> bool {
        self.0.kind == MemberKind::Measure
    }

    pub fn is_null(&self) -> bool {
        self.0.kind == MemberKind::Null
    }

    /// Whether the member is defined by a formula rather than stored data
    pub fn is_calculated(&self) -> bool {
        self.0.calculated
    }

    /// Iterate over the proper ancestors, nearest first
    pub fn ancestors(&self) -> impl Iterator<Item = &Member> {
        std::iter::successors(self.parent(), |m| m.parent())
    }

    /// Whether this member is a proper ancestor of `other`
    pub fn is_ancestor_of(&self, other: &Member) -> bool {
        other.depth() > self.depth() && other.ancestors().any(|a| a == self)
    }

    /// The ancestor of this member (or the member itself) at `depth`
    pub fn ancestor_at_depth(&self, depth: u32) -> Option<&Member> {
        if depth > self.depth() {
            return None;
        }
        std::iter::once(self)
            .chain(self.ancestors())
            .find(|m| m.depth() == depth)
    }
}

impl PartialEq for Member {
    fn eq(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl Eq for Member {}

impl Hash for Member {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.id.hash(state);
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.unique_name)
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.unique_name)
    }
}

impl Serialize for Member {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.unique_name)
    }
}

/// Compare two members of the same hierarchy in hierarchical order.
///
/// In pre-order an ancestor sorts before its descendants, in post-order
/// after them. Members that are not in an ancestor relationship sort by
/// their position in the hierarchy.
pub fn compare_hierarchically(a: &Member, b: &Member, post: bool) -> Ordering {
    if a == b {
        return Ordering::Equal;
    }
    if a.is_ancestor_of(b) {
        return if post { Ordering::Greater } else { Ordering::Less };
    }
    if b.is_ancestor_of(a) {
        return if post { Ordering::Less } else { Ordering::Greater };
    }
    a.ordinal().cmp(&b.ordinal())
}

/// Natural order of two siblings
pub fn compare_siblings(a: &Member, b: &Member) -> Ordering {
    a.ordinal().cmp(&b.ordinal())
}


#[cfg(test)]
mod tests {
    use super::testing::tree;
    use super::*;

    #[test]
    fn test_ancestry() {
        let m = tree();
        assert!(m[0].is_ancestor_of(&m[2]));
        assert!(m[1].is_ancestor_of(&m[3]));
        assert!(!m[4].is_ancestor_of(&m[2]));
        assert!(!m[2].is_ancestor_of(&m[2]));
        assert_eq!(m[3].ancestor_at_depth(1), Some(&m[1]));
        assert_eq!(m[3].ancestors().count(), 2);
    }

    #[test]
    fn test_hierarchical_order() {
        let m = tree();
        assert_eq!(compare_hierarchically(&m[1], &m[2], false), Ordering::Less);
        assert_eq!(compare_hierarchically(&m[1], &m[2], true), Ordering::Greater);
        assert_eq!(compare_hierarchically(&m[3], &m[4], false), Ordering::Less);
        assert_eq!(compare_hierarchically(&m[3], &m[4], true), Ordering::Less);
    }
}
