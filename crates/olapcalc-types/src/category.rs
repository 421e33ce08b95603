//! Value-kind categories and static expression types
//!
//! [`Category`] is the coarse tag used in function signatures. [`DataType`]
//! is the richer static type carried by every resolved expression: besides
//! the category it records which hierarchy a member, level or hierarchy
//! expression belongs to (when that is known at compile time), and the
//! per-position hierarchies of tuple and set element types.

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use std::fmt;

use crate::member::{DimensionId, HierarchyId};

/// Coarse value-kind tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Array,
    Dimension,
    Hierarchy,
    Level,
    Logical,
    Member,
    Numeric,
    Integer,
    Set,
    String,
    Tuple,
    Value,
    Symbol,
    Null,
    Empty,
    DateTime,
    Unknown,
}

impl Category {
    /// Human-readable name, as used in signature descriptions
    pub fn name(&self) -> &'static str {
        match self {
            Self::Array => "Array",
            Self::Dimension => "Dimension",
            Self::Hierarchy => "Hierarchy",
            Self::Level => "Level",
            Self::Logical => "Logical Expression",
            Self::Member => "Member",
            Self::Numeric => "Numeric Expression",
            Self::Integer => "Integer",
            Self::Set => "Set",
            Self::String => "String",
            Self::Tuple => "Tuple",
            Self::Value => "Value",
            Self::Symbol => "Symbol",
            Self::Null => "Null",
            Self::Empty => "Empty",
            Self::DateTime => "DateTime",
            Self::Unknown => "Unknown",
        }
    }

    /// Whether values of this category are scalars (cell values)
    pub fn is_scalar(&self) -> bool {
        matches!(
            self,
            Self::Numeric
                | Self::Integer
                | Self::String
                | Self::Logical
                | Self::DateTime
                | Self::Value
                | Self::Null
        )
    }

    /// Whether values of this category are numbers
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Numeric | Self::Integer)
    }

    /// Whether values of this category are catalog elements
    pub fn is_element(&self) -> bool {
        matches!(
            self,
            Self::Member | Self::Level | Self::Hierarchy | Self::Dimension
        )
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Element hierarchies of a tuple or set type, one per position
pub type HierarchyList = SmallVec<[Option<HierarchyId>; 4]>;

/// Static type of a resolved expression
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Numeric,
    Integer,
    String,
    Logical,
    DateTime,
    /// A scalar whose kind is only known at run time
    Value,
    Symbol,
    Null,
    Empty,
    Array,
    Member(Option<HierarchyId>),
    Tuple(HierarchyList),
    /// Set of members (one position) or tuples
    Set(HierarchyList),
    Level(Option<HierarchyId>),
    Hierarchy(Option<HierarchyId>),
    Dimension(Option<DimensionId>),
    Unknown,
}

impl DataType {
    /// Set of members of the given hierarchy
    pub fn member_set(hierarchy: Option<HierarchyId>) -> Self {
        Self::Set(smallvec::smallvec![hierarchy])
    }

    /// Set whose elements have the given per-position hierarchies
    pub fn set_of(hierarchies: impl IntoIterator<Item = Option<HierarchyId>>) -> Self {
        Self::Set(hierarchies.into_iter().collect())
    }

    /// The signature category of this type
    pub fn category(&self) -> Category {
        match self {
            Self::Numeric => Category::Numeric,
            Self::Integer => Category::Integer,
            Self::String => Category::String,
            Self::Logical => Category::Logical,
            Self::DateTime => Category::DateTime,
            Self::Value => Category::Value,
            Self::Symbol => Category::Symbol,
            Self::Null => Category::Null,
            Self::Empty => Category::Empty,
            Self::Array => Category::Array,
            Self::Member(_) => Category::Member,
            Self::Tuple(_) => Category::Tuple,
            Self::Set(_) => Category::Set,
            Self::Level(_) => Category::Level,
            Self::Hierarchy(_) => Category::Hierarchy,
            Self::Dimension(_) => Category::Dimension,
            Self::Unknown => Category::Unknown,
        }
    }

    /// Number of member positions for members, tuples and sets
    pub fn arity(&self) -> Option<usize> {
        match self {
            Self::Member(_) => Some(1),
            Self::Tuple(h) | Self::Set(h) => Some(h.len()),
            _ => None,
        }
    }

    /// Per-position hierarchies for members, tuples and sets
    pub fn hierarchies(&self) -> HierarchyList {
        match self {
            Self::Member(h) => smallvec::smallvec![*h],
            Self::Tuple(h) | Self::Set(h) => h.clone(),
            _ => HierarchyList::new(),
        }
    }

    /// The hierarchy of a member, level or hierarchy type
    pub fn hierarchy(&self) -> Option<HierarchyId> {
        match self {
            Self::Member(h) | Self::Level(h) | Self::Hierarchy(h) => *h,
            _ => None,
        }
    }

    /// Whether an expression of this type fixes `hierarchy`.
    ///
    /// With `definitely` false, a member type of unknown hierarchy is assumed
    /// to use every hierarchy.
    pub fn uses_hierarchy(&self, hierarchy: HierarchyId, definitely: bool) -> bool {
        match self {
            Self::Member(h) | Self::Level(h) | Self::Hierarchy(h) => match h {
                Some(h) => *h == hierarchy,
                None => !definitely,
            },
            Self::Tuple(hs) | Self::Set(hs) => hs.iter().any(|h| match h {
                Some(h) => *h == hierarchy,
                None => !definitely,
            }),
            _ => false,
        }
    }

    /// The type obtained when this type is used as a set
    pub fn to_set(&self) -> Option<DataType> {
        match self {
            Self::Set(_) => Some(self.clone()),
            Self::Member(h) | Self::Level(h) | Self::Hierarchy(h) => Some(Self::member_set(*h)),
            Self::Tuple(h) => Some(Self::Set(h.clone())),
            _ => None,
        }
    }

    /// Whether this is a scalar type
    pub fn is_scalar(&self) -> bool {
        self.category().is_scalar()
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tuple(h) | Self::Set(h) if h.len() > 1 => {
                write!(f, "{}[{}]", self.category().name(), h.len())
            }
            _ => f.write_str(self.category().name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_type_uses_hierarchy() {
        let t = DataType::Member(Some(HierarchyId(2)));
        assert!(t.uses_hierarchy(HierarchyId(2), true));
        assert!(!t.uses_hierarchy(HierarchyId(3), false));

        let unknown = DataType::Member(None);
        assert!(unknown.uses_hierarchy(HierarchyId(3), false));
        assert!(!unknown.uses_hierarchy(HierarchyId(3), true));
    }

    #[test]
    fn test_to_set() {
        let t = DataType::Tuple(smallvec::smallvec![Some(HierarchyId(0)), Some(HierarchyId(1))]);
        assert_eq!(t.to_set().and_then(|s| s.arity()), Some(2));
        assert_eq!(DataType::Numeric.to_set(), None);
        assert_eq!(DataType::Level(Some(HierarchyId(4))).to_set().unwrap().category(), Category::Set);
    }

    #[test]
    fn test_scalar_categories() {
        assert!(Category::Numeric.is_scalar());
        assert!(Category::Value.is_scalar());
        assert!(!Category::Set.is_scalar());
        assert!(Category::Member.is_element());
    }
}
