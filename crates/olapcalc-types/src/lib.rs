//! Type system of the olapcalc engine
//!
//! This crate defines the data the rest of the engine passes around:
//! - Signature categories and static expression types
//! - Function signatures and their compact string encoding
//! - Implicit conversion rules used by overload resolution
//! - Members, tuples and arity-checked tuple lists
//! - Runtime values

pub mod category;
pub mod coercion;
pub mod member;
pub mod signature;
pub mod tuple;
pub mod value;

pub use category::{Category, DataType, HierarchyList};
pub use coercion::{Conversion, ConversionRules};
pub use member::{
    DimensionId, HierarchyId, LevelId, Member, MemberId, MemberKind, MemberSpec,
    compare_hierarchically, compare_siblings,
};
pub use signature::{Signature, SignatureError, Syntax};
pub use tuple::{CartesianIter, Tuple, TupleError, TupleList, cartesian_product, product_size};
pub use value::{CellError, Value, compare_values};
