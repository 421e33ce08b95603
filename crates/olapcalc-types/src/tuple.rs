//! Tuples and arity-checked tuple lists
//!
//! A [`Tuple`] is a fixed-length sequence of members, one per hierarchy
//! position. A [`TupleList`] is an ordered collection of tuples that all share
//! the list's arity. Lists share their backing store copy-on-write: cloning a
//! list is cheap, and mutating a list that is shared copies it first, so a
//! list owned by exactly one holder behaves as a mutable list.

use indexmap::IndexSet;
use serde::{Serialize, Serializer};
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;
use std::sync::Arc;
use thiserror::Error;

use crate::member::Member;

/// Errors raised by tuple set algebra
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TupleError {
    /// A tuple does not have the arity of its list
    #[error("Arity mismatch: expected {expected}, found {found}")]
    ArityMismatch { expected: usize, found: usize },

    /// A column index is out of range
    #[error("Column {column} out of range for arity {arity}")]
    ColumnOutOfRange { column: usize, arity: usize },

    /// A cartesian product would exceed the configured limit
    #[error("Cartesian product of size {size} exceeds the result limit of {limit}")]
    ResultLimitExceeded { size: u128, limit: usize },
}

/// Fixed-length sequence of members
#[derive(Clone, PartialEq, Eq, Hash, Default)]
pub struct Tuple(SmallVec<[Member; 4]>);

impl Tuple {
    pub fn new(members: impl IntoIterator<Item = Member>) -> Self {
        Self(members.into_iter().collect())
    }

    /// A tuple of one member
    pub fn unit(member: Member) -> Self {
        Self(smallvec::smallvec![member])
    }

    pub fn arity(&self) -> usize {
        self.0.len()
    }

    pub fn members(&self) -> &[Member] {
        &self.0
    }

    /// Concatenate two tuples
    pub fn concat(&self, other: &Tuple) -> Tuple {
        let mut members = self.0.clone();
        members.extend(other.0.iter().cloned());
        Self(members)
    }

    /// Extract the members at `ordinals`
    pub fn project(&self, ordinals: &[usize]) -> Result<Tuple, TupleError> {
        ordinals
            .iter()
            .map(|&i| {
                self.0.get(i).cloned().ok_or(TupleError::ColumnOutOfRange {
                    column: i,
                    arity: self.arity(),
                })
            })
            .collect::<Result<SmallVec<_>, _>>()
            .map(Self)
    }

    /// Whether any member of the tuple is calculated
    pub fn contains_calculated(&self) -> bool {
        self.0.iter().any(Member::is_calculated)
    }
}

impl Deref for Tuple {
    type Target = [Member];

    fn deref(&self) -> &[Member] {
        &self.0
    }
}

impl FromIterator<Member> for Tuple {
    fn from_iter<I: IntoIterator<Item = Member>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<Vec<Member>> for Tuple {
    fn from(members: Vec<Member>) -> Self {
        Self(SmallVec::from_vec(members))
    }
}

impl fmt::Debug for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, m) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{m}")?;
        }
        f.write_str(")")
    }
}

impl Serialize for Tuple {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.0.iter())
    }
}

/// Ordered, arity-tagged collection of tuples
#[derive(Clone)]
pub struct TupleList {
    arity: usize,
    tuples: Arc<Vec<Tuple>>,
}

impl TupleList {
    /// Create an empty list
    pub fn new(arity: usize) -> Self {
        Self::with_capacity(arity, 0)
    }

    /// Create an empty list with room for `capacity` tuples
    pub fn with_capacity(arity: usize, capacity: usize) -> Self {
        Self {
            arity,
            tuples: Arc::new(Vec::with_capacity(capacity)),
        }
    }

    /// Wrap existing tuples, checking each against `arity`
    pub fn from_tuples(arity: usize, tuples: Vec<Tuple>) -> Result<Self, TupleError> {
        if let Some(bad) = tuples.iter().find(|t| t.arity() != arity) {
            return Err(TupleError::ArityMismatch {
                expected: arity,
                found: bad.arity(),
            });
        }
        Ok(Self {
            arity,
            tuples: Arc::new(tuples),
        })
    }

    /// A list of one-member tuples
    pub fn from_members(members: impl IntoIterator<Item = Member>) -> Self {
        Self {
            arity: 1,
            tuples: Arc::new(members.into_iter().map(Tuple::unit).collect()),
        }
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn len(&self) -> usize {
        self.tuples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tuples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Tuple> {
        self.tuples.get(index)
    }

    pub fn tuples(&self) -> &[Tuple] {
        &self.tuples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tuple> {
        self.tuples.iter()
    }

    /// Whether this handle is the only owner of the backing store, i.e.
    /// mutation will not copy
    pub fn is_exclusive(&self) -> bool {
        Arc::strong_count(&self.tuples) == 1
    }

    /// Append a tuple
    pub fn push(&mut self, tuple: Tuple) -> Result<(), TupleError> {
        if tuple.arity() != self.arity {
            return Err(TupleError::ArityMismatch {
                expected: self.arity,
                found: tuple.arity(),
            });
        }
        Arc::make_mut(&mut self.tuples).push(tuple);
        Ok(())
    }

    /// Append every tuple of another list of the same arity
    pub fn extend_from(&mut self, other: &TupleList) -> Result<(), TupleError> {
        if other.arity != self.arity {
            return Err(TupleError::ArityMismatch {
                expected: self.arity,
                found: other.arity,
            });
        }
        Arc::make_mut(&mut self.tuples).extend(other.iter().cloned());
        Ok(())
    }

    /// Stable sort
    pub fn sort_by(&mut self, compare: impl FnMut(&Tuple, &Tuple) -> Ordering) {
        Arc::make_mut(&mut self.tuples).sort_by(compare);
    }

    /// Extract one column
    pub fn slice(&self, column: usize) -> Result<Vec<Member>, TupleError> {
        if column >= self.arity {
            return Err(TupleError::ColumnOutOfRange {
                column,
                arity: self.arity,
            });
        }
        Ok(self.tuples.iter().map(|t| t[column].clone()).collect())
    }

    /// Extract a sub-tuple from every element
    pub fn project(&self, ordinals: &[usize]) -> Result<TupleList, TupleError> {
        let tuples = self
            .tuples
            .iter()
            .map(|t| t.project(ordinals))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            arity: ordinals.len(),
            tuples: Arc::new(tuples),
        })
    }

    /// Remove duplicates, keeping the first occurrence of each tuple
    pub fn distinct(&self) -> TupleList {
        let set: IndexSet<&Tuple> = self.tuples.iter().collect();
        if set.len() == self.len() {
            return self.clone();
        }
        Self {
            arity: self.arity,
            tuples: Arc::new(set.into_iter().cloned().collect()),
        }
    }

    /// Take the tuples out, copying only if the store is shared
    pub fn into_vec(self) -> Vec<Tuple> {
        Arc::unwrap_or_clone(self.tuples)
    }
}

impl PartialEq for TupleList {
    fn eq(&self, other: &Self) -> bool {
        self.arity == other.arity && self.tuples == other.tuples
    }
}

impl fmt::Debug for TupleList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TupleList")
            .field("arity", &self.arity)
            .field("tuples", &self.tuples)
            .finish()
    }
}

impl<'a> IntoIterator for &'a TupleList {
    type Item = &'a Tuple;
    type IntoIter = std::slice::Iter<'a, Tuple>;

    fn into_iter(self) -> Self::IntoIter {
        self.tuples.iter()
    }
}

impl Serialize for TupleList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.tuples.iter())
    }
}

/// Size of the cartesian product of `lists`, checked against `limit`
/// (0 means unlimited).
pub fn product_size(lists: &[TupleList], limit: usize) -> Result<usize, TupleError> {
    let size: u128 = lists.iter().map(|l| l.len() as u128).product();
    if (limit > 0 && size > limit as u128) || size > usize::MAX as u128 {
        return Err(TupleError::ResultLimitExceeded { size, limit });
    }
    Ok(size as usize)
}

/// Materialize the cartesian product of `lists`.
///
/// The right-most list varies fastest. The size is checked against `limit`
/// before anything is allocated, and `tick` is called once per produced
/// tuple so that callers can enforce an execution budget.
pub fn cartesian_product<E>(
    lists: &[TupleList],
    limit: usize,
    mut tick: impl FnMut() -> Result<(), E>,
) -> Result<TupleList, E>
where
    E: From<TupleError>,
{
    let arity = lists.iter().map(TupleList::arity).sum();
    let size = product_size(lists, limit)?;
    let mut out = Vec::with_capacity(size);
    if size > 0 {
        let mut odometer = vec![0usize; lists.len()];
        'outer: loop {
            tick()?;
            out.push(
                odometer
                    .iter()
                    .zip(lists)
                    .flat_map(|(&i, l)| l.tuples[i].iter().cloned())
                    .collect(),
            );
            for pos in (0..lists.len()).rev() {
                odometer[pos] += 1;
                if odometer[pos] < lists[pos].len() {
                    continue 'outer;
                }
                odometer[pos] = 0;
            }
            break;
        }
    }
    Ok(TupleList {
        arity,
        tuples: Arc::new(out),
    })
}

/// Lazy cartesian product of a single-pass iterator with re-iterable lists.
///
/// The left operand is consumed one tuple at a time; for each left tuple the
/// right lists are walked with the right-most varying fastest, then reset.
pub struct CartesianIter<I> {
    left: I,
    rights: Vec<TupleList>,
    current: Option<Tuple>,
    odometer: Vec<usize>,
}

impl<I: Iterator<Item = Tuple>> CartesianIter<I> {
    pub fn new(left: I, rights: Vec<TupleList>) -> Self {
        let odometer = vec![0; rights.len()];
        Self {
            left,
            rights,
            current: None,
            odometer,
        }
    }

    fn advance_rights(&mut self) -> bool {
        for pos in (0..self.rights.len()).rev() {
            self.odometer[pos] += 1;
            if self.odometer[pos] < self.rights[pos].len() {
                return true;
            }
            self.odometer[pos] = 0;
        }
        false
    }
}

impl<I: Iterator<Item = Tuple>> Iterator for CartesianIter<I> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        if self.rights.iter().any(TupleList::is_empty) {
            return None;
        }
        if self.current.is_some() && !self.advance_rights() {
            self.current = None;
        }
        if self.current.is_none() {
            self.current = Some(self.left.next()?);
            self.odometer.iter_mut().for_each(|i| *i = 0);
        }
        let left = self.current.as_ref()?;
        let mut members: SmallVec<[Member; 4]> = left.0.clone();
        for (&i, list) in self.odometer.iter().zip(&self.rights) {
            members.extend(list.tuples[i].iter().cloned());
        }
        Some(Tuple(members))
    }
}
