//! Value-set lattice for dataflow analysis
//!
//! A [`ValueSet`] means "one of these values, statically we don't know
//! which". Merging at control-flow joins is set union:
//! - Empty (⊥) = no information, identity for [`ValueSet::meet`]
//! - One = the overwhelmingly common case, stored inline
//! - Many = two or more distinct values, stored in a shared backing set
//!
//! The lattice is purely structural; it never interprets its elements.

use super::cfg::Slot;
use indexmap::{IndexMap, IndexSet};
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

#[derive(Clone)]
enum Repr<T> {
    Empty,
    One(T),
    /// Invariant: holds at least two distinct values.
    Many(Arc<IndexSet<T>>),
}

/// Immutable set of values with inline storage for zero or one element
#[derive(Clone)]
pub struct ValueSet<T> {
    repr: Repr<T>,
}

impl<T> ValueSet<T> {
    pub const fn empty() -> Self {
        Self { repr: Repr::Empty }
    }

    pub fn singleton(value: T) -> Self {
        Self { repr: Repr::One(value) }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self.repr, Repr::Empty)
    }

    pub fn len(&self) -> usize {
        match &self.repr {
            Repr::Empty => 0,
            Repr::One(_) => 1,
            Repr::Many(values) => values.len(),
        }
    }

    /// Whether the values live in a separately allocated backing set
    pub fn is_backed(&self) -> bool {
        matches!(self.repr, Repr::Many(_))
    }

    /// Iterate distinct values; multi-value sets yield in first-insertion order
    pub fn iter(&self) -> Iter<'_, T> {
        match &self.repr {
            Repr::Empty => Iter::Inline(None),
            Repr::One(value) => Iter::Inline(Some(value)),
            Repr::Many(values) => Iter::Backed(values.iter()),
        }
    }
}

impl<T: Eq + Hash + Clone> ValueSet<T> {
    /// Build a set from arbitrary values, dropping duplicates
    pub fn from_values(values: impl IntoIterator<Item = T>) -> Self {
        let mut set: IndexSet<T> = values.into_iter().collect();
        match set.len() {
            0 => Self::empty(),
            1 => match set.pop() {
                Some(value) => Self::singleton(value),
                None => Self::empty(),
            },
            _ => Self {
                repr: Repr::Many(Arc::new(set)),
            },
        }
    }

    pub fn contains(&self, value: &T) -> bool {
        match &self.repr {
            Repr::Empty => false,
            Repr::One(single) => single == value,
            Repr::Many(values) => values.contains(value),
        }
    }

    /// Union of two sets
    ///
    /// Returns one of the operands unchanged whenever the other contributes
    /// nothing new, so merging an already-present single value allocates nothing.
    pub fn meet(&self, other: &ValueSet<T>) -> ValueSet<T> {
        match (&self.repr, &other.repr) {
            (Repr::Empty, _) => other.clone(),
            (_, Repr::Empty) => self.clone(),
            (Repr::One(value), _) if other.contains(value) => other.clone(),
            (_, Repr::One(value)) if self.contains(value) => self.clone(),
            (Repr::Many(left), Repr::Many(right)) if Arc::ptr_eq(left, right) => self.clone(),
            _ => {
                let mut union: IndexSet<T> = self.iter().cloned().collect();
                union.extend(other.iter().cloned());
                Self {
                    repr: Repr::Many(Arc::new(union)),
                }
            }
        }
    }

    /// Apply `f` to every value and collect the results as a set
    pub fn map<U: Eq + Hash + Clone>(&self, f: impl FnMut(&T) -> U) -> ValueSet<U> {
        ValueSet::from_values(self.iter().map(f))
    }
}

impl<T> Default for ValueSet<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: Eq + Hash> PartialEq for ValueSet<T> {
    fn eq(&self, other: &Self) -> bool {
        match (&self.repr, &other.repr) {
            (Repr::Empty, Repr::Empty) => true,
            (Repr::One(a), Repr::One(b)) => a == b,
            (Repr::Many(a), Repr::Many(b)) => Arc::ptr_eq(a, b) || (a.len() == b.len() && a.is_subset(b)),
            _ => false,
        }
    }
}

impl<T: Eq + Hash> Eq for ValueSet<T> {}

fn element_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

impl<T: Eq + Hash> Hash for ValueSet<T> {
    /// Order-independent: element hashes are combined with wrapping addition.
    fn hash<H: Hasher>(&self, state: &mut H) {
        let combined = match &self.repr {
            Repr::Empty => 0,
            Repr::One(value) => element_hash(value),
            Repr::Many(values) => values.iter().map(element_hash).fold(0u64, u64::wrapping_add),
        };
        state.write_usize(self.len());
        state.write_u64(combined);
    }
}

impl<T: fmt::Debug> fmt::Debug for ValueSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<T: fmt::Display> fmt::Display for ValueSet<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, value) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str("}")
    }
}

impl<T> From<T> for ValueSet<T> {
    fn from(value: T) -> Self {
        Self::singleton(value)
    }
}

impl<T: Eq + Hash + Clone> FromIterator<T> for ValueSet<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_values(iter)
    }
}

impl<'a, T> IntoIterator for &'a ValueSet<T> {
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

pub enum Iter<'a, T> {
    Inline(Option<&'a T>),
    Backed(indexmap::set::Iter<'a, T>),
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Iter::Inline(value) => value.take(),
            Iter::Backed(inner) => inner.next(),
        }
    }
}

/// Slot values at a single program point
///
/// A slot missing from the map carries no information (the empty set).
#[derive(Debug, Clone)]
pub struct SlotState<T> {
    slots: IndexMap<Slot, ValueSet<T>>,
}

impl<T: Eq + Hash> PartialEq for SlotState<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slots == other.slots
    }
}

impl<T: Eq + Hash> Eq for SlotState<T> {}

impl<T: Eq + Hash + Clone> SlotState<T> {
    pub fn new() -> Self {
        Self { slots: IndexMap::new() }
    }

    /// Current value of a slot
    pub fn get(&self, slot: Slot) -> ValueSet<T> {
        self.slots.get(&slot).cloned().unwrap_or_default()
    }

    /// Replace the value of a slot; assignments never accumulate across time
    pub fn set(&mut self, slot: Slot, values: ValueSet<T>) {
        self.slots.insert(slot, values);
    }

    /// Slot-by-slot meet, used at control-flow joins
    pub fn join(&self, other: &SlotState<T>) -> SlotState<T> {
        let mut result = self.clone();
        result.join_in_place(other);
        result
    }

    pub fn join_in_place(&mut self, other: &SlotState<T>) {
        for (slot, values) in &other.slots {
            let merged = match self.slots.get(slot) {
                Some(existing) => existing.meet(values),
                None => values.clone(),
            };
            self.slots.insert(*slot, merged);
        }
    }

    pub fn slots(&self) -> impl Iterator<Item = (&Slot, &ValueSet<T>)> {
        self.slots.iter()
    }
}

impl<T: Eq + Hash + Clone> Default for SlotState<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        element_hash(value)
    }

    #[test]
    fn test_singleton_is_inline() {
        let set = ValueSet::singleton("a");
        assert!(!set.is_backed());
        assert_eq!(set.len(), 1);
        assert!(set.contains(&"a"));
    }

    #[test]
    fn test_from_values_normalizes_representation() {
        assert!(ValueSet::<i32>::from_values([]).is_empty());
        let one = ValueSet::from_values([7, 7, 7]);
        assert!(!one.is_backed());
        assert_eq!(one, ValueSet::singleton(7));
        assert!(ValueSet::from_values([1, 2]).is_backed());
    }

    #[test]
    fn test_meet_with_empty_is_identity() {
        let x = ValueSet::from_values([1, 2]);
        assert_eq!(ValueSet::empty().meet(&x), x);
        assert_eq!(x.meet(&ValueSet::empty()), x);
    }

    #[test]
    fn test_meet_contained_single_returns_operand() {
        let many = ValueSet::from_values([1, 2, 3]);
        let merged = ValueSet::singleton(2).meet(&many);
        assert_eq!(merged, many);
        assert!(merged.is_backed());

        let merged = many.meet(&ValueSet::singleton(3));
        assert_eq!(merged.len(), 3);
    }

    #[test]
    fn test_meet_same_single_stays_inline() {
        let merged = ValueSet::singleton("x").meet(&ValueSet::singleton("x"));
        assert!(!merged.is_backed());
        assert_eq!(merged, ValueSet::singleton("x"));
    }

    #[test]
    fn test_meet_distinct_singles_promotes() {
        let merged = ValueSet::singleton(1).meet(&ValueSet::singleton(2));
        assert!(merged.is_backed());
        assert_eq!(merged, ValueSet::from_values([2, 1]));
    }

    #[test]
    fn test_equality_and_hash_ignore_order() {
        let xy = ValueSet::singleton("x").meet(&ValueSet::singleton("y"));
        let yx = ValueSet::singleton("y").meet(&ValueSet::singleton("x"));
        assert_eq!(xy, yx);
        assert_eq!(hash_of(&xy), hash_of(&yx));

        let mut seen = HashSet::new();
        seen.insert(xy);
        assert!(seen.contains(&yx));
    }

    #[test]
    fn test_display() {
        assert_eq!(ValueSet::<i32>::empty().to_string(), "{}");
        assert_eq!(ValueSet::from_values([1, 2]).to_string(), "{1,2}");
    }

    #[test]
    fn test_slot_state_join() {
        let mut left = SlotState::new();
        left.set(Slot::Local(0), ValueSet::singleton("a"));
        left.set(Slot::Local(1), ValueSet::singleton("b"));

        let mut right = SlotState::new();
        right.set(Slot::Local(0), ValueSet::singleton("c"));
        right.set(Slot::Local(2), ValueSet::singleton("d"));

        let joined = left.join(&right);
        assert_eq!(joined.get(Slot::Local(0)), ValueSet::from_values(["a", "c"]));
        // A slot missing on one side contributes nothing
        assert_eq!(joined.get(Slot::Local(1)), ValueSet::singleton("b"));
        assert_eq!(joined.get(Slot::Local(2)), ValueSet::singleton("d"));
        assert!(joined.get(Slot::Local(9)).is_empty());
    }

    #[test]
    fn test_slot_assignment_replaces() {
        let mut state = SlotState::new();
        state.set(Slot::Parameter(0), ValueSet::singleton(1));
        state.set(Slot::Parameter(0), ValueSet::singleton(2));
        assert_eq!(state.get(Slot::Parameter(0)), ValueSet::singleton(2));
    }

    #[test]
    fn test_slot_state_equality_ignores_order() {
        let mut left = SlotState::new();
        left.set(Slot::Local(0), ValueSet::from_values(["a", "b"]));
        left.set(Slot::This, ValueSet::singleton("t"));

        let mut right = SlotState::new();
        right.set(Slot::This, ValueSet::singleton("t"));
        right.set(Slot::Local(0), ValueSet::from_values(["b", "a"]));

        assert_eq!(left, right);
        right.set(Slot::This, ValueSet::singleton("u"));
        assert_ne!(left, right);
    }
}
