/*!

A set of (small) natural numbers backed by a bitset, used wherever the engine needs dense membership tests over
small integer domains (variable slot indices, pattern positions) rather than a general-purpose hash set.

*/

use std::fmt::{Debug, Formatter};
use bit_set::BitSet;

#[derive(Clone, Default, Eq, PartialEq)]
pub struct NatSet {
  bits: BitSet,
}

impl NatSet {
  pub fn new() -> Self {
    NatSet { bits: BitSet::new() }
  }

  pub fn with_capacity(capacity: usize) -> Self {
    NatSet { bits: BitSet::with_capacity(capacity) }
  }

  pub fn insert(&mut self, value: usize) -> bool {
    self.bits.insert(value)
  }

  pub fn remove(&mut self, value: usize) -> bool {
    self.bits.remove(value)
  }

  pub fn contains(&self, value: usize) -> bool {
    self.bits.contains(value)
  }

  pub fn is_empty(&self) -> bool {
    self.bits.is_empty()
  }

  pub fn len(&self) -> usize {
    self.bits.len()
  }

  pub fn clear(&mut self) {
    self.bits.clear()
  }

  pub fn union_with(&mut self, other: &NatSet) {
    self.bits.union_with(&other.bits);
  }

  pub fn intersect_with(&mut self, other: &NatSet) {
    self.bits.intersect_with(&other.bits);
  }

  pub fn difference(&self, other: &NatSet) -> NatSet {
    let mut result = self.clone();
    result.bits.difference_with(&other.bits);
    result
  }

  pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
    self.bits.iter()
  }
}

impl FromIterator<usize> for NatSet {
  fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
    let mut set = NatSet::new();
    for value in iter {
      set.insert(value);
    }
    set
  }
}

impl Debug for NatSet {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    f.debug_set().entries(self.iter()).finish()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn basic_membership() {
    let mut set = NatSet::new();
    assert!(set.insert(3));
    assert!(!set.insert(3));
    assert!(set.contains(3));
    assert!(!set.contains(4));
    assert_eq!(set.len(), 1);
  }

  #[test]
  fn set_algebra() {
    let a: NatSet = [1, 2, 3].into_iter().collect();
    let b: NatSet = [2, 3, 4].into_iter().collect();
    let diff = a.difference(&b);
    assert_eq!(diff.iter().collect::<Vec<_>>(), vec![1]);
  }
}
