/*!

An `IndexSet` swaps a value for an index (a `usize`) using some key value. We have two use cases:
1. When the value and key are the same, namely an interned value's own content
2. When the key is provided by the caller, typically a content hash of the value

In the first case, we provide `IndexSet::insert` and `IndexSet::value_to_index`. In the second case, we provide
`IndexSet::insert_with_key`. This is exactly the shape the atom interning layer (`rulecore::atoms`) needs: each
per-kind interning table is an `IndexSet` keyed by content, handing back a dense index that doubles as the atom's
identity.

*/

use std::collections::hash_map::Entry;
use std::hash::Hash;
use crate::HashMap;

pub struct IndexSet<Key, Value>
    where Key: Hash + Clone + Eq, Value: PartialEq
{
  /// Maps an index to a key of the hash map below.
  keys: Vec<Key>,
  /// Maps a key to a (index, value) pair. Sometimes the key is a content hash, sometimes it's the value itself.
  indices: HashMap<Key, (usize, Value)>,
}

impl<Key, Value> Default for IndexSet<Key, Value>
    where Key: Hash + Clone + Eq, Value: PartialEq
{
  fn default() -> Self {
    Self {
      keys   : Vec::new(),
      indices: HashMap::new(),
    }
  }
}

// When `Key` is the value's own content.
impl<Value> IndexSet<Value, Value>
where Value: Hash + Clone + Eq
{
  /// Use the value's own content as the key, returning its (possibly newly assigned) index.
  pub fn insert(&mut self, value: Value) -> usize {
    let index = self.indices.len();

    match self.indices.entry(value.clone()) {
      Entry::Occupied(entry) => entry.get().0,
      Entry::Vacant(entry) => {
        entry.insert((index, value.clone()));
        self.keys.push(value);
        index
      }
    }
  }

  pub fn value_to_index(&self, value: Value) -> Option<usize> {
    self.indices.get(&value).map(|(index, _)| *index)
  }
}

// The more general case where the caller provides the key. This subsumes the above case.
impl<Key, Value> IndexSet<Key, Value>
where Key: Hash + Clone + Eq,
      Value: PartialEq
{
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert `value` under `key`, returning its (possibly newly assigned) index. If `key` already maps to some
  /// value, the existing value is kept and the existing index is returned (this is the hash-consing contract:
  /// on a content collision we never replace the canonical instance).
  pub fn insert_with_key(&mut self, key: Key, value: Value) -> usize {
    let index = self.indices.len();

    match self.indices.entry(key.clone()) {
      Entry::Occupied(entry) => entry.get().0,
      Entry::Vacant(entry) => {
        entry.insert((index, value));
        self.keys.push(key);
        index
      }
    }
  }

  /// Looks up `key`, returning its index only if the stored value equals `value`.
  pub fn key_to_index(&self, key: Key, value: Value) -> Option<usize> {
    self.indices
        .get(&key)
        .filter(|(_, v)| *v == value)
        .map(|(idx, _)| *idx)
  }

  pub fn index_to_key(&self, index: usize) -> Option<Key> {
    self.keys.get(index).cloned()
  }

  pub fn index_to_value(&self, index: usize) -> Option<&Value> {
    self.keys.get(index).map(
      // Guaranteed to exist, since the key is in the keys vector.
      |key| &self.indices.get(key).unwrap().1
    )
  }

  pub fn contains_key(&self, key: &Key) -> bool {
    self.indices.contains_key(key)
  }

  pub fn len(&self) -> usize {
    self.keys.len()
  }

  pub fn is_empty(&self) -> bool {
    self.keys.is_empty()
  }

  pub fn clear(&mut self) {
    self.keys.clear();
    self.indices.clear();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_and_default_impls() {
    let iset: IndexSet<u8, u8> = IndexSet::new();
    assert_eq!(iset.len(), 0);
    assert_eq!(iset.index_to_key(0), None);
    assert_eq!(iset.index_to_value(0), None);
    assert_eq!(iset.key_to_index(0, 0), None);
  }

  #[test]
  fn insert_with_key_basic() {
    let mut iset = IndexSet::new();
    let idx1 = iset.insert_with_key(10u8, "ten");
    assert_eq!(idx1, 0);
    assert_eq!(iset.key_to_index(10, "ten"), Some(0));
    assert_eq!(iset.index_to_key(0), Some(10));
    assert_eq!(iset.index_to_value(0), Some(&"ten"));
    assert_eq!(iset.key_to_index(10, "wrong"), None);
  }

  #[test]
  fn insert_with_key_duplicates_keep_first() {
    let mut iset = IndexSet::new();
    let idx1 = iset.insert_with_key(7u8, "seven");
    let idx2 = iset.insert_with_key(7, "SEVEN");
    assert_eq!(idx2, idx1);
    assert_eq!(iset.len(), 1);
    assert_eq!(iset.index_to_value(idx1), Some(&"seven"));
  }

  #[test]
  fn clear_empties() {
    let mut iset = IndexSet::new();
    iset.insert_with_key(1, "a");
    iset.insert_with_key(2, "b");
    assert_eq!(iset.len(), 2);
    iset.clear();
    assert_eq!(iset.len(), 0);
  }

  #[test]
  fn specialized_insert_and_lookup() {
    let mut iset = IndexSet::<&'static str, &'static str>::new();
    let idx1 = iset.insert("apple");
    assert_eq!(idx1, 0);
    assert_eq!(iset.value_to_index("apple"), Some(0));
    assert_eq!(iset.value_to_index("banana"), None);
    let idx2 = iset.insert("apple");
    assert_eq!(idx2, idx1);
  }
}
