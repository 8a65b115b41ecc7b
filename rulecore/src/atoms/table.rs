/*!

A per-kind open hash table implementing the interning contract of `spec.md` §4.1: content-equal insertions are
pointer-equal (here, index-equal); every atom carries a reference count, an ephemeral flag, and a "needed for
serialization" flag; an atom with `ref_count == 0 && !ephemeral` does not exist.

This is the generic engine behind each of `Interner`'s per-kind tables (symbol, string, instance-name, integer,
float, bitmap, external-address, quantity). The table itself knows nothing about garbage frames — it exposes
`retain`/`release`/`collect` primitives; `crate::atoms::gc` drives *when* `collect` runs.

*/

use std::collections::HashMap;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

struct AtomRecord<C> {
  content  : C,
  ref_count: u32,
  ephemeral: bool,
  needed   : bool,
  live     : bool,
}

/// A per-kind interning table. `C` is the content type (e.g. `IString` for symbols, `i64` for integers); `S` is
/// the `BuildHasher` used for the content → index map, letting each kind plug in the hashing strategy named in
/// §4.1 (see `crate::atoms::hashers`).
pub(crate) struct KindTable<C, S = std::collections::hash_map::RandomState> {
  records  : Vec<AtomRecord<C>>,
  index    : HashMap<C, usize, S>,
  free_list: Vec<usize>,
}

pub(crate) type HashedKindTable<C, H> = KindTable<C, BuildHasherDefault<H>>;

impl<C, S> KindTable<C, S>
where
    C: Eq + Hash + Clone,
    S: BuildHasher + Default,
{
  pub fn new() -> Self {
    KindTable {
      records  : Vec::new(),
      index    : HashMap::default(),
      free_list: Vec::new(),
    }
  }

  /// Looks up `content`; on a miss, allocates a new slot with `ref_count = 0`, `ephemeral = true`, and returns its
  /// index. The caller (the `Interner`) is responsible for registering a freshly-allocated index on the current
  /// garbage frame's ephemeral list.
  pub fn intern(&mut self, content: C) -> (usize, bool /* was_new */) {
    if let Some(&index) = self.index.get(&content) {
      debug_assert!(self.records[index].live);
      return (index, false);
    }

    let index = if let Some(free_index) = self.free_list.pop() {
      self.records[free_index] = AtomRecord {
        content: content.clone(),
        ref_count: 0,
        ephemeral: true,
        needed: false,
        live: true,
      };
      free_index
    } else {
      self.records.push(AtomRecord {
        content: content.clone(),
        ref_count: 0,
        ephemeral: true,
        needed: false,
        live: true,
      });
      self.records.len() - 1
    };

    self.index.insert(content, index);
    (index, true)
  }

  pub fn content(&self, index: usize) -> &C {
    debug_assert!(self.records[index].live);
    &self.records[index].content
  }

  pub fn ref_count(&self, index: usize) -> u32 {
    self.records[index].ref_count
  }

  pub fn is_ephemeral(&self, index: usize) -> bool {
    self.records[index].ephemeral
  }

  pub fn is_needed(&self, index: usize) -> bool {
    self.records[index].needed
  }

  pub fn set_needed(&mut self, index: usize, needed: bool) {
    self.records[index].needed = needed;
  }

  /// Returns `true` exactly when the ref count transitioned 0 → 1 (the caller must then clear `ephemeral`).
  pub fn retain(&mut self, index: usize) -> bool {
    let record = &mut self.records[index];
    let was_zero = record.ref_count == 0;
    record.ref_count += 1;
    if was_zero {
      record.ephemeral = false;
    }
    was_zero
  }

  /// Returns `true` exactly when the ref count transitioned to 0 (the caller must then register the atom on the
  /// current garbage frame's ephemeral list).
  pub fn release(&mut self, index: usize) -> bool {
    let record = &mut self.records[index];
    debug_assert!(record.ref_count > 0, "release() on an atom with ref_count == 0");
    record.ref_count -= 1;
    if record.ref_count == 0 {
      record.ephemeral = true;
      true
    } else {
      false
    }
  }

  /// Collects one atom that appeared on an ephemeral list: if its count is still 0, it is unlinked from the
  /// content index and freed (its slot joins the free list); otherwise its ephemeral flag is cleared.
  pub fn collect_one(&mut self, index: usize) {
    let record = &mut self.records[index];
    if !record.live {
      return;
    }
    if record.ref_count == 0 {
      self.index.remove(&record.content);
      record.live = false;
      record.ephemeral = false;
      self.free_list.push(index);
    } else {
      record.ephemeral = false;
    }
  }

  pub fn live_count(&self) -> usize {
    self.records.len() - self.free_list.len()
  }

  pub fn exists(&self, index: usize) -> bool {
    self.records.get(index).map(|r| r.live).unwrap_or(false)
  }

  /// Iterates live (index, content) pairs in table order, for bsave.
  pub fn iter_live(&self) -> impl Iterator<Item = (usize, &C)> {
    self.records.iter().enumerate().filter_map(|(i, r)| r.live.then_some((i, &r.content)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::hash_map::RandomState;

  #[test]
  fn intern_is_idempotent() {
    let mut table: KindTable<String, RandomState> = KindTable::new();
    let (idx1, is_new1) = table.intern("hello".to_string());
    let (idx2, is_new2) = table.intern("hello".to_string());
    assert_eq!(idx1, idx2);
    assert!(is_new1);
    assert!(!is_new2);
  }

  #[test]
  fn retain_release_and_collect_frees_slot() {
    let mut table: KindTable<i64, RandomState> = KindTable::new();
    let (idx, _) = table.intern(42);
    assert!(table.retain(idx));
    assert_eq!(table.ref_count(idx), 1);
    assert!(table.release(idx));
    assert_eq!(table.ref_count(idx), 0);
    assert!(table.is_ephemeral(idx));

    table.collect_one(idx);
    assert!(!table.exists(idx));

    // Reinterning the same content allocates a fresh (possibly reused) slot.
    let (idx2, is_new) = table.intern(42);
    assert!(is_new);
    assert!(table.exists(idx2));
  }

  #[test]
  fn collect_unmarks_a_still_referenced_atom() {
    let mut table: KindTable<i64, RandomState> = KindTable::new();
    let (idx, _) = table.intern(7);
    table.retain(idx);
    table.collect_one(idx);
    assert!(table.exists(idx));
    assert!(!table.is_ephemeral(idx));
  }
}
