/*!

The dynamic value universe of `spec.md` §3: "a tagged union of an atom pointer, a multifield handle, a fact
handle, or an instance handle," plus the "UDF value" variant that additionally carries `(begin, range)` indices
when it denotes a slice of a multifield.

*/

use crate::atoms::Atom;
use crate::facts::FactIndex;

/// An opaque handle to an externally-managed object instance (`spec.md` §1: the generic-function/object
/// subsystem is out of scope; the core only needs to carry instance handles through slot values and expressions).
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct InstanceHandle(pub u64);

/// A multifield: an ordered sequence of atoms with its own reference count. Multifields are *not* interned;
/// equality is structural (`spec.md` §3).
#[derive(Clone, Debug, Default)]
pub struct Multifield {
  pub(crate) elements : Vec<Atom>,
  pub(crate) ref_count: u32,
}

impl Multifield {
  pub fn new(elements: Vec<Atom>) -> Self {
    Multifield { elements, ref_count: 0 }
  }

  pub fn empty() -> Self {
    Multifield::new(Vec::new())
  }

  pub fn len(&self) -> usize {
    self.elements.len()
  }

  pub fn is_empty(&self) -> bool {
    self.elements.is_empty()
  }

  pub fn as_slice(&self) -> &[Atom] {
    &self.elements
  }

  pub fn get(&self, index: usize) -> Option<Atom> {
    self.elements.get(index).copied()
  }

  pub fn retain(&mut self) {
    self.ref_count += 1;
  }

  /// Returns `true` when the count reached zero, i.e. the multifield is now garbage.
  pub fn release(&mut self) -> bool {
    debug_assert!(self.ref_count > 0);
    self.ref_count -= 1;
    self.ref_count == 0
  }
}

impl PartialEq for Multifield {
  fn eq(&self, other: &Self) -> bool {
    self.elements == other.elements
  }
}
impl Eq for Multifield {}

/// A `(begin, range)` pair into a multifield, used by a "UDF value" to denote a contiguous slice without copying
/// (`spec.md` §3).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct MultifieldSlice {
  pub begin: usize,
  pub range: usize,
}

/// The dynamic value a fully-evaluated expression, a fact slot, or a join-token binding produces.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
  Atom(Atom),
  Multifield(std::rc::Rc<Multifield>),
  /// A contiguous slice of a multifield, as produced by multifield-valued slot access with a restriction, or by
  /// the `$?var` segment-variable binding form.
  MultifieldSlice(std::rc::Rc<Multifield>, MultifieldSlice),
  Fact(FactIndex),
  Instance(InstanceHandle),
}

impl Value {
  pub fn as_atom(&self) -> Option<Atom> {
    match self {
      Value::Atom(atom) => Some(*atom),
      _ => None,
    }
  }

  pub fn as_fact(&self) -> Option<FactIndex> {
    match self {
      Value::Fact(index) => Some(*index),
      _ => None,
    }
  }

  pub fn as_instance(&self) -> Option<InstanceHandle> {
    match self {
      Value::Instance(handle) => Some(*handle),
      _ => None,
    }
  }

  /// Materializes a slice view (whole-multifield or `MultifieldSlice`) as a flat vector of atoms.
  pub fn as_atoms(&self) -> Option<Vec<Atom>> {
    match self {
      Value::Multifield(mf) => Some(mf.as_slice().to_vec()),
      Value::MultifieldSlice(mf, slice) => {
        Some(mf.as_slice()[slice.begin..slice.begin + slice.range].to_vec())
      }
      _ => None,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::atoms::AtomKind;

  #[test]
  fn multifield_structural_equality() {
    let a = Atom::new(AtomKind::Integer, 0);
    let b = Atom::new(AtomKind::Integer, 1);
    let mf1 = Multifield::new(vec![a, b]);
    let mf2 = Multifield::new(vec![a, b]);
    assert_eq!(mf1, mf2);
    let mf3 = Multifield::new(vec![b, a]);
    assert_ne!(mf1, mf3);
  }

  #[test]
  fn multifield_slice_materializes() {
    let a = Atom::new(AtomKind::Integer, 0);
    let b = Atom::new(AtomKind::Integer, 1);
    let c = Atom::new(AtomKind::Integer, 2);
    let mf = std::rc::Rc::new(Multifield::new(vec![a, b, c]));
    let value = Value::MultifieldSlice(mf, MultifieldSlice { begin: 1, range: 2 });
    assert_eq!(value.as_atoms(), Some(vec![b, c]));
  }
}
