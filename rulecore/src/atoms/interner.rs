/*!

The engine-owned interning tables for every content-bearing atom kind, the garbage-frame stack, and the permanent
special roots (`spec.md` §4.1: `true-symbol`, `false-symbol`, `+oo`, `-oo`, integer 0, the void singleton).

*/

use ordered_float::OrderedFloat;
use rulecore_abs::IString;
use rulecore_abs::numeric::BigInt;

use crate::error::{EngineError, EngineResult};
use super::{Atom, AtomKind, CONTENT_KIND_COUNT};
use super::gc::{GcFrame, GarbageFrameGuard};
use super::hashers::{PolynomialHasher, FloatHasher, IntegerHasher, BitmapHasher, AddressHasher};
use super::table::{KindTable, HashedKindTable};

pub struct Interner {
  symbols           : HashedKindTable<IString, PolynomialHasher>,
  strings           : HashedKindTable<IString, PolynomialHasher>,
  instance_names    : HashedKindTable<IString, PolynomialHasher>,
  integers          : HashedKindTable<i64, IntegerHasher>,
  floats            : HashedKindTable<OrderedFloat<f64>, FloatHasher>,
  bitmaps           : HashedKindTable<Vec<u8>, BitmapHasher>,
  external_addresses: HashedKindTable<(usize, IString), AddressHasher>,
  quantities        : KindTable<BigInt>,

  frames: Vec<GcFrame>,

  /// Per-kind cap used to turn an unbounded allocation into a recoverable `AllocationError` instead of relying
  /// on the global allocator aborting the process on real OOM (`SPEC_FULL.md` §2). `None` means unlimited.
  max_atoms_per_kind: Option<usize>,

  void_atom                 : Atom,
  unquantified_variable_atom: Atom,
  true_atom                 : Atom,
  false_atom                : Atom,
  positive_infinity_atom    : Atom,
  negative_infinity_atom    : Atom,
  zero_atom                 : Atom,
}

impl Interner {
  pub fn new() -> Self {
    Self::with_capacity(None)
  }

  pub fn with_capacity(max_atoms_per_kind: Option<usize>) -> Self {
    let mut interner = Interner {
      symbols           : HashedKindTable::new(),
      strings           : HashedKindTable::new(),
      instance_names    : HashedKindTable::new(),
      integers          : HashedKindTable::new(),
      floats            : HashedKindTable::new(),
      bitmaps           : HashedKindTable::new(),
      external_addresses: HashedKindTable::new(),
      quantities        : KindTable::new(),
      frames            : vec![GcFrame::default()],
      max_atoms_per_kind,
      void_atom                 : Atom::new(AtomKind::Void, 0),
      unquantified_variable_atom: Atom::new(AtomKind::UnquantifiedVariable, 0),
      true_atom                 : Atom::new(AtomKind::Symbol, 0),
      false_atom                : Atom::new(AtomKind::Symbol, 0),
      positive_infinity_atom    : Atom::new(AtomKind::Float, 0),
      negative_infinity_atom    : Atom::new(AtomKind::Float, 0),
      zero_atom                 : Atom::new(AtomKind::Integer, 0),
    };

    // Special roots, held permanently: one retain each so they never become ephemeral.
    interner.true_atom = interner.intern_symbol("TRUE").expect("interning a root cannot fail");
    interner.retain(interner.true_atom);
    interner.false_atom = interner.intern_symbol("FALSE").expect("interning a root cannot fail");
    interner.retain(interner.false_atom);
    interner.positive_infinity_atom = interner.intern_float(f64::INFINITY).expect("interning a root cannot fail");
    interner.retain(interner.positive_infinity_atom);
    interner.negative_infinity_atom = interner.intern_float(f64::NEG_INFINITY).expect("interning a root cannot fail");
    interner.retain(interner.negative_infinity_atom);
    interner.zero_atom = interner.intern_integer(0).expect("interning a root cannot fail");
    interner.retain(interner.zero_atom);

    interner
  }

  // region Special roots
  pub fn true_atom(&self) -> Atom { self.true_atom }
  pub fn false_atom(&self) -> Atom { self.false_atom }
  pub fn positive_infinity(&self) -> Atom { self.positive_infinity_atom }
  pub fn negative_infinity(&self) -> Atom { self.negative_infinity_atom }
  pub fn zero(&self) -> Atom { self.zero_atom }
  pub fn void(&self) -> Atom { self.void_atom }
  pub fn unquantified_variable(&self) -> Atom { self.unquantified_variable_atom }

  pub fn boolean(&self, value: bool) -> Atom {
    if value { self.true_atom } else { self.false_atom }
  }
  // endregion

  fn check_capacity(&self, live: usize) -> EngineResult<()> {
    if let Some(max) = self.max_atoms_per_kind {
      if live >= max {
        return Err(EngineError::AllocationError);
      }
    }
    Ok(())
  }

  fn register_ephemeral(&mut self, kind: AtomKind, index: usize) {
    if let Some(content_index) = kind.content_index() {
      self.frames
          .last_mut()
          .expect("garbage frame stack is never empty")
          .ephemeral_atoms[content_index]
          .push(index as u32);
    }
  }

  pub fn intern_symbol(&mut self, text: &str) -> EngineResult<Atom> {
    self.check_capacity(self.symbols.live_count())?;
    let (index, is_new) = self.symbols.intern(IString::from(text));
    if is_new {
      self.register_ephemeral(AtomKind::Symbol, index);
    }
    Ok(Atom::new(AtomKind::Symbol, index as u32))
  }

  pub fn intern_string(&mut self, text: &str) -> EngineResult<Atom> {
    self.check_capacity(self.strings.live_count())?;
    let (index, is_new) = self.strings.intern(IString::from(text));
    if is_new {
      self.register_ephemeral(AtomKind::String, index);
    }
    Ok(Atom::new(AtomKind::String, index as u32))
  }

  pub fn intern_instance_name(&mut self, text: &str) -> EngineResult<Atom> {
    self.check_capacity(self.instance_names.live_count())?;
    let (index, is_new) = self.instance_names.intern(IString::from(text));
    if is_new {
      self.register_ephemeral(AtomKind::InstanceName, index);
    }
    Ok(Atom::new(AtomKind::InstanceName, index as u32))
  }

  pub fn intern_integer(&mut self, value: i64) -> EngineResult<Atom> {
    self.check_capacity(self.integers.live_count())?;
    let (index, is_new) = self.integers.intern(value);
    if is_new {
      self.register_ephemeral(AtomKind::Integer, index);
    }
    Ok(Atom::new(AtomKind::Integer, index as u32))
  }

  pub fn intern_float(&mut self, value: f64) -> EngineResult<Atom> {
    self.check_capacity(self.floats.live_count())?;
    let (index, is_new) = self.floats.intern(OrderedFloat(value));
    if is_new {
      self.register_ephemeral(AtomKind::Float, index);
    }
    Ok(Atom::new(AtomKind::Float, index as u32))
  }

  pub fn intern_bitmap(&mut self, bytes: &[u8]) -> EngineResult<Atom> {
    self.check_capacity(self.bitmaps.live_count())?;
    let (index, is_new) = self.bitmaps.intern(bytes.to_vec());
    if is_new {
      self.register_ephemeral(AtomKind::Bitmap, index);
    }
    Ok(Atom::new(AtomKind::Bitmap, index as u32))
  }

  pub fn intern_external_address(&mut self, pointer: usize, type_tag: &str) -> EngineResult<Atom> {
    self.check_capacity(self.external_addresses.live_count())?;
    // Per `spec.md` §9's open question, this resolves to the source's choice: external addresses are compared
    // for interning by pointer identity plus type tag, not by any type-specific equality.
    let (index, is_new) = self.external_addresses.intern((pointer, IString::from(type_tag)));
    if is_new {
      self.register_ephemeral(AtomKind::ExternalAddress, index);
    }
    Ok(Atom::new(AtomKind::ExternalAddress, index as u32))
  }

  pub fn intern_quantity(&mut self, value: BigInt) -> EngineResult<Atom> {
    self.check_capacity(self.quantities.live_count())?;
    let (index, is_new) = self.quantities.intern(value);
    if is_new {
      self.register_ephemeral(AtomKind::Quantity, index);
    }
    Ok(Atom::new(AtomKind::Quantity, index as u32))
  }

  // region Content accessors
  pub fn symbol_text(&self, atom: Atom) -> &str {
    debug_assert_eq!(atom.kind, AtomKind::Symbol);
    self.symbols.content(atom.index as usize)
  }

  pub fn string_text(&self, atom: Atom) -> &str {
    debug_assert_eq!(atom.kind, AtomKind::String);
    self.strings.content(atom.index as usize)
  }

  pub fn instance_name_text(&self, atom: Atom) -> &str {
    debug_assert_eq!(atom.kind, AtomKind::InstanceName);
    self.instance_names.content(atom.index as usize)
  }

  pub fn integer_value(&self, atom: Atom) -> i64 {
    debug_assert_eq!(atom.kind, AtomKind::Integer);
    *self.integers.content(atom.index as usize)
  }

  pub fn float_value(&self, atom: Atom) -> f64 {
    debug_assert_eq!(atom.kind, AtomKind::Float);
    self.floats.content(atom.index as usize).0
  }

  pub fn bitmap_bytes(&self, atom: Atom) -> &[u8] {
    debug_assert_eq!(atom.kind, AtomKind::Bitmap);
    self.bitmaps.content(atom.index as usize)
  }

  pub fn external_address_value(&self, atom: Atom) -> (usize, &str) {
    debug_assert_eq!(atom.kind, AtomKind::ExternalAddress);
    let (ptr, tag) = self.external_addresses.content(atom.index as usize);
    (*ptr, tag.as_ref())
  }

  pub fn quantity_value(&self, atom: Atom) -> &BigInt {
    debug_assert_eq!(atom.kind, AtomKind::Quantity);
    self.quantities.content(atom.index as usize)
  }
  // endregion

  pub fn exists(&self, atom: Atom) -> bool {
    match atom.kind {
      AtomKind::Symbol           => self.symbols.exists(atom.index as usize),
      AtomKind::String           => self.strings.exists(atom.index as usize),
      AtomKind::InstanceName     => self.instance_names.exists(atom.index as usize),
      AtomKind::Integer          => self.integers.exists(atom.index as usize),
      AtomKind::Float            => self.floats.exists(atom.index as usize),
      AtomKind::Bitmap           => self.bitmaps.exists(atom.index as usize),
      AtomKind::ExternalAddress  => self.external_addresses.exists(atom.index as usize),
      AtomKind::Quantity         => self.quantities.exists(atom.index as usize),
      AtomKind::Void | AtomKind::UnquantifiedVariable => true,
    }
  }

  pub fn ref_count(&self, atom: Atom) -> u32 {
    match atom.kind {
      AtomKind::Symbol           => self.symbols.ref_count(atom.index as usize),
      AtomKind::String           => self.strings.ref_count(atom.index as usize),
      AtomKind::InstanceName     => self.instance_names.ref_count(atom.index as usize),
      AtomKind::Integer          => self.integers.ref_count(atom.index as usize),
      AtomKind::Float            => self.floats.ref_count(atom.index as usize),
      AtomKind::Bitmap           => self.bitmaps.ref_count(atom.index as usize),
      AtomKind::ExternalAddress  => self.external_addresses.ref_count(atom.index as usize),
      AtomKind::Quantity         => self.quantities.ref_count(atom.index as usize),
      AtomKind::Void | AtomKind::UnquantifiedVariable => u32::MAX,
    }
  }

  pub fn is_ephemeral(&self, atom: Atom) -> bool {
    match atom.kind {
      AtomKind::Symbol           => self.symbols.is_ephemeral(atom.index as usize),
      AtomKind::String           => self.strings.is_ephemeral(atom.index as usize),
      AtomKind::InstanceName     => self.instance_names.is_ephemeral(atom.index as usize),
      AtomKind::Integer          => self.integers.is_ephemeral(atom.index as usize),
      AtomKind::Float            => self.floats.is_ephemeral(atom.index as usize),
      AtomKind::Bitmap           => self.bitmaps.is_ephemeral(atom.index as usize),
      AtomKind::ExternalAddress  => self.external_addresses.is_ephemeral(atom.index as usize),
      AtomKind::Quantity         => self.quantities.is_ephemeral(atom.index as usize),
      AtomKind::Void | AtomKind::UnquantifiedVariable => false,
    }
  }

  pub fn set_needed_for_serialization(&mut self, atom: Atom, needed: bool) {
    let index = atom.index as usize;
    match atom.kind {
      AtomKind::Symbol           => self.symbols.set_needed(index, needed),
      AtomKind::String           => self.strings.set_needed(index, needed),
      AtomKind::InstanceName     => self.instance_names.set_needed(index, needed),
      AtomKind::Integer          => self.integers.set_needed(index, needed),
      AtomKind::Float            => self.floats.set_needed(index, needed),
      AtomKind::Bitmap           => self.bitmaps.set_needed(index, needed),
      AtomKind::ExternalAddress  => self.external_addresses.set_needed(index, needed),
      AtomKind::Quantity         => self.quantities.set_needed(index, needed),
      AtomKind::Void | AtomKind::UnquantifiedVariable => {}
    }
  }

  pub fn is_needed_for_serialization(&self, atom: Atom) -> bool {
    let index = atom.index as usize;
    match atom.kind {
      AtomKind::Symbol           => self.symbols.is_needed(index),
      AtomKind::String           => self.strings.is_needed(index),
      AtomKind::InstanceName     => self.instance_names.is_needed(index),
      AtomKind::Integer          => self.integers.is_needed(index),
      AtomKind::Float            => self.floats.is_needed(index),
      AtomKind::Bitmap           => self.bitmaps.is_needed(index),
      AtomKind::ExternalAddress  => self.external_addresses.is_needed(index),
      AtomKind::Quantity         => self.quantities.is_needed(index),
      AtomKind::Void | AtomKind::UnquantifiedVariable => false,
    }
  }

  /// Iterates every live atom of `kind` as `(index, Atom)`, used by bsave to assign dense serialization indices.
  pub fn iter_kind(&self, kind: AtomKind) -> Box<dyn Iterator<Item = Atom> + '_> {
    match kind {
      AtomKind::Symbol => Box::new(self.symbols.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::String => Box::new(self.strings.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::InstanceName => Box::new(self.instance_names.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::Integer => Box::new(self.integers.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::Float => Box::new(self.floats.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::Bitmap => Box::new(self.bitmaps.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::ExternalAddress => Box::new(self.external_addresses.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::Quantity => Box::new(self.quantities.iter_live().map(move |(i, _)| Atom::new(kind, i as u32))),
      AtomKind::Void | AtomKind::UnquantifiedVariable => Box::new(std::iter::empty()),
    }
  }

  /// Increments `atom`'s reference count, clearing its ephemeral flag if this is the 0 → 1 transition. Special
  /// roots and the content-less singletons are no-ops.
  pub fn retain(&mut self, atom: Atom) {
    let index = atom.index as usize;
    match atom.kind {
      AtomKind::Symbol           => { self.symbols.retain(index); }
      AtomKind::String           => { self.strings.retain(index); }
      AtomKind::InstanceName     => { self.instance_names.retain(index); }
      AtomKind::Integer          => { self.integers.retain(index); }
      AtomKind::Float            => { self.floats.retain(index); }
      AtomKind::Bitmap           => { self.bitmaps.retain(index); }
      AtomKind::ExternalAddress  => { self.external_addresses.retain(index); }
      AtomKind::Quantity         => { self.quantities.retain(index); }
      AtomKind::Void | AtomKind::UnquantifiedVariable => {}
    }
  }

  /// Decrements `atom`'s reference count; if it reaches zero, registers the atom as ephemeral on the *current*
  /// garbage frame (`spec.md` §4.1).
  pub fn release(&mut self, atom: Atom) {
    let index = atom.index as usize;
    let became_zero = match atom.kind {
      AtomKind::Symbol           => self.symbols.release(index),
      AtomKind::String           => self.strings.release(index),
      AtomKind::InstanceName     => self.instance_names.release(index),
      AtomKind::Integer          => self.integers.release(index),
      AtomKind::Float            => self.floats.release(index),
      AtomKind::Bitmap           => self.bitmaps.release(index),
      AtomKind::ExternalAddress  => self.external_addresses.release(index),
      AtomKind::Quantity         => self.quantities.release(index),
      AtomKind::Void | AtomKind::UnquantifiedVariable => false,
    };
    if became_zero {
      self.register_ephemeral(atom.kind, index);
    }
  }

  pub fn push_frame(&mut self) {
    self.frames.push(GcFrame::default());
  }

  /// Begins a scoped garbage frame; the frame is collected when the returned guard is dropped, on every exit
  /// path (including an early error return).
  pub fn scoped_frame(&mut self) -> GarbageFrameGuard<'_> {
    GarbageFrameGuard::new(self)
  }

  /// Walks the ephemeral lists of the *current* (topmost) frame, freeing atoms whose count is still zero and
  /// unmarking the rest, then pops the frame. The base frame (index 0) is never popped.
  pub fn pop_frame(&mut self) {
    if self.frames.len() <= 1 {
      return;
    }
    let frame = self.frames.pop().expect("checked len > 1 above");
    self.collect_frame(&frame);
  }

  fn collect_frame(&mut self, frame: &GcFrame) {
    for content_index in 0..CONTENT_KIND_COUNT {
      for &slot in &frame.ephemeral_atoms[content_index] {
        let slot = slot as usize;
        match content_index {
          0 => self.symbols.collect_one(slot),
          1 => self.strings.collect_one(slot),
          2 => self.instance_names.collect_one(slot),
          3 => self.integers.collect_one(slot),
          4 => self.floats.collect_one(slot),
          5 => self.bitmaps.collect_one(slot),
          6 => self.external_addresses.collect_one(slot),
          7 => self.quantities.collect_one(slot),
          _ => unreachable!(),
        }
      }
    }
  }

  /// Collects the current frame in place without popping it (`spec.md` §4.1's `collect()` operation), useful for
  /// reclaiming memory mid-step without ending the frame's scope.
  pub fn collect(&mut self) {
    let frame = std::mem::take(self.frames.last_mut().expect("garbage frame stack is never empty"));
    self.collect_frame(&frame);
  }

  pub fn frame_depth(&self) -> usize {
    self.frames.len()
  }
}

impl Default for Interner {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn atom_uniqueness() {
    let mut interner = Interner::new();
    let a1 = interner.intern_symbol("foo").unwrap();
    let a2 = interner.intern_symbol("foo").unwrap();
    assert_eq!(a1, a2);
    let b = interner.intern_symbol("bar").unwrap();
    assert_ne!(a1, b);
  }

  #[test]
  fn reference_count_soundness_across_frame_scope() {
    let mut interner = Interner::new();
    let atom = {
      let mut guard = interner.scoped_frame();
      let atom = guard.interner().intern_symbol("ephemeral").unwrap();
      assert!(guard.interner().is_ephemeral(atom));
      atom
    };
    // The frame was collected when the guard dropped; the atom had ref_count 0, so it was freed.
    assert!(!interner.exists(atom));

    // Reinterning gives a live atom again.
    let atom2 = interner.intern_symbol("ephemeral").unwrap();
    assert!(interner.exists(atom2));
  }

  #[test]
  fn retained_atom_survives_frame_pop() {
    let mut interner = Interner::new();
    let atom = interner.intern_symbol("kept").unwrap();
    interner.retain(atom);
    interner.push_frame();
    interner.pop_frame();
    assert!(interner.exists(atom));
    assert_eq!(interner.ref_count(atom), 1);
    interner.release(atom);
  }

  #[test]
  fn roots_are_permanent() {
    let interner = Interner::new();
    assert!(interner.exists(interner.true_atom()));
    assert!(interner.ref_count(interner.true_atom()) >= 1);
    assert_eq!(interner.integer_value(interner.zero()), 0);
    assert_eq!(interner.float_value(interner.positive_infinity()), f64::INFINITY);
  }

  #[test]
  fn allocation_error_when_over_capacity() {
    let mut interner = Interner::new();
    interner.max_atoms_per_kind = Some(interner.integers.live_count());
    let result = interner.intern_integer(999);
    assert!(matches!(result, Err(EngineError::AllocationError)));
  }
}
