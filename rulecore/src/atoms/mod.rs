/*!

The atom interning layer (`spec.md` §4.1): hash-consed representations for the primitive value kinds, with
reference-counted, ephemeral-lifted reclamation compatible with a single-threaded execution cycle that freely
creates temporary atoms.

An [`Atom`] is a cheap `Copy` handle `(kind, index)`. Two atoms of the same kind with equal content always carry the
same index — that *is* the uniqueness invariant, reinterpreted for an arena-of-indices design (`SPEC_FULL.md` / the
teacher's design notes on cyclic references and arena+index addressing) instead of raw-pointer identity.

*/

mod hashers;
mod table;
mod interner;
mod gc;

pub use interner::Interner;
pub use gc::GarbageFrameGuard;

use std::fmt::{Debug, Formatter};

/// The primitive atom kinds of `spec.md` §3. `Void` and `UnquantifiedVariable` are content-less singletons;
/// every other kind is backed by a `crate::atoms::table::KindTable`.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Ord, PartialOrd)]
#[repr(u8)]
pub enum AtomKind {
  Symbol = 0,
  String = 1,
  InstanceName = 2,
  Integer = 3,
  Float = 4,
  Bitmap = 5,
  ExternalAddress = 6,
  Quantity = 7,
  Void,
  UnquantifiedVariable,
}

pub(crate) const CONTENT_KIND_COUNT: usize = 8;

impl AtomKind {
  /// Index into the fixed-size per-kind arrays (garbage frame ephemeral lists). `None` for the content-less
  /// singleton kinds, which are never tracked for reclamation.
  pub(crate) fn content_index(self) -> Option<usize> {
    match self {
      AtomKind::Symbol          => Some(0),
      AtomKind::String          => Some(1),
      AtomKind::InstanceName    => Some(2),
      AtomKind::Integer         => Some(3),
      AtomKind::Float           => Some(4),
      AtomKind::Bitmap          => Some(5),
      AtomKind::ExternalAddress => Some(6),
      AtomKind::Quantity        => Some(7),
      AtomKind::Void | AtomKind::UnquantifiedVariable => None,
    }
  }
}

/// A handle to an interned atom. Two atoms with the same `(kind, index)` are, by the interning invariant, the
/// same atom; two distinct atoms of the same kind never share an index while either is live.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct Atom {
  pub kind: AtomKind,
  pub(crate) index: u32,
}

impl Atom {
  pub(crate) fn new(kind: AtomKind, index: u32) -> Self {
    Atom { kind, index }
  }

  pub fn is_void(&self) -> bool {
    self.kind == AtomKind::Void
  }

  pub fn is_unquantified_variable(&self) -> bool {
    self.kind == AtomKind::UnquantifiedVariable
  }
}

impl Debug for Atom {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "Atom({:?}#{})", self.kind, self.index)
  }
}
