/*!

Atom-level binary encoding, shared by expression constants, fact slot values, and template constraints
(`spec.md` §4.6 step 5: "needed atom tables"). The seven content-less... no, content-*bearing* kinds
(`spec.md` §3's atom kinds minus `external_address`, which is host-owned and never meaningfully portable across
a save/load boundary — `DESIGN.md`) are each written as a dense, needed-only table; everything else references an
atom by `(kind tag, serial index)` into that table.

The well-known roots (`true`/`false`/the infinities/zero/void/the unquantified-variable singleton) are never
written into the atom tables — a fresh [`crate::atoms::Interner`] always recreates them identically, so they are
encoded by a fixed root id instead.

*/

use std::collections::HashMap;
use std::rc::Rc;

use crate::atoms::{Atom, AtomKind, Interner};
use crate::bsave::format::*;
use crate::error::{EngineError, EngineResult};
use crate::value::{InstanceHandle, Multifield, Value};

pub fn saved_atom_kinds() -> &'static [AtomKind] {
  &[
    AtomKind::Symbol,
    AtomKind::String,
    AtomKind::InstanceName,
    AtomKind::Integer,
    AtomKind::Float,
    AtomKind::Bitmap,
    AtomKind::Quantity,
  ]
}

pub fn atom_kind_tag(kind: AtomKind) -> EngineResult<u8> {
  saved_atom_kinds()
      .iter()
      .position(|&k| k == kind)
      .map(|position| position as u8)
      .ok_or_else(|| EngineError::FormatError(format!("atom kind {:?} is not serializable", kind)))
}

pub fn atom_kind_from_tag(tag: u8) -> EngineResult<AtomKind> {
  saved_atom_kinds()
      .get(tag as usize)
      .copied()
      .ok_or_else(|| EngineError::FormatError(format!("unknown atom kind tag {}", tag)))
}

/// Decodes a slot constraint's type-mask entry, which (unlike a `Constant` atom) may legitimately name any of
/// the ten atom kinds, including the two content-less singletons and `external_address`.
pub fn atom_kind_from_discriminant(tag: u8) -> EngineResult<AtomKind> {
  Ok(match tag {
    0 => AtomKind::Symbol,
    1 => AtomKind::String,
    2 => AtomKind::InstanceName,
    3 => AtomKind::Integer,
    4 => AtomKind::Float,
    5 => AtomKind::Bitmap,
    6 => AtomKind::ExternalAddress,
    7 => AtomKind::Quantity,
    8 => AtomKind::Void,
    9 => AtomKind::UnquantifiedVariable,
    other => return Err(EngineError::FormatError(format!("unknown atom kind discriminant {}", other))),
  })
}

/// The fixed singleton atoms every fresh [`Interner`] already carries, captured once at save or load time.
pub struct RootAtoms {
  void                  : Atom,
  unquantified_variable : Atom,
  true_atom             : Atom,
  false_atom            : Atom,
  positive_infinity     : Atom,
  negative_infinity     : Atom,
  zero                  : Atom,
}

impl RootAtoms {
  pub fn capture(interner: &Interner) -> Self {
    RootAtoms {
      void                  : interner.void(),
      unquantified_variable : interner.unquantified_variable(),
      true_atom             : interner.true_atom(),
      false_atom            : interner.false_atom(),
      positive_infinity     : interner.positive_infinity(),
      negative_infinity     : interner.negative_infinity(),
      zero                  : interner.zero(),
    }
  }

  fn id_of(&self, atom: Atom) -> Option<u8> {
    match atom {
      a if a == self.void => Some(0),
      a if a == self.unquantified_variable => Some(1),
      a if a == self.true_atom => Some(2),
      a if a == self.false_atom => Some(3),
      a if a == self.positive_infinity => Some(4),
      a if a == self.negative_infinity => Some(5),
      a if a == self.zero => Some(6),
      _ => None,
    }
  }

  fn by_id(&self, id: u8) -> EngineResult<Atom> {
    Ok(match id {
      0 => self.void,
      1 => self.unquantified_variable,
      2 => self.true_atom,
      3 => self.false_atom,
      4 => self.positive_infinity,
      5 => self.negative_infinity,
      6 => self.zero,
      other => return Err(EngineError::FormatError(format!("unknown root atom id {}", other))),
    })
  }
}

/// `0xFF` never collides with a real atom-kind tag (`saved_atom_kinds` has 7 entries), so it doubles as the
/// "this is a well-known root, not a table atom" marker.
const ROOT_MARKER: u8 = 0xFF;

pub fn write_atom(
  buf: &mut Vec<u8>,
  atom: Atom,
  roots: &RootAtoms,
  atom_serial: &HashMap<Atom, u32>,
) -> EngineResult<()> {
  if let Some(root_id) = roots.id_of(atom) {
    write_u8(buf, ROOT_MARKER);
    write_u8(buf, root_id);
    return Ok(());
  }
  write_u8(buf, atom_kind_tag(atom.kind)?);
  let serial = atom_serial
      .get(&atom)
      .ok_or_else(|| EngineError::internal("atom missing from serialization index"))?;
  write_u32(buf, *serial);
  Ok(())
}

pub fn read_atom(
  bytes: &[u8],
  pos: &mut usize,
  roots: &RootAtoms,
  atoms_by_kind: &[Vec<Atom>],
) -> EngineResult<Atom> {
  let tag = read_u8(bytes, pos)?;
  if tag == ROOT_MARKER {
    return roots.by_id(read_u8(bytes, pos)?);
  }
  let kind = atom_kind_from_tag(tag)?;
  let serial = read_u32(bytes, pos)? as usize;
  let table_index = saved_atom_kinds().iter().position(|&k| k == kind).unwrap();
  atoms_by_kind[table_index]
      .get(serial)
      .copied()
      .ok_or_else(|| EngineError::FormatError("atom index out of range".to_string()))
}

/// Marks every atom reachable from a slot `Value` (`spec.md` §4.6: facts are walked the same way rule/template
/// expressions are).
pub fn mark_needed_value(value: &Value, mark: &mut impl FnMut(Atom)) {
  match value {
    Value::Atom(atom) => mark(*atom),
    Value::Multifield(mf) => {
      for atom in mf.as_slice() {
        mark(*atom);
      }
    }
    Value::MultifieldSlice(mf, slice) => {
      for atom in &mf.as_slice()[slice.begin..slice.begin + slice.range] {
        mark(*atom);
      }
    }
    // Fact/instance slot values reference other facts/instances by handle, not by atom.
    Value::Fact(_) | Value::Instance(_) => {}
  }
}

pub fn write_value(
  buf: &mut Vec<u8>,
  value: &Value,
  roots: &RootAtoms,
  atom_serial: &HashMap<Atom, u32>,
) -> EngineResult<()> {
  match value {
    Value::Atom(atom) => {
      write_u8(buf, 0);
      write_atom(buf, *atom, roots, atom_serial)?;
    }
    Value::Multifield(mf) => {
      write_u8(buf, 1);
      write_u32(buf, mf.len() as u32);
      for atom in mf.as_slice() {
        write_atom(buf, *atom, roots, atom_serial)?;
      }
    }
    Value::MultifieldSlice(mf, slice) => {
      write_u8(buf, 1);
      write_u32(buf, slice.range as u32);
      for atom in &mf.as_slice()[slice.begin..slice.begin + slice.range] {
        write_atom(buf, *atom, roots, atom_serial)?;
      }
    }
    // Facts referencing other facts round-trip by raw index: bload restores every fact at its original index
    // before the match network re-derives activations, so the referenced index is valid once the whole image
    // is loaded (`spec.md` §4.6: "pointers ... resolved by indexing").
    Value::Fact(index) => {
      write_u8(buf, 2);
      write_u64(buf, index.0);
    }
    // An instance handle is host-owned; only the numeric handle round-trips; see `DESIGN.md`.
    Value::Instance(handle) => {
      write_u8(buf, 3);
      write_u64(buf, handle.0);
    }
  }
  Ok(())
}

pub fn read_value(
  bytes: &[u8],
  pos: &mut usize,
  roots: &RootAtoms,
  atoms_by_kind: &[Vec<Atom>],
) -> EngineResult<Value> {
  let tag = read_u8(bytes, pos)?;
  Ok(match tag {
    0 => Value::Atom(read_atom(bytes, pos, roots, atoms_by_kind)?),
    1 => {
      let count = read_u32(bytes, pos)? as usize;
      let mut elements = Vec::with_capacity(count);
      for _ in 0..count {
        elements.push(read_atom(bytes, pos, roots, atoms_by_kind)?);
      }
      Value::Multifield(Rc::new(Multifield::new(elements)))
    }
    2 => Value::Fact(crate::facts::FactIndex(read_u64(bytes, pos)?)),
    3 => Value::Instance(InstanceHandle(read_u64(bytes, pos)?)),
    other => return Err(EngineError::FormatError(format!("unknown value tag {}", other))),
  })
}

