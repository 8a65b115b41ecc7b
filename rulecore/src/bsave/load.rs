/*!

The bsave image reader (`spec.md` §4.6), mirroring `save.rs` section for section. Agenda reconstruction is
deliberately left to the caller (`Engine::bload`): this module has no dependency on `crate::agenda`, matching the
leaves-first dependency order the rest of the core follows, and activations are re-derived by replaying the
loaded facts through the loaded network rather than being part of the image.

*/

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use rulecore_abs::IString;
use rulecore_abs::numeric::BigInt;

use crate::atoms::{Atom, AtomKind, Interner};
use crate::bsave::atoms_io::{atom_kind_from_discriminant, read_atom, read_value, saved_atom_kinds, RootAtoms};
use crate::bsave::expr_io::read_expr;
use crate::bsave::format::*;
use crate::bsave::FunctionRegistry;
use crate::error::{EngineError, EngineResult};
use crate::expr::ExprNode;
use crate::facts::{Fact, FactIndex, FactStore, SlotConstraint, SlotDescriptor, Template};
use crate::network::{MatchNetwork, PatternKind, PatternSpec};

/// The constructs recovered from a binary image; the caller wires these into a fresh [`crate::atoms::Interner`]
/// wrapper, asserts the facts to rebuild the agenda, and adopts the result as the engine's new state.
pub struct LoadedImage {
  pub interner : Interner,
  pub templates: HashMap<IString, Rc<Template>>,
  pub facts    : FactStore,
  pub network  : MatchNetwork,
}

pub fn load(path: &Path, functions: &dyn FunctionRegistry) -> EngineResult<LoadedImage> {
  let bytes = std::fs::read(path)?;
  let mut pos = 0usize;

  let magic = read_fixed(&bytes, &mut pos, MAGIC_PREFIX.len())?;
  if magic != MAGIC_PREFIX {
    return Err(EngineError::FormatError("not a binary rule-engine image".to_string()));
  }
  let version = read_fixed(&bytes, &mut pos, FORMAT_VERSION.len())?;
  if version != FORMAT_VERSION {
    return Err(EngineError::VersionMismatchError {
      expected: String::from_utf8_lossy(FORMAT_VERSION).to_string(),
      found   : String::from_utf8_lossy(version).to_string(),
    });
  }
  let size_tag = read_u8(&bytes, &mut pos)?;
  if size_tag != std::mem::size_of::<usize>() as u8 {
    return Err(EngineError::FormatError(format!(
      "image was saved on a {}-byte-pointer engine, this one is {}-byte",
      size_tag, std::mem::size_of::<usize>()
    )));
  }

  // Needed function table.
  let function_count = read_u32(&bytes, &mut pos)? as usize;
  let mut function_table = Vec::with_capacity(function_count);
  for _ in 0..function_count {
    let name = read_cstring(&bytes, &mut pos)?;
    let definition = functions.lookup(&name).ok_or_else(|| {
      EngineError::FormatError(format!("unknown function `{}` referenced by binary image", name))
    })?;
    function_table.push(definition);
  }

  let mut interner = Interner::new();
  let roots = RootAtoms::capture(&interner);

  // Needed atom tables, in the same fixed kind order `save.rs` wrote them.
  let mut atoms_by_kind: Vec<Vec<Atom>> = Vec::with_capacity(saved_atom_kinds().len());
  for &kind in saved_atom_kinds() {
    let count = read_u32(&bytes, &mut pos)? as usize;
    let mut table = Vec::with_capacity(count);
    for _ in 0..count {
      let atom = read_atom_content(&bytes, &mut pos, &mut interner, kind)?;
      interner.retain(atom);
      table.push(atom);
    }
    atoms_by_kind.push(table);
  }

  // Templates.
  let template_count = read_u32(&bytes, &mut pos)? as usize;
  let mut templates = HashMap::with_capacity(template_count);
  for _ in 0..template_count {
    let name = IString::from(read_cstring(&bytes, &mut pos)?.as_str());
    let implied = read_u8(&bytes, &mut pos)? != 0;
    let slot_count = read_u32(&bytes, &mut pos)? as usize;
    let mut slots = Vec::with_capacity(slot_count);
    for _ in 0..slot_count {
      let slot_name = IString::from(read_cstring(&bytes, &mut pos)?.as_str());
      let is_multi = read_u8(&bytes, &mut pos)? != 0;

      let mask_count = read_u32(&bytes, &mut pos)? as usize;
      let mut type_mask = Vec::with_capacity(mask_count);
      for _ in 0..mask_count {
        type_mask.push(atom_kind_from_discriminant(read_u8(&bytes, &mut pos)?)?);
      }

      let allowed_values = if read_u8(&bytes, &mut pos)? != 0 {
        let count = read_u32(&bytes, &mut pos)? as usize;
        let mut values = Vec::with_capacity(count);
        for _ in 0..count {
          values.push(read_atom(&bytes, &mut pos, &roots, &atoms_by_kind)?);
        }
        Some(values)
      } else {
        None
      };

      let range = if read_u8(&bytes, &mut pos)? != 0 {
        let low = read_f64(&bytes, &mut pos)?;
        let high = read_f64(&bytes, &mut pos)?;
        Some((low, high))
      } else {
        None
      };

      let default: Option<ExprNode> = if read_u8(&bytes, &mut pos)? != 0 {
        Some(read_expr(&bytes, &mut pos, &roots, &atoms_by_kind, &function_table)?)
      } else {
        None
      };

      slots.push(SlotDescriptor {
        name: slot_name,
        is_multi,
        default,
        constraints: SlotConstraint { type_mask, allowed_values, range },
      });
    }
    let template = Rc::new(Template { name: name.clone(), slots, implied });
    templates.insert(name, template);
  }

  // Facts, restored at their original indices.
  let mut facts = FactStore::new();
  let fact_count = read_u64(&bytes, &mut pos)? as usize;
  for _ in 0..fact_count {
    let index = FactIndex(read_u64(&bytes, &mut pos)?);
    let template_name = read_cstring(&bytes, &mut pos)?;
    let template = templates.get(template_name.as_str()).cloned().ok_or_else(|| {
      EngineError::FormatError(format!("fact references undefined template `{}`", template_name))
    })?;
    let slot_count = read_u32(&bytes, &mut pos)? as usize;
    let mut slot_values = Vec::with_capacity(slot_count);
    for _ in 0..slot_count {
      slot_values.push(read_value(&bytes, &mut pos, &roots, &atoms_by_kind)?);
    }
    facts.insert_loaded(Fact::new(index, template, slot_values));
  }

  // Rules.
  let mut network = MatchNetwork::new();
  let rule_count = read_u32(&bytes, &mut pos)? as usize;
  for _ in 0..rule_count {
    let name = IString::from(read_cstring(&bytes, &mut pos)?.as_str());
    let salience = read_i64(&bytes, &mut pos)? as i32;
    let pattern_count = read_u32(&bytes, &mut pos)? as usize;
    let mut patterns = Vec::with_capacity(pattern_count);
    for _ in 0..pattern_count {
      let kind_tag = read_u8(&bytes, &mut pos)?;
      let kind = match kind_tag {
        0 => PatternKind::Positive,
        1 => PatternKind::Negated,
        2 => PatternKind::TestOnly,
        other => return Err(EngineError::FormatError(format!("unknown pattern kind tag {}", other))),
      };
      let template_name = if read_u8(&bytes, &mut pos)? != 0 {
        Some(IString::from(read_cstring(&bytes, &mut pos)?.as_str()))
      } else {
        None
      };
      let alpha_test_count = read_u32(&bytes, &mut pos)? as usize;
      let mut alpha_tests = Vec::with_capacity(alpha_test_count);
      for _ in 0..alpha_test_count {
        alpha_tests.push(read_expr(&bytes, &mut pos, &roots, &atoms_by_kind, &function_table)?);
      }
      let join_test = if read_u8(&bytes, &mut pos)? != 0 {
        Some(read_expr(&bytes, &mut pos, &roots, &atoms_by_kind, &function_table)?)
      } else {
        None
      };
      patterns.push(PatternSpec { kind, template_name, alpha_tests, join_test });
    }
    let binding_count = read_u32(&bytes, &mut pos)? as usize;
    let mut variable_bindings = Vec::with_capacity(binding_count);
    for _ in 0..binding_count {
      let pattern_index = read_u32(&bytes, &mut pos)? as usize;
      let slot_index = read_u32(&bytes, &mut pos)? as usize;
      variable_bindings.push((pattern_index, slot_index));
    }
    let rhs = read_expr(&bytes, &mut pos, &roots, &atoms_by_kind, &function_table)?;
    network.define_rule(name, salience, patterns, variable_bindings, rhs)?;
  }

  let footer = read_fixed(&bytes, &mut pos, MAGIC_PREFIX.len())?;
  if footer != MAGIC_PREFIX {
    return Err(EngineError::FormatError("binary image missing closing marker".to_string()));
  }

  Ok(LoadedImage { interner, templates, facts, network })
}

fn read_fixed<'a>(bytes: &'a [u8], pos: &mut usize, len: usize) -> EngineResult<&'a [u8]> {
  let end = pos.checked_add(len).ok_or_else(|| EngineError::FormatError("length overflow".to_string()))?;
  let slice = bytes.get(*pos..end).ok_or_else(|| EngineError::FormatError("truncated binary image".to_string()))?;
  *pos = end;
  Ok(slice)
}

fn read_atom_content(bytes: &[u8], pos: &mut usize, interner: &mut Interner, kind: AtomKind) -> EngineResult<Atom> {
  match kind {
    AtomKind::Symbol => interner.intern_symbol(&read_cstring(bytes, pos)?),
    AtomKind::String => interner.intern_string(&read_cstring(bytes, pos)?),
    AtomKind::InstanceName => interner.intern_instance_name(&read_cstring(bytes, pos)?),
    AtomKind::Integer => interner.intern_integer(read_i64(bytes, pos)?),
    AtomKind::Float => interner.intern_float(read_f64(bytes, pos)?),
    AtomKind::Bitmap => interner.intern_bitmap(&read_bytes(bytes, pos)?),
    AtomKind::Quantity => {
      let raw = read_bytes(bytes, pos)?;
      interner.intern_quantity(BigInt::from_signed_bytes_le(&raw))
    }
    other => Err(EngineError::FormatError(format!("{:?} is not a serializable atom kind", other))),
  }
}
