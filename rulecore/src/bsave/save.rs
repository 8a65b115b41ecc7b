/*!

The bsave image writer (`spec.md` §4.6). Layout, in order: magic prefix, format version, a size tag (catches a
32-/64-bit mismatch between the engine that saved and the one that loads), the needed atom tables, templates,
facts, rules, and a closing repeat of the magic prefix.

*/

use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use rulecore_abs::IString;

use crate::atoms::{Atom, Interner};
use crate::bsave::atoms_io::{mark_needed_value, saved_atom_kinds, write_atom, write_value, RootAtoms};
use crate::bsave::expr_io::{collect_function_names, mark_needed, write_expr};
use crate::bsave::format::*;
use crate::error::EngineResult;
use crate::facts::{FactStore, Template};
use crate::network::{JoinKind, MatchNetwork};

pub fn save(
  path: &Path,
  interner: &mut Interner,
  templates: &HashMap<IString, Rc<Template>>,
  facts: &FactStore,
  network: &MatchNetwork,
) -> EngineResult<()> {
  let roots = RootAtoms::capture(interner);

  // Start every atom unneeded, then mark exactly what this image references — a stale `needed` flag from a
  // previous save must not leak an atom no construct mentions anymore into the new image.
  for &kind in saved_atom_kinds() {
    let stale: Vec<Atom> = interner.iter_kind(kind).collect();
    for atom in stale {
      interner.set_needed_for_serialization(atom, false);
    }
  }

  let mut mark = |atom: Atom| interner.set_needed_for_serialization(atom, true);
  for template in templates.values() {
    for slot in &template.slots {
      if let Some(default) = &slot.default {
        mark_needed(default, &mut mark);
      }
      if let Some(allowed) = &slot.constraints.allowed_values {
        for &atom in allowed {
          mark(atom);
        }
      }
    }
  }
  for fact in facts.iter_asserted() {
    for value in &fact.slot_values {
      mark_needed_value(value, &mut mark);
    }
  }
  let mut function_names: Vec<IString> = Vec::new();
  for rule_name in network.rule_names().cloned().collect::<Vec<_>>() {
    let rule = network.rule(&rule_name).expect("name came from rule_names");
    for join in &rule.joins {
      if let Some(alpha_index) = join.alpha_node {
        for test in &network.alpha_node(alpha_index).tests {
          mark_needed(test, &mut mark);
          collect_function_names(test, &mut function_names);
        }
      }
      if let Some(test) = &join.test {
        mark_needed(test, &mut mark);
        collect_function_names(test, &mut function_names);
      }
    }
    mark_needed(&rule.rhs, &mut mark);
    collect_function_names(&rule.rhs, &mut function_names);
  }

  let mut buf = Vec::new();
  buf.extend_from_slice(MAGIC_PREFIX);
  buf.extend_from_slice(FORMAT_VERSION);
  write_u8(&mut buf, std::mem::size_of::<usize>() as u8);

  // Needed function table.
  write_u32(&mut buf, function_names.len() as u32);
  let mut function_slot = HashMap::new();
  for (slot, name) in function_names.iter().enumerate() {
    write_cstring(&mut buf, name.as_ref());
    function_slot.insert(name.clone(), slot as u32);
  }

  // Needed atom tables, building the serial-index map consumed by every later section.
  let mut atom_serial: HashMap<Atom, u32> = HashMap::new();
  for &kind in saved_atom_kinds() {
    let needed: Vec<Atom> = interner
        .iter_kind(kind)
        .filter(|&atom| interner.is_needed_for_serialization(atom))
        .collect();
    write_u32(&mut buf, needed.len() as u32);
    for (serial, &atom) in needed.iter().enumerate() {
      atom_serial.insert(atom, serial as u32);
      write_atom_content(&mut buf, interner, atom)?;
    }
  }

  // Templates.
  write_u32(&mut buf, templates.len() as u32);
  for template in templates.values() {
    write_cstring(&mut buf, template.name.as_ref());
    write_u8(&mut buf, template.implied as u8);
    write_u32(&mut buf, template.slots.len() as u32);
    for slot in &template.slots {
      write_cstring(&mut buf, slot.name.as_ref());
      write_u8(&mut buf, slot.is_multi as u8);

      write_u32(&mut buf, slot.constraints.type_mask.len() as u32);
      for &kind in &slot.constraints.type_mask {
        write_u8(&mut buf, kind as u8);
      }

      match &slot.constraints.allowed_values {
        Some(values) => {
          write_u8(&mut buf, 1);
          write_u32(&mut buf, values.len() as u32);
          for &atom in values {
            write_atom(&mut buf, atom, &roots, &atom_serial)?;
          }
        }
        None => write_u8(&mut buf, 0),
      }

      match slot.constraints.range {
        Some((low, high)) => {
          write_u8(&mut buf, 1);
          write_f64(&mut buf, low);
          write_f64(&mut buf, high);
        }
        None => write_u8(&mut buf, 0),
      }

      match &slot.default {
        Some(default) => {
          write_u8(&mut buf, 1);
          write_expr(&mut buf, default, &roots, &atom_serial, &function_slot)?;
        }
        None => write_u8(&mut buf, 0),
      }
    }
  }

  // Facts, in assertion order, each retaining its original index.
  let asserted: Vec<_> = facts.iter_asserted().collect();
  write_u64(&mut buf, asserted.len() as u64);
  for fact in &asserted {
    write_u64(&mut buf, fact.index.0);
    write_cstring(&mut buf, fact.template.name.as_ref());
    write_u32(&mut buf, fact.slot_values.len() as u32);
    for value in &fact.slot_values {
      write_value(&mut buf, value, &roots, &atom_serial)?;
    }
  }

  // Rules.
  let rule_names: Vec<IString> = network.rule_names().cloned().collect();
  write_u32(&mut buf, rule_names.len() as u32);
  for rule_name in &rule_names {
    let rule = network.rule(rule_name).expect("name came from rule_names");
    write_cstring(&mut buf, rule.name.as_ref());
    write_i64(&mut buf, rule.salience as i64);
    write_u32(&mut buf, rule.joins.len() as u32);
    for join in &rule.joins {
      let (kind_tag, template_name, alpha_tests) = match join.alpha_node {
        Some(alpha_index) => {
          let alpha = network.alpha_node(alpha_index);
          let kind_tag = match join.kind {
            JoinKind::Initial | JoinKind::Positive => 0u8,
            JoinKind::Negated => 1u8,
            JoinKind::TestOnly => unreachable!("test-only joins carry no alpha node"),
          };
          (kind_tag, Some(alpha.template_name.clone()), alpha.tests.clone())
        }
        None => (2u8, None, Vec::new()),
      };
      write_u8(&mut buf, kind_tag);
      match &template_name {
        Some(name) => {
          write_u8(&mut buf, 1);
          write_cstring(&mut buf, name.as_ref());
        }
        None => write_u8(&mut buf, 0),
      }
      write_u32(&mut buf, alpha_tests.len() as u32);
      for test in &alpha_tests {
        write_expr(&mut buf, test, &roots, &atom_serial, &function_slot)?;
      }
      match &join.test {
        Some(test) => {
          write_u8(&mut buf, 1);
          write_expr(&mut buf, test, &roots, &atom_serial, &function_slot)?;
        }
        None => write_u8(&mut buf, 0),
      }
    }
    write_u32(&mut buf, rule.variable_bindings.len() as u32);
    for &(pattern_index, slot_index) in &rule.variable_bindings {
      write_u32(&mut buf, pattern_index as u32);
      write_u32(&mut buf, slot_index as u32);
    }
    write_expr(&mut buf, &rule.rhs, &roots, &atom_serial, &function_slot)?;
  }

  buf.extend_from_slice(MAGIC_PREFIX);

  std::fs::write(path, buf)?;
  Ok(())
}

fn write_atom_content(buf: &mut Vec<u8>, interner: &Interner, atom: Atom) -> EngineResult<()> {
  use crate::atoms::AtomKind;
  match atom.kind {
    AtomKind::Symbol => write_cstring(buf, interner.symbol_text(atom)),
    AtomKind::String => write_cstring(buf, interner.string_text(atom)),
    AtomKind::InstanceName => write_cstring(buf, interner.instance_name_text(atom)),
    AtomKind::Integer => write_i64(buf, interner.integer_value(atom)),
    AtomKind::Float => write_f64(buf, interner.float_value(atom)),
    AtomKind::Bitmap => write_bytes(buf, interner.bitmap_bytes(atom)),
    AtomKind::Quantity => write_bytes(buf, &interner.quantity_value(atom).to_signed_bytes_le()),
    other => unreachable!("{:?} is not a serializable atom kind", other),
  }
  Ok(())
}
