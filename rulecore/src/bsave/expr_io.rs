/*!

Binary encode/decode of expression trees (`spec.md` §4.6 step 6: "expression count and hashed-expression
block"). Shared subexpression hash-consing across rules is an optimization the reference implementation performs
for file size; it is not part of the save/load contract (round-trip observational equivalence), so each
occurrence here is written out in full rather than deduplicated — see `DESIGN.md`.

*/

use std::collections::HashMap;
use std::rc::Rc;

use rulecore_abs::IString;

use crate::atoms::Atom;
use crate::bsave::atoms_io::{read_atom, write_atom, RootAtoms};
use crate::bsave::format::*;
use crate::error::{EngineError, EngineResult};
use crate::expr::{ExprNode, FunctionDefinition};

/// Walks every `Constant` atom reachable from `node`, marking it needed for serialization (`spec.md` §4.6: "every
/// atom that any to-be-saved construct references is marked needed").
pub fn mark_needed(node: &ExprNode, mark: &mut impl FnMut(Atom)) {
  match node {
    ExprNode::Constant(atom) => mark(*atom),
    ExprNode::MultifieldLiteral(children) | ExprNode::Progn(children) => {
      for child in children {
        mark_needed(child, mark);
      }
    }
    ExprNode::LocalVar(_) | ExprNode::FactSetVar(_) | ExprNode::PatternSlot { .. } | ExprNode::GlobalRef(_) | ExprNode::Break => {}
    ExprNode::SlotAccess { target, .. } => mark_needed(target, mark),
    ExprNode::FunctionCall { args, .. } => {
      for arg in args {
        mark_needed(arg, mark);
      }
    }
    ExprNode::If { condition, then_branch, else_branch } => {
      mark_needed(condition, mark);
      mark_needed(then_branch, mark);
      if let Some(else_branch) = else_branch {
        mark_needed(else_branch, mark);
      }
    }
    ExprNode::While { condition, body } => {
      mark_needed(condition, mark);
      mark_needed(body, mark);
    }
    ExprNode::Bind { value, .. } => mark_needed(value, mark),
    ExprNode::Return(value) => {
      if let Some(value) = value {
        mark_needed(value, mark);
      }
    }
  }
}

/// Collects the distinct function names referenced by `node`, in first-encountered order (`spec.md` §4.6 step
/// 4: "needed function table").
pub fn collect_function_names(node: &ExprNode, names: &mut Vec<IString>) {
  match node {
    ExprNode::Constant(_)
    | ExprNode::LocalVar(_)
    | ExprNode::FactSetVar(_)
    | ExprNode::PatternSlot { .. }
    | ExprNode::GlobalRef(_)
    | ExprNode::Break => {}
    ExprNode::MultifieldLiteral(children) | ExprNode::Progn(children) => {
      for child in children {
        collect_function_names(child, names);
      }
    }
    ExprNode::SlotAccess { target, .. } => collect_function_names(target, names),
    ExprNode::FunctionCall { function, args } => {
      if !names.iter().any(|name| *name == function.name) {
        names.push(function.name.clone());
      }
      for arg in args {
        collect_function_names(arg, names);
      }
    }
    ExprNode::If { condition, then_branch, else_branch } => {
      collect_function_names(condition, names);
      collect_function_names(then_branch, names);
      if let Some(else_branch) = else_branch {
        collect_function_names(else_branch, names);
      }
    }
    ExprNode::While { condition, body } => {
      collect_function_names(condition, names);
      collect_function_names(body, names);
    }
    ExprNode::Bind { value, .. } => collect_function_names(value, names),
    ExprNode::Return(value) => {
      if let Some(value) = value {
        collect_function_names(value, names);
      }
    }
  }
}

pub fn write_expr(
  buf: &mut Vec<u8>,
  node: &ExprNode,
  roots: &RootAtoms,
  atom_serial: &HashMap<Atom, u32>,
  function_slot: &HashMap<IString, u32>,
) -> EngineResult<()> {
  match node {
    ExprNode::Constant(atom) => {
      write_u8(buf, 0);
      write_atom(buf, *atom, roots, atom_serial)?;
    }
    ExprNode::MultifieldLiteral(children) => {
      write_u8(buf, 1);
      write_u32(buf, children.len() as u32);
      for child in children {
        write_expr(buf, child, roots, atom_serial, function_slot)?;
      }
    }
    ExprNode::LocalVar(slot) => {
      write_u8(buf, 2);
      write_u32(buf, *slot as u32);
    }
    ExprNode::FactSetVar(slot) => {
      write_u8(buf, 3);
      write_u32(buf, *slot as u32);
    }
    ExprNode::PatternSlot { pattern_index, slot_index } => {
      write_u8(buf, 4);
      write_u32(buf, *pattern_index as u32);
      write_u32(buf, *slot_index as u32);
    }
    ExprNode::SlotAccess { target, slot } => {
      write_u8(buf, 5);
      write_expr(buf, target, roots, atom_serial, function_slot)?;
      write_cstring(buf, slot.as_ref());
    }
    ExprNode::GlobalRef(name) => {
      write_u8(buf, 6);
      write_cstring(buf, name.as_ref());
    }
    ExprNode::FunctionCall { function, args } => {
      write_u8(buf, 7);
      let slot = function_slot.get(&function.name).ok_or_else(|| {
        EngineError::internal("function call missing from needed-function table")
      })?;
      write_u32(buf, *slot);
      write_u32(buf, args.len() as u32);
      for arg in args {
        write_expr(buf, arg, roots, atom_serial, function_slot)?;
      }
    }
    ExprNode::If { condition, then_branch, else_branch } => {
      write_u8(buf, 8);
      write_expr(buf, condition, roots, atom_serial, function_slot)?;
      write_expr(buf, then_branch, roots, atom_serial, function_slot)?;
      match else_branch {
        Some(else_branch) => {
          write_u8(buf, 1);
          write_expr(buf, else_branch, roots, atom_serial, function_slot)?;
        }
        None => write_u8(buf, 0),
      }
    }
    ExprNode::While { condition, body } => {
      write_u8(buf, 9);
      write_expr(buf, condition, roots, atom_serial, function_slot)?;
      write_expr(buf, body, roots, atom_serial, function_slot)?;
    }
    ExprNode::Progn(children) => {
      write_u8(buf, 10);
      write_u32(buf, children.len() as u32);
      for child in children {
        write_expr(buf, child, roots, atom_serial, function_slot)?;
      }
    }
    ExprNode::Bind { slot, value } => {
      write_u8(buf, 11);
      write_u32(buf, *slot as u32);
      write_expr(buf, value, roots, atom_serial, function_slot)?;
    }
    ExprNode::Return(value) => {
      write_u8(buf, 12);
      match value {
        Some(value) => {
          write_u8(buf, 1);
          write_expr(buf, value, roots, atom_serial, function_slot)?;
        }
        None => write_u8(buf, 0),
      }
    }
    ExprNode::Break => {
      write_u8(buf, 13);
    }
  }
  Ok(())
}

pub fn read_expr(
  bytes: &[u8],
  pos: &mut usize,
  roots: &RootAtoms,
  atoms_by_kind: &[Vec<Atom>],
  functions: &[Rc<FunctionDefinition>],
) -> EngineResult<ExprNode> {
  let tag = read_u8(bytes, pos)?;
  Ok(match tag {
    0 => ExprNode::Constant(read_atom(bytes, pos, roots, atoms_by_kind)?),
    1 => {
      let count = read_u32(bytes, pos)? as usize;
      let mut children = Vec::with_capacity(count);
      for _ in 0..count {
        children.push(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      }
      ExprNode::MultifieldLiteral(children)
    }
    2 => ExprNode::LocalVar(read_u32(bytes, pos)? as usize),
    3 => ExprNode::FactSetVar(read_u32(bytes, pos)? as usize),
    4 => {
      let pattern_index = read_u32(bytes, pos)? as usize;
      let slot_index = read_u32(bytes, pos)? as usize;
      ExprNode::PatternSlot { pattern_index, slot_index }
    }
    5 => {
      let target = Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      let slot = IString::from(read_cstring(bytes, pos)?.as_str());
      ExprNode::SlotAccess { target, slot }
    }
    6 => ExprNode::GlobalRef(IString::from(read_cstring(bytes, pos)?.as_str())),
    7 => {
      let slot = read_u32(bytes, pos)? as usize;
      let function = functions
          .get(slot)
          .cloned()
          .ok_or_else(|| EngineError::FormatError("function slot index out of range".to_string()))?;
      let count = read_u32(bytes, pos)? as usize;
      let mut args = Vec::with_capacity(count);
      for _ in 0..count {
        args.push(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      }
      ExprNode::FunctionCall { function, args }
    }
    8 => {
      let condition = Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      let then_branch = Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      let has_else = read_u8(bytes, pos)? != 0;
      let else_branch =
          if has_else { Some(Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?)) } else { None };
      ExprNode::If { condition, then_branch, else_branch }
    }
    9 => {
      let condition = Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      let body = Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      ExprNode::While { condition, body }
    }
    10 => {
      let count = read_u32(bytes, pos)? as usize;
      let mut children = Vec::with_capacity(count);
      for _ in 0..count {
        children.push(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      }
      ExprNode::Progn(children)
    }
    11 => {
      let slot = read_u32(bytes, pos)? as usize;
      let value = Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?);
      ExprNode::Bind { slot, value }
    }
    12 => {
      let has_value = read_u8(bytes, pos)? != 0;
      let value =
          if has_value { Some(Box::new(read_expr(bytes, pos, roots, atoms_by_kind, functions)?)) } else { None };
      ExprNode::Return(value)
    }
    13 => ExprNode::Break,
    other => return Err(EngineError::FormatError(format!("unknown expression tag {}", other))),
  })
}
