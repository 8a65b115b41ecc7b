/*!

A function definition (`spec.md` §3): `(name, impl, minArgs, maxArgs, returnTypeMask, argTypeMasks)`. Builtins
(arithmetic, `assert`/`retract`, `printout`, …) and any host-registered extension function share this shape.

*/

use std::fmt::{Debug, Formatter};
use rulecore_abs::IString;
use crate::atoms::AtomKind;
use crate::value::Value;
use crate::expr::eval::Environment;

pub type FunctionCallback = Box<dyn Fn(&[Value], &mut Environment) -> Value>;

pub struct FunctionDefinition {
  pub name            : IString,
  pub min_args        : usize,
  /// `None` means unbounded (e.g. `progn`, `+`).
  pub max_args        : Option<usize>,
  pub return_type_mask: Vec<AtomKind>,
  /// One type mask per fixed argument position; positions beyond the vector's length (variadic tail) are
  /// unconstrained.
  pub arg_type_masks  : Vec<Vec<AtomKind>>,
  callback            : FunctionCallback,
}

impl FunctionDefinition {
  pub fn new(
    name: IString,
    min_args: usize,
    max_args: Option<usize>,
    callback: FunctionCallback,
  ) -> Self {
    FunctionDefinition {
      name,
      min_args,
      max_args,
      return_type_mask: Vec::new(),
      arg_type_masks  : Vec::new(),
      callback,
    }
  }

  pub fn arity_in_range(&self, count: usize) -> bool {
    count >= self.min_args && self.max_args.map(|max| count <= max).unwrap_or(true)
  }

  pub fn arg_mask(&self, position: usize) -> &[AtomKind] {
    self.arg_type_masks.get(position).map(|mask| mask.as_slice()).unwrap_or(&[])
  }

  pub fn call(&self, args: &[Value], env: &mut Environment) -> Value {
    (self.callback)(args, env)
  }
}

impl Debug for FunctionDefinition {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "FunctionDefinition({})", self.name)
  }
}
