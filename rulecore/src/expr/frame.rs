/*!

Activation frames (`spec.md` §4.2): pushed before a rule's RHS or a function body is entered, popped on exit,
restoring whatever frame (including its wildcard-arguments value) was active before.

*/

use crate::facts::FactIndex;
use crate::value::Value;

#[derive(Clone, Debug, Default)]
pub struct ActivationFrame {
  /// The rule instantiation's pattern-bound variables and any RHS-local `bind` targets, indexed by the slot
  /// assigned at parse time.
  pub locals       : Vec<Value>,
  /// The facts bound by the current rule instantiation's join tuple (for `LocalVar`/slot-access resolution of
  /// fact/instance-valued pattern variables).
  pub fact_set     : Vec<FactIndex>,
  /// `$?argv`-style wildcard arguments available inside a user-defined function body; `None` in a rule's RHS.
  pub wildcard_args: Option<Vec<Value>>,
}

impl ActivationFrame {
  pub fn new(locals: Vec<Value>, fact_set: Vec<FactIndex>) -> Self {
    ActivationFrame { locals, fact_set, wildcard_args: None }
  }

  pub fn with_wildcard_args(mut self, args: Vec<Value>) -> Self {
    self.wildcard_args = Some(args);
    self
  }

  pub fn local(&self, slot: usize) -> Option<&Value> {
    self.locals.get(slot)
  }

  pub fn set_local(&mut self, slot: usize, value: Value) {
    if slot >= self.locals.len() {
      self.locals.resize(slot + 1, Value::Atom(crate::atoms::Atom::new(crate::atoms::AtomKind::Void, 0)));
    }
    self.locals[slot] = value;
  }

  pub fn fact_at(&self, offset: usize) -> Option<FactIndex> {
    self.fact_set.get(offset).copied()
  }
}
