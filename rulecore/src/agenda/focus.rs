/*!

The focus stack (`spec.md` §4.5): the agenda is partitioned by module; the currently focused module's agenda is
consulted first, popping to the next module on the stack once it runs dry. Rules change focus via `focus`/
`pop-focus` RHS actions (out of this core's scope to parse, but the stack itself is core state).

*/

use rulecore_abs::IString;

pub const DEFAULT_MODULE: &str = "MAIN";

pub struct FocusStack {
  stack: Vec<IString>,
}

impl FocusStack {
  pub fn new() -> Self {
    FocusStack { stack: vec![IString::from(DEFAULT_MODULE)] }
  }

  pub fn current(&self) -> &IString {
    self.stack.last().expect("focus stack always has a base module")
  }

  pub fn push(&mut self, module: IString) {
    self.stack.push(module);
  }

  /// Pops the current module, unless it is the last one on the stack (the base focus is never popped).
  pub fn pop(&mut self) -> Option<IString> {
    if self.stack.len() <= 1 {
      return None;
    }
    self.stack.pop()
  }

  pub fn reset(&mut self) {
    self.stack.clear();
    self.stack.push(IString::from(DEFAULT_MODULE));
  }

  pub fn stack(&self) -> &[IString] {
    &self.stack
  }
}

impl Default for FocusStack {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn base_focus_is_never_popped() {
    let mut stack = FocusStack::new();
    assert_eq!(stack.pop(), None);
    assert_eq!(stack.current().as_ref(), DEFAULT_MODULE);
  }

  #[test]
  fn pushed_focus_pops_back_to_base() {
    let mut stack = FocusStack::new();
    stack.push(IString::from("UTIL"));
    assert_eq!(stack.current().as_ref(), "UTIL");
    assert_eq!(stack.pop().as_deref(), Some("UTIL"));
    assert_eq!(stack.current().as_ref(), DEFAULT_MODULE);
  }
}
