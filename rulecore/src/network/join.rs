/*!

Join nodes (`spec.md` §4.4.2/§4.4.3): combine a left beta memory with a right alpha memory under a join-test
expression. Three shapes share this struct, distinguished by [`JoinKind`]: a positive join produces a token only
when some right fact satisfies the test; a negated join produces a token only when *no* right fact does; a
test-only join has no right input at all.

*/

use std::collections::HashMap;

use crate::expr::{BindingView, Environment, Evaluator, ExprNode};
use crate::facts::{FactIndex, FactStore};
use crate::value::Value;
use crate::network::beta::Token;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum JoinKind {
  /// The first pattern in a rule's LHS: right side only, left is the implicit empty tuple.
  Initial,
  Positive,
  Negated,
  TestOnly,
}

/// Resolves `(pattern_index, slot_index)` against a join's left token (patterns `0..left.len()`) and, when
/// present, the candidate right fact (pattern index `left.len()`) (`spec.md` §4.4.3).
pub struct JoinBindingView<'a> {
  pub store: &'a FactStore,
  pub left : &'a Token,
  pub right: Option<FactIndex>,
}

impl BindingView for JoinBindingView<'_> {
  fn resolve(&self, pattern_index: usize, slot_index: usize) -> Option<Value> {
    let fact_index = if pattern_index < self.left.facts.len() {
      self.left.facts[pattern_index]
    } else if pattern_index == self.left.facts.len() {
      self.right?
    } else {
      return None;
    };
    self.store.find_by_index(fact_index)?.slot_values.get(slot_index).cloned()
  }
}

pub struct JoinNode {
  pub kind : JoinKind,
  /// Index into the network's alpha-node arena. `None` only for `TestOnly`.
  pub alpha_node: Option<usize>,
  /// Absent only for `Initial`, whose right fact is admitted unconditionally.
  pub test: Option<ExprNode>,
  /// Tokens currently passing this join, in the order produced (`spec.md` §4.4: "Beta memories are vectors of
  /// tokens").
  pub memory: Vec<Token>,
  /// For `Negated` joins only: count of right-side facts currently satisfying the test for each left token
  /// (`spec.md` §4.4.2, invariant 8 of §8 — "count of positive right matches ≥ 0 at all times").
  pub negated_counters: HashMap<Token, u32>,
}

impl JoinNode {
  pub fn initial(alpha_node: usize) -> Self {
    JoinNode { kind: JoinKind::Initial, alpha_node: Some(alpha_node), test: None, memory: Vec::new(), negated_counters: HashMap::new() }
  }

  pub fn positive(alpha_node: usize, test: Option<ExprNode>) -> Self {
    JoinNode { kind: JoinKind::Positive, alpha_node: Some(alpha_node), test, memory: Vec::new(), negated_counters: HashMap::new() }
  }

  pub fn negated(alpha_node: usize, test: Option<ExprNode>) -> Self {
    JoinNode { kind: JoinKind::Negated, alpha_node: Some(alpha_node), test, memory: Vec::new(), negated_counters: HashMap::new() }
  }

  pub fn test_only(test: ExprNode) -> Self {
    JoinNode { kind: JoinKind::TestOnly, alpha_node: None, test: Some(test), memory: Vec::new(), negated_counters: HashMap::new() }
  }

  /// Evaluates `self.test` over `(left, right)`; a join with no test (e.g. a bare initial join) always passes.
  /// An erroring test counts as false for that pair (`spec.md` §4.4.6).
  pub fn test_passes(&self, left: &Token, right: Option<FactIndex>, store: &FactStore, env: &mut Environment) -> bool {
    let Some(test) = &self.test else { return true };
    let view = JoinBindingView { store, left, right };
    let result = Evaluator::eval_in_join(test, env, &view);
    if env.has_error() {
      env.clear_errors();
      return false;
    }
    !result.as_atom().map(|atom| atom == env.interner.borrow().false_atom()).unwrap_or(false)
  }

  pub fn position(&self, token: &Token) -> Option<usize> {
    self.memory.iter().position(|existing| existing == token)
  }

  /// Drops all held tokens and negated-join counters without touching `test`/`alpha_node`, for `reset()`
  /// (`SPEC_FULL.md` §5): working-memory state is wiped but a rule's compiled join structure is not.
  pub fn clear_memory(&mut self) {
    self.memory.clear();
    self.negated_counters.clear();
  }

  pub fn remove_token(&mut self, token: &Token) -> bool {
    if let Some(position) = self.position(token) {
      self.memory.remove(position);
      true
    } else {
      false
    }
  }
}
