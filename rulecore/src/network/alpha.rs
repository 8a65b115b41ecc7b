/*!

Alpha side of the match network (`spec.md` §4.4.1): one alpha node per rule pattern, applying that pattern's
intra-pattern tests (constant equality, type predicate, intra-pattern variable consistency) to each asserted fact
of the pattern's template.

*/

use rulecore_abs::IString;

use crate::expr::{BindingView, Environment, Evaluator, ExprNode};
use crate::facts::{Fact, FactIndex};
use crate::value::Value;

/// Resolves `(pattern_index, slot_index)` against a single candidate fact, ignoring `pattern_index` — an alpha
/// node's tests only ever reference the one fact under test.
struct FactBindingView<'a> {
  fact: &'a Fact,
}

impl BindingView for FactBindingView<'_> {
  fn resolve(&self, _pattern_index: usize, slot_index: usize) -> Option<Value> {
    self.fact.slot_values.get(slot_index).cloned()
  }
}

#[derive(Clone, Debug)]
pub struct AlphaNode {
  pub template_name: IString,
  /// Intra-pattern tests, compiled from the pattern's literal/binding constraints. An empty list matches every
  /// fact of the template (a pattern with only unbound variables).
  pub tests: Vec<ExprNode>,
  /// Facts currently passing this pattern's tests, in fact-index order (`spec.md` §4.4.1: "the set of facts
  /// passing the pattern's intra-pattern tests").
  pub memory: std::collections::BTreeSet<FactIndex>,
}

impl AlphaNode {
  pub fn new(template_name: IString, tests: Vec<ExprNode>) -> Self {
    AlphaNode { template_name, tests, memory: std::collections::BTreeSet::new() }
  }

  /// Evaluates this node's tests against `fact`. A test that errors is treated as false for this fact
  /// (`spec.md` §4.4.6); the recorded environment error is cleared afterward so it doesn't leak into unrelated
  /// evaluations.
  pub fn accepts(&self, fact: &Fact, env: &mut Environment) -> bool {
    let view = FactBindingView { fact };
    for test in &self.tests {
      let result = Evaluator::eval_in_join(test, env, &view);
      if env.has_error() {
        env.clear_errors();
        return false;
      }
      if result.as_atom().map(|atom| atom == env.interner.borrow().false_atom()).unwrap_or(false) {
        return false;
      }
    }
    true
  }

  pub fn insert(&mut self, fact_index: FactIndex) {
    self.memory.insert(fact_index);
  }

  pub fn remove(&mut self, fact_index: FactIndex) {
    self.memory.remove(&fact_index);
  }

  /// Drops all held facts without touching `tests`, for `reset()` (`SPEC_FULL.md` §5): working-memory state is
  /// wiped but the pattern compiled into this node is not.
  pub fn clear_memory(&mut self) {
    self.memory.clear();
  }

  pub fn iter(&self) -> impl Iterator<Item = FactIndex> + '_ {
    self.memory.iter().copied()
  }
}
