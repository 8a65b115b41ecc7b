/*!

A fact: one instance of a template in working memory (`spec.md` §3/§4.3).

The spec's `(next/prev in list)` fields describe the reference C implementation's intrusive doubly-linked lists.
`FactStore` gets the same assertion-order traversal and O(log n) removal from a `BTreeSet<FactIndex>` (fact
indices are monotonically increasing and never reused, so set order *is* assertion order) without hand-rolled
pointer juggling — an arena-of-indices simplification in the spirit of the teacher's own advice (Design Notes
§9: "arena of nodes addressed by indices").

*/

use std::rc::Rc;
use crate::facts::template::Template;
use crate::value::Value;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub struct FactIndex(pub u64);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum FactState {
  Pending,
  Asserted,
  /// Garbage: retracted, but still referenced by identity until no match-network partial match references it.
  Retracted,
}

#[derive(Debug)]
pub struct Fact {
  pub index      : FactIndex,
  pub template   : Rc<Template>,
  pub slot_values: Vec<Value>,
  pub state      : FactState,
}

impl Fact {
  pub fn new(index: FactIndex, template: Rc<Template>, slot_values: Vec<Value>) -> Self {
    Fact { index, template, slot_values, state: FactState::Pending }
  }

  pub fn is_garbage(&self) -> bool {
    self.state == FactState::Retracted
  }

  pub fn slot(&self, name: &str) -> Option<&Value> {
    let slot_index = self.template.slot_index(name)?;
    self.slot_values.get(slot_index)
  }
}
