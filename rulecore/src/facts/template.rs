/*!

Template schema: a named, ordered list of slot descriptors (`spec.md` §3). An *implied* template has exactly one
anonymous multislot, used when facts are asserted without a prior `define_template` call.

*/

use rulecore_abs::IString;
use crate::atoms::{Atom, AtomKind};
use crate::expr::ExprNode;

/// Per-slot constraints, enforced during assertion (`spec.md` §4.3 step 2; the concrete shape is
/// `SPEC_FULL.md` §5's supplement, grounded in the original source's constraint records).
#[derive(Clone, Debug, Default)]
pub struct SlotConstraint {
  /// Allowed atom kinds for this slot's value(s); empty means unconstrained.
  pub type_mask: Vec<AtomKind>,
  /// A closed set of permitted values, if any.
  pub allowed_values: Option<Vec<Atom>>,
  /// An inclusive numeric range, for integer/float slots.
  pub range: Option<(f64, f64)>,
}

impl SlotConstraint {
  pub fn allows_kind(&self, kind: AtomKind) -> bool {
    self.type_mask.is_empty() || self.type_mask.contains(&kind)
  }
}

#[derive(Clone, Debug)]
pub struct SlotDescriptor {
  pub name       : IString,
  pub is_multi   : bool,
  pub default    : Option<ExprNode>,
  pub constraints: SlotConstraint,
}

impl SlotDescriptor {
  pub fn new(name: IString, is_multi: bool) -> Self {
    SlotDescriptor {
      name,
      is_multi,
      default: None,
      constraints: SlotConstraint::default(),
    }
  }
}

#[derive(Clone, Debug)]
pub struct Template {
  pub name    : IString,
  pub slots   : Vec<SlotDescriptor>,
  /// An implied template has exactly one anonymous multislot (`spec.md` §3); `define_template` never produces
  /// one, only the fallback path for an undeclared relation name does (`spec.md` §4.3, last paragraph).
  pub implied : bool,
}

impl Template {
  pub fn new(name: IString, slots: Vec<SlotDescriptor>) -> Self {
    Template { name, slots, implied: false }
  }

  /// The single-multislot schema automatically constructed for an undeclared relation name.
  pub fn implied(name: IString) -> Self {
    let mut slot = SlotDescriptor::new(IString::from(""), true);
    slot.constraints = SlotConstraint::default();
    Template { name, slots: vec![slot], implied: true }
  }

  pub fn slot_count(&self) -> usize {
    self.slots.len()
  }

  pub fn slot_index(&self, name: &str) -> Option<usize> {
    self.slots.iter().position(|slot| slot.name.as_ref() == name)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn implied_template_has_one_multislot() {
    let template = Template::implied(IString::from("point"));
    assert!(template.implied);
    assert_eq!(template.slot_count(), 1);
    assert!(template.slots[0].is_multi);
  }

  #[test]
  fn slot_index_lookup() {
    let template = Template::new(
      IString::from("point"),
      vec![
        SlotDescriptor::new(IString::from("x"), false),
        SlotDescriptor::new(IString::from("y"), false),
      ],
    );
    assert_eq!(template.slot_index("y"), Some(1));
    assert_eq!(template.slot_index("z"), None);
  }
}
