/*!

The fact store (`spec.md` §4.3): create/assert/retract, lookup by fact index, iteration in assertion order, and
slot access. Constraint checking (step 2) and content-hash duplicate suppression (step 3) happen here; expression
evaluation of slot values (step 1) and delivery to the match network (step 5) are the caller's (`Engine`'s)
responsibility, since those need the evaluator and the network, neither of which this module depends on
(`spec.md` §2's leaves-first dependency order: the fact store sits below the match network).

*/

use std::collections::{BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use rulecore_abs::{debug, IString};

use crate::error::{EngineError, EngineResult};
use crate::facts::fact::{Fact, FactIndex, FactState};
use crate::facts::template::{SlotConstraint, Template};
use crate::value::Value;

fn hash_value(value: &Value, hasher: &mut impl Hasher) {
  match value {
    Value::Atom(atom) => { 0u8.hash(hasher); atom.hash(hasher); }
    Value::Multifield(mf) => { 1u8.hash(hasher); mf.as_slice().hash(hasher); }
    Value::MultifieldSlice(mf, slice) => {
      2u8.hash(hasher);
      mf.as_slice()[slice.begin..slice.begin + slice.range].hash(hasher);
    }
    Value::Fact(index) => { 3u8.hash(hasher); index.hash(hasher); }
    Value::Instance(handle) => { 4u8.hash(hasher); handle.hash(hasher); }
  }
}

fn content_hash(template_name: &IString, values: &[Value]) -> u64 {
  let mut hasher = std::collections::hash_map::DefaultHasher::new();
  template_name.hash(&mut hasher);
  for value in values {
    hash_value(value, &mut hasher);
  }
  hasher.finish()
}

fn check_constraint(constraint: &SlotConstraint, value: &Value) -> Result<(), String> {
  if let Value::Atom(atom) = value {
    if !constraint.allows_kind(atom.kind) {
      return Err(format!("value of kind {:?} not permitted", atom.kind));
    }
  }
  if let Some(allowed) = &constraint.allowed_values {
    if let Value::Atom(atom) = value {
      if !allowed.contains(atom) {
        return Err("value not among slot's allowed values".to_string());
      }
    }
  }
  Ok(())
}

pub struct FactStore {
  facts             : HashMap<FactIndex, Fact>,
  global_order      : BTreeSet<FactIndex>,
  per_template_order: HashMap<IString, BTreeSet<FactIndex>>,
  /// Maps a content hash to the fact indices presently asserted with that hash, for O(1)-average duplicate
  /// lookup (`spec.md` §4.3 step 3). Collisions are broken by full `Value` equality.
  content_index     : HashMap<u64, Vec<FactIndex>>,
  next_index        : u64,
}

impl FactStore {
  pub fn new() -> Self {
    FactStore {
      facts             : HashMap::new(),
      global_order      : BTreeSet::new(),
      per_template_order: HashMap::new(),
      content_index     : HashMap::new(),
      next_index        : 1,
    }
  }

  /// Assigns the next fact index, applies slot constraints, and (unless `fact_duplication` is enabled) returns
  /// an already-asserted content-equal fact's index instead of creating a new one (`spec.md` §4.3 steps 2–4).
  /// Does not touch the match network; the caller delivers the returned fact to it (step 5).
  pub fn assert_values(
    &mut self,
    template: Rc<Template>,
    slot_values: Vec<Value>,
    fact_duplication: bool,
  ) -> EngineResult<FactIndex> {
    if slot_values.len() != template.slot_count() {
      return Err(EngineError::InternalError(format!(
        "template `{}` expects {} slot values, got {}",
        template.name, template.slot_count(), slot_values.len()
      )));
    }

    for (slot, value) in template.slots.iter().zip(slot_values.iter()) {
      if !slot.is_multi {
        if let Err(reason) = check_constraint(&slot.constraints, value) {
          return Err(EngineError::ConstraintError { slot: slot.name.to_string(), reason });
        }
      } else if let Some(atoms) = value.as_atoms() {
        for atom in atoms {
          if !slot.constraints.allows_kind(atom.kind) {
            return Err(EngineError::ConstraintError {
              slot  : slot.name.to_string(),
              reason: format!("value of kind {:?} not permitted in multislot", atom.kind),
            });
          }
        }
      }
    }

    let hash = content_hash(&template.name, &slot_values);
    if !fact_duplication {
      if let Some(candidates) = self.content_index.get(&hash) {
        for &candidate_index in candidates {
          if let Some(existing) = self.facts.get(&candidate_index) {
            if existing.state == FactState::Asserted
                && existing.template.name == template.name
                && existing.slot_values == slot_values
            {
              debug!(fact_index = candidate_index.0, "suppressed duplicate assertion");
              return Ok(candidate_index);
            }
          }
        }
      }
    }

    let index = FactIndex(self.next_index);
    self.next_index += 1;

    let mut fact = Fact::new(index, template.clone(), slot_values);
    fact.state = FactState::Asserted;

    self.global_order.insert(index);
    self.per_template_order.entry(template.name.clone()).or_default().insert(index);
    self.content_index.entry(hash).or_default().push(index);
    self.facts.insert(index, fact);

    Ok(index)
  }

  /// Marks a fact retracted. The fact remains reachable by identity (`find_by_index` still returns it, with
  /// `state == Retracted`) until the caller physically drops it; `spec.md` §4.3 leaves final reclamation to
  /// whichever match-network tokens still reference the fact.
  pub fn retract(&mut self, index: FactIndex) -> EngineResult<()> {
    let fact = self.facts.get_mut(&index).ok_or_else(|| {
      EngineError::StaleReferenceError(format!("fact {} does not exist", index.0))
    })?;

    if fact.state == FactState::Retracted {
      // Retract idempotence (`spec.md` §8 property 6): a second retract is a no-op, not an error.
      return Ok(());
    }

    fact.state = FactState::Retracted;
    self.global_order.remove(&index);
    if let Some(set) = self.per_template_order.get_mut(&fact.template.name) {
      set.remove(&index);
    }
    Ok(())
  }

  /// Physically drops a retracted fact once nothing else references it. Only the engine, after confirming no
  /// match-network token still holds the fact, should call this.
  pub fn finalize_retraction(&mut self, index: FactIndex) {
    if let Some(fact) = self.facts.get(&index) {
      if fact.state == FactState::Retracted {
        self.facts.remove(&index);
      }
    }
  }

  pub fn find_by_index(&self, index: FactIndex) -> Option<&Fact> {
    self.facts.get(&index)
  }

  /// Reinserts a fact at its original index, bypassing duplicate suppression and index assignment — used only
  /// by `bload` to restore a previously-saved fact set verbatim (`spec.md` §8 property 7: indices, not just
  /// content, must round-trip). The caller is responsible for restoring facts in ascending index order.
  pub fn insert_loaded(&mut self, mut fact: Fact) {
    fact.state = FactState::Asserted;
    let index = fact.index;
    let hash = content_hash(&fact.template.name, &fact.slot_values);
    self.global_order.insert(index);
    self.per_template_order.entry(fact.template.name.clone()).or_default().insert(index);
    self.content_index.entry(hash).or_default().push(index);
    self.facts.insert(index, fact);
    self.next_index = self.next_index.max(index.0 + 1);
  }

  /// Iterates currently-asserted facts in assertion order (global, unscoped by module).
  pub fn iter_asserted(&self) -> impl Iterator<Item = &Fact> {
    self.global_order.iter().filter_map(move |index| self.facts.get(index))
  }

  /// Iterates currently-asserted facts of one template, in assertion order.
  pub fn iter_template(&self, template_name: &str) -> impl Iterator<Item = &Fact> {
    self.per_template_order
        .get(template_name)
        .into_iter()
        .flat_map(|set| set.iter())
        .filter_map(move |index| self.facts.get(index))
  }

  /// Query operator over a fact/instance set (`SPEC_FULL.md` §5): iterates asserted facts of `template_name`
  /// whose content satisfies `predicate`.
  pub fn query<'a>(
    &'a self,
    template_name: &str,
    predicate: impl Fn(&Fact) -> bool + 'a,
  ) -> impl Iterator<Item = &'a Fact> + 'a {
    self.iter_template(template_name).filter(move |fact| predicate(fact))
  }

  pub fn asserted_count(&self) -> usize {
    self.global_order.len()
  }

  /// Clears all facts and resets the fact-index counter to 1, matching the CLIPS `reset` convention
  /// (`SPEC_FULL.md` §5).
  pub fn clear(&mut self) {
    self.facts.clear();
    self.global_order.clear();
    self.per_template_order.clear();
    self.content_index.clear();
    self.next_index = 1;
  }
}

impl Default for FactStore {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::atoms::{Atom, AtomKind};
  use crate::facts::template::SlotDescriptor;

  fn point_template() -> Rc<Template> {
    Rc::new(Template::new(
      IString::from("point"),
      vec![
        SlotDescriptor::new(IString::from("x"), false),
        SlotDescriptor::new(IString::from("y"), false),
      ],
    ))
  }

  fn int_values(values: &[i32]) -> Vec<Value> {
    values.iter().map(|&v| Value::Atom(Atom::new(AtomKind::Integer, v as u32))).collect()
  }

  #[test]
  fn s1_duplicate_suppression_and_index_monotonicity() {
    let mut store = FactStore::new();
    let template = point_template();

    let i1 = store.assert_values(template.clone(), int_values(&[1, 2]), false).unwrap();
    let i2 = store.assert_values(template.clone(), int_values(&[1, 2]), false).unwrap();
    assert_eq!(i1, i2);
    assert_eq!(store.asserted_count(), 1);

    let i3 = store.assert_values(template.clone(), int_values(&[1, 2]), true).unwrap();
    assert_ne!(i2, i3);
    assert_eq!(store.asserted_count(), 2);
    assert!(i3.0 > i2.0);
  }

  #[test]
  fn retract_is_idempotent() {
    let mut store = FactStore::new();
    let template = point_template();
    let index = store.assert_values(template, int_values(&[1, 2]), false).unwrap();

    store.retract(index).unwrap();
    assert_eq!(store.find_by_index(index).unwrap().state, FactState::Retracted);
    // Second retract must not error and must not change anything further.
    store.retract(index).unwrap();
    assert_eq!(store.find_by_index(index).unwrap().state, FactState::Retracted);
  }

  #[test]
  fn retract_on_unknown_fact_is_stale_reference() {
    let mut store = FactStore::new();
    let result = store.retract(FactIndex(999));
    assert!(matches!(result, Err(EngineError::StaleReferenceError(_))));
  }

  #[test]
  fn reset_restarts_index_counter_at_one() {
    let mut store = FactStore::new();
    let template = point_template();
    store.assert_values(template.clone(), int_values(&[1, 2]), true).unwrap();
    store.assert_values(template.clone(), int_values(&[3, 4]), true).unwrap();
    store.clear();
    let index = store.assert_values(template, int_values(&[5, 6]), true).unwrap();
    assert_eq!(index, FactIndex(1));
  }
}
