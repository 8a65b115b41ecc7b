/*!

The agenda and execution cycle (`spec.md` §4.5): a priority structure over activations, partitioned by module via
the focus stack, plus the `run(n)` loop that pops the highest-priority activation and fires it.

*/

mod activation;
mod focus;
mod strategy;

pub use activation::Activation;
pub use focus::{FocusStack, DEFAULT_MODULE};
pub use strategy::Strategy;

use std::collections::HashMap;

use rand::random;
use rulecore_abs::IString;

use crate::network::Token;

pub struct Agenda {
  /// Per-module buckets of pending activations (`spec.md` §4.5's focus-partitioned agenda).
  buckets        : HashMap<IString, Vec<Activation>>,
  focus          : FocusStack,
  strategy       : Strategy,
  next_timetag   : u64,
}

impl Agenda {
  pub fn new(strategy: Strategy) -> Self {
    Agenda { buckets: HashMap::new(), focus: FocusStack::new(), strategy, next_timetag: 0 }
  }

  pub fn set_strategy(&mut self, strategy: Strategy) {
    self.strategy = strategy;
  }

  pub fn strategy(&self) -> Strategy {
    self.strategy
  }

  pub fn focus(&mut self, module: IString) {
    self.focus.push(module);
  }

  pub fn pop_focus(&mut self) -> Option<IString> {
    self.focus.pop()
  }

  pub fn current_focus(&self) -> &IString {
    self.focus.current()
  }

  /// Adds a new activation (`spec.md` §4.5: "created when a token reaches a terminal node"). `module` is the
  /// rule's owning module; `specificity` is the rule's pattern count, used only by the simplicity/complexity
  /// strategies.
  pub fn insert(&mut self, module: IString, rule_name: IString, token: Token, salience: i32, specificity: usize) {
    let timetag = self.next_timetag;
    self.next_timetag += 1;
    let activation = Activation { rule_name, token, salience, timetag, random_key: random(), specificity };
    self.buckets.entry(module).or_default().push(activation);
  }

  /// Withdraws the activation for `(rule_name, token)`, if any is present, in any module's bucket (`spec.md`
  /// §4.5: "destroyed when ... the underlying token is retracted").
  pub fn remove(&mut self, rule_name: &str, token: &Token) -> bool {
    for bucket in self.buckets.values_mut() {
      if let Some(position) = bucket.iter().position(|a| a.rule_name.as_ref() == rule_name && &a.token == token) {
        bucket.remove(position);
        return true;
      }
    }
    false
  }

  fn best_index(&self, bucket: &[Activation]) -> Option<usize> {
    let mut best: Option<usize> = None;
    for (index, activation) in bucket.iter().enumerate() {
      best = Some(match best {
        None => index,
        Some(current_best) => {
          let current = &bucket[current_best];
          let salience_order = activation.salience.cmp(&current.salience).reverse();
          let order = salience_order.then_with(|| self.strategy.compare(activation, current));
          if order == std::cmp::Ordering::Less { index } else { current_best }
        }
      });
    }
    best
  }

  /// Pops the highest-priority activation, walking the focus stack down to the first module with a non-empty
  /// bucket (`spec.md` §4.5).
  pub fn pop_highest(&mut self) -> Option<Activation> {
    loop {
      let module = self.focus.current().clone();
      let has_work = self.buckets.get(&module).map(|bucket| !bucket.is_empty()).unwrap_or(false);
      if has_work {
        let bucket = self.buckets.get_mut(&module).expect("checked non-empty above");
        let index = self.best_index(bucket).expect("non-empty bucket has a best activation");
        return Some(bucket.remove(index));
      }
      if self.focus.pop().is_none() {
        return None;
      }
    }
  }

  /// Diagnostic listing of every pending activation across every module (`spec.md` §6's `list_activations()`),
  /// not necessarily in firing order.
  pub fn list_activations(&self) -> Vec<&Activation> {
    self.buckets.values().flatten().collect()
  }

  /// Withdraws every pending activation for `rule_name`, in every module's bucket — used when a rule is
  /// undefined out from under the agenda (`spec.md` §4.5's activation lifecycle: destroyed when its rule no
  /// longer exists, same as when its token is retracted).
  pub fn remove_all_for_rule(&mut self, rule_name: &str) {
    for bucket in self.buckets.values_mut() {
      bucket.retain(|activation| activation.rule_name.as_ref() != rule_name);
    }
  }

  pub fn is_empty(&self) -> bool {
    self.buckets.values().all(|bucket| bucket.is_empty())
  }

  pub fn clear(&mut self) {
    self.buckets.clear();
    self.focus.reset();
    self.next_timetag = 0;
  }
}

impl Default for Agenda {
  fn default() -> Self {
    Self::new(Strategy::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::facts::FactIndex;

  #[test]
  fn s4_salience_orders_before_strategy() {
    let mut agenda = Agenda::new(Strategy::Depth);
    agenda.insert(IString::from(DEFAULT_MODULE), IString::from("L"), Token::single(FactIndex(1)), 0, 1);
    agenda.insert(IString::from(DEFAULT_MODULE), IString::from("H"), Token::single(FactIndex(2)), 100, 1);

    let first = agenda.pop_highest().unwrap();
    assert_eq!(first.rule_name.as_ref(), "H");
    let second = agenda.pop_highest().unwrap();
    assert_eq!(second.rule_name.as_ref(), "L");
    assert!(agenda.pop_highest().is_none());
  }

  #[test]
  fn at_most_one_activation_per_rule_and_token() {
    let mut agenda = Agenda::new(Strategy::Depth);
    let token = Token::single(FactIndex(1));
    agenda.insert(IString::from(DEFAULT_MODULE), IString::from("R"), token.clone(), 0, 1);
    assert!(agenda.remove("R", &token));
    assert!(!agenda.remove("R", &token));
    assert!(agenda.is_empty());
  }
}
