/*!

Conflict resolution strategies (`spec.md` §4.5): secondary ordering of activations that share a salience. Primary
ordering is always by `salience` (descending); a [`Strategy`] only decides ties.

*/

use std::cmp::Ordering;

use crate::agenda::activation::Activation;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub enum Strategy {
  #[default]
  Depth,
  Breadth,
  Lex,
  Mea,
  Simplicity,
  Complexity,
  Random,
}

impl Strategy {
  /// Orders two equal-salience activations; `Less` means `a` fires first.
  pub fn compare(self, a: &Activation, b: &Activation) -> Ordering {
    match self {
      Strategy::Depth => b.timetag.cmp(&a.timetag),
      Strategy::Breadth => a.timetag.cmp(&b.timetag),
      Strategy::Lex => Self::compare_sorted_facts(a, b),
      Strategy::Mea => Self::compare_first_fact_then_sorted(a, b),
      Strategy::Simplicity => a.specificity.cmp(&b.specificity).then_with(|| b.timetag.cmp(&a.timetag)),
      Strategy::Complexity => b.specificity.cmp(&a.specificity).then_with(|| b.timetag.cmp(&a.timetag)),
      Strategy::Random => a.random_key.cmp(&b.random_key),
    }
  }

  fn sorted_facts_desc(activation: &Activation) -> Vec<u64> {
    let mut facts: Vec<u64> = activation.token.facts.iter().map(|index| index.0).collect();
    facts.sort_unstable_by(|x, y| y.cmp(x));
    facts
  }

  fn compare_sorted_facts(a: &Activation, b: &Activation) -> Ordering {
    Self::sorted_facts_desc(a).cmp(&Self::sorted_facts_desc(b)).reverse()
  }

  fn compare_first_fact_then_sorted(a: &Activation, b: &Activation) -> Ordering {
    let first_a = a.token.facts.first().map(|index| index.0).unwrap_or(0);
    let first_b = b.token.facts.first().map(|index| index.0).unwrap_or(0);
    first_b.cmp(&first_a).then_with(|| Self::compare_sorted_facts(a, b))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rulecore_abs::IString;
  use crate::facts::FactIndex;
  use crate::network::Token;

  fn activation(timetag: u64, facts: &[u64]) -> Activation {
    Activation {
      rule_name: IString::from("r"),
      token: Token { facts: facts.iter().map(|&f| FactIndex(f)).collect() },
      salience: 0,
      timetag,
      random_key: timetag,
      specificity: facts.len(),
    }
  }

  #[test]
  fn depth_prefers_more_recent_timetag() {
    let older = activation(1, &[1]);
    let newer = activation(2, &[1]);
    assert_eq!(Strategy::Depth.compare(&newer, &older), Ordering::Less);
  }

  #[test]
  fn breadth_prefers_earlier_timetag() {
    let older = activation(1, &[1]);
    let newer = activation(2, &[1]);
    assert_eq!(Strategy::Breadth.compare(&older, &newer), Ordering::Less);
  }
}
