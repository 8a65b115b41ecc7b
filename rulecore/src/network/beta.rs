/*!

Beta side of the match network (`spec.md` §4.4.2): tokens, fixed-size tuples of fact handles representing a
partial match up through some join.

*/

use rulecore_abs::{smallvec, SmallVec};

use crate::facts::FactIndex;

/// A partial match: the ordered fact bound to each pattern seen so far in a rule's LHS. `smallvec` avoids a heap
/// allocation for the common case of a handful of patterns.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub struct Token {
  pub facts: SmallVec<[FactIndex; 4]>,
}

impl Token {
  pub fn single(fact: FactIndex) -> Self {
    Token { facts: smallvec![fact] }
  }

  pub fn extended(&self, fact: FactIndex) -> Self {
    let mut facts = self.facts.clone();
    facts.push(fact);
    Token { facts }
  }

  pub fn contains(&self, fact: FactIndex) -> bool {
    self.facts.contains(&fact)
  }

  pub fn len(&self) -> usize {
    self.facts.len()
  }

  pub fn is_empty(&self) -> bool {
    self.facts.is_empty()
  }
}
