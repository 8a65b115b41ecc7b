/*!

An agenda entry (`spec.md` §3/§4.5): `(rule, token, salience, timetag)`. Created when a token reaches a rule's
terminal join, destroyed when the rule fires, the token is retracted, or the agenda is cleared.

*/

use rulecore_abs::IString;

use crate::network::Token;

#[derive(Clone, Debug)]
pub struct Activation {
  pub rule_name: IString,
  pub token    : Token,
  pub salience : i32,
  /// Assigned at creation from a monotonically increasing counter; doubles as insertion order for the
  /// `depth`/`breadth` strategies and as the per-fact recency proxy for `lex`/`mea`.
  pub timetag  : u64,
  /// A stable tiebreak assigned at creation, consulted only by the `random` strategy (`spec.md` §4.5).
  pub random_key: u64,
  /// The rule's pattern count, consulted only by the `simplicity`/`complexity` strategies.
  pub specificity: usize,
}

impl Activation {
  pub fn identity(&self) -> (IString, &Token) {
    (self.rule_name.clone(), &self.token)
  }
}
