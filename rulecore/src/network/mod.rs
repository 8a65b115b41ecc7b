/*!

The incremental match network (`spec.md` §4.4): maintains, across asserts and retracts, the set of currently
matched rule instantiations. This is specified by invariants and event contracts rather than by a fixed graph
layout: assert/retract deliver "right-activation"/"right-retraction" events to each rule's chain of join nodes;
within a join, the new fact or upstream token is compared against the opposite side and a pass/fail propagates
one join further ("left-activation"/"left-retraction") until it reaches the terminal join, at which point it
becomes (or withdraws) an agenda activation.

Per rule, patterns compile to a flat `Vec<JoinNode>` rather than a shared DAG — the "hashed alpha memories" and
cross-rule node-sharing optimizations `spec.md` §4.4.1/§9 call out as open/optional are not implemented; every
rule owns its own alpha nodes. The contract (the set of tokens present) is unaffected; see `DESIGN.md`.

Propagation is processed breadth-first per rule via an explicit work queue rather than by recursive calls, so a
long join chain cannot blow the native call stack (`spec.md` §9: "careful structuring ... to be safe with a
bounded stack"). `spec.md` §4.4.5 requires a single assert/retract's consequences to fully resolve, depth-first in
pattern order, before any other external event — the queue is drained completely, one rule at a time, before
`assert_fact`/`retract_fact` returns, which satisfies that ordering without needing actual call-stack recursion.

*/

mod alpha;
mod beta;
mod join;

pub use alpha::AlphaNode;
pub use beta::Token;
pub use join::{JoinBindingView, JoinKind, JoinNode};

use std::collections::{HashMap, VecDeque};

use rulecore_abs::IString;

use crate::error::{EngineError, EngineResult};
use crate::expr::{Environment, ExprNode};
use crate::facts::{FactIndex, FactStore};

/// One pattern of a rule's LHS, as handed to [`MatchNetwork::define_rule`] by the (out-of-scope) surface compiler.
pub struct PatternSpec {
  pub kind: PatternKind,
  /// The template this pattern matches against. Required for `Positive`/`Negated`, absent for `TestOnly`.
  pub template_name: Option<IString>,
  /// Intra-pattern tests (constant equality, type predicate, intra-pattern variable consistency) evaluated
  /// against one candidate fact in isolation (`spec.md` §4.4.1).
  pub alpha_tests: Vec<ExprNode>,
  /// The join test against the tuple of patterns bound so far plus (for `Positive`/`Negated`) this pattern's
  /// candidate fact. Absent only for the first, unconditioned `Positive` pattern.
  pub join_test: Option<ExprNode>,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PatternKind {
  Positive,
  Negated,
  TestOnly,
}

pub struct CompiledRule {
  pub name    : IString,
  pub salience: i32,
  pub joins   : Vec<JoinNode>,
  /// Maps an RHS `LocalVar` slot to `(pattern_index, slot_index)` in the firing token's fact set — the
  /// compiler-assigned correspondence between a pattern variable and the `LocalVar` slot it was given
  /// (`spec.md` §3: "Variables in expressions resolve at parse time to `(frame, slot)` pairs"). The engine uses
  /// this to build an activation's initial `ActivationFrame.locals` before evaluating `rhs`.
  pub variable_bindings: Vec<(usize, usize)>,
  pub rhs     : ExprNode,
}

/// An activation created or withdrawn by the network in response to one assert/retract; the caller (the agenda)
/// turns `ActivationCreated` into a new agenda entry with a fresh timetag and `ActivationRemoved` into the
/// removal of the matching one (`spec.md` §4.5: "at most one activation exists per (rule, token) pair").
#[derive(Clone, Debug)]
pub enum NetworkEvent {
  ActivationCreated { rule_name: IString, token: Token },
  ActivationRemoved { rule_name: IString, token: Token },
}

enum PendingEvent {
  Right { join_index: usize, fact: FactIndex, retracting: bool },
  Left { join_index: usize, token: Token, adding: bool },
}

pub struct MatchNetwork {
  alpha_nodes: Vec<AlphaNode>,
  /// Alpha node index -> the `(rule, join_index)` pairs that read it as a right input.
  subscribers: HashMap<usize, Vec<(IString, usize)>>,
  rules: HashMap<IString, CompiledRule>,
}

impl MatchNetwork {
  pub fn new() -> Self {
    MatchNetwork { alpha_nodes: Vec::new(), subscribers: HashMap::new(), rules: HashMap::new() }
  }

  pub fn rule(&self, name: &str) -> Option<&CompiledRule> {
    self.rules.get(name)
  }

  pub fn rule_names(&self) -> impl Iterator<Item = &IString> {
    self.rules.keys()
  }

  /// Exposes one rule's alpha nodes by arena index, for bsave to recover each join's `(template_name,
  /// alpha_tests)` without needing its own copy of the network's internals.
  pub fn alpha_node(&self, index: usize) -> &AlphaNode {
    &self.alpha_nodes[index]
  }

  fn push_alpha(&mut self, template_name: IString, tests: Vec<ExprNode>) -> usize {
    let index = self.alpha_nodes.len();
    self.alpha_nodes.push(AlphaNode::new(template_name, tests));
    index
  }

  fn subscribe(&mut self, alpha_index: usize, rule_name: IString, join_index: usize) {
    self.subscribers.entry(alpha_index).or_default().push((rule_name, join_index));
  }

  pub fn define_rule(
    &mut self,
    name: IString,
    salience: i32,
    patterns: Vec<PatternSpec>,
    variable_bindings: Vec<(usize, usize)>,
    rhs: ExprNode,
  ) -> EngineResult<()> {
    if self.rules.contains_key(&name) {
      return Err(EngineError::DuplicateConstructError(name.to_string()));
    }
    if patterns.is_empty() {
      return Err(EngineError::internal("a rule must have at least one pattern"));
    }

    let mut joins = Vec::with_capacity(patterns.len());
    for (position, spec) in patterns.into_iter().enumerate() {
      match spec.kind {
        PatternKind::Positive => {
          let template = spec.template_name.ok_or_else(|| {
            EngineError::internal("a positive pattern requires a template name")
          })?;
          let alpha_index = self.push_alpha(template, spec.alpha_tests);
          self.subscribe(alpha_index, name.clone(), position);
          joins.push(if position == 0 {
            JoinNode::initial(alpha_index)
          } else {
            JoinNode::positive(alpha_index, spec.join_test)
          });
        }
        PatternKind::Negated => {
          if position == 0 {
            return Err(EngineError::internal("a rule's first pattern cannot be negated"));
          }
          let template = spec.template_name.ok_or_else(|| {
            EngineError::internal("a negated pattern requires a template name")
          })?;
          let alpha_index = self.push_alpha(template, spec.alpha_tests);
          self.subscribe(alpha_index, name.clone(), position);
          joins.push(JoinNode::negated(alpha_index, spec.join_test));
        }
        PatternKind::TestOnly => {
          if position == 0 {
            return Err(EngineError::internal("a rule's first pattern cannot be test-only"));
          }
          let test = spec.join_test.ok_or_else(|| {
            EngineError::internal("a test-only pattern requires a test expression")
          })?;
          joins.push(JoinNode::test_only(test));
        }
      }
    }

    self.rules.insert(name.clone(), CompiledRule { name, salience, joins, variable_bindings, rhs });
    Ok(())
  }

  pub fn undefine_rule(&mut self, name: &str) -> EngineResult<()> {
    self.rules.remove(name).ok_or_else(|| EngineError::internal(format!("no such rule `{}`", name)))?;
    for subscribers in self.subscribers.values_mut() {
      subscribers.retain(|(rule_name, _)| rule_name.as_ref() != name);
    }
    Ok(())
  }

  pub fn clear(&mut self) {
    self.alpha_nodes.clear();
    self.subscribers.clear();
    self.rules.clear();
  }

  /// Wipes every alpha and join memory in place, keeping rule/pattern definitions intact — `reset()`
  /// (`SPEC_FULL.md` §5) clears working memory and the agenda but not construct definitions.
  pub fn reset_memories(&mut self) {
    for node in &mut self.alpha_nodes {
      node.clear_memory();
    }
    for rule in self.rules.values_mut() {
      for join in &mut rule.joins {
        join.clear_memory();
      }
    }
  }

  /// Delivers a newly-asserted fact to every alpha node for its template (`spec.md` §4.4.1/§4.4.4).
  pub fn assert_fact(
    &mut self,
    fact_index: FactIndex,
    template_name: &str,
    store: &FactStore,
    env: &mut Environment,
  ) -> Vec<NetworkEvent> {
    let mut events = Vec::new();
    let Some(fact) = store.find_by_index(fact_index) else { return events };

    let matching: Vec<usize> = self
        .alpha_nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.template_name.as_ref() == template_name)
        .map(|(index, _)| index)
        .collect();

    for alpha_index in matching {
      if !self.alpha_nodes[alpha_index].accepts(fact, env) {
        continue;
      }
      self.alpha_nodes[alpha_index].insert(fact_index);
      let subscribers = self.subscribers.get(&alpha_index).cloned().unwrap_or_default();
      for (rule_name, join_index) in subscribers {
        self.process_rule(
          &rule_name,
          PendingEvent::Right { join_index, fact: fact_index, retracting: false },
          store,
          env,
          &mut events,
        );
      }
    }
    events
  }

  /// Withdraws a retracted fact from every alpha node that held it, propagating retraction through each
  /// dependent join chain before physically removing it from the alpha memory (`spec.md` §4.4.1/§4.4.4).
  pub fn retract_fact(
    &mut self,
    fact_index: FactIndex,
    template_name: &str,
    store: &FactStore,
    env: &mut Environment,
  ) -> Vec<NetworkEvent> {
    let mut events = Vec::new();
    let holding: Vec<usize> = self
        .alpha_nodes
        .iter()
        .enumerate()
        .filter(|(_, node)| node.template_name.as_ref() == template_name && node.memory.contains(&fact_index))
        .map(|(index, _)| index)
        .collect();

    for alpha_index in holding {
      let subscribers = self.subscribers.get(&alpha_index).cloned().unwrap_or_default();
      for (rule_name, join_index) in subscribers {
        self.process_rule(
          &rule_name,
          PendingEvent::Right { join_index, fact: fact_index, retracting: true },
          store,
          env,
          &mut events,
        );
      }
      self.alpha_nodes[alpha_index].remove(fact_index);
    }
    events
  }

  fn process_rule(
    &mut self,
    rule_name: &IString,
    seed: PendingEvent,
    store: &FactStore,
    env: &mut Environment,
    out_events: &mut Vec<NetworkEvent>,
  ) {
    let mut queue = VecDeque::new();
    queue.push_back(seed);

    while let Some(event) = queue.pop_front() {
      match event {
        PendingEvent::Right { join_index, fact, retracting } => {
          self.handle_right(rule_name, join_index, fact, retracting, store, env, &mut queue, out_events);
        }
        PendingEvent::Left { join_index, token, adding } => {
          self.handle_left(rule_name, join_index, token, adding, store, env, &mut queue, out_events);
        }
      }
    }
  }

  fn emit_or_queue(
    &self,
    rule_name: &IString,
    join_index: usize,
    last_index: usize,
    token: Token,
    adding: bool,
    queue: &mut VecDeque<PendingEvent>,
    out_events: &mut Vec<NetworkEvent>,
  ) {
    if join_index == last_index {
      out_events.push(if adding {
        NetworkEvent::ActivationCreated { rule_name: rule_name.clone(), token }
      } else {
        NetworkEvent::ActivationRemoved { rule_name: rule_name.clone(), token }
      });
    } else {
      queue.push_back(PendingEvent::Left { join_index: join_index + 1, token, adding });
    }
  }

  fn handle_right(
    &mut self,
    rule_name: &IString,
    join_index: usize,
    fact: FactIndex,
    retracting: bool,
    store: &FactStore,
    env: &mut Environment,
    queue: &mut VecDeque<PendingEvent>,
    out_events: &mut Vec<NetworkEvent>,
  ) {
    let last_index = self.rules[rule_name].joins.len() - 1;
    let kind = self.rules[rule_name].joins[join_index].kind;

    match kind {
      JoinKind::Initial => {
        let token = Token::single(fact);
        let rule = self.rules.get_mut(rule_name).expect("rule exists");
        if !retracting {
          rule.joins[join_index].memory.push(token.clone());
          self.emit_or_queue(rule_name, join_index, last_index, token, true, queue, out_events);
        } else if rule.joins[join_index].remove_token(&token) {
          self.emit_or_queue(rule_name, join_index, last_index, token, false, queue, out_events);
        }
      }

      JoinKind::Positive => {
        let left_tokens = self.rules[rule_name].joins[join_index - 1].memory.clone();
        for left in left_tokens {
          if !retracting {
            let rule = self.rules.get_mut(rule_name).expect("rule exists");
            if rule.joins[join_index].test_passes(&left, Some(fact), store, env) {
              let new_token = left.extended(fact);
              rule.joins[join_index].memory.push(new_token.clone());
              self.emit_or_queue(rule_name, join_index, last_index, new_token, true, queue, out_events);
            }
          } else {
            let candidate = left.extended(fact);
            let rule = self.rules.get_mut(rule_name).expect("rule exists");
            if rule.joins[join_index].remove_token(&candidate) {
              self.emit_or_queue(rule_name, join_index, last_index, candidate, false, queue, out_events);
            }
          }
        }
      }

      JoinKind::Negated => {
        let left_tokens = self.rules[rule_name].joins[join_index - 1].memory.clone();
        for left in left_tokens {
          let rule = self.rules.get_mut(rule_name).expect("rule exists");
          if !rule.joins[join_index].test_passes(&left, Some(fact), store, env) {
            continue;
          }
          if !retracting {
            let became_one = {
              let counter = rule.joins[join_index].negated_counters.entry(left.clone()).or_insert(0);
              *counter += 1;
              *counter == 1
            };
            if became_one && rule.joins[join_index].remove_token(&left) {
              self.emit_or_queue(rule_name, join_index, last_index, left, false, queue, out_events);
            }
          } else {
            let became_zero = match rule.joins[join_index].negated_counters.get_mut(&left) {
              Some(counter) if *counter > 0 => {
                *counter -= 1;
                *counter == 0
              }
              _ => false,
            };
            if became_zero {
              rule.joins[join_index].memory.push(left.clone());
              self.emit_or_queue(rule_name, join_index, last_index, left, true, queue, out_events);
            }
          }
        }
      }

      JoinKind::TestOnly => {
        debug_assert!(false, "test-only joins are never subscribed to an alpha node");
      }
    }
  }

  fn handle_left(
    &mut self,
    rule_name: &IString,
    join_index: usize,
    token: Token,
    adding: bool,
    store: &FactStore,
    env: &mut Environment,
    queue: &mut VecDeque<PendingEvent>,
    out_events: &mut Vec<NetworkEvent>,
  ) {
    let last_index = self.rules[rule_name].joins.len() - 1;
    let kind = self.rules[rule_name].joins[join_index].kind;
    let alpha_index = self.rules[rule_name].joins[join_index].alpha_node;

    match kind {
      JoinKind::Initial => {
        debug_assert!(false, "the initial join never receives a left-activation");
      }

      JoinKind::Positive => {
        let alpha_index = alpha_index.expect("positive join has an alpha node");
        if adding {
          let facts: Vec<FactIndex> = self.alpha_nodes[alpha_index].iter().collect();
          let rule = self.rules.get_mut(rule_name).expect("rule exists");
          for fact in facts {
            if rule.joins[join_index].test_passes(&token, Some(fact), store, env) {
              let new_token = token.extended(fact);
              rule.joins[join_index].memory.push(new_token.clone());
              self.emit_or_queue(rule_name, join_index, last_index, new_token, true, queue, out_events);
            }
          }
        } else {
          let rule = self.rules.get_mut(rule_name).expect("rule exists");
          let to_remove: Vec<Token> = rule.joins[join_index]
              .memory
              .iter()
              .filter(|candidate| {
                candidate.len() == token.len() + 1 && candidate.facts[..token.len()] == token.facts[..]
              })
              .cloned()
              .collect();
          for candidate in to_remove {
            rule.joins[join_index].remove_token(&candidate);
            self.emit_or_queue(rule_name, join_index, last_index, candidate, false, queue, out_events);
          }
        }
      }

      JoinKind::Negated => {
        let alpha_index = alpha_index.expect("negated join has an alpha node");
        if adding {
          let facts: Vec<FactIndex> = self.alpha_nodes[alpha_index].iter().collect();
          let rule = self.rules.get_mut(rule_name).expect("rule exists");
          let count = facts
              .iter()
              .filter(|&&fact| rule.joins[join_index].test_passes(&token, Some(fact), store, env))
              .count() as u32;
          rule.joins[join_index].negated_counters.insert(token.clone(), count);
          if count == 0 {
            rule.joins[join_index].memory.push(token.clone());
            self.emit_or_queue(rule_name, join_index, last_index, token, true, queue, out_events);
          }
        } else {
          let rule = self.rules.get_mut(rule_name).expect("rule exists");
          rule.joins[join_index].negated_counters.remove(&token);
          if rule.joins[join_index].remove_token(&token) {
            self.emit_or_queue(rule_name, join_index, last_index, token, false, queue, out_events);
          }
        }
      }

      JoinKind::TestOnly => {
        let rule = self.rules.get_mut(rule_name).expect("rule exists");
        if adding {
          if rule.joins[join_index].test_passes(&token, None, store, env) {
            rule.joins[join_index].memory.push(token.clone());
            self.emit_or_queue(rule_name, join_index, last_index, token, true, queue, out_events);
          }
        } else if rule.joins[join_index].remove_token(&token) {
          self.emit_or_queue(rule_name, join_index, last_index, token, false, queue, out_events);
        }
      }
    }
  }
}

impl Default for MatchNetwork {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use std::rc::Rc;

  use rulecore_abs::RcCell;

  use super::*;
  use crate::atoms::Interner;
  use crate::expr::ExprNode;
  use crate::facts::{SlotDescriptor, Template};
  use crate::value::Value;

  fn env_with(interner: RcCell<Interner>, store: RcCell<FactStore>) -> Environment {
    Environment::new(interner, store, RcCell::new(HashMap::new()), 512)
  }

  fn point_template() -> Rc<Template> {
    Rc::new(Template::new(
      IString::from("point"),
      vec![SlotDescriptor::new(IString::from("x"), false), SlotDescriptor::new(IString::from("y"), false)],
    ))
  }

  #[test]
  fn single_pattern_rule_activates_and_retracts() {
    let interner = RcCell::new(Interner::new());
    let store = RcCell::new(FactStore::new());
    let mut env = env_with(interner.clone(), store.clone());

    let mut network = MatchNetwork::new();
    network
        .define_rule(
          IString::from("r1"),
          0,
          vec![PatternSpec {
            kind: PatternKind::Positive,
            template_name: Some(IString::from("point")),
            alpha_tests: Vec::new(),
            join_test: None,
          }],
          Vec::new(),
          ExprNode::Progn(Vec::new()),
        )
        .unwrap();

    let template = point_template();
    let x = interner.borrow_mut().intern_integer(1).unwrap();
    let y = interner.borrow_mut().intern_integer(2).unwrap();
    let index = store.borrow_mut().assert_values(template, vec![Value::Atom(x), Value::Atom(y)], false).unwrap();

    let events = network.assert_fact(index, "point", &store.borrow(), &mut env);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], NetworkEvent::ActivationCreated { .. }));

    store.borrow_mut().retract(index).unwrap();
    let events = network.retract_fact(index, "point", &store.borrow(), &mut env);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], NetworkEvent::ActivationRemoved { .. }));
  }

  #[test]
  fn negated_join_suspends_and_resumes() {
    let interner = RcCell::new(Interner::new());
    let store = RcCell::new(FactStore::new());
    let mut env = env_with(interner.clone(), store.clone());

    let a_template = Rc::new(Template::new(
      IString::from("a"),
      vec![SlotDescriptor::new(IString::from("x"), false)],
    ));
    let b_template = Rc::new(Template::new(
      IString::from("b"),
      vec![SlotDescriptor::new(IString::from("x"), false)],
    ));

    let mut network = MatchNetwork::new();
    network
        .define_rule(
          IString::from("r2"),
          0,
          vec![
            PatternSpec {
              kind: PatternKind::Positive,
              template_name: Some(IString::from("a")),
              alpha_tests: Vec::new(),
              join_test: None,
            },
            PatternSpec {
              kind: PatternKind::Negated,
              template_name: Some(IString::from("b")),
              alpha_tests: Vec::new(),
              join_test: None,
            },
          ],
          Vec::new(),
          ExprNode::Progn(Vec::new()),
        )
        .unwrap();

    let one = interner.borrow_mut().intern_integer(1).unwrap();
    let a_index =
        store.borrow_mut().assert_values(a_template, vec![Value::Atom(one)], false).unwrap();
    let events = network.assert_fact(a_index, "a", &store.borrow(), &mut env);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], NetworkEvent::ActivationCreated { .. }));

    let b_index =
        store.borrow_mut().assert_values(b_template, vec![Value::Atom(one)], false).unwrap();
    let events = network.assert_fact(b_index, "b", &store.borrow(), &mut env);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], NetworkEvent::ActivationRemoved { .. }));

    store.borrow_mut().retract(b_index).unwrap();
    let events = network.retract_fact(b_index, "b", &store.borrow(), &mut env);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], NetworkEvent::ActivationCreated { .. }));
  }
}
