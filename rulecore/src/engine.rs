/*!

The `Engine` facade: wires the atom interner, fact store, match network, agenda, and module registry together
behind the public operations of `spec.md` §6. This is the only module that depends on all of the others —
everywhere else follows the leaves-first order atoms → expr → facts → network → agenda.

*/

use std::cell::Ref;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

use rulecore_abs::{warning, IString, RcCell};

use crate::agenda::{Activation, Agenda, Strategy, DEFAULT_MODULE};
use crate::atoms::{Atom, Interner};
use crate::bsave::{self, FunctionRegistry};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::expr::{ActivationFrame, Environment, Evaluator, ExprNode};
use crate::facts::{FactIndex, FactStore, SlotDescriptor, Template};
use crate::module::ModuleRegistry;
use crate::network::{MatchNetwork, NetworkEvent, PatternSpec};
use crate::value::Value;

pub struct Engine {
  interner: RcCell<Interner>,
  facts   : RcCell<FactStore>,
  globals : RcCell<HashMap<IString, Value>>,
  templates: HashMap<IString, Rc<Template>>,
  network : MatchNetwork,
  agenda  : Agenda,
  modules : ModuleRegistry,
  /// The module each live rule belongs to, for tagging a new activation with its owning module's bucket
  /// (`spec.md` §4.5's focus-partitioned agenda).
  rule_modules: HashMap<IString, IString>,
  config  : EngineConfig,
  /// Named, ordered fact lists asserted together by `reset()` (`SPEC_FULL.md` §5's `deffacts`), in definition
  /// order. Each entry is one deffacts construct's own ordered `(template, slot_values)` list.
  deffacts: Vec<(IString, Vec<(IString, Vec<Value>)>)>,
  /// Set once `bload` succeeds; `bsave` refuses while set (`spec.md` §4.6: "a binary load is exclusive with
  /// further bsave").
  loaded_from_binary: bool,
  halted  : bool,
}

impl Engine {
  pub fn new(config: EngineConfig) -> Self {
    let strategy = config.strategy;
    Engine {
      interner          : RcCell::new(Interner::with_capacity(config.max_atoms_per_kind)),
      facts             : RcCell::new(FactStore::new()),
      globals           : RcCell::new(HashMap::new()),
      templates         : HashMap::new(),
      network           : MatchNetwork::new(),
      agenda            : Agenda::new(strategy),
      modules           : ModuleRegistry::new(),
      rule_modules      : HashMap::new(),
      config,
      deffacts          : Vec::new(),
      loaded_from_binary: false,
      halted            : false,
    }
  }

  fn environment(&self) -> Environment {
    Environment::new(
      self.interner.clone(),
      self.facts.clone(),
      self.globals.clone(),
      self.config.max_activation_recursion_depth,
    )
  }

  // region Atoms (spec.md §6: "intern(kind, bytes) -> atom, retain/release, begin_frame/end_frame")
  pub fn intern_symbol(&mut self, text: &str) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_symbol(text)
  }

  pub fn intern_string(&mut self, text: &str) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_string(text)
  }

  pub fn intern_instance_name(&mut self, text: &str) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_instance_name(text)
  }

  pub fn intern_integer(&mut self, value: i64) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_integer(value)
  }

  pub fn intern_float(&mut self, value: f64) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_float(value)
  }

  pub fn intern_bitmap(&mut self, bytes: &[u8]) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_bitmap(bytes)
  }

  pub fn intern_external_address(&mut self, pointer: usize, type_tag: &str) -> EngineResult<Atom> {
    self.interner.borrow_mut().intern_external_address(pointer, type_tag)
  }

  pub fn retain(&mut self, atom: Atom) {
    self.interner.borrow_mut().retain(atom);
  }

  pub fn release(&mut self, atom: Atom) {
    self.interner.borrow_mut().release(atom);
  }

  pub fn begin_frame(&mut self) {
    self.interner.borrow_mut().push_frame();
  }

  pub fn end_frame(&mut self) {
    self.interner.borrow_mut().pop_frame();
  }

  pub fn interner(&self) -> Ref<'_, Interner> {
    self.interner.borrow()
  }
  // endregion

  // region Globals
  pub fn set_global(&mut self, name: IString, value: Value) {
    self.globals.borrow_mut().insert(name, value);
  }

  pub fn global(&self, name: &str) -> Option<Value> {
    self.globals.borrow().get(name).cloned()
  }
  // endregion

  // region Templates (spec.md §6: "define_template(name, slots), find_template(name)")
  pub fn define_template(&mut self, name: IString, slots: Vec<SlotDescriptor>) -> EngineResult<Rc<Template>> {
    if self.templates.contains_key(&name) {
      return Err(EngineError::DuplicateConstructError(name.to_string()));
    }
    let template = Rc::new(Template::new(name.clone(), slots));
    self.templates.insert(name.clone(), template.clone());
    let module = self.modules.current().clone();
    self.modules.get_or_create_mut(&module).templates.insert(name);
    Ok(template)
  }

  pub fn find_template(&self, name: &str) -> Option<Rc<Template>> {
    self.templates.get(name).cloned()
  }

  /// Looks up `name`, falling back to an auto-constructed implied template for an undeclared relation name
  /// (`spec.md` §4.3, last paragraph).
  pub fn find_or_create_implied_template(&mut self, name: IString) -> Rc<Template> {
    if let Some(template) = self.templates.get(&name) {
      return template.clone();
    }
    let template = Rc::new(Template::implied(name.clone()));
    self.templates.insert(name.clone(), template.clone());
    let module = self.modules.current().clone();
    self.modules.get_or_create_mut(&module).templates.insert(name);
    template
  }
  // endregion

  // region Facts (spec.md §6: "assert(template, slot_bindings), retract(fact), find_by_index(u64), iteration")
  pub fn facts(&self) -> Ref<'_, FactStore> {
    self.facts.borrow()
  }

  pub fn assert(&mut self, template_name: &str, slot_values: Vec<Value>) -> EngineResult<FactIndex> {
    let template = self.find_template(template_name).ok_or_else(|| {
      EngineError::StaleReferenceError(format!("no such template `{}`", template_name))
    })?;
    let index = self.facts.borrow_mut().assert_values(template, slot_values, self.config.fact_duplication)?;
    self.deliver_assert(index, template_name);
    Ok(index)
  }

  fn deliver_assert(&mut self, index: FactIndex, template_name: &str) {
    let mut env = self.environment();
    let events = {
      let facts = self.facts.borrow();
      self.network.assert_fact(index, template_name, &facts, &mut env)
    };
    self.apply_events(events);
  }

  pub fn retract(&mut self, index: FactIndex) -> EngineResult<()> {
    let template_name = {
      let facts = self.facts.borrow();
      let fact = facts.find_by_index(index).ok_or_else(|| {
        EngineError::StaleReferenceError(format!("fact {} does not exist", index.0))
      })?;
      fact.template.name.clone()
    };

    self.facts.borrow_mut().retract(index)?;

    let mut env = self.environment();
    let events = {
      let facts = self.facts.borrow();
      self.network.retract_fact(index, &template_name, &facts, &mut env)
    };
    self.apply_events(events);

    // Propagation above fully resolves, depth-first, before this call returns (`spec.md` §4.4.5), so no token
    // still references the fact: safe to reclaim it now rather than waiting for a separate sweep.
    self.facts.borrow_mut().finalize_retraction(index);
    Ok(())
  }

  fn apply_events(&mut self, events: Vec<NetworkEvent>) {
    for event in events {
      match event {
        NetworkEvent::ActivationCreated { rule_name, token } => {
          let (salience, specificity) = match self.network.rule(&rule_name) {
            Some(rule) => (rule.salience, rule.joins.len()),
            None => (0, token.len()),
          };
          let module = self.rule_modules.get(&rule_name).cloned().unwrap_or_else(|| IString::from(DEFAULT_MODULE));
          self.agenda.insert(module, rule_name, token, salience, specificity);
        }
        NetworkEvent::ActivationRemoved { rule_name, token } => {
          self.agenda.remove(rule_name.as_ref(), &token);
        }
      }
    }
  }
  // endregion

  // region Rules (spec.md §6: "define_rule(name, lhs_ast, rhs_ast, salience), undefine_rule(name)")
  pub fn define_rule(
    &mut self,
    name: IString,
    salience: i32,
    patterns: Vec<PatternSpec>,
    variable_bindings: Vec<(usize, usize)>,
    rhs: ExprNode,
  ) -> EngineResult<()> {
    self.network.define_rule(name.clone(), salience, patterns, variable_bindings, rhs)?;
    let module = self.modules.current().clone();
    self.modules.get_or_create_mut(&module).rules.insert(name.clone());
    self.rule_modules.insert(name, module);
    Ok(())
  }

  pub fn undefine_rule(&mut self, name: &str) -> EngineResult<()> {
    self.network.undefine_rule(name)?;
    self.agenda.remove_all_for_rule(name);
    self.rule_modules.remove(name);
    Ok(())
  }
  // endregion

  // region Deffacts (`SPEC_FULL.md` §5: a named, ordered fact list asserted together by `reset()`)
  pub fn define_deffacts(&mut self, name: IString, facts: Vec<(IString, Vec<Value>)>) -> EngineResult<()> {
    if self.deffacts.iter().any(|(existing, _)| *existing == name) {
      return Err(EngineError::DuplicateConstructError(name.to_string()));
    }
    self.deffacts.push((name, facts));
    Ok(())
  }
  // endregion

  // region Execution (spec.md §6: "run(n), halt(), focus(module), set_strategy(strategy)")
  /// Pops and fires activations in priority order until the agenda empties, `halt` is signalled, or `n`
  /// firings have happened (`n < 0` means unbounded), per `spec.md` §4.5's execution cycle.
  pub fn run(&mut self, n: i64) -> EngineResult<u64> {
    self.halted = false;
    let mut fired: u64 = 0;
    loop {
      if self.halted || (n >= 0 && fired as i64 >= n) {
        break;
      }
      let Some(activation) = self.agenda.pop_highest() else { break };
      self.fire(activation)?;
      fired += 1;
    }
    Ok(fired)
  }

  fn fire(&mut self, activation: Activation) -> EngineResult<()> {
    let rule = self.network.rule(&activation.rule_name).ok_or_else(|| {
      EngineError::internal(format!("activation references undefined rule `{}`", activation.rule_name))
    })?;
    let variable_bindings = rule.variable_bindings.clone();
    let rhs = rule.rhs.clone();

    let mut locals = Vec::with_capacity(variable_bindings.len());
    {
      let facts = self.facts.borrow();
      for (pattern_index, slot_index) in variable_bindings {
        let fact_index = activation.token.facts.get(pattern_index).copied().ok_or_else(|| {
          EngineError::internal("variable binding references a pattern index outside the firing token")
        })?;
        let value = facts
            .find_by_index(fact_index)
            .and_then(|fact| fact.slot_values.get(slot_index).cloned())
            .ok_or_else(|| EngineError::internal("variable binding references a missing fact or slot"))?;
        locals.push(value);
      }
    }
    let fact_set = activation.token.facts.iter().copied().collect();

    let mut env = self.environment();
    env.push_frame(ActivationFrame::new(locals, fact_set));
    Self::fire_rhs(&rhs, &mut env);
    if env.has_error() {
      warning!(rule = %activation.rule_name, "rule fired with an unhandled evaluation error");
      env.clear_errors();
    }
    if env.halt_execution {
      self.halted = true;
    }
    env.pop_frame();
    Ok(())
  }

  /// Evaluates a rule's RHS, stopping at a top-level `return`/`break` statement instead of continuing to later
  /// statements in the same `progn` (`crate::expr::eval`: "Return/Break are propagated by the RHS driver").
  fn fire_rhs(rhs: &ExprNode, env: &mut Environment) {
    match rhs {
      ExprNode::Progn(statements) => {
        for statement in statements {
          if env.has_error() || env.halt_execution {
            break;
          }
          let stops_here = matches!(statement, ExprNode::Return(_) | ExprNode::Break);
          Evaluator::eval(statement, env);
          if stops_here {
            break;
          }
        }
      }
      other => {
        Evaluator::eval(other, env);
      }
    }
  }

  pub fn halt(&mut self) {
    self.halted = true;
  }

  pub fn focus(&mut self, module: IString) {
    self.agenda.focus(module);
  }

  pub fn pop_focus(&mut self) -> Option<IString> {
    self.agenda.pop_focus()
  }

  pub fn set_current_module(&mut self, name: IString) {
    self.modules.set_current(name);
  }

  pub fn current_module(&self) -> &IString {
    self.modules.current()
  }

  pub fn set_strategy(&mut self, strategy: Strategy) {
    self.agenda.set_strategy(strategy);
  }

  pub fn strategy(&self) -> Strategy {
    self.agenda.strategy()
  }
  // endregion

  // region Agenda (spec.md §6: "list_activations(), clear()")
  pub fn list_activations(&self) -> Vec<&Activation> {
    self.agenda.list_activations()
  }

  pub fn clear(&mut self) {
    self.agenda.clear();
  }

  /// `SPEC_FULL.md` §5 / the `EnvReset` this mirrors: wipes working memory, the match network's partial matches,
  /// and the agenda, restarts the fact-index counter at 1, then asserts every registered deffacts list's facts in
  /// definition order.
  pub fn reset(&mut self) -> EngineResult<()> {
    self.facts.borrow_mut().clear();
    self.network.reset_memories();
    self.agenda.clear();
    self.halted = false;

    let deffacts = self.deffacts.clone();
    for (_, facts) in deffacts {
      for (template_name, slot_values) in facts {
        self.assert(template_name.as_ref(), slot_values)?;
      }
    }
    Ok(())
  }
  // endregion

  // region Binary save/load (spec.md §6: "bsave(path), bload(path)")
  pub fn bsave(&mut self, path: &Path) -> EngineResult<()> {
    if self.loaded_from_binary {
      return Err(EngineError::internal("bsave is unavailable on an engine populated by bload"));
    }
    let mut interner = self.interner.borrow_mut();
    let facts = self.facts.borrow();
    bsave::save(path, &mut interner, &self.templates, &facts, &self.network)
  }

  /// Adopts a binary image as the engine's new state and rebuilds the agenda by replaying every restored fact,
  /// in ascending (original assertion) order, through the restored network — the image itself carries no
  /// match-network memories or agenda (`crate::bsave`).
  pub fn bload(&mut self, path: &Path, functions: &dyn FunctionRegistry) -> EngineResult<()> {
    let image = bsave::load(path, functions)?;

    self.interner = RcCell::new(image.interner);
    self.templates = image.templates;
    self.facts = RcCell::new(image.facts);
    self.network = image.network;
    self.agenda.clear();
    self.modules.clear();
    self.rule_modules.clear();
    self.loaded_from_binary = true;
    self.halted = false;

    let default_module = IString::from(DEFAULT_MODULE);
    for rule_name in self.network.rule_names().cloned().collect::<Vec<_>>() {
      self.modules.get_or_create_mut(&default_module).rules.insert(rule_name.clone());
      self.rule_modules.insert(rule_name, default_module.clone());
    }

    let mut env = self.environment();
    let restored: Vec<(FactIndex, IString)> = {
      let facts = self.facts.borrow();
      facts.iter_asserted().map(|fact| (fact.index, fact.template.name.clone())).collect()
    };
    for (index, template_name) in restored {
      let events = {
        let facts = self.facts.borrow();
        self.network.assert_fact(index, &template_name, &facts, &mut env)
      };
      self.apply_events(events);
    }
    Ok(())
  }
  // endregion
}

impl Default for Engine {
  fn default() -> Self {
    Self::new(EngineConfig::default())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::facts::SlotConstraint;
  use crate::network::PatternKind;

  fn point_template(engine: &mut Engine) -> Rc<Template> {
    engine
        .define_template(
          IString::from("point"),
          vec![
            SlotDescriptor { name: IString::from("x"), is_multi: false, default: None, constraints: SlotConstraint::default() },
            SlotDescriptor { name: IString::from("y"), is_multi: false, default: None, constraints: SlotConstraint::default() },
          ],
        )
        .unwrap()
  }

  #[test]
  fn s1_duplicate_suppression_via_engine_assert() {
    let mut engine = Engine::default();
    point_template(&mut engine);
    let one = engine.intern_integer(1).unwrap();
    let two = engine.intern_integer(2).unwrap();

    let first = engine.assert("point", vec![Value::Atom(one), Value::Atom(two)]).unwrap();
    let second = engine.assert("point", vec![Value::Atom(one), Value::Atom(two)]).unwrap();
    assert_eq!(first, second);
    assert_eq!(engine.facts().asserted_count(), 1);
  }

  #[test]
  fn s2_join_rule_fires_exactly_once_and_retract_clears_agenda() {
    let mut engine = Engine::default();
    point_template(&mut engine);

    // (point ?x ?y) (point ?x ?z&:(> ?z ?y)) =>
    engine
        .define_rule(
          IString::from("R1"),
          0,
          vec![
            PatternSpec {
              kind: PatternKind::Positive,
              template_name: Some(IString::from("point")),
              alpha_tests: Vec::new(),
              join_test: None,
            },
            PatternSpec {
              kind: PatternKind::Positive,
              template_name: Some(IString::from("point")),
              alpha_tests: Vec::new(),
              join_test: Some(ExprNode::FunctionCall {
                function: Rc::new(crate::expr::FunctionDefinition::new(
                  IString::from(">"),
                  2,
                  Some(2),
                  Box::new(|args, env| {
                    let lhs = args[0].as_atom().map(|a| env.interner.borrow().integer_value(a));
                    let rhs = args[1].as_atom().map(|a| env.interner.borrow().integer_value(a));
                    match (lhs, rhs) {
                      (Some(a), Some(b)) if a > b => Value::Atom(env.interner.borrow().true_atom()),
                      _ => Value::Atom(env.interner.borrow().false_atom()),
                    }
                  }),
                )),
                args: vec![
                  ExprNode::PatternSlot { pattern_index: 1, slot_index: 1 },
                  ExprNode::PatternSlot { pattern_index: 0, slot_index: 1 },
                ],
              }),
            },
          ],
          Vec::new(),
          ExprNode::Progn(Vec::new()),
        )
        .unwrap();

    let seven = engine.intern_integer(7).unwrap();
    let three = engine.intern_integer(3).unwrap();
    let five = engine.intern_integer(5).unwrap();
    let two = engine.intern_integer(2).unwrap();

    let fact1 = engine.assert("point", vec![Value::Atom(seven), Value::Atom(three)]).unwrap();
    let fact2 = engine.assert("point", vec![Value::Atom(seven), Value::Atom(five)]).unwrap();
    let fact3 = engine.assert("point", vec![Value::Atom(seven), Value::Atom(two)]).unwrap();

    // Each pattern gets its own alpha node, and both receive every "point" fact independently, so the
    // terminal join pairs every single-fact token against every alpha-1 fact passing the join test:
    // [fact1,fact2], [fact3,fact1], [fact3,fact2].
    assert_eq!(engine.list_activations().len(), 3);

    engine.retract(fact2).unwrap();

    let remaining = engine.list_activations();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].token.facts.iter().copied().collect::<Vec<_>>(), vec![fact3, fact1]);
  }

  #[test]
  fn bsave_bload_round_trips_facts_at_original_indices() {
    let dir = std::env::temp_dir().join(format!("rulecore-engine-test-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("image.bin");

    struct NoFunctions;
    impl FunctionRegistry for NoFunctions {
      fn lookup(&self, _name: &str) -> Option<Rc<crate::expr::FunctionDefinition>> {
        None
      }
    }

    let mut engine = Engine::default();
    point_template(&mut engine);
    let one = engine.intern_integer(1).unwrap();
    let two = engine.intern_integer(2).unwrap();
    let first = engine.assert("point", vec![Value::Atom(one), Value::Atom(two)]).unwrap();
    engine.assert("point", vec![Value::Atom(two), Value::Atom(one)], ).unwrap();

    engine.bsave(&path).unwrap();

    let mut reloaded = Engine::default();
    reloaded.bload(&path, &NoFunctions).unwrap();

    assert_eq!(reloaded.facts().asserted_count(), 2);
    assert!(reloaded.facts().find_by_index(first).is_some());
    assert!(reloaded.bsave(&path).is_err());

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn reset_reasserts_deffacts_and_restarts_the_index_counter() {
    let mut engine = Engine::default();
    point_template(&mut engine);

    let one = engine.intern_integer(1).unwrap();
    let two = engine.intern_integer(2).unwrap();
    engine
        .define_deffacts(
          IString::from("startup"),
          vec![
            (IString::from("point"), vec![Value::Atom(one), Value::Atom(two)]),
            (IString::from("point"), vec![Value::Atom(two), Value::Atom(one)]),
          ],
        )
        .unwrap();

    // Facts asserted before a reset must not linger, and the index counter restarts at 1.
    engine.assert("point", vec![Value::Atom(two), Value::Atom(two)]).unwrap();
    engine.reset().unwrap();

    assert_eq!(engine.facts().asserted_count(), 2);
    let first = engine.facts().iter_asserted().next().unwrap();
    assert_eq!(first.index, FactIndex(1));
    assert_eq!(first.slot_values, vec![Value::Atom(one), Value::Atom(two)]);

    // A second reset must not duplicate-register the deffacts list or leave behind a stale agenda.
    engine.reset().unwrap();
    assert_eq!(engine.facts().asserted_count(), 2);
  }
}
