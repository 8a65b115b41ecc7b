/*!

The expression evaluator (`spec.md` §4.2). Evaluation never returns a `Result`: per §7's propagation model, the
evaluator records an `EngineError` on `Environment::evaluation_error` and returns a sentinel (the false atom),
exactly as the error-handling design specifies — only construct-boundary operations (assert, rule firing) turn a
recorded error into an `Err`.

A join's test expression (`spec.md` §4.4.3) is evaluated against a *binding view* rather than a fresh activation
frame: `PatternSlot` nodes resolve through the `BindingView` trait instead of `Environment`'s frame stack, so the
match network can reuse this evaluator without allocating an `ActivationFrame` per candidate pair.

*/

use std::collections::HashMap;

use rulecore_abs::{warning, IString, RcCell};

use crate::atoms::{AtomKind, Interner};
use crate::error::EngineError;
use crate::expr::frame::ActivationFrame;
use crate::expr::node::ExprNode;
use crate::facts::FactStore;
use crate::value::Value;

/// Resolves a `(pattern_index, slot_index)` pair during join-test evaluation (`spec.md` §4.4.3). Implemented by
/// the match network over whatever left-token/right-candidate pair is under test.
pub trait BindingView {
  fn resolve(&self, pattern_index: usize, slot_index: usize) -> Option<Value>;
}

pub struct Environment {
  pub interner  : RcCell<Interner>,
  pub facts     : RcCell<FactStore>,
  pub globals   : RcCell<HashMap<IString, Value>>,
  frames        : Vec<ActivationFrame>,
  /// Set by a callback/special form on evaluation failure; checked by the construct boundary after each
  /// top-level evaluation (`spec.md` §4.2, §7).
  pub evaluation_error: Option<EngineError>,
  /// Soft-termination flag, polled between rule firings and between top-level RHS statements (`spec.md` §5).
  pub halt_execution  : bool,
  recursion_depth     : usize,
  max_recursion_depth : usize,
}

impl Environment {
  pub fn new(
    interner: RcCell<Interner>,
    facts: RcCell<FactStore>,
    globals: RcCell<HashMap<IString, Value>>,
    max_recursion_depth: usize,
  ) -> Self {
    Environment {
      interner,
      facts,
      globals,
      frames: Vec::new(),
      evaluation_error: None,
      halt_execution: false,
      recursion_depth: 0,
      max_recursion_depth,
    }
  }

  pub fn push_frame(&mut self, frame: ActivationFrame) {
    self.frames.push(frame);
  }

  /// Pops the current activation frame, restoring whatever frame (including its wildcard-arguments value) was
  /// active before (`spec.md` §4.2).
  pub fn pop_frame(&mut self) -> Option<ActivationFrame> {
    self.frames.pop()
  }

  pub fn current_frame(&self) -> Option<&ActivationFrame> {
    self.frames.last()
  }

  pub fn current_frame_mut(&mut self) -> Option<&mut ActivationFrame> {
    self.frames.last_mut()
  }

  /// Records an evaluation error if none is already recorded (`spec.md` §4.2: evaluation stops at the *first*
  /// error within one top-level evaluation, so later stages must not clobber it).
  pub fn record_error(&mut self, error: EngineError) {
    if self.evaluation_error.is_none() {
      warning!(error = %error, "evaluation error recorded");
      self.evaluation_error = Some(error);
    }
  }

  pub fn has_error(&self) -> bool {
    self.evaluation_error.is_some()
  }

  /// Used between embedded top-level calls (`spec.md` §7).
  pub fn clear_errors(&mut self) {
    self.evaluation_error = None;
  }

  fn false_sentinel(&self) -> Value {
    Value::Atom(self.interner.borrow().false_atom())
  }

  fn void_sentinel(&self) -> Value {
    Value::Atom(self.interner.borrow().void())
  }
}

pub struct Evaluator;

impl Evaluator {
  /// Evaluates `node` against the current activation frame. Using a `PatternSlot` node here is a programming
  /// error (join tests alone use those) and records an `InternalError`.
  pub fn eval(node: &ExprNode, env: &mut Environment) -> Value {
    Self::eval_node(node, env, None)
  }

  /// Evaluates a join's test expression against `bindings` (`spec.md` §4.4.3). `LocalVar`/`FactSetVar` nodes are
  /// not expected here but fall back to `env`'s (likely absent) frame rather than panicking.
  pub fn eval_in_join(node: &ExprNode, env: &mut Environment, bindings: &dyn BindingView) -> Value {
    Self::eval_node(node, env, Some(bindings))
  }

  fn eval_node(node: &ExprNode, env: &mut Environment, bindings: Option<&dyn BindingView>) -> Value {
    if env.has_error() || env.halt_execution {
      return env.false_sentinel();
    }

    env.recursion_depth += 1;
    if env.recursion_depth > env.max_recursion_depth {
      env.recursion_depth -= 1;
      env.record_error(EngineError::OverflowError("recursion depth exceeded".to_string()));
      return env.false_sentinel();
    }

    let result = Self::eval_node_inner(node, env, bindings);
    env.recursion_depth -= 1;
    result
  }

  fn eval_node_inner(node: &ExprNode, env: &mut Environment, bindings: Option<&dyn BindingView>) -> Value {
    match node {
      ExprNode::Constant(atom) => Value::Atom(*atom),

      ExprNode::MultifieldLiteral(children) => {
        let mut elements = Vec::with_capacity(children.len());
        for child in children {
          let value = Self::eval_node(child, env, bindings);
          if env.has_error() {
            return env.false_sentinel();
          }
          match value {
            Value::Atom(atom) => elements.push(atom),
            other => {
              if let Some(atoms) = other.as_atoms() {
                elements.extend(atoms);
              } else {
                env.record_error(EngineError::TypeError {
                  expected: vec![AtomKind::Symbol],
                  found   : AtomKind::Void,
                });
                return env.false_sentinel();
              }
            }
          }
        }
        Value::Multifield(std::rc::Rc::new(crate::value::Multifield::new(elements)))
      }

      ExprNode::LocalVar(slot) => {
        match env.current_frame().and_then(|frame| frame.local(*slot)) {
          Some(value) => value.clone(),
          None => {
            env.record_error(EngineError::UnboundVariableError(format!("local slot {}", slot)));
            env.false_sentinel()
          }
        }
      }

      ExprNode::FactSetVar(slot) => {
        match env.current_frame().and_then(|frame| frame.fact_at(*slot)) {
          Some(fact_index) => Value::Fact(fact_index),
          None => {
            env.record_error(EngineError::UnboundVariableError(format!("fact-set slot {}", slot)));
            env.false_sentinel()
          }
        }
      }

      ExprNode::PatternSlot { pattern_index, slot_index } => {
        match bindings.and_then(|view| view.resolve(*pattern_index, *slot_index)) {
          Some(value) => value,
          None => {
            env.record_error(EngineError::internal(format!(
              "pattern slot ({}, {}) referenced outside join-test evaluation",
              pattern_index, slot_index
            )));
            env.false_sentinel()
          }
        }
      }

      ExprNode::SlotAccess { target, slot } => {
        let target_value = Self::eval_node(target, env, bindings);
        if env.has_error() {
          return env.false_sentinel();
        }
        Self::eval_slot_access(&target_value, slot, env)
      }

      ExprNode::GlobalRef(name) => {
        match env.globals.borrow().get(name) {
          Some(value) => value.clone(),
          None => {
            env.record_error(EngineError::UnboundVariableError(name.to_string()));
            env.false_sentinel()
          }
        }
      }

      ExprNode::FunctionCall { function, args } => {
        if !function.arity_in_range(args.len()) {
          env.record_error(EngineError::ArityError {
            function: function.name.to_string(),
            expected: match function.max_args {
              Some(max) if max == function.min_args => function.min_args.to_string(),
              Some(max) => format!("{}..={}", function.min_args, max),
              None => format!("{}..", function.min_args),
            },
            found: args.len(),
          });
          return env.false_sentinel();
        }

        let mut evaluated = Vec::with_capacity(args.len());
        for (position, arg) in args.iter().enumerate() {
          let value = Self::eval_node(arg, env, bindings);
          if env.has_error() {
            return env.false_sentinel();
          }
          let mask = function.arg_mask(position);
          if !mask.is_empty() {
            if let Value::Atom(atom) = &value {
              if !mask.contains(&atom.kind) {
                env.record_error(EngineError::TypeError { expected: mask.to_vec(), found: atom.kind });
                return env.false_sentinel();
              }
            }
          }
          evaluated.push(value);
        }

        function.call(&evaluated, env)
      }

      ExprNode::If { condition, then_branch, else_branch } => {
        let cond_value = Self::eval_node(condition, env, bindings);
        if env.has_error() {
          return env.false_sentinel();
        }
        if Self::is_truthy(&cond_value, env) {
          Self::eval_node(then_branch, env, bindings)
        } else if let Some(else_branch) = else_branch {
          Self::eval_node(else_branch, env, bindings)
        } else {
          env.void_sentinel()
        }
      }

      ExprNode::While { condition, body } => {
        loop {
          if env.has_error() || env.halt_execution {
            break;
          }
          let cond_value = Self::eval_node(condition, env, bindings);
          if env.has_error() || !Self::is_truthy(&cond_value, env) {
            break;
          }
          Self::eval_node(body, env, bindings);
        }
        env.void_sentinel()
      }

      ExprNode::Progn(children) => {
        let mut last = env.void_sentinel();
        for child in children {
          last = Self::eval_node(child, env, bindings);
          if env.has_error() || env.halt_execution {
            break;
          }
        }
        last
      }

      ExprNode::Bind { slot, value } => {
        let evaluated = Self::eval_node(value, env, bindings);
        if env.has_error() {
          return env.false_sentinel();
        }
        if let Some(frame) = env.current_frame_mut() {
          frame.set_local(*slot, evaluated.clone());
        } else {
          env.record_error(EngineError::internal("bind outside any activation frame"));
          return env.false_sentinel();
        }
        evaluated
      }

      // `Return`/`Break` are propagated by the RHS driver (outside this evaluator, e.g. the agenda's firing
      // loop), which special-cases `Progn`/`While` bodies; here they simply evaluate to their payload/void.
      ExprNode::Return(value) => match value {
        Some(value) => Self::eval_node(value, env, bindings),
        None => env.void_sentinel(),
      },
      ExprNode::Break => env.void_sentinel(),
    }
  }

  fn eval_slot_access(target: &Value, slot: &IString, env: &mut Environment) -> Value {
    match target {
      Value::Fact(index) => {
        let facts = env.facts.clone();
        let store = facts.borrow();
        match store.find_by_index(*index) {
          Some(fact) if fact.is_garbage() => {
            env.record_error(EngineError::StaleReferenceError(format!("fact {} is retracted", index.0)));
            env.false_sentinel()
          }
          Some(fact) => match fact.slot(slot.as_ref()) {
            Some(value) => value.clone(),
            None => {
              env.record_error(EngineError::DomainError(format!("no slot `{}` on fact {}", slot, index.0)));
              env.false_sentinel()
            }
          },
          None => {
            env.record_error(EngineError::StaleReferenceError(format!("fact {} does not exist", index.0)));
            env.false_sentinel()
          }
        }
      }
      Value::Instance(_) => {
        // The generic-function/object subsystem is out of scope; slot access on an instance handle has no
        // local implementation to delegate to.
        env.record_error(EngineError::DomainError(format!("cannot resolve slot `{}` on an instance handle", slot)));
        env.false_sentinel()
      }
      _ => {
        env.record_error(EngineError::TypeError { expected: vec![], found: AtomKind::Void });
        env.false_sentinel()
      }
    }
  }

  /// Truthiness over UDF values (`spec.md` §4.2): only the false symbol is false; everything else, including
  /// void, is true.
  fn is_truthy(value: &Value, env: &Environment) -> bool {
    match value {
      Value::Atom(atom) => *atom != env.interner.borrow().false_atom(),
      _ => true,
    }
  }
}
