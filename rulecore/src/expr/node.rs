/*!

The expression tree (`spec.md` §3/§4.2). The reference implementation links children via `(argList, nextArg)`
pointers; here each node owns a `Vec<ExprNode>` of children, which is the idiomatic-Rust equivalent (no loss of
sharing: common subexpressions are still shared via `Rc` at the `FunctionCall` boundary — see
`crate::expr::function::FunctionDefinition`). Trees are immutable after construction.

Variable references are resolved at construction time to integer slots (`LocalVar`, `FactSetVar`) or
`(pattern_index, slot_index)` pairs (`PatternSlot`), never by name lookup during evaluation — Design Notes:
"Variables in expressions resolve at parse time to `(frame, slot)` pairs — no runtime name lookup inside hot
paths."

*/

use std::rc::Rc;
use rulecore_abs::IString;
use crate::atoms::Atom;
use crate::expr::function::FunctionDefinition;

#[derive(Clone, Debug)]
pub enum ExprNode {
  /// An interned atom constant.
  Constant(Atom),

  /// A literal multifield built from evaluating each child in order.
  MultifieldLiteral(Vec<ExprNode>),

  /// Indexes into the current activation frame's local-variable array.
  LocalVar(usize),

  /// Indexes into the fact-set array for the active fact-set query (`spec.md` §4.5's query operators).
  FactSetVar(usize),

  /// `(pattern_index, slot_index)`, resolvable only against a join's binding view (`spec.md` §4.4.3). Using
  /// this node outside join-test evaluation is a evaluator-internal error.
  PatternSlot { pattern_index: usize, slot_index: usize },

  /// `v:s` — resolves `v` (itself an expression, typically a `LocalVar`/`PatternSlot`) to a fact or instance,
  /// then looks up slot `s`.
  SlotAccess { target: Box<ExprNode>, slot: IString },

  /// Reads a named global's current value.
  GlobalRef(IString),

  /// A call to a (possibly builtin) function. Evaluates each argument in order into a temporary frame, then
  /// invokes the function's callback; per `spec.md` §4.2, evaluation stops at the first evaluation error.
  FunctionCall { function: Rc<FunctionDefinition>, args: Vec<ExprNode> },

  If { condition: Box<ExprNode>, then_branch: Box<ExprNode>, else_branch: Option<Box<ExprNode>> },
  While { condition: Box<ExprNode>, body: Box<ExprNode> },
  /// Evaluates each child in sequence, returning the last value (or void if empty).
  Progn(Vec<ExprNode>),
  /// Binds a local-variable slot to a value.
  Bind { slot: usize, value: Box<ExprNode> },
  Return(Option<Box<ExprNode>>),
  Break,
}
