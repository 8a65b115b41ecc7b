/*!

The error taxonomy of `spec.md` §7, collected into a single enum via `thiserror`. Construct-boundary operations
(`Engine::assert_fact`, rule firing, `bsave`/`bload`) return `Result<T, EngineError>`; the expression evaluator
itself does *not* propagate `Result` out of every node (see `crate::expr::eval::Environment`) — it records an
`EngineError` on the environment and returns a sentinel, exactly as §7 specifies, and only the construct boundary
turns that recorded error into an `Err`.

`ParseError` and `CycleError` are declared, per §7, but the core never constructs them: `ParseError` belongs to the
out-of-scope surface parser, and `CycleError` is explicitly "reserved" with no defined trigger in the core.

*/

use rulecore_abs::critical;
use crate::atoms::AtomKind;

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum EngineError {
  #[error("parse error: {0}")]
  ParseError(String),

  #[error("constraint violation on slot `{slot}`: {reason}")]
  ConstraintError { slot: String, reason: String },

  #[error("type error: expected one of {expected:?}, found {found:?}")]
  TypeError { expected: Vec<AtomKind>, found: AtomKind },

  #[error("unbound variable `{0}`")]
  UnboundVariableError(String),

  #[error("stale reference: {0}")]
  StaleReferenceError(String),

  #[error("arity mismatch calling `{function}`: expected {expected}, found {found}")]
  ArityError { function: String, expected: String, found: usize },

  #[error("domain error: {0}")]
  DomainError(String),

  #[error("arithmetic overflow in `{0}`")]
  OverflowError(String),

  #[error("cannot redefine non-redefinable construct `{0}`")]
  DuplicateConstructError(String),

  #[error("cycle detected: {0}")]
  CycleError(String),

  #[error("I/O error: {0}")]
  IOError(String),

  #[error("format error: {0}")]
  FormatError(String),

  #[error("binary image version mismatch: file is `{found}`, engine expects `{expected}`")]
  VersionMismatchError { expected: String, found: String },

  #[error("out of memory")]
  AllocationError,

  #[error("internal invariant violation: {0}")]
  InternalError(String),
}

impl EngineError {
  /// Reports an `InternalError` at `critical!` severity before the caller halts the engine, per `SPEC_FULL.md` §1.
  pub fn internal(message: impl Into<String>) -> Self {
    let message = message.into();
    critical!(message = %message, "internal invariant violation");
    EngineError::InternalError(message)
  }
}

pub type EngineResult<T> = Result<T, EngineError>;

impl From<std::io::Error> for EngineError {
  fn from(err: std::io::Error) -> Self {
    EngineError::IOError(err.to_string())
  }
}
