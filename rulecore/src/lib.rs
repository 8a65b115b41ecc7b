/*!

A forward-chaining production rule engine core: atom interning with reference-counted garbage frames, an
expression evaluator, a fact store with constraint-checked templates, an incremental match network, an
agenda-driven execution cycle, and binary save/load of engine state.

This crate is the core only — parsing a rule-language surface syntax into `ExprNode`/`PatternSpec` trees, a REPL,
and the generic-function/object subsystem are left to a host layer built on top of [`Engine`].

Module dependency order, leaves first: [`atoms`] → [`value`] → [`expr`] → [`facts`] → [`network`] → [`agenda`] →
[`module`] → [`bsave`] → [`engine`].

*/

pub mod agenda;
pub mod atoms;
pub mod bsave;
pub mod config;
pub mod engine;
pub mod error;
pub mod expr;
pub mod facts;
pub mod module;
pub mod network;
pub mod value;

pub use agenda::{Activation, Strategy};
pub use atoms::{Atom, AtomKind, GarbageFrameGuard, Interner};
pub use bsave::FunctionRegistry;
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use expr::{ActivationFrame, BindingView, Environment, Evaluator, ExprNode, FunctionCallback, FunctionDefinition};
pub use facts::{Fact, FactIndex, FactState, SlotConstraint, SlotDescriptor, Template};
pub use module::{Module, ModuleRegistry};
pub use network::{JoinKind, MatchNetwork, PatternKind, PatternSpec, Token};
pub use value::{InstanceHandle, Multifield, MultifieldSlice, Value};
