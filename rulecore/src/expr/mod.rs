/*!

The expression tree and its evaluator (`spec.md` §3/§4.2).

*/

mod eval;
mod frame;
mod function;
mod node;

pub use eval::{BindingView, Environment, Evaluator};
pub use frame::ActivationFrame;
pub use function::{FunctionCallback, FunctionDefinition};
pub use node::ExprNode;
