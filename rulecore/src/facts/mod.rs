/*!

The fact store and template schema (`spec.md` §4.3): structured records with named single- and multi-valued
slots, indexed by monotonically increasing fact indices.

*/

mod fact;
mod template;
mod store;

pub use fact::{Fact, FactIndex, FactState};
pub use template::{SlotConstraint, SlotDescriptor, Template};
pub use store::FactStore;
