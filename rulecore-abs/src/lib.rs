/*!

Types/type aliases that abstract over the implementing backing type.

# Background and Motivation

A motivating example is the `IString` type, an interned string type. A number of external crates could provide this
functionality. This module redirects to whatever chosen implementation we want. To use the
[`string_cache` crate](https://crates.io/crates/string_cache), we define `IString` as an alias for
`string_cache::DefaultAtom`. If we later want to change to another interner, we only touch this file.

For types or infrastructure with very different backing implementations, we define an abstraction layer over the
implementation. For example, the `log` module could use any of a number of logging frameworks or even a bespoke
solution for its implementation. However, its (crate) public interface consists only of
`set_global_logging_threshold()`/`get_global_logging_threshold()` and the macros `critical!`, `error!`, `warning!`,
`info!`, `debug!`, and `trace!`. The (private) backing implementation is encapsulated in the `log` module.

*/

mod nat_set;
mod index_set;
mod rccell;

pub mod log;
pub mod numeric;

// region Hashing data structures
use std::collections::HashSet as StdHashSet;
use std::collections::HashMap as StdHashMap;
pub use std::collections::HashSet;
pub use std::collections::HashMap;

// For vectors that are expected to have few or zero elements.
pub use smallvec::{SmallVec, smallvec};

/// A `Set<T>` is a plain hash set. Useful when you need membership tests but never need to iterate in any
/// particular order.
pub type Set<T> = StdHashSet<T>;
// endregion

// Logging
pub use tracing;

// Interned string. `DefaultAtom` gives us a global cache usable across threads, which is what an engine that may
// be embedded in a multithreaded host wants (see `spec.md` §5: engine instances are independent, but an embedding
// host is free to run several on different threads).
pub use string_cache::DefaultAtom as IString;

pub use index_set::IndexSet;

// A set of (small) natural numbers, used for the discrimination network's intra-pattern variable bookkeeping.
pub use nat_set::NatSet;

// Reference counted pointers with mutable interior, and complementary weak pointers.
pub use rccell::{RcCell, WeakCell};

/// Join an iterator of `Display`-able items with a separator, without the final trailing separator.
pub fn join_iter<T: std::fmt::Display>(items: impl IntoIterator<Item = T>, sep: &str) -> String {
  items
      .into_iter()
      .map(|item| item.to_string())
      .collect::<Vec<_>>()
      .join(sep)
}
