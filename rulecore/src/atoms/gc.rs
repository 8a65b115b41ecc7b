/*!

Garbage frames are a stack; each frame owns one ephemeral list per content-bearing atom kind plus an ephemeral
multifield list (`spec.md` §4.1). `push_frame`/`pop_frame` bracket one evaluation step so that temporary atoms
created during that step become garbage at its end without reference-count churn in the common case.

[`GarbageFrameGuard`] is the scoped-guard adaptation the teacher's design notes call for ("the 'ephemeral frame' is
a scoped guard object releasing short-lived handles at end-of-scope"): it pushes a frame on construction and pops
(collects) it on `Drop`, so a frame is popped on every exit path — including an early `?` return from the middle of
an evaluation — without the caller having to remember to call `pop_frame` explicitly.

*/

use super::interner::Interner;

#[derive(Default)]
pub(crate) struct GcFrame {
  pub(crate) ephemeral_atoms     : [Vec<u32>; super::CONTENT_KIND_COUNT],
  pub(crate) ephemeral_multifields: Vec<u64>,
}

/// A scope guard around `Interner::push_frame`/`pop_frame`. Holds a raw pointer rather than `&mut Interner`
/// because the guarded interner is almost always reached through a larger `Engine` that also needs mutable
/// access during the guarded scope (e.g. to assert facts while evaluating a rule's RHS); see
/// `spec.md` §9 on re-entrancy. Safety: the pointer is valid for the guard's lifetime because the guard borrows
/// the interner for `'a` to construct, and nothing may move the interner out from under an active borrow.
pub struct GarbageFrameGuard<'a> {
  interner: &'a mut Interner,
}

impl<'a> GarbageFrameGuard<'a> {
  pub(crate) fn new(interner: &'a mut Interner) -> Self {
    interner.push_frame();
    GarbageFrameGuard { interner }
  }

  pub fn interner(&mut self) -> &mut Interner {
    self.interner
  }
}

impl<'a> Drop for GarbageFrameGuard<'a> {
  fn drop(&mut self) {
    self.interner.pop_frame();
  }
}
