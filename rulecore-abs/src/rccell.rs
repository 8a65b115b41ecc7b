/*!

Reference-counted pointers with interior mutability, and complementary weak pointers. The engine's core
structures are mutually referential (a rule's join chain references the rule for firing; the rule references the
network it feeds) and are all single-threaded, so `Rc<RefCell<T>>`/`Weak<RefCell<T>>` is the natural backing
implementation — this module exists so the rest of the workspace names the pattern once, the same way `IString`
names the interning backend once.

*/

use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

#[derive(Debug)]
pub struct RcCell<T>(Rc<RefCell<T>>);

impl<T> RcCell<T> {
  pub fn new(value: T) -> Self {
    RcCell(Rc::new(RefCell::new(value)))
  }

  pub fn borrow(&self) -> Ref<'_, T> {
    self.0.borrow()
  }

  pub fn borrow_mut(&self) -> RefMut<'_, T> {
    self.0.borrow_mut()
  }

  pub fn downgrade(&self) -> WeakCell<T> {
    WeakCell(Rc::downgrade(&self.0))
  }

  pub fn ptr_eq(&self, other: &RcCell<T>) -> bool {
    Rc::ptr_eq(&self.0, &other.0)
  }

  pub fn strong_count(&self) -> usize {
    Rc::strong_count(&self.0)
  }
}

impl<T> Clone for RcCell<T> {
  fn clone(&self) -> Self {
    RcCell(self.0.clone())
  }
}

#[derive(Debug)]
pub struct WeakCell<T>(Weak<RefCell<T>>);

impl<T> WeakCell<T> {
  pub fn upgrade(&self) -> Option<RcCell<T>> {
    self.0.upgrade().map(RcCell)
  }
}

impl<T> Clone for WeakCell<T> {
  fn clone(&self) -> Self {
    WeakCell(self.0.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shared_mutation_is_visible_through_clones() {
    let cell = RcCell::new(0_i32);
    let clone = cell.clone();
    *cell.borrow_mut() += 1;
    assert_eq!(*clone.borrow(), 1);
  }

  #[test]
  fn weak_cell_does_not_keep_alive() {
    let weak = {
      let cell = RcCell::new("temp".to_string());
      cell.downgrade()
    };
    assert!(weak.upgrade().is_none());
  }
}
