/*!

Namespaces (`spec.md` §3/§6): a module maps names to constructs and partitions the agenda via the focus stack.
Import/export and cross-module visibility rules belong to the (out-of-scope) surface layer; the core only needs
"current module" and a membership registry so `Engine::define_*` can tag each construct with its owner
(`spec.md` §1: "only what the core needs to scope rule visibility").

*/

use std::collections::HashSet;

use rulecore_abs::IString;

use crate::agenda::DEFAULT_MODULE;

pub struct Module {
  pub name     : IString,
  pub templates: HashSet<IString>,
  pub rules    : HashSet<IString>,
  pub globals  : HashSet<IString>,
}

impl Module {
  pub fn new(name: IString) -> Self {
    Module { name, templates: HashSet::new(), rules: HashSet::new(), globals: HashSet::new() }
  }
}

pub struct ModuleRegistry {
  modules: std::collections::HashMap<IString, Module>,
  current: IString,
}

impl ModuleRegistry {
  pub fn new() -> Self {
    let default_name = IString::from(DEFAULT_MODULE);
    let mut modules = std::collections::HashMap::new();
    modules.insert(default_name.clone(), Module::new(default_name.clone()));
    ModuleRegistry { modules, current: default_name }
  }

  pub fn current(&self) -> &IString {
    &self.current
  }

  pub fn set_current(&mut self, name: IString) {
    self.modules.entry(name.clone()).or_insert_with(|| Module::new(name.clone()));
    self.current = name;
  }

  pub fn get(&self, name: &str) -> Option<&Module> {
    self.modules.get(name)
  }

  pub fn get_or_create_mut(&mut self, name: &IString) -> &mut Module {
    self.modules.entry(name.clone()).or_insert_with(|| Module::new(name.clone()))
  }

  pub fn is_visible(&self, construct_module: &str, from_module: &str) -> bool {
    // Minimal visibility: a construct is visible from its own module, with MAIN additionally able to see
    // everything (the common CLIPS default of starting everything in MAIN). Import/export lists are the
    // out-of-scope surface layer's concern.
    construct_module == from_module || from_module == DEFAULT_MODULE
  }

  pub fn clear(&mut self) {
    self.modules.clear();
    let default_name = IString::from(DEFAULT_MODULE);
    self.modules.insert(default_name.clone(), Module::new(default_name.clone()));
    self.current = default_name;
  }
}

impl Default for ModuleRegistry {
  fn default() -> Self {
    Self::new()
  }
}
