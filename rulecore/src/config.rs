/*!

Engine configuration. `spec.md` leaves several knobs as per-kind constants in the reference implementation
(bucket counts) or as binary toggles threaded through call sites (fact-duplication); this collects them into one
value handed to [`crate::engine::Engine::new`], in the spirit of the teacher's own config-struct convention.

*/

use crate::agenda::Strategy;

#[derive(Clone, Debug)]
pub struct EngineConfig {
  /// `spec.md` §4.3 step 3: when `false` (the default), asserting a content-equal fact returns the existing
  /// fact instead of creating a new one.
  pub fact_duplication: bool,
  /// The conflict-resolution strategy the agenda starts with (`spec.md` §4.5); changeable at runtime via
  /// `Engine::set_strategy`.
  pub strategy: Strategy,
  /// Evaluator recursion guard (`spec.md` §4.2's "defend against recursion beyond a configured depth").
  pub max_activation_recursion_depth: usize,
  /// When `true`, salience expressions are re-evaluated at activation time rather than rule-definition time
  /// (`SPEC_FULL.md` §3 — the reference implementation's dynamic-salience toggle; the core accepts only
  /// pre-evaluated integer salience, so this is surfaced for forward compatibility with a surface layer that
  /// re-evaluates and re-inserts activations itself).
  pub dynamic_salience: bool,
  /// Per-kind initial hash-table capacities, mirroring the reference implementation's fixed bucket counts
  /// (`spec.md` §4.1). The target interner's tables grow dynamically, so these only pre-size the underlying
  /// `HashMap`s; they carry no correctness weight.
  pub symbol_bucket_hint: usize,
  pub float_bucket_hint: usize,
  pub integer_bucket_hint: usize,
  pub bitmap_bucket_hint: usize,
  pub external_address_bucket_hint: usize,
  /// Cap on live atoms per kind, turning runaway allocation into a recoverable `AllocationError`
  /// (`SPEC_FULL.md` §2). `None` means unlimited.
  pub max_atoms_per_kind: Option<usize>,
}

impl Default for EngineConfig {
  fn default() -> Self {
    EngineConfig {
      fact_duplication: false,
      strategy: Strategy::default(),
      max_activation_recursion_depth: 1000,
      dynamic_salience: false,
      symbol_bucket_hint: 65521,
      float_bucket_hint: 8191,
      integer_bucket_hint: 8191,
      bitmap_bucket_hint: 8191,
      external_address_bucket_hint: 8191,
      max_atoms_per_kind: None,
    }
  }
}
