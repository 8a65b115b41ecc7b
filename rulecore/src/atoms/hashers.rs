/*!

Per-kind hashing strategies named in `spec.md` §4.1: "symbols use polynomial rolling hash (multiplier 127); floats
hash their raw byte pattern; integers hash `|n|`; bitmaps chunk-fold bytes into word-sized accumulators; external
addresses hash the pointer value divided by the platform pointer alignment." The spec is explicit that the exact
bucket counts and hash functions aren't contractually significant (only O(1) average lookup is), but implementing
them anyway — as `std::hash::Hasher`s plugged into `HashMap` via `BuildHasherDefault` — costs nothing and keeps the
interning tables' bucket-distribution behavior faithful to the source.

*/

use std::hash::Hasher;

/// Polynomial rolling hash with multiplier 127, used for symbol/string/instance-name interning.
#[derive(Default)]
pub struct PolynomialHasher {
  state: u64,
}

impl Hasher for PolynomialHasher {
  fn finish(&self) -> u64 {
    self.state
  }

  fn write(&mut self, bytes: &[u8]) {
    for &byte in bytes {
      self.state = self.state.wrapping_mul(127).wrapping_add(byte as u64);
    }
  }
}

/// Hashes the raw bit pattern of a float, per spec.
#[derive(Default)]
pub struct FloatHasher {
  state: u64,
}

impl Hasher for FloatHasher {
  fn finish(&self) -> u64 {
    self.state
  }

  fn write(&mut self, bytes: &[u8]) {
    // Floats are hashed via `write_u64` below in practice (we feed the raw bits directly); this fallback keeps
    // the implementation total for any caller that writes raw bytes instead.
    for &byte in bytes {
      self.state = self.state.wrapping_add(byte as u64);
    }
  }

  fn write_u64(&mut self, bits: u64) {
    self.state = bits;
  }
}

/// Hashes the absolute value of an integer.
#[derive(Default)]
pub struct IntegerHasher {
  state: u64,
}

impl Hasher for IntegerHasher {
  fn finish(&self) -> u64 {
    self.state
  }

  fn write(&mut self, bytes: &[u8]) {
    for &byte in bytes {
      self.state = self.state.wrapping_add(byte as u64);
    }
  }

  fn write_i64(&mut self, value: i64) {
    self.state = value.unsigned_abs();
  }
}

/// Chunk-folds bytes into word-sized (u64) accumulators, for bitmaps.
#[derive(Default)]
pub struct BitmapHasher {
  state: u64,
}

impl Hasher for BitmapHasher {
  fn finish(&self) -> u64 {
    self.state
  }

  fn write(&mut self, bytes: &[u8]) {
    for chunk in bytes.chunks(8) {
      let mut word = [0u8; 8];
      word[..chunk.len()].copy_from_slice(chunk);
      self.state ^= u64::from_le_bytes(word);
    }
  }
}

/// Hashes an external-address pointer value divided by the platform pointer alignment.
#[derive(Default)]
pub struct AddressHasher {
  state: u64,
}

impl Hasher for AddressHasher {
  fn finish(&self) -> u64 {
    self.state
  }

  fn write(&mut self, bytes: &[u8]) {
    for &byte in bytes {
      self.state = self.state.wrapping_add(byte as u64);
    }
  }

  fn write_usize(&mut self, ptr_value: usize) {
    let alignment = std::mem::align_of::<usize>() as u64;
    self.state = (ptr_value as u64) / alignment;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn polynomial_hash_is_order_sensitive() {
    let mut a = PolynomialHasher::default();
    a.write(b"ab");
    let mut b = PolynomialHasher::default();
    b.write(b"ba");
    assert_ne!(a.finish(), b.finish());
  }

  #[test]
  fn integer_hash_ignores_sign() {
    let mut pos = IntegerHasher::default();
    pos.write_i64(5);
    let mut neg = IntegerHasher::default();
    neg.write_i64(-5);
    assert_eq!(pos.finish(), neg.finish());
  }
}
