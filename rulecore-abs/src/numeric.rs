/*!

Arbitrary precision arithmetic, used for the `quantity` atom kind (`spec.md` §3's atom kind list includes
`quantity` alongside the fixed-width `integer`/`float` kinds; unlike those, a quantity is not assumed to fit in a
machine word).

*/

pub use num_bigint::{
  BigInt,
  BigUint,
  ParseBigIntError,
  ToBigInt,
  ToBigUint,
  Sign,
};

pub use num_traits as traits;
