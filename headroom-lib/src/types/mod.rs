#![allow(unreachable_pub)]

use std::collections::BTreeMap;

mod error;

pub use error::ErrorKind;

/// Capacity reported for URLs which have no estimate yet.
pub const DEFAULT_CAPACITY: usize = 1;

/// Estimated capacity per URL, as returned by a resolution.
///
/// Ordered by URL so that serializing the same resolution twice yields the
/// same output.
pub type CapacityMap = BTreeMap<String, usize>;

/// The headroom `Result` type
pub type Result<T> = std::result::Result<T, crate::ErrorKind>;
