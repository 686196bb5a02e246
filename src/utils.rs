use rustc_hash::FxHasher;
use std::hash::BuildHasherDefault;

pub type FxBuildHasher = BuildHasherDefault<FxHasher>;
pub type FxHashMap<K, V> = hashbrown::HashMap<K, V, FxBuildHasher>;
pub type FxHashSet<T> = hashbrown::HashSet<T, FxBuildHasher>;
pub type FxIndexMap<K, V> = indexmap::IndexMap<K, V, FxBuildHasher>;

/// Converts a length read from a byte file into a `usize`, saturating on targets where `usize` is
/// narrower than 64 bits. A saturated length can never fit in the remaining input, so callers
/// comparing it against a buffer length still reject it.
#[inline(always)]
pub(crate) fn saturating_usize(value: u64) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}
