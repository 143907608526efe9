use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;

/// An insertion-ordered map with the fast, non-cryptographic `FxHash` hasher.
pub type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

/// An insertion-ordered set with the fast, non-cryptographic `FxHash` hasher.
pub type FxIndexSet<T> = IndexSet<T, FxBuildHasher>;
