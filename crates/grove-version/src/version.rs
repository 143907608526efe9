use std::fmt::{Debug, Display};

/// A totally ordered version with a notion of pre-releases.
///
/// The solver only ever compares versions and asks whether they are pre-releases, so any type
/// with a consistent [`Ord`] can be used.
pub trait Version: Clone + Ord + Debug + Display {
    /// Whether this version is a pre-release, e.g. `1.0.0-rc.1`.
    fn is_prerelease(&self) -> bool;

    /// The release this version belongs to, with any pre-release information stripped.
    #[must_use]
    fn only_release(&self) -> Self;
}

impl Version for u32 {
    fn is_prerelease(&self) -> bool {
        false
    }

    fn only_release(&self) -> Self {
        *self
    }
}

impl Version for u64 {
    fn is_prerelease(&self) -> bool {
        false
    }

    fn only_release(&self) -> Self {
        *self
    }
}
