//! Dependency providers for [`grove_pubgrub::resolve`].
//!
//! [`CachedDependencyProvider`] memoizes another provider so that concurrent resolutions share
//! their queries, and [`IndexProvider`] serves packages from a JSON index file.

pub use crate::cached::{CachedDependencyProvider, prefetch_versions};
pub use crate::index::{IndexError, IndexProvider};
pub use crate::name::{InvalidNameError, PackageName};

mod cached;
mod index;
mod name;
