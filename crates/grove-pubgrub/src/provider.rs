use std::collections::BTreeMap;
use std::convert::Infallible;
use std::future::Future;

use rustc_hash::FxHashMap;

use grove_version::{Version, VersionSet};

use crate::{FxIndexMap, Package};

/// The requirements of a package at a given version: for each dependency, the versions it
/// accepts.
pub type DependencyConstraints<P, V> = FxIndexMap<P, VersionSet<V>>;

/// Trait that allows the solver to retrieve available packages and their dependencies.
///
/// These two methods are the only places where resolution may suspend. Within a single
/// resolution, each is awaited at most once per package or package version.
pub trait DependencyProvider {
    type P: Package;
    type V: Version;
    type Err: std::error::Error + 'static;

    /// All known versions of `package`, in any order.
    fn versions<'io>(
        &'io self,
        package: &'io Self::P,
    ) -> impl Future<Output = Result<Vec<Self::V>, Self::Err>> + 'io;

    /// The dependencies of `package` at `version`.
    fn dependencies<'io>(
        &'io self,
        package: &'io Self::P,
        version: &'io Self::V,
    ) -> impl Future<Output = Result<DependencyConstraints<Self::P, Self::V>, Self::Err>> + 'io;
}

/// A dependency provider that keeps everything in memory.
#[derive(Debug, Clone)]
pub struct OfflineDependencyProvider<P, V> {
    dependencies: FxHashMap<P, BTreeMap<V, DependencyConstraints<P, V>>>,
}

impl<P, V> Default for OfflineDependencyProvider<P, V> {
    fn default() -> Self {
        Self {
            dependencies: FxHashMap::default(),
        }
    }
}

impl<P: Package, V: Version> OfflineDependencyProvider<P, V> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the dependencies of a package and version pair.
    ///
    /// A later call for the same pair replaces the dependencies instead of extending them, so
    /// that the provider always returns the complete requirements of a version.
    pub fn add_dependencies<I: IntoIterator<Item = (P, VersionSet<V>)>>(
        &mut self,
        package: P,
        version: impl Into<V>,
        dependencies: I,
    ) {
        *self
            .dependencies
            .entry(package)
            .or_default()
            .entry(version.into())
            .or_default() = dependencies.into_iter().collect();
    }

    /// Lists packages that have been saved.
    pub fn packages(&self) -> impl Iterator<Item = &P> {
        self.dependencies.keys()
    }

    /// Lists versions of saved packages in sorted order, or `None` if the package is unknown.
    pub fn versions_of(&self, package: &P) -> Option<impl Iterator<Item = &V>> {
        self.dependencies.get(package).map(BTreeMap::keys)
    }
}

impl<P: Package, V: Version> DependencyProvider for OfflineDependencyProvider<P, V> {
    type P = P;
    type V = V;
    type Err = Infallible;

    fn versions<'io>(
        &'io self,
        package: &'io P,
    ) -> impl Future<Output = Result<Vec<V>, Infallible>> + 'io {
        std::future::ready(Ok(self
            .versions_of(package)
            .map(|versions| versions.cloned().collect())
            .unwrap_or_default()))
    }

    /// Unknown versions have no dependencies.
    fn dependencies<'io>(
        &'io self,
        package: &'io P,
        version: &'io V,
    ) -> impl Future<Output = Result<DependencyConstraints<P, V>, Infallible>> + 'io {
        std::future::ready(Ok(self
            .dependencies
            .get(package)
            .and_then(|versions| versions.get(version))
            .cloned()
            .unwrap_or_default()))
    }
}
