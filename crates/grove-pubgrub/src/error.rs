//! Handling pubgrub errors.

use thiserror::Error;

use crate::{DependencyProvider, DerivationTree};

/// Errors that may occur while solving dependencies.
#[derive(Error)]
pub enum PubGrubError<DP: DependencyProvider> {
    /// There is no solution for this set of dependencies.
    #[error("No solution")]
    NoSolution(DerivationTree<DP::P, DP::V>),

    /// Error arising when the implementer of [`DependencyProvider`] returned an error in the
    /// method [`versions`](DependencyProvider::versions).
    #[error("Retrieving versions of {package} failed")]
    ErrorRetrievingVersions {
        /// Package whose versions we wanted to retrieve.
        package: DP::P,
        /// Error raised by the implementer of [`DependencyProvider`].
        #[source]
        source: DP::Err,
    },

    /// Error arising when the implementer of [`DependencyProvider`] returned an error in the
    /// method [`dependencies`](DependencyProvider::dependencies).
    #[error("Retrieving dependencies of {package} {version} failed")]
    ErrorRetrievingDependencies {
        /// Package whose dependencies we want.
        package: DP::P,
        /// Version of the package for which we want the dependencies.
        version: DP::V,
        /// Error raised by the implementer of [`DependencyProvider`].
        #[source]
        source: DP::Err,
    },
}

impl<DP: DependencyProvider> std::fmt::Debug for PubGrubError<DP> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSolution(tree) => f.debug_tuple("NoSolution").field(tree).finish(),
            Self::ErrorRetrievingVersions { package, source } => f
                .debug_struct("ErrorRetrievingVersions")
                .field("package", package)
                .field("source", source)
                .finish(),
            Self::ErrorRetrievingDependencies {
                package,
                version,
                source,
            } => f
                .debug_struct("ErrorRetrievingDependencies")
                .field("package", package)
                .field("version", version)
                .field("source", source)
                .finish(),
        }
    }
}
