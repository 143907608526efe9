//! A PubGrub version solver.
//!
//! [`resolve`] picks one version per package reachable from a root so that every dependency
//! requirement holds, or returns a [`DerivationTree`] proving that no such selection exists. The
//! tree can be rendered with [`DefaultStringReporter`].
//!
//! The solver is generic over the package and version types. Package metadata comes from a
//! [`DependencyProvider`], whose two methods are the only places where resolution suspends.

pub use crate::error::PubGrubError;
pub use crate::internal::arena::Id;
pub use crate::package::Package;
pub use crate::provider::{DependencyConstraints, DependencyProvider, OfflineDependencyProvider};
pub use crate::report::{
    DefaultStringReporter, DerivationTree, Derived, External, Node, NodeId, Reporter,
};
pub use crate::solver::{SelectedDependencies, resolve};
pub use crate::term::Term;
pub use crate::type_aliases::{FxIndexMap, FxIndexSet};

pub use grove_version::{Ranges, SemanticVersion, Version, VersionSet};

mod error;
mod internal;
mod package;
mod provider;
mod report;
mod solver;
mod term;
mod type_aliases;
