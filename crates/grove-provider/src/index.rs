use std::collections::BTreeMap;
use std::future::Future;
use std::path::Path;

use thiserror::Error;
use tracing::debug;

use grove_pubgrub::{DependencyConstraints, DependencyProvider, FxIndexMap, SemanticVersion};

use crate::PackageName;

type Versions = BTreeMap<SemanticVersion, DependencyConstraints<PackageName, SemanticVersion>>;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("Failed to parse the package index")]
    Json(#[from] serde_json::Error),
    #[error("There is no version {version} of {package} in the index")]
    UnknownVersion {
        package: PackageName,
        version: SemanticVersion,
    },
}

/// A dependency provider backed by a JSON document.
///
/// The document maps package names to versions, and each version to its dependencies:
///
/// ```json
/// {
///   "root": { "1.0.0": { "foo": ">=1.0.0, <2.0.0" } },
///   "foo": { "1.0.0": {}, "2.0.0": { "bar": "*" } }
/// }
/// ```
///
/// Dependencies keep the order of the document, which is the order in which the solver
/// discovers them.
#[derive(Debug, Clone, Default)]
pub struct IndexProvider {
    packages: FxIndexMap<PackageName, Versions>,
}

impl IndexProvider {
    /// Read an index from a JSON file.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        let path = path.as_ref();
        debug!("Reading package index from: {}", path.display());
        let contents = fs_err::tokio::read_to_string(path).await?;
        Self::from_json(&contents)
    }

    /// Parse an index from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, IndexError> {
        let packages: FxIndexMap<PackageName, Versions> = serde_json::from_str(json)?;
        debug!("Loaded {} packages from the index", packages.len());
        Ok(Self { packages })
    }

    /// The packages of the index, in document order.
    pub fn packages(&self) -> impl Iterator<Item = &PackageName> {
        self.packages.keys()
    }
}

impl DependencyProvider for IndexProvider {
    type P = PackageName;
    type V = SemanticVersion;
    type Err = IndexError;

    /// Packages missing from the index have no versions.
    fn versions<'io>(
        &'io self,
        package: &'io PackageName,
    ) -> impl Future<Output = Result<Vec<SemanticVersion>, IndexError>> + 'io {
        std::future::ready(Ok(self
            .packages
            .get(package)
            .map(|versions| versions.keys().cloned().collect())
            .unwrap_or_default()))
    }

    fn dependencies<'io>(
        &'io self,
        package: &'io PackageName,
        version: &'io SemanticVersion,
    ) -> impl Future<
        Output = Result<DependencyConstraints<PackageName, SemanticVersion>, IndexError>,
    > + 'io {
        std::future::ready(
            self.packages
                .get(package)
                .and_then(|versions| versions.get(version))
                .cloned()
                .ok_or_else(|| IndexError::UnknownVersion {
                    package: package.clone(),
                    version: version.clone(),
                }),
        )
    }
}
