use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt};
use tracing::{debug, trace};

use grove_once_map::OnceMap;
use grove_pubgrub::{DependencyConstraints, DependencyProvider};

type VersionsResponse<DP> =
    Result<Arc<Vec<<DP as DependencyProvider>::V>>, Arc<<DP as DependencyProvider>::Err>>;
type DependenciesResponse<DP> = Result<
    Arc<DependencyConstraints<<DP as DependencyProvider>::P, <DP as DependencyProvider>::V>>,
    Arc<<DP as DependencyProvider>::Err>,
>;

/// A dependency provider that asks the wrapped provider at most once per package, and once per
/// package version.
///
/// The cache can be shared between concurrent resolutions: when two of them need the same
/// package, the second one waits for the query of the first instead of repeating it. Failures
/// are cached too, and every caller receives the same shared error.
pub struct CachedDependencyProvider<DP: DependencyProvider> {
    provider: DP,
    versions: OnceMap<DP::P, VersionsResponse<DP>>,
    dependencies: OnceMap<(DP::P, DP::V), DependenciesResponse<DP>>,
}

impl<DP: DependencyProvider> CachedDependencyProvider<DP>
where
    DP::V: Hash,
{
    pub fn new(provider: DP) -> Self {
        Self {
            provider,
            versions: OnceMap::default(),
            dependencies: OnceMap::default(),
        }
    }

    /// The wrapped provider.
    pub fn inner(&self) -> &DP {
        &self.provider
    }

    /// Whether the versions of `package` were requested, whether or not they arrived yet.
    pub fn has_versions(&self, package: &DP::P) -> bool {
        self.versions.contains_key(package)
    }
}

impl<DP: DependencyProvider> DependencyProvider for CachedDependencyProvider<DP>
where
    DP::V: Hash,
{
    type P = DP::P;
    type V = DP::V;
    type Err = Arc<DP::Err>;

    fn versions<'io>(
        &'io self,
        package: &'io DP::P,
    ) -> impl Future<Output = Result<Vec<DP::V>, Arc<DP::Err>>> + 'io {
        async move {
            let versions = self
                .versions
                .get_or_run(package.clone(), move || async move {
                    debug!("Fetching versions of {package}");
                    self.provider
                        .versions(package)
                        .await
                        .map(Arc::new)
                        .map_err(Arc::new)
                })
                .await?;
            trace!("Found {} versions of {package}", versions.len());
            Ok(versions.as_ref().clone())
        }
    }

    fn dependencies<'io>(
        &'io self,
        package: &'io DP::P,
        version: &'io DP::V,
    ) -> impl Future<Output = Result<DependencyConstraints<DP::P, DP::V>, Arc<DP::Err>>> + 'io
    {
        async move {
            let dependencies = self
                .dependencies
                .get_or_run((package.clone(), version.clone()), move || async move {
                    debug!("Fetching dependencies of {package} {version}");
                    self.provider
                        .dependencies(package, version)
                        .await
                        .map(Arc::new)
                        .map_err(Arc::new)
                })
                .await?;
            Ok(dependencies.as_ref().clone())
        }
    }
}

/// Request the versions of `packages` ahead of a resolution, running up to `concurrency`
/// requests at once.
///
/// Returns the first error. The error is cached as well, so a resolution that needs the failed
/// package reports it again.
pub async fn prefetch_versions<DP: DependencyProvider>(
    provider: &CachedDependencyProvider<DP>,
    packages: impl IntoIterator<Item = DP::P>,
    concurrency: usize,
) -> Result<(), Arc<DP::Err>>
where
    DP::V: Hash,
{
    futures::stream::iter(packages)
        .map(|package| async move { provider.versions(&package).await.map(|_| ()) })
        .buffer_unordered(concurrency.max(1))
        .try_collect()
        .await
}

#[cfg(test)]
mod tests {
    use std::convert::Infallible;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use grove_pubgrub::{OfflineDependencyProvider, PubGrubError, SemanticVersion, resolve};

    use super::*;

    /// Counts the requests that reach an in-memory provider.
    #[derive(Default)]
    struct CountingProvider {
        inner: OfflineDependencyProvider<&'static str, SemanticVersion>,
        versions: AtomicUsize,
        dependencies: AtomicUsize,
    }

    impl DependencyProvider for CountingProvider {
        type P = &'static str;
        type V = SemanticVersion;
        type Err = Infallible;

        async fn versions<'io>(
            &'io self,
            package: &'io &'static str,
        ) -> Result<Vec<SemanticVersion>, Infallible> {
            self.versions.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.versions(package).await
        }

        async fn dependencies<'io>(
            &'io self,
            package: &'io &'static str,
            version: &'io SemanticVersion,
        ) -> Result<DependencyConstraints<&'static str, SemanticVersion>, Infallible> {
            self.dependencies.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inner.dependencies(package, version).await
        }
    }

    fn registry() -> CountingProvider {
        let mut inner = OfflineDependencyProvider::<&'static str, SemanticVersion>::new();
        inner.add_dependencies(
            "root",
            (1, 0, 0),
            [("a", "*".parse().unwrap()), ("b", "*".parse().unwrap())],
        );
        inner.add_dependencies("a", (1, 0, 0), [("c", ">=1.0.0".parse().unwrap())]);
        inner.add_dependencies("b", (1, 0, 0), [("c", "<2.0.0".parse().unwrap())]);
        inner.add_dependencies("c", (1, 0, 0), []);
        inner.add_dependencies("c", (2, 0, 0), []);
        CountingProvider {
            inner,
            ..CountingProvider::default()
        }
    }

    #[tokio::test]
    async fn concurrent_resolutions_share_requests() {
        let provider = CachedDependencyProvider::new(registry());

        let (first, second) = tokio::join!(
            resolve(&provider, "root", (1, 0, 0)),
            resolve(&provider, "root", (1, 0, 0)),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        assert_eq!(first, second);
        assert_eq!(first["c"], SemanticVersion::new(1, 0, 0));

        // One request per package, one per package version.
        assert_eq!(provider.inner().versions.load(Ordering::SeqCst), 4);
        assert_eq!(provider.inner().dependencies.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn prefetch_warms_the_cache() {
        let provider = CachedDependencyProvider::new(registry());
        prefetch_versions(&provider, ["a", "b", "c", "missing"], 2)
            .await
            .unwrap();
        assert!(provider.has_versions(&"missing"));
        assert_eq!(provider.inner().versions.load(Ordering::SeqCst), 4);

        resolve(&provider, "root", (1, 0, 0)).await.unwrap();
        // Only `root` was left to fetch.
        assert_eq!(provider.inner().versions.load(Ordering::SeqCst), 5);
    }

    /// A provider that fails every request, counting them.
    #[derive(Default)]
    struct BrokenProvider {
        requests: AtomicUsize,
    }

    impl DependencyProvider for BrokenProvider {
        type P = &'static str;
        type V = SemanticVersion;
        type Err = io::Error;

        async fn versions<'io>(
            &'io self,
            package: &'io &'static str,
        ) -> Result<Vec<SemanticVersion>, io::Error> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::other(format!("no index for {package}")))
        }

        async fn dependencies<'io>(
            &'io self,
            package: &'io &'static str,
            version: &'io SemanticVersion,
        ) -> Result<DependencyConstraints<&'static str, SemanticVersion>, io::Error> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::other(format!("no metadata for {package} {version}")))
        }
    }

    #[tokio::test]
    async fn errors_are_shared() {
        let provider = CachedDependencyProvider::new(BrokenProvider::default());

        let first = provider.versions(&"foo").await.unwrap_err();
        let second = provider.versions(&"foo").await.unwrap_err();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.to_string(), "no index for foo");

        let err = prefetch_versions(&provider, ["foo"], 4).await.unwrap_err();
        assert!(Arc::ptr_eq(&first, &err));
        assert_eq!(provider.inner().requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn resolution_reports_cached_errors() {
        let provider = CachedDependencyProvider::new(BrokenProvider::default());

        for _ in 0..2 {
            match resolve(&provider, "root", (1, 0, 0)).await {
                Err(PubGrubError::ErrorRetrievingVersions { package, source }) => {
                    assert_eq!(package, "root");
                    let cached = provider.versions(&"root").await.unwrap_err();
                    assert!(Arc::ptr_eq(&source, &cached));
                }
                resolved => panic!("unexpected resolution: {resolved:?}"),
            }
        }
        assert_eq!(provider.inner().requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_package_has_no_solution() {
        let mut inner = OfflineDependencyProvider::<&'static str, SemanticVersion>::new();
        inner.add_dependencies("root", (1, 0, 0), [("foo", "*".parse().unwrap())]);
        let provider = CachedDependencyProvider::new(inner);

        let resolved = resolve(&provider, "root", (1, 0, 0)).await;
        assert!(
            matches!(resolved, Err(PubGrubError::NoSolution(_))),
            "{resolved:?}"
        );
        assert!(provider.has_versions(&"foo"));
    }
}
