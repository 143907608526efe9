use std::path::PathBuf;

use anstream::println;
use anyhow::{Context, Result, anyhow};
use clap::Parser;
use tracing::info;

use grove_provider::{CachedDependencyProvider, IndexProvider, PackageName, prefetch_versions};
use grove_pubgrub::{
    DefaultStringReporter, PubGrubError, Reporter, SemanticVersion, resolve as solve,
};

#[derive(Parser)]
pub(crate) struct ResolveArgs {
    /// The package to resolve the dependencies of.
    pub(crate) root: PackageName,
    /// The version of the root package.
    #[arg(long = "version", default_value = "1.0.0")]
    pub(crate) root_version: SemanticVersion,
    /// The JSON package index to read packages from.
    #[arg(long, env = "GROVE_INDEX")]
    pub(crate) index: PathBuf,
    /// Merge "no versions" facts into the dependency they constrain, for a shorter explanation
    /// when there is no solution.
    #[arg(long)]
    pub(crate) collapse: bool,
    /// How many packages to fetch concurrently before solving. `0` disables prefetching.
    #[arg(long, env = "GROVE_PREFETCH_CONCURRENCY", default_value_t = 16)]
    pub(crate) prefetch: usize,
}

pub(crate) async fn resolve(args: ResolveArgs) -> Result<()> {
    let index = IndexProvider::from_path(&args.index)
        .await
        .with_context(|| format!("Failed to load index from `{}`", args.index.display()))?;
    let provider = CachedDependencyProvider::new(index);

    if args.prefetch > 0 {
        let packages: Vec<PackageName> = provider.inner().packages().cloned().collect();
        info!("Prefetching {} packages", packages.len());
        prefetch_versions(&provider, packages, args.prefetch).await?;
    }

    let root = args.root;
    let version = args.root_version;
    match solve(&provider, root.clone(), version.clone()).await {
        Ok(resolution) => {
            for (package, version) in &resolution {
                println!("{package}=={version}");
            }
            Ok(())
        }
        Err(PubGrubError::NoSolution(mut tree)) => {
            if args.collapse {
                tree.collapse_no_versions();
            }
            Err(anyhow!(DefaultStringReporter::report(&tree)))
                .with_context(|| format!("No solution found when resolving {root} {version}"))
        }
        Err(err) => Err(err).with_context(|| format!("Failed to resolve {root} {version}")),
    }
}
