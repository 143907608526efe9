//! The solver loop: alternate between unit propagation and decisions until every required
//! package has a version, or a conflict can't be resolved.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;
use tracing::{debug, info};

use crate::internal::core::State;
use crate::internal::incompatibility::{IncompId, Incompatibility};
use crate::{DependencyProvider, FxIndexMap, PubGrubError, Term};

/// The version selected for each package of a solution, in the order the decisions were made.
pub type SelectedDependencies<P, V> = FxIndexMap<P, V>;

/// Find a set of packages and versions satisfying the dependencies of `package` at `version`.
///
/// Among the packages that still need a version, the one with the fewest matching versions is
/// decided first, with ties going to the package discovered first. Versions are tried from the
/// highest down.
pub async fn resolve<DP: DependencyProvider>(
    dependency_provider: &DP,
    package: DP::P,
    version: impl Into<DP::V>,
) -> Result<SelectedDependencies<DP::P, DP::V>, PubGrubError<DP>> {
    let version = version.into();
    info!("Solving dependencies of {package} {version}");

    let mut state = State::init(package.clone(), version);
    // Versions in descending order.
    let mut available_versions: FxHashMap<DP::P, Vec<DP::V>> = FxHashMap::default();
    // The dependency incompatibilities already registered for each package version.
    let mut added_dependencies: FxHashMap<DP::P, BTreeMap<DP::V, Vec<IncompId<DP::P, DP::V>>>> =
        FxHashMap::default();
    let mut next = package;

    loop {
        if let Err(terminal) = state.unit_propagation(next) {
            debug!("No solution: {}", state.incompatibility_store[terminal]);
            return Err(PubGrubError::NoSolution(
                state.build_derivation_tree(terminal),
            ));
        }

        let potential_packages: Vec<_> = state
            .partial_solution
            .potential_packages()
            .map(|(package, set)| (package.clone(), set.clone()))
            .collect();

        for (package, _) in &potential_packages {
            if available_versions.contains_key(package) {
                continue;
            }
            debug!("Fetching versions of {package}");
            let mut versions = dependency_provider
                .versions(package)
                .await
                .map_err(|source| PubGrubError::ErrorRetrievingVersions {
                    package: package.clone(),
                    source,
                })?;
            versions.sort_unstable_by(|a, b| b.cmp(a));
            versions.dedup();
            available_versions.insert(package.clone(), versions);
        }

        let Some((package, set)) = potential_packages.into_iter().min_by_key(|(package, set)| {
            let candidates = available_versions[package]
                .iter()
                .filter(|version| set.contains(version))
                .count();
            (candidates, state.discovery_index(package))
        }) else {
            let solution = state.partial_solution.extract_solution();
            info!("Solved with {} packages", solution.len());
            return Ok(solution);
        };
        next = package;

        let Some(version) = available_versions[&next]
            .iter()
            .find(|version| set.contains(version))
            .cloned()
        else {
            debug!("No versions of {next} in {set}");
            state.add_incompatibility(Incompatibility::no_versions(
                next.clone(),
                Term::Positive(set),
            ));
            continue;
        };

        let known = added_dependencies.entry(next.clone()).or_default();
        if known.contains_key(&version) {
            // The dependency incompatibilities were registered and propagated when this version
            // was first tried, so none of them can be satisfied by it.
            info!("Selecting {next} {version}");
            state.partial_solution.add_decision(next.clone(), version);
            continue;
        }

        debug!("Fetching dependencies of {next} {version}");
        let dependencies = dependency_provider
            .dependencies(&next, &version)
            .await
            .map_err(|source| PubGrubError::ErrorRetrievingDependencies {
                package: next.clone(),
                version: version.clone(),
                source,
            })?;
        let dependency_incompatibilities =
            state.add_incompatibility_from_dependencies(&next, &version, dependencies);
        known.insert(version.clone(), dependency_incompatibilities.clone());

        if state.partial_solution.add_version(
            next.clone(),
            version.clone(),
            &dependency_incompatibilities,
            &state.incompatibility_store,
        ) {
            info!("Selecting {next} {version}");
        } else {
            debug!("Skipping {next} {version}, which conflicts with its own dependencies");
        }
    }
}
