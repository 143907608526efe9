//! Compare the solver against an exhaustive search on small random registries.

use futures::executor::block_on;
use proptest::prelude::*;

use grove_pubgrub::{FxIndexMap, OfflineDependencyProvider, PubGrubError, VersionSet, resolve};

const PACKAGES: u32 = 4;
const VERSIONS: u32 = 3;

type Provider = OfflineDependencyProvider<u32, u32>;

/// Dependencies of a single package version: `(dependency, lower, upper)` for `[lower, upper)`.
type Requirements = Vec<(u32, u32, u32)>;

/// For each package, for each version, its requirements. `None` when the version doesn't exist.
type Registry = Vec<Vec<Option<Requirements>>>;

fn registry_strategy() -> impl Strategy<Value = Registry> {
    let requirement = (0..PACKAGES, 0..=VERSIONS, 0..=VERSIONS);
    let version = prop::option::weighted(0.8, prop::collection::vec(requirement, 0..3));
    let package = prop::collection::vec(version, VERSIONS as usize);
    prop::collection::vec(package, PACKAGES as usize)
}

fn provider(registry: &Registry) -> Provider {
    let mut provider = Provider::new();
    for (package, versions) in (0u32..).zip(registry) {
        for (version, requirements) in (0u32..).zip(versions) {
            let Some(requirements) = requirements else {
                continue;
            };
            // Requirements on the same package all apply.
            let mut dependencies: FxIndexMap<u32, VersionSet<u32>> = FxIndexMap::default();
            for &(dependency, lower, upper) in requirements {
                let set = VersionSet::between(lower, upper);
                dependencies
                    .entry(dependency)
                    .and_modify(|existing| *existing = existing.intersection(&set))
                    .or_insert(set);
            }
            provider.add_dependencies(package, version, dependencies);
        }
    }
    provider
}

/// Whether the selection satisfies every requirement of every selected package version.
fn is_solution(registry: &Registry, selection: &[Option<u32>]) -> bool {
    selection
        .iter()
        .zip(registry)
        .all(|(selected, versions)| match selected {
            None => true,
            Some(version) => match &versions[*version as usize] {
                None => false,
                Some(requirements) => {
                    requirements.iter().all(|&(dependency, lower, upper)| {
                        selection[dependency as usize]
                            .is_some_and(|selected| lower <= selected && selected < upper)
                    })
                }
            },
        })
}

/// Try every selection with the root package at `root_version`.
fn exhaustive_search(registry: &Registry, root_version: u32) -> bool {
    let choices = VERSIONS + 1;
    (0..choices.pow(PACKAGES - 1)).any(|mut index| {
        let mut selection = vec![Some(root_version)];
        for _ in 1..PACKAGES {
            let choice = index % choices;
            index /= choices;
            selection.push((choice < VERSIONS).then_some(choice));
        }
        is_solution(registry, &selection)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn agrees_with_exhaustive_search(registry in registry_strategy(), root_version in 0..VERSIONS) {
        let provider = provider(&registry);
        match block_on(resolve(&provider, 0, root_version)) {
            Ok(solution) => {
                let mut selection = vec![None; PACKAGES as usize];
                for (package, version) in &solution {
                    selection[*package as usize] = Some(*version);
                }
                prop_assert_eq!(selection[0], Some(root_version));
                prop_assert!(is_solution(&registry, &selection), "{:?}", solution);
            }
            Err(PubGrubError::NoSolution(_)) => {
                prop_assert!(!exhaustive_search(&registry, root_version));
            }
            Err(err) => prop_assert!(false, "unexpected error: {:?}", err),
        }
    }

    #[test]
    fn deterministic(registry in registry_strategy()) {
        let provider = provider(&registry);
        let first = block_on(resolve(&provider, 0, 0u32)).ok();
        let second = block_on(resolve(&provider, 0, 0u32)).ok();
        prop_assert_eq!(first, second);
    }
}
