//! Core state of the solver: the incompatibility store, the partial solution, and the
//! propagation and conflict resolution steps working on them.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};

use grove_version::{Version, VersionSet};

use crate::internal::arena::Arena;
use crate::internal::incompatibility::{IncompId, Incompatibility, Relation};
use crate::internal::partial_solution::{DecisionLevel, PartialSolution, SatisfierSearch};
use crate::{DerivationTree, FxIndexMap, Package};

/// The solver state of a single resolution.
pub(crate) struct State<P, V> {
    root_package: P,
    root_version: V,

    /// The incompatibilities mentioning each package, oldest first. The map's insertion order is
    /// the order in which packages were discovered.
    incompatibilities: FxIndexMap<P, Vec<IncompId<P, V>>>,

    /// Incompatibilities known to be contradicted, with the decision level at which they became
    /// contradicted. They stay contradicted until a backtrack below that level.
    contradicted_incompatibilities: FxHashMap<IncompId<P, V>, DecisionLevel>,

    pub(crate) incompatibility_store: Arena<Incompatibility<P, V>>,
    pub(crate) partial_solution: PartialSolution<P, V>,

    /// Packages whose assignments changed and still need propagation.
    unit_propagation_buffer: SmallVec<[P; 4]>,
}

impl<P: Package, V: Version> State<P, V> {
    pub(crate) fn init(root_package: P, root_version: V) -> Self {
        let mut incompatibility_store = Arena::new();
        let not_root_id = incompatibility_store.alloc(Incompatibility::not_root(
            root_package.clone(),
            root_version.clone(),
        ));
        let mut incompatibilities = FxIndexMap::default();
        incompatibilities.insert(root_package.clone(), vec![not_root_id]);
        Self {
            root_package,
            root_version,
            incompatibilities,
            contradicted_incompatibilities: FxHashMap::default(),
            incompatibility_store,
            partial_solution: PartialSolution::empty(),
            unit_propagation_buffer: SmallVec::new(),
        }
    }

    /// Store a new incompatibility and register it for each of its packages.
    pub(crate) fn add_incompatibility(
        &mut self,
        incompat: Incompatibility<P, V>,
    ) -> IncompId<P, V> {
        let id = self.incompatibility_store.alloc(incompat);
        self.merge_incompatibility(id);
        id
    }

    /// Register the dependencies of `package` at `version`, returning the ids of the new
    /// incompatibilities.
    pub(crate) fn add_incompatibility_from_dependencies(
        &mut self,
        package: &P,
        version: &V,
        dependencies: impl IntoIterator<Item = (P, VersionSet<V>)>,
    ) -> Vec<IncompId<P, V>> {
        dependencies
            .into_iter()
            .filter_map(|dependency| {
                Incompatibility::from_dependency(package.clone(), version.clone(), dependency)
            })
            .map(|incompat| self.add_incompatibility(incompat))
            .collect()
    }

    fn merge_incompatibility(&mut self, id: IncompId<P, V>) {
        for (package, _) in self.incompatibility_store[id].iter() {
            self.incompatibilities
                .entry(package.clone())
                .or_default()
                .push(id);
        }
    }

    /// The position of `package` in discovery order, used to break ties between packages.
    pub(crate) fn discovery_index(&self, package: &P) -> usize {
        self.incompatibilities
            .get_index_of(package)
            .unwrap_or(usize::MAX)
    }

    /// Derive everything that follows from the changes to `package`, resolving conflicts along
    /// the way.
    ///
    /// Returns the terminal incompatibility if a conflict can't be resolved.
    pub(crate) fn unit_propagation(&mut self, package: P) -> Result<(), IncompId<P, V>> {
        self.unit_propagation_buffer.clear();
        self.unit_propagation_buffer.push(package);
        while let Some(current_package) = self.unit_propagation_buffer.pop() {
            let mut conflict_id = None;
            // Newer incompatibilities are usually more specific, and conflict with the partial
            // solution sooner.
            for &incompat_id in self.incompatibilities[&current_package].iter().rev() {
                if self.contradicted_incompatibilities.contains_key(&incompat_id) {
                    continue;
                }
                let current_incompat = &self.incompatibility_store[incompat_id];
                match self.partial_solution.relation(current_incompat) {
                    Relation::Satisfied => {
                        debug!("Conflict with {current_incompat}");
                        conflict_id = Some(incompat_id);
                        break;
                    }
                    Relation::AlmostSatisfied(package_almost) => {
                        trace!("Deriving {package_almost} from {current_incompat}");
                        if !self.unit_propagation_buffer.contains(&package_almost) {
                            self.unit_propagation_buffer.push(package_almost.clone());
                        }
                        self.partial_solution.add_derivation(
                            package_almost,
                            incompat_id,
                            &self.incompatibility_store,
                        );
                        // With the new derivation, the incompatibility is contradicted.
                        self.contradicted_incompatibilities
                            .insert(incompat_id, self.partial_solution.current_decision_level());
                    }
                    Relation::Contradicted(_) => {
                        self.contradicted_incompatibilities
                            .insert(incompat_id, self.partial_solution.current_decision_level());
                    }
                    Relation::Inconclusive => {}
                }
            }
            if let Some(incompat_id) = conflict_id {
                let (package_almost, root_cause) = self.conflict_resolution(incompat_id)?;
                self.unit_propagation_buffer.clear();
                self.unit_propagation_buffer.push(package_almost.clone());
                debug!(
                    "Deriving {package_almost} from learned {}",
                    self.incompatibility_store[root_cause]
                );
                self.partial_solution.add_derivation(
                    package_almost,
                    root_cause,
                    &self.incompatibility_store,
                );
                self.contradicted_incompatibilities
                    .insert(root_cause, self.partial_solution.current_decision_level());
            }
        }
        Ok(())
    }

    /// Learn from a conflict until backtracking turns it into a derivation.
    ///
    /// Returns the package to derive and the incompatibility it is derived from, or the terminal
    /// incompatibility proving that there is no solution.
    fn conflict_resolution(
        &mut self,
        incompatibility: IncompId<P, V>,
    ) -> Result<(P, IncompId<P, V>), IncompId<P, V>> {
        let mut current_incompat_id = incompatibility;
        let mut current_incompat_changed = false;
        loop {
            if self.incompatibility_store[current_incompat_id]
                .is_terminal(&self.root_package, &self.root_version)
            {
                debug!(
                    "Terminal incompatibility: {}",
                    self.incompatibility_store[current_incompat_id]
                );
                return Err(current_incompat_id);
            }

            let (package, satisfier_search) = self
                .partial_solution
                .satisfier_search(&self.incompatibility_store[current_incompat_id]);
            match satisfier_search {
                SatisfierSearch::DifferentDecisionLevels {
                    previous_satisfier_level,
                } => {
                    self.backtrack(
                        current_incompat_id,
                        current_incompat_changed,
                        previous_satisfier_level,
                    );
                    return Ok((package, current_incompat_id));
                }
                SatisfierSearch::SameDecisionLevels { satisfier_cause } => {
                    let prior_cause = Incompatibility::prior_cause(
                        current_incompat_id,
                        satisfier_cause,
                        &package,
                        &self.incompatibility_store,
                    );
                    debug!("Learned {prior_cause}");
                    current_incompat_id = self.incompatibility_store.alloc(prior_cause);
                    current_incompat_changed = true;
                }
            }
        }
    }

    fn backtrack(
        &mut self,
        incompat: IncompId<P, V>,
        incompat_changed: bool,
        decision_level: DecisionLevel,
    ) {
        debug!("Backtracking to decision level {decision_level}");
        self.partial_solution.backtrack(decision_level);
        self.contradicted_incompatibilities
            .retain(|_, level| *level <= decision_level);
        if incompat_changed {
            self.merge_incompatibility(incompat);
        }
    }

    pub(crate) fn build_derivation_tree(&self, incompat: IncompId<P, V>) -> DerivationTree<P, V> {
        Incompatibility::build_derivation_tree(incompat, &self.incompatibility_store)
    }
}
