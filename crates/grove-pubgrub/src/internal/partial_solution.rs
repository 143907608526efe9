//! The partial solution is the current state of the solution being built by the algorithm.

use std::fmt::{self, Display};

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use grove_version::{Version, VersionSet};

use crate::internal::arena::Arena;
use crate::internal::incompatibility::{IncompId, Incompatibility, Relation};
use crate::term::Term;
use crate::{FxIndexMap, Package, SelectedDependencies};

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct DecisionLevel(pub(crate) usize);

impl Display for DecisionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug)]
enum AssignmentKind<P, V> {
    Decision(V),
    Derivation(IncompId<P, V>),
}

/// A single entry of the solver's history.
#[derive(Clone, Debug)]
struct Assignment<P, V> {
    package: P,
    kind: AssignmentKind<P, V>,
    /// The term this assignment asserts on its own.
    term: Term<V>,
    /// The intersection of every assignment for `package` up to and including this one.
    accumulated: Term<V>,
    decision_level: DecisionLevel,
    /// The previous assignment for `package`, if any.
    previous: Option<usize>,
}

/// The decisions and derivations made so far, in the order they were made.
///
/// The history is append-only. Backtracking truncates it at the start of a decision level and
/// rewinds the per-package index by following `previous` links of the removed entries.
#[derive(Clone, Debug)]
pub(crate) struct PartialSolution<P, V> {
    history: Vec<Assignment<P, V>>,
    /// The history index of the decision opening each level, i.e. `decision_starts[0]` opened
    /// level 1.
    decision_starts: Vec<usize>,
    /// The latest assignment of each package.
    latest: FxHashMap<P, usize>,
}

pub(crate) enum SatisfierSearch<P, V> {
    /// Backtracking to the previous satisfier's level turns the incompatibility into a
    /// derivation.
    DifferentDecisionLevels {
        previous_satisfier_level: DecisionLevel,
    },
    /// The satisfier must be resolved with its cause first.
    SameDecisionLevels { satisfier_cause: IncompId<P, V> },
}

impl<P: Package, V: Version> PartialSolution<P, V> {
    pub(crate) fn empty() -> Self {
        Self {
            history: Vec::new(),
            decision_starts: Vec::new(),
            latest: FxHashMap::default(),
        }
    }

    pub(crate) fn current_decision_level(&self) -> DecisionLevel {
        DecisionLevel(self.decision_starts.len())
    }

    /// The intersection of every assignment for `package`, if there is any.
    pub(crate) fn term_intersection_for_package(&self, package: &P) -> Option<&Term<V>> {
        self.latest
            .get(package)
            .map(|&idx| &self.history[idx].accumulated)
    }

    /// Select `version` for `package`, opening a new decision level.
    pub(crate) fn add_decision(&mut self, package: P, version: V) {
        let previous = self.latest.get(&package).copied();
        let term = Term::exact(version.clone());
        let accumulated = match previous.map(|idx| &self.history[idx]) {
            Some(assignment) => {
                assert!(
                    matches!(assignment.kind, AssignmentKind::Derivation(_)),
                    "{package} was already decided"
                );
                assert!(
                    assignment.accumulated.contains(&version),
                    "{package} {version} is not allowed by {}",
                    assignment.accumulated
                );
                assignment.accumulated.intersection(&term)
            }
            None => term.clone(),
        };

        self.decision_starts.push(self.history.len());
        self.push(Assignment {
            package,
            kind: AssignmentKind::Decision(version),
            term,
            accumulated,
            decision_level: self.current_decision_level(),
            previous,
        });
    }

    /// Record the negation of `cause`'s term on `package` at the current decision level.
    pub(crate) fn add_derivation(
        &mut self,
        package: P,
        cause: IncompId<P, V>,
        store: &Arena<Incompatibility<P, V>>,
    ) {
        let term = store[cause]
            .get(&package)
            .expect("a derivation's cause mentions its package")
            .negate();
        let previous = self.latest.get(&package).copied();
        let accumulated = match previous.map(|idx| &self.history[idx]) {
            Some(assignment) => {
                assert!(
                    matches!(assignment.kind, AssignmentKind::Derivation(_)),
                    "derived {package} {term} after it was decided"
                );
                let accumulated = assignment.accumulated.intersection(&term);
                assert!(
                    accumulated != Term::empty(),
                    "derived {package} {term} contradicts {}",
                    assignment.accumulated
                );
                accumulated
            }
            None => term.clone(),
        };

        self.push(Assignment {
            package,
            kind: AssignmentKind::Derivation(cause),
            term,
            accumulated,
            decision_level: self.current_decision_level(),
            previous,
        });
    }

    fn push(&mut self, assignment: Assignment<P, V>) {
        self.latest
            .insert(assignment.package.clone(), self.history.len());
        self.history.push(assignment);
    }

    /// Add `version` of `package` as a decision, unless one of its dependency incompatibilities
    /// would immediately be satisfied. In that case, propagation will exclude the version instead.
    pub(crate) fn add_version(
        &mut self,
        package: P,
        version: V,
        new_incompatibilities: &[IncompId<P, V>],
        store: &Arena<Incompatibility<P, V>>,
    ) -> bool {
        let exact = Term::exact(version.clone());
        let conflicting = new_incompatibilities.iter().any(|&id| {
            store[id].relation(|p| {
                if p == &package {
                    Some(&exact)
                } else {
                    self.term_intersection_for_package(p)
                }
            }) == Relation::Satisfied
        });
        if conflicting {
            false
        } else {
            self.add_decision(package, version);
            true
        }
    }

    /// Undo every assignment made after `decision_level`.
    pub(crate) fn backtrack(&mut self, decision_level: DecisionLevel) {
        let Some(&cut) = self.decision_starts.get(decision_level.0) else {
            return;
        };
        self.decision_starts.truncate(decision_level.0);
        for assignment in self.history.drain(cut..).rev() {
            match assignment.previous {
                Some(previous) => {
                    self.latest.insert(assignment.package, previous);
                }
                None => {
                    self.latest.remove(&assignment.package);
                }
            }
        }
    }

    /// Packages that still need a decision: required by a positive term, but not decided yet.
    pub(crate) fn potential_packages(&self) -> impl Iterator<Item = (&P, &VersionSet<V>)> {
        self.latest.iter().filter_map(|(package, &idx)| {
            let assignment = &self.history[idx];
            match (&assignment.kind, &assignment.accumulated) {
                (AssignmentKind::Derivation(_), Term::Positive(set)) => Some((package, set)),
                _ => None,
            }
        })
    }

    /// Every decided package and its version, in the order the decisions were made.
    pub(crate) fn extract_solution(&self) -> SelectedDependencies<P, V> {
        self.history
            .iter()
            .filter_map(|assignment| match &assignment.kind {
                AssignmentKind::Decision(version) => {
                    Some((assignment.package.clone(), version.clone()))
                }
                AssignmentKind::Derivation(_) => None,
            })
            .collect::<FxIndexMap<_, _>>()
    }

    pub(crate) fn relation(&self, incompat: &Incompatibility<P, V>) -> Relation<P> {
        incompat.relation(|package| self.term_intersection_for_package(package))
    }

    /// Find the earliest assignment that, together with everything before it, satisfies
    /// `incompat`, and how far back the solver can jump.
    ///
    /// `incompat` must be satisfied by the partial solution.
    pub(crate) fn satisfier_search(
        &self,
        incompat: &Incompatibility<P, V>,
    ) -> (P, SatisfierSearch<P, V>) {
        let mut satisfiers: SmallVec<[(&P, &Term<V>, usize); 4]> = incompat
            .iter()
            .map(|(package, incompat_term)| {
                let idx = self
                    .earliest_satisfier(package, incompat_term, Term::any())
                    .expect("the incompatibility is satisfied");
                (package, incompat_term, idx)
            })
            .collect();

        let (satisfier_position, &(satisfier_package, incompat_term, satisfier_idx)) = satisfiers
            .iter()
            .enumerate()
            .max_by_key(|(_, (_, _, idx))| *idx)
            .expect("incompatibilities satisfied by the partial solution are not empty");
        let satisfier = &self.history[satisfier_idx];

        // Would the incompatibility already be satisfied without everything the satisfier's
        // package got before, apart from the satisfier's own term?
        let previous_idx = self
            .earliest_satisfier(satisfier_package, incompat_term, satisfier.term.clone())
            .expect("the satisfier's own term is enough");
        satisfiers[satisfier_position].2 = previous_idx;

        let previous_satisfier_level = satisfiers
            .iter()
            .map(|&(_, _, idx)| self.history[idx].decision_level)
            .max()
            .unwrap_or(DecisionLevel(0))
            .max(DecisionLevel(1));

        let search = if previous_satisfier_level < satisfier.decision_level {
            SatisfierSearch::DifferentDecisionLevels {
                previous_satisfier_level,
            }
        } else {
            match satisfier.kind {
                AssignmentKind::Derivation(satisfier_cause) => {
                    SatisfierSearch::SameDecisionLevels { satisfier_cause }
                }
                AssignmentKind::Decision(_) => panic!(
                    "the satisfier of {incompat} is the decision {satisfier_package} at level {}, \
                    but so is its previous satisfier",
                    satisfier.decision_level
                ),
            }
        };
        (satisfier_package.clone(), search)
    }

    /// The index of the first assignment of `package` at which `start`, intersected with every
    /// assignment of `package` so far, implies `incompat_term`.
    fn earliest_satisfier(
        &self,
        package: &P,
        incompat_term: &Term<V>,
        start: Term<V>,
    ) -> Option<usize> {
        let mut chain: SmallVec<[usize; 8]> = std::iter::successors(
            self.latest.get(package).copied(),
            |&idx| self.history[idx].previous,
        )
        .collect();
        chain.reverse();

        let mut accumulated = start;
        for idx in chain {
            accumulated = accumulated.intersection(&self.history[idx].term);
            if accumulated.subset_of(incompat_term) {
                return Some(idx);
            }
        }
        None
    }
}
