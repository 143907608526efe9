//! An incompatibility is a set of terms for different packages that should never be satisfied
//! all together.

use std::fmt::{self, Display};

use rustc_hash::{FxHashMap, FxHashSet};
use smallvec::{SmallVec, smallvec};

use grove_version::{Version, VersionSet};

use crate::internal::arena::{Arena, Id};
use crate::report::{DefaultStringReporter, DerivationTree, Derived, External, Node};
use crate::term::{self, Term};
use crate::Package;

pub(crate) type IncompId<P, V> = Id<Incompatibility<P, V>>;

/// A set of terms that must not all hold at the same time, e.g. `{foo 1.0.0, not bar >=2.0.0}`
/// means that `foo 1.0.0` can't be selected together with a `bar` outside of `>=2.0.0`.
///
/// Terms are kept in insertion order, with at most one term per package.
#[derive(Debug, Clone)]
pub(crate) struct Incompatibility<P, V> {
    package_terms: SmallVec<[(P, Term<V>); 2]>,
    kind: Kind<P, V>,
}

/// Why an incompatibility holds.
#[derive(Debug, Clone)]
enum Kind<P, V> {
    /// The root package can only be selected at the root version.
    NotRoot(P, V),
    /// There are no versions of the package in the set.
    NoVersions(P, VersionSet<V>),
    /// The first package, at the versions in the first set, depends on the second package at the
    /// versions in the second set.
    FromDependencyOf(P, VersionSet<V>, P, VersionSet<V>),
    /// Learned during conflict resolution from two other incompatibilities.
    DerivedFrom(IncompId<P, V>, IncompId<P, V>),
}

/// How an incompatibility relates to the partial solution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Relation<P> {
    /// Every term is satisfied: the partial solution is in conflict.
    Satisfied,
    /// At least one term is contradicted, so the incompatibility can't fire.
    Contradicted(P),
    /// Every term but the one for this package is satisfied, and that one is inconclusive.
    AlmostSatisfied(P),
    Inconclusive,
}

impl<P: Package, V: Version> Incompatibility<P, V> {
    /// The root package must be selected at the root version.
    pub(crate) fn not_root(package: P, version: V) -> Self {
        Self {
            package_terms: smallvec![(
                package.clone(),
                Term::Negative(VersionSet::exact(version.clone()))
            )],
            kind: Kind::NotRoot(package, version),
        }
    }

    /// No version of `package` satisfies `term`.
    pub(crate) fn no_versions(package: P, term: Term<V>) -> Self {
        let set = term.unwrap_positive().clone();
        Self {
            package_terms: smallvec![(package.clone(), term)],
            kind: Kind::NoVersions(package, set),
        }
    }

    /// `package` at `version` depends on `dependency` at a version in `set`.
    ///
    /// Returns `None` for a package depending on itself at a set containing its own version,
    /// which is always satisfied.
    pub(crate) fn from_dependency(
        package: P,
        version: V,
        (dependency, set): (P, VersionSet<V>),
    ) -> Option<Self> {
        let exact = VersionSet::exact(version.clone());
        let package_terms = if dependency == package {
            if set.contains(&version) {
                return None;
            }
            smallvec![(package.clone(), Term::Positive(exact.clone()))]
        } else if set.is_empty() {
            smallvec![(package.clone(), Term::Positive(exact.clone()))]
        } else {
            smallvec![
                (package.clone(), Term::Positive(exact.clone())),
                (dependency.clone(), Term::Negative(set.clone())),
            ]
        };
        Some(Self {
            package_terms,
            kind: Kind::FromDependencyOf(package, exact, dependency, set),
        })
    }

    /// Binary resolution: combine `incompat` with the cause of the assignment that satisfied its
    /// term for `package`.
    ///
    /// The result keeps every other term of both (intersected where both mention the same
    /// package), and the union of their two terms on `package`, unless that union always holds.
    pub(crate) fn prior_cause(
        incompat: IncompId<P, V>,
        satisfier_cause: IncompId<P, V>,
        package: &P,
        store: &Arena<Self>,
    ) -> Self {
        let kind = Kind::DerivedFrom(incompat, satisfier_cause);
        let incompat = &store[incompat];
        let satisfier_cause = &store[satisfier_cause];

        let mut package_terms: SmallVec<[(P, Term<V>); 2]> = incompat
            .package_terms
            .iter()
            .filter(|(p, _)| p != package)
            .cloned()
            .collect();
        for (p, term) in &satisfier_cause.package_terms {
            if p == package {
                continue;
            }
            if let Some((_, existing)) = package_terms.iter_mut().find(|(known, _)| known == p) {
                *existing = existing.intersection(term);
            } else {
                package_terms.push((p.clone(), term.clone()));
            }
        }

        let t1 = incompat
            .get(package)
            .expect("the resolved package is part of the incompatibility");
        let t2 = satisfier_cause
            .get(package)
            .expect("the resolved package is part of the satisfier cause");
        let term = t1.union(t2);
        if term != Term::any() {
            package_terms.push((package.clone(), term));
        }

        Self {
            package_terms,
            kind,
        }
    }

    /// Whether this incompatibility proves that the root can't be selected, i.e. that resolution
    /// failed.
    pub(crate) fn is_terminal(&self, root_package: &P, root_version: &V) -> bool {
        match self.package_terms.as_slice() {
            [] => true,
            [(package, term)] => package == root_package && term.contains(root_version),
            _ => false,
        }
    }

    pub(crate) fn get(&self, package: &P) -> Option<&Term<V>> {
        self.package_terms
            .iter()
            .find(|(p, _)| p == package)
            .map(|(_, term)| term)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&P, &Term<V>)> {
        self.package_terms.iter().map(|(package, term)| (package, term))
    }

    /// The two incompatibilities this one was derived from, if any.
    pub(crate) fn causes(&self) -> Option<(IncompId<P, V>, IncompId<P, V>)> {
        match self.kind {
            Kind::DerivedFrom(id1, id2) => Some((id1, id2)),
            _ => None,
        }
    }

    /// Classify this incompatibility given the accumulated term of each package.
    pub(crate) fn relation<'a>(
        &self,
        mut terms: impl FnMut(&P) -> Option<&'a Term<V>>,
    ) -> Relation<P>
    where
        V: 'a,
    {
        let mut relation = Relation::Satisfied;
        for (package, incompat_term) in &self.package_terms {
            match terms(package).map(|term| incompat_term.relation_with(term)) {
                Some(term::Relation::Satisfied) => {}
                Some(term::Relation::Contradicted) => {
                    return Relation::Contradicted(package.clone());
                }
                // Nothing known about a package is the same as `Term::any`, which never satisfies
                // a term: incompatibilities don't store terms that always hold.
                None | Some(term::Relation::Inconclusive) => {
                    if relation == Relation::Satisfied {
                        relation = Relation::AlmostSatisfied(package.clone());
                    } else {
                        return Relation::Inconclusive;
                    }
                }
            }
        }
        relation
    }

    fn external(&self) -> Option<External<P, V>> {
        match &self.kind {
            Kind::NotRoot(package, version) => {
                Some(External::NotRoot(package.clone(), version.clone()))
            }
            Kind::NoVersions(package, set) => {
                Some(External::NoVersions(package.clone(), set.clone()))
            }
            Kind::FromDependencyOf(package, set, dependency, dependency_set) => {
                Some(External::FromDependencyOf(
                    package.clone(),
                    set.clone(),
                    dependency.clone(),
                    dependency_set.clone(),
                ))
            }
            Kind::DerivedFrom(..) => None,
        }
    }

    /// Build the derivation tree proving `root`.
    ///
    /// Derived incompatibilities always have larger ids than their causes, so walking the
    /// reachable ids in ascending order builds every child before its parent.
    pub(crate) fn build_derivation_tree(
        root: IncompId<P, V>,
        store: &Arena<Self>,
    ) -> DerivationTree<P, V> {
        let mut reachable = FxHashSet::default();
        let mut shared_ids = FxHashSet::default();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            if !reachable.insert(id) {
                if store[id].causes().is_some() {
                    shared_ids.insert(id);
                }
                continue;
            }
            if let Some((id1, id2)) = store[id].causes() {
                stack.push(id1);
                stack.push(id2);
            }
        }

        let mut ordered: Vec<_> = reachable.into_iter().collect();
        ordered.sort_unstable();

        let mut nodes = Arena::new();
        let mut built: FxHashMap<IncompId<P, V>, _> = FxHashMap::default();
        for id in ordered {
            let incompat = &store[id];
            let node = match (incompat.external(), incompat.causes()) {
                (Some(external), _) => Node::External(external),
                (None, Some((id1, id2))) => Node::Derived(Derived {
                    terms: incompat.package_terms.to_vec(),
                    shared_id: shared_ids.contains(&id).then(|| id.into_raw()),
                    cause1: built[&id1],
                    cause2: built[&id2],
                }),
                (None, None) => unreachable!("an incompatibility is either external or derived"),
            };
            built.insert(id, nodes.alloc(node));
        }

        DerivationTree::new(nodes, built[&root])
    }
}

impl<P: Package, V: Version> Display for Incompatibility<P, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            DefaultStringReporter::string_terms(self.package_terms.as_slice())
        )
    }
}
