use std::fmt::{self, Display};

use grove_version::{Version, VersionSet};

/// A positive or negative statement about the version selected for a package.
///
/// `Positive(set)` means the package is selected at a version in `set`. `Negative(set)` means it
/// is not selected at a version in `set`, which also holds if it isn't selected at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Term<V> {
    Positive(VersionSet<V>),
    Negative(VersionSet<V>),
}

/// How a term relates to what the partial solution already knows about a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Relation {
    /// The known term implies this one.
    Satisfied,
    /// The known term excludes this one.
    Contradicted,
    Inconclusive,
}

impl<V: Version> Term<V> {
    /// A term that always holds.
    pub(crate) fn any() -> Self {
        Self::Negative(VersionSet::none())
    }

    /// A term that never holds.
    pub(crate) fn empty() -> Self {
        Self::Positive(VersionSet::none())
    }

    pub(crate) fn exact(version: V) -> Self {
        Self::Positive(VersionSet::exact(version))
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Self::Positive(_))
    }

    #[must_use]
    pub fn negate(&self) -> Self {
        match self {
            Self::Positive(set) => Self::Negative(set.clone()),
            Self::Negative(set) => Self::Positive(set.clone()),
        }
    }

    /// Whether selecting `version` makes this term hold.
    pub fn contains(&self, version: &V) -> bool {
        match self {
            Self::Positive(set) => set.contains(version),
            Self::Negative(set) => !set.contains(version),
        }
    }

    /// The set of a positive term.
    ///
    /// Panics on negative terms, which are only ever built where a positive one is impossible.
    pub(crate) fn unwrap_positive(&self) -> &VersionSet<V> {
        match self {
            Self::Positive(set) => set,
            Self::Negative(set) => {
                panic!("Negative term `Not ( {set} )` where a positive one was expected")
            }
        }
    }

    #[must_use]
    pub(crate) fn intersection(&self, other: &Self) -> Self {
        match (self, other) {
            (Self::Positive(r1), Self::Positive(r2)) => Self::Positive(r1.intersection(r2)),
            (Self::Positive(r1), Self::Negative(r2)) | (Self::Negative(r2), Self::Positive(r1)) => {
                Self::Positive(r1.intersection(&r2.complement()))
            }
            (Self::Negative(r1), Self::Negative(r2)) => Self::Negative(r1.union(r2)),
        }
    }

    #[must_use]
    pub(crate) fn union(&self, other: &Self) -> Self {
        self.negate().intersection(&other.negate()).negate()
    }

    /// Whether every selection satisfying `self` also satisfies `other`.
    pub(crate) fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }

    /// Compare this term with the intersection of everything known about its package.
    pub(crate) fn relation_with(&self, other_terms_intersection: &Self) -> Relation {
        let full_intersection = self.intersection(other_terms_intersection);
        if &full_intersection == other_terms_intersection {
            Relation::Satisfied
        } else if full_intersection == Self::empty() {
            Relation::Contradicted
        } else {
            Relation::Inconclusive
        }
    }
}

impl<V: Display + Eq> Display for Term<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Positive(set) => write!(f, "{set}"),
            Self::Negative(set) => write!(f, "Not ( {set} )"),
        }
    }
}

#[cfg(test)]
mod tests {
    use grove_version::SemanticVersion;
    use proptest::prelude::*;

    use super::*;

    fn version(major: u64) -> SemanticVersion {
        SemanticVersion::new(major, 0, 0)
    }

    fn set_strat() -> impl Strategy<Value = VersionSet<SemanticVersion>> {
        prop::collection::vec((0u64..6, 0u64..6), 0..3).prop_map(|pairs| {
            pairs
                .into_iter()
                .fold(VersionSet::none(), |set, (lower, upper)| {
                    set.union(&VersionSet::between(version(lower), version(upper)))
                })
        })
    }

    fn term_strat() -> impl Strategy<Value = Term<SemanticVersion>> {
        prop_oneof![
            set_strat().prop_map(Term::Positive),
            set_strat().prop_map(Term::Negative),
        ]
    }

    proptest! {
        #[test]
        fn relation_with(term1 in term_strat(), term2 in term_strat()) {
            match term1.relation_with(&term2) {
                Relation::Satisfied => assert!(term2.subset_of(&term1)),
                Relation::Contradicted => assert_eq!(term1.intersection(&term2), Term::empty()),
                Relation::Inconclusive => {
                    assert!(!term2.subset_of(&term1));
                    assert_ne!(term1.intersection(&term2), Term::empty());
                }
            }
        }

        #[test]
        fn intersection_contains_both(
            term1 in term_strat(),
            term2 in term_strat(),
            major in 0u64..7
        ) {
            let version = version(major);
            assert_eq!(
                term1.intersection(&term2).contains(&version),
                term1.contains(&version) && term2.contains(&version)
            );
        }

        #[test]
        fn union_contains_either(term1 in term_strat(), term2 in term_strat(), major in 0u64..7) {
            let version = version(major);
            assert_eq!(
                term1.union(&term2).contains(&version),
                term1.contains(&version) || term2.contains(&version)
            );
        }
    }

    #[test]
    fn any_and_empty() {
        let term = Term::Positive(VersionSet::between(version(1), version(2)));
        assert_eq!(Term::any().intersection(&term), term);
        assert_eq!(Term::empty().intersection(&term), Term::empty());
        assert!(Term::<SemanticVersion>::any().contains(&version(7)));
    }

    #[test]
    fn display() {
        let set = VersionSet::between(version(1), version(2));
        assert_eq!(Term::Positive(set.clone()).to_string(), ">=1.0.0, <2.0.0");
        assert_eq!(Term::Negative(set).to_string(), "Not ( >=1.0.0, <2.0.0 )");
    }
}
