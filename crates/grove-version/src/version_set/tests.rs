use std::str::FromStr;

use proptest::prelude::*;

use crate::{PrereleaseIdentifier, Ranges, SemanticVersion, Version, VersionSet};

fn version_strat() -> impl Strategy<Value = SemanticVersion> {
    (0u64..4, 0u64..3, 0u64..3, prop::option::of(0u64..3)).prop_map(
        |(major, minor, patch, pre)| {
            let version = SemanticVersion::new(major, minor, patch);
            match pre {
                Some(number) => version.with_prerelease([PrereleaseIdentifier::Numeric(number)]),
                None => version,
            }
        },
    )
}

fn axis_strat() -> impl Strategy<Value = Ranges<SemanticVersion>> {
    prop::collection::vec((version_strat(), version_strat(), 0u8..4), 0..4).prop_map(|pieces| {
        pieces
            .into_iter()
            .fold(Ranges::empty(), |ranges: Ranges<SemanticVersion>, (lower, upper, kind)| {
                let piece: Ranges<SemanticVersion> = match kind {
                    0 => Ranges::between(lower, upper),
                    1 => Ranges::singleton(lower),
                    2 => Ranges::higher_than(lower),
                    _ => Ranges::strictly_lower_than(upper),
                };
                ranges.union(&piece)
            })
    })
}

fn set_strat() -> impl Strategy<Value = VersionSet<SemanticVersion>> {
    (axis_strat(), axis_strat())
        .prop_map(|(release, prerelease)| VersionSet::from_parts(release, prerelease))
}

proptest! {
    #[test]
    fn intersection_contains_both(a in set_strat(), b in set_strat(), version in version_strat()) {
        assert_eq!(
            a.intersection(&b).contains(&version),
            a.contains(&version) && b.contains(&version)
        );
    }

    #[test]
    fn union_contains_either(a in set_strat(), b in set_strat(), version in version_strat()) {
        assert_eq!(
            a.union(&b).contains(&version),
            a.contains(&version) || b.contains(&version)
        );
    }

    #[test]
    fn complement_contains_opposite(a in set_strat(), version in version_strat()) {
        assert_ne!(a.contains(&version), a.complement().contains(&version));
    }

    #[test]
    fn intersection_with_complement_is_empty(a in set_strat()) {
        assert!(a.intersection(&a.complement()).is_empty());
    }

    #[test]
    fn union_with_complement_is_any(a in set_strat()) {
        assert_eq!(a.union(&a.complement()), VersionSet::any());
    }

    #[test]
    fn double_complement_is_identity(a in set_strat()) {
        assert_eq!(a.complement().complement(), a);
    }

    #[test]
    fn de_morgan(a in set_strat(), b in set_strat()) {
        assert_eq!(
            a.union(&b).complement(),
            a.complement().intersection(&b.complement())
        );
        assert_eq!(
            a.intersection(&b).complement(),
            a.complement().union(&b.complement())
        );
    }

    #[test]
    fn intersection_distributes_over_union(a in set_strat(), b in set_strat(), c in set_strat()) {
        assert_eq!(
            a.intersection(&b.union(&c)),
            a.intersection(&b).union(&a.intersection(&c))
        );
    }

    #[test]
    fn subset_of_union(a in set_strat(), b in set_strat()) {
        assert!(a.subset_of(&a.union(&b)));
        assert!(a.intersection(&b).subset_of(&a));
    }

    #[test]
    fn default_constructors_exclude_prereleases(lower in version_strat(), upper in version_strat(), version in version_strat()) {
        prop_assume!(version.is_prerelease());
        let lower = lower.only_release();
        assert!(!VersionSet::between(lower.clone(), upper).contains(&version));
        assert!(!VersionSet::higher_than(lower.clone()).contains(&version));
        assert!(!VersionSet::strictly_lower_than(lower).contains(&version));
        assert!(!VersionSet::full_release().contains(&version));
    }
}

fn v(version: &str) -> SemanticVersion {
    SemanticVersion::from_str(version).unwrap()
}

#[test]
fn any_and_none() {
    let any = VersionSet::<SemanticVersion>::any();
    let none = VersionSet::<SemanticVersion>::none();
    assert!(any.contains(&v("1.0.0")));
    assert!(any.contains(&v("1.0.0-alpha")));
    assert!(!none.contains(&v("1.0.0")));
    assert!(none.is_empty());
    assert!(any.is_any());
    assert_eq!(any.complement(), none);
}

#[test]
fn between_excludes_upper_bound_and_prereleases() {
    let set = VersionSet::between(v("1.0.0"), v("2.0.0"));
    assert!(set.contains(&v("1.0.0")));
    assert!(set.contains(&v("1.9.9")));
    assert!(!set.contains(&v("2.0.0")));
    assert!(!set.contains(&v("1.5.0-beta.1")));
    assert!(!set.contains(&v("0.9.0")));
}

#[test]
fn allowing_prereleases() {
    let set = VersionSet::between(v("1.0.0"), v("2.0.0")).allowing_prereleases();
    assert!(set.contains(&v("1.5.0-beta.1")));
    assert!(set.contains(&v("2.0.0-rc.1")));
    assert!(!set.contains(&v("1.0.0-rc.1")));
    assert!(!set.contains(&v("2.0.0")));
}

#[test]
fn exact_prerelease_is_explicit_opt_in() {
    let prerelease = v("1.0.0-rc.1");
    let set = VersionSet::exact(prerelease.clone());
    assert!(set.contains(&prerelease));
    assert!(!set.contains(&v("1.0.0")));
    assert_eq!(set.as_singleton(), Some(&prerelease));

    let release = VersionSet::exact(v("1.0.0"));
    assert!(release.contains(&v("1.0.0")));
    assert!(!release.contains(&prerelease));
    assert_eq!(release.as_singleton(), Some(&v("1.0.0")));
}

#[test]
fn diamond_intersection() {
    let left = VersionSet::between(v("2.0.0"), v("4.0.0"));
    let right = VersionSet::between(v("3.0.0"), v("5.0.0"));
    let both = left.intersection(&right);
    assert_eq!(both, VersionSet::between(v("3.0.0"), v("4.0.0")));
    assert!(both.contains(&v("3.6.9")));
}

#[test]
fn exact_release_excludes_its_prereleases() {
    let version = v("3.0.0-rc.2");
    let release = VersionSet::exact(version.only_release());
    assert!(release.contains(&v("3.0.0")));
    assert!(!release.contains(&version));
    // `3.0.0-rc.2` sorts below `3.0.0`, so it stays out even with pre-releases allowed.
    assert!(!release.allowing_prereleases().contains(&version));
}

#[test]
fn display() {
    assert_eq!(VersionSet::<SemanticVersion>::full_release().to_string(), "*");
    assert_eq!(
        VersionSet::<SemanticVersion>::any().to_string(),
        "* (including pre-releases)"
    );
    assert_eq!(VersionSet::<SemanticVersion>::none().to_string(), "∅");
    assert_eq!(VersionSet::exact(v("1")).to_string(), "1.0.0");
    assert_eq!(
        VersionSet::between(v("1"), v("2")).to_string(),
        ">=1.0.0, <2.0.0"
    );
    assert_eq!(VersionSet::higher_than(v("1")).to_string(), ">1.0.0");
    assert_eq!(
        VersionSet::exact(v("1.0.0-rc.1")).to_string(),
        "1.0.0-rc.1 (pre-releases only)"
    );
    assert_eq!(
        VersionSet::between(v("1"), v("2")).complement().to_string(),
        "<1.0.0 | >=2.0.0 or pre-releases *"
    );
}

#[test]
fn parse() {
    assert_eq!(
        VersionSet::<SemanticVersion>::from_str(">=1.0.0, <2.0.0").unwrap(),
        VersionSet::between(v("1"), v("2"))
    );
    assert_eq!(
        VersionSet::<SemanticVersion>::from_str("1.1").unwrap(),
        VersionSet::exact(v("1.1.0"))
    );
    assert_eq!(
        VersionSet::<SemanticVersion>::from_str(">=1, <2 (including pre-releases)").unwrap(),
        VersionSet::between(v("1"), v("2")).allowing_prereleases()
    );
    assert_eq!(
        VersionSet::<SemanticVersion>::from_str("*").unwrap(),
        VersionSet::full_release()
    );
    let err = VersionSet::<SemanticVersion>::from_str(">=one").unwrap_err();
    assert_eq!(err.to_string(), "Failed to parse version set `>=one`");
}

#[cfg(feature = "serde")]
#[test]
fn serde_as_string() {
    let set: VersionSet<SemanticVersion> = serde_json::from_str("\">=1.0.0, <2.0.0\"").unwrap();
    assert_eq!(set, VersionSet::between(v("1"), v("2")));
    assert_eq!(serde_json::to_string(&set).unwrap(), "\">=1.0.0, <2.0.0\"");
}
