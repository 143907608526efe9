use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

use crate::{Ranges, RangesParseError, Version};

const INCLUDING_PRERELEASES: &str = " (including pre-releases)";

/// A set of versions, split into a release axis and a pre-release axis.
///
/// Release versions are matched against the release axis and pre-releases against the
/// pre-release axis. Every operation works on both axes independently, so the usual set laws hold
/// exactly. The constructors below leave the pre-release axis empty: `between(1.0.0, 2.0.0)`
/// contains `1.5.0` but not `1.5.0-rc.1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionSet<V> {
    release: Ranges<V>,
    prerelease: Ranges<V>,
}

impl<V> VersionSet<V> {
    /// Every version, including pre-releases.
    pub fn any() -> Self {
        Self {
            release: Ranges::full(),
            prerelease: Ranges::full(),
        }
    }

    /// No version at all.
    pub fn none() -> Self {
        Self {
            release: Ranges::empty(),
            prerelease: Ranges::empty(),
        }
    }

    /// Every release version, but no pre-release.
    pub fn full_release() -> Self {
        Self::from_release(Ranges::full())
    }

    /// A set that admits the given release versions and no pre-release.
    pub fn from_release(release: Ranges<V>) -> Self {
        Self {
            release,
            prerelease: Ranges::empty(),
        }
    }

    pub fn from_parts(release: Ranges<V>, prerelease: Ranges<V>) -> Self {
        Self {
            release,
            prerelease,
        }
    }

    /// `> version`, releases only.
    pub fn higher_than(version: V) -> Self {
        Self::from_release(Ranges::higher_than(version))
    }

    /// `< version`, releases only.
    pub fn strictly_lower_than(version: V) -> Self {
        Self::from_release(Ranges::strictly_lower_than(version))
    }

    pub fn release(&self) -> &Ranges<V> {
        &self.release
    }

    pub fn prerelease(&self) -> &Ranges<V> {
        &self.prerelease
    }

    pub fn is_empty(&self) -> bool {
        self.release.is_empty() && self.prerelease.is_empty()
    }

    pub fn is_any(&self) -> bool {
        self.release.is_full() && self.prerelease.is_full()
    }
}

impl<V: Version> VersionSet<V> {
    /// Exactly `version`.
    ///
    /// Naming a pre-release explicitly is an opt-in, so `exact(1.0.0-rc.1)` contains it.
    pub fn exact(version: V) -> Self {
        if version.is_prerelease() {
            Self {
                release: Ranges::empty(),
                prerelease: Ranges::singleton(version),
            }
        } else {
            Self::from_release(Ranges::singleton(version))
        }
    }

    /// `[lower, upper)`, releases only.
    pub fn between(lower: V, upper: V) -> Self {
        Self::from_release(Ranges::between(lower, upper))
    }

    /// Admit pre-releases within the release range of this set, e.g. `2.0.0-rc.1` for
    /// `>=1.0.0, <3.0.0`.
    #[must_use]
    pub fn allowing_prereleases(self) -> Self {
        let prerelease = self.prerelease.union(&self.release);
        Self {
            release: self.release,
            prerelease,
        }
    }

    /// If this set contains a single version, return it.
    pub fn as_singleton(&self) -> Option<&V> {
        match (self.release.as_singleton(), self.prerelease.as_singleton()) {
            (Some(version), None) if self.prerelease.is_empty() => Some(version),
            (None, Some(version)) if self.release.is_empty() => Some(version),
            _ => None,
        }
    }

    pub fn contains(&self, version: &V) -> bool {
        if version.is_prerelease() {
            self.prerelease.contains(version)
        } else {
            self.release.contains(version)
        }
    }

    #[must_use]
    pub fn complement(&self) -> Self {
        Self {
            release: self.release.complement(),
            prerelease: self.prerelease.complement(),
        }
    }

    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        Self {
            release: self.release.intersection(&other.release),
            prerelease: self.prerelease.intersection(&other.prerelease),
        }
    }

    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            release: self.release.union(&other.release),
            prerelease: self.prerelease.union(&other.prerelease),
        }
    }

    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }

    pub fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }
}

impl<V: Display + Eq> Display for VersionSet<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.prerelease.is_empty() {
            write!(f, "{}", self.release)
        } else if self.release == self.prerelease {
            write!(f, "{}{INCLUDING_PRERELEASES}", self.release)
        } else if self.release.is_empty() {
            write!(f, "{} (pre-releases only)", self.prerelease)
        } else {
            write!(f, "{} or pre-releases {}", self.release, self.prerelease)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Failed to parse version set `{input}`")]
pub struct VersionSetParseError {
    input: String,
    #[source]
    source: RangesParseError,
}

impl<V> FromStr for VersionSet<V>
where
    V: Version + FromStr,
    V::Err: Display,
{
    type Err = VersionSetParseError;

    /// Parse a release range such as `>=1.0.0, <2.0.0`, optionally followed by
    /// ` (including pre-releases)`.
    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let trimmed = input.trim();
        let (release, allow_prereleases) = match trimmed.strip_suffix(INCLUDING_PRERELEASES) {
            Some(release) => (release, true),
            None => (trimmed, false),
        };
        let release = Ranges::from_str(release).map_err(|source| VersionSetParseError {
            input: input.to_string(),
            source,
        })?;
        let set = Self::from_release(release);
        if allow_prereleases {
            Ok(set.allowing_prereleases())
        } else {
            Ok(set)
        }
    }
}

#[cfg(feature = "serde")]
impl<'de, V> Deserialize<'de> for VersionSet<V>
where
    V: Version + FromStr,
    V::Err: Display,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl<V: Display + Eq> Serialize for VersionSet<V> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests;
