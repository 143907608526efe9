use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Deserializer, Serialize, Serializer, de};
use thiserror::Error;

use crate::Version;

/// A `major.minor.patch` version with optional pre-release identifiers, e.g. `1.2.0-rc.1`.
///
/// Ordering follows semantic versioning precedence: a pre-release sorts before the release it
/// belongs to, and build metadata is not part of the version.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SemanticVersion {
    major: u64,
    minor: u64,
    patch: u64,
    pre: Vec<PrereleaseIdentifier>,
}

/// A single dot-separated pre-release identifier.
///
/// Numeric identifiers compare numerically and always sort before alphanumeric ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrereleaseIdentifier {
    Numeric(u64),
    Alphanumeric(String),
}

impl SemanticVersion {
    /// Create a release version.
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
            pre: Vec::new(),
        }
    }

    /// Attach pre-release identifiers to this version.
    #[must_use]
    pub fn with_prerelease(mut self, pre: impl IntoIterator<Item = PrereleaseIdentifier>) -> Self {
        self.pre = pre.into_iter().collect();
        self
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    pub fn minor(&self) -> u64 {
        self.minor
    }

    pub fn patch(&self) -> u64 {
        self.patch
    }

    pub fn prerelease(&self) -> &[PrereleaseIdentifier] {
        &self.pre
    }
}

impl Version for SemanticVersion {
    fn is_prerelease(&self) -> bool {
        !self.pre.is_empty()
    }

    fn only_release(&self) -> Self {
        Self::new(self.major, self.minor, self.patch)
    }
}

impl From<(u64, u64, u64)> for SemanticVersion {
    fn from((major, minor, patch): (u64, u64, u64)) -> Self {
        Self::new(major, minor, patch)
    }
}

impl Ord for SemanticVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for SemanticVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for SemanticVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        for (idx, identifier) in self.pre.iter().enumerate() {
            if idx == 0 {
                write!(f, "-{identifier}")?;
            } else {
                write!(f, ".{identifier}")?;
            }
        }
        Ok(())
    }
}

impl Display for PrereleaseIdentifier {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Numeric(number) => write!(f, "{number}"),
            Self::Alphanumeric(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionParseError {
    #[error("Empty version string")]
    Empty,
    #[error("Version `{version}` has an empty component")]
    EmptyComponent { version: String },
    #[error("Version component `{component}` is not a non-negative integer")]
    InvalidComponent { component: String },
    #[error("Version `{version}` has more than three release components")]
    TooManyComponents { version: String },
    #[error("Version `{version}` has an invalid pre-release identifier `{identifier}`")]
    InvalidPrerelease { version: String, identifier: String },
}

impl FromStr for SemanticVersion {
    type Err = VersionParseError;

    /// Parse a version, filling in missing minor and patch components with zero.
    ///
    /// Ex) `1` is `1.0.0`, `2.1` is `2.1.0` and `1.0.0-beta.2+abc` is `1.0.0-beta.2`.
    fn from_str(version: &str) -> Result<Self, Self::Err> {
        let version = version.trim();
        let version = version.strip_prefix('v').unwrap_or(version);
        if version.is_empty() {
            return Err(VersionParseError::Empty);
        }

        // Build metadata doesn't participate in precedence.
        let version = version
            .split_once('+')
            .map_or(version, |(version, _build)| version);

        let (release, pre) = match version.split_once('-') {
            Some((release, pre)) => (release, Some(pre)),
            None => (version, None),
        };

        let mut components = [0u64; 3];
        for (idx, component) in release.split('.').enumerate() {
            let Some(slot) = components.get_mut(idx) else {
                return Err(VersionParseError::TooManyComponents {
                    version: version.to_string(),
                });
            };
            if component.is_empty() {
                return Err(VersionParseError::EmptyComponent {
                    version: version.to_string(),
                });
            }
            *slot = parse_numeric(component)?;
        }

        let pre = match pre {
            None => Vec::new(),
            Some(pre) => pre
                .split('.')
                .map(|identifier| parse_identifier(version, identifier))
                .collect::<Result<_, _>>()?,
        };

        let [major, minor, patch] = components;
        Ok(Self {
            major,
            minor,
            patch,
            pre,
        })
    }
}

fn parse_numeric(component: &str) -> Result<u64, VersionParseError> {
    if !component.bytes().all(|byte| byte.is_ascii_digit()) {
        return Err(VersionParseError::InvalidComponent {
            component: component.to_string(),
        });
    }
    component
        .parse()
        .map_err(|_| VersionParseError::InvalidComponent {
            component: component.to_string(),
        })
}

fn parse_identifier(
    version: &str,
    identifier: &str,
) -> Result<PrereleaseIdentifier, VersionParseError> {
    let invalid = || VersionParseError::InvalidPrerelease {
        version: version.to_string(),
        identifier: identifier.to_string(),
    };
    if identifier.is_empty() {
        return Err(invalid());
    }
    if identifier.bytes().all(|byte| byte.is_ascii_digit()) {
        return identifier
            .parse()
            .map(PrereleaseIdentifier::Numeric)
            .map_err(|_| invalid());
    }
    if identifier
        .bytes()
        .all(|byte| byte.is_ascii_alphanumeric() || byte == b'-')
    {
        return Ok(PrereleaseIdentifier::Alphanumeric(identifier.to_string()));
    }
    Err(invalid())
}

/// <https://github.com/serde-rs/serde/issues/1316#issue-332908452>
#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for SemanticVersion {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(de::Error::custom)
    }
}

#[cfg(feature = "serde")]
impl Serialize for SemanticVersion {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}
