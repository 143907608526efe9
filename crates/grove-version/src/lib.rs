//! Versions and version sets for the grove solver.
//!
//! A [`VersionSet`] is judged on two axes: release versions are matched against its release
//! [`Ranges`], pre-release versions against its pre-release [`Ranges`]. The usual constructors
//! leave the pre-release axis empty, so a requirement like `>=1.0.0, <2.0.0` never admits
//! `1.5.0-beta.1` unless the caller opts in.

pub use crate::ranges::{Ranges, RangesParseError};
pub use crate::semantic::{PrereleaseIdentifier, SemanticVersion, VersionParseError};
pub use crate::version::Version;
pub use crate::version_set::{VersionSet, VersionSetParseError};

mod ranges;
mod semantic;
mod version;
mod version_set;
