use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::ops::{Bound, RangeBounds};
use std::str::FromStr;

use smallvec::{SmallVec, smallvec};
use thiserror::Error;

/// A set of versions on a single axis, stored as sorted, disjoint segments.
///
/// Segments never overlap and never touch, e.g. `[1, 2)` and `[2, 3)` are always merged into
/// `[1, 3)`. This keeps equality structural: two ranges built from the same operations compare
/// equal iff they contain the same versions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ranges<V> {
    segments: SmallVec<[Interval<V>; 1]>,
}

type Interval<V> = (Bound<V>, Bound<V>);

impl<V> Ranges<V> {
    /// The empty set.
    pub fn empty() -> Self {
        Self {
            segments: SmallVec::new(),
        }
    }

    /// The set of all versions.
    pub fn full() -> Self {
        Self {
            segments: smallvec![(Bound::Unbounded, Bound::Unbounded)],
        }
    }

    /// `> version`
    pub fn higher_than(version: impl Into<V>) -> Self {
        Self {
            segments: smallvec![(Bound::Excluded(version.into()), Bound::Unbounded)],
        }
    }

    /// `>= version`
    pub fn higher_than_or_equal(version: impl Into<V>) -> Self {
        Self {
            segments: smallvec![(Bound::Included(version.into()), Bound::Unbounded)],
        }
    }

    /// `< version`
    pub fn strictly_lower_than(version: impl Into<V>) -> Self {
        Self {
            segments: smallvec![(Bound::Unbounded, Bound::Excluded(version.into()))],
        }
    }

    /// `<= version`
    pub fn lower_than_or_equal(version: impl Into<V>) -> Self {
        Self {
            segments: smallvec![(Bound::Unbounded, Bound::Included(version.into()))],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn is_full(&self) -> bool {
        matches!(
            self.segments.as_slice(),
            [(Bound::Unbounded, Bound::Unbounded)]
        )
    }

    /// Iterate over the segments as pairs of bounds, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bound<V>, &Bound<V>)> {
        self.segments.iter().map(|(start, end)| (start, end))
    }
}

impl<V: Clone> Ranges<V> {
    /// The set containing exactly `version`.
    pub fn singleton(version: impl Into<V>) -> Self {
        let version = version.into();
        Self {
            segments: smallvec![(Bound::Included(version.clone()), Bound::Included(version))],
        }
    }

    /// Returns the single version in this set, if it contains exactly one through a singleton
    /// segment.
    pub fn as_singleton(&self) -> Option<&V>
    where
        V: PartialEq,
    {
        match self.segments.as_slice() {
            [(Bound::Included(start), Bound::Included(end))] if start == end => Some(start),
            _ => None,
        }
    }
}

impl<V: Ord + Clone> Ranges<V> {
    /// `[lower, upper)`, or the empty set if `lower >= upper`.
    pub fn between(lower: impl Into<V>, upper: impl Into<V>) -> Self {
        let (lower, upper) = (lower.into(), upper.into());
        if lower < upper {
            Self {
                segments: smallvec![(Bound::Included(lower), Bound::Excluded(upper))],
            }
        } else {
            Self::empty()
        }
    }

    /// Build a set from any Rust range, e.g. `Ranges::from_range_bounds(v1..=v2)`.
    pub fn from_range_bounds<R, IV>(bounds: R) -> Self
    where
        R: RangeBounds<IV>,
        IV: Clone + Into<V>,
    {
        let start = bounds.start_bound().cloned().map(Into::into);
        let end = bounds.end_bound().cloned().map(Into::into);
        if valid_segment(start.as_ref(), end.as_ref()) {
            Self {
                segments: smallvec![(start, end)],
            }
        } else {
            Self::empty()
        }
    }

    pub fn contains(&self, version: &V) -> bool {
        self.segments
            .iter()
            .any(|(start, end)| within_start(start, version) && within_end(end, version))
    }

    /// The set of all versions not in this set.
    #[must_use]
    pub fn complement(&self) -> Self {
        match self.segments.first() {
            None => Self::full(),
            Some((Bound::Unbounded, Bound::Unbounded)) => Self::empty(),
            Some((Bound::Included(version), Bound::Unbounded)) => {
                Self::strictly_lower_than(version.clone())
            }
            Some((Bound::Excluded(version), Bound::Unbounded)) => {
                Self::lower_than_or_equal(version.clone())
            }
            Some((Bound::Unbounded, end)) => {
                Self::complement_segments(flip(end), &self.segments[1..])
            }
            Some(_) => Self::complement_segments(Bound::Unbounded, &self.segments),
        }
    }

    /// Walk the gaps between `segments`, starting from `start`.
    fn complement_segments(mut start: Bound<V>, segments: &[Interval<V>]) -> Self {
        let mut complement = SmallVec::new();
        for (segment_start, segment_end) in segments {
            complement.push((start, flip(segment_start)));
            start = flip(segment_end);
        }
        if !matches!(start, Bound::Unbounded) {
            complement.push((start, Bound::Unbounded));
        }
        Self {
            segments: complement,
        }
    }

    /// The set of versions in both `self` and `other`.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut segments = SmallVec::new();
        let (mut left, mut right) = (self.segments.iter(), other.segments.iter());
        let (mut left_next, mut right_next) = (left.next(), right.next());

        while let (Some((left_start, left_end)), Some((right_start, right_end))) =
            (left_next, right_next)
        {
            let start = if cmp_start(left_start, right_start) == Ordering::Less {
                right_start
            } else {
                left_start
            };
            let left_ends_first = cmp_end(left_end, right_end) == Ordering::Less;
            let end = if left_ends_first { left_end } else { right_end };

            if valid_segment(start.as_ref(), end.as_ref()) {
                segments.push((start.clone(), end.clone()));
            }

            // Whichever segment ends first can't overlap anything further on the other side.
            if left_ends_first {
                left_next = left.next();
            } else {
                right_next = right.next();
            }
        }

        Self { segments }
    }

    /// The set of versions in `self`, `other` or both.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        self.complement()
            .intersection(&other.complement())
            .complement()
    }

    /// Whether `self` and `other` share no version.
    pub fn is_disjoint(&self, other: &Self) -> bool {
        self.intersection(other).is_empty()
    }

    /// Whether every version in `self` is also in `other`.
    pub fn subset_of(&self, other: &Self) -> bool {
        self == &self.intersection(other)
    }
}

/// Turn the end of one segment into the start of the adjacent gap, or vice versa.
fn flip<V: Clone>(bound: &Bound<V>) -> Bound<V> {
    match bound {
        Bound::Included(version) => Bound::Excluded(version.clone()),
        Bound::Excluded(version) => Bound::Included(version.clone()),
        Bound::Unbounded => Bound::Unbounded,
    }
}

fn within_start<V: Ord>(start: &Bound<V>, version: &V) -> bool {
    match start {
        Bound::Included(start) => start <= version,
        Bound::Excluded(start) => start < version,
        Bound::Unbounded => true,
    }
}

fn within_end<V: Ord>(end: &Bound<V>, version: &V) -> bool {
    match end {
        Bound::Included(end) => version <= end,
        Bound::Excluded(end) => version < end,
        Bound::Unbounded => true,
    }
}

/// Order two lower bounds: the bound admitting smaller versions sorts first.
fn cmp_start<V: Ord>(left: &Bound<V>, right: &Bound<V>) -> Ordering {
    match (left, right) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Less,
        (_, Bound::Unbounded) => Ordering::Greater,
        (Bound::Included(left), Bound::Included(right))
        | (Bound::Excluded(left), Bound::Excluded(right)) => left.cmp(right),
        (Bound::Included(left), Bound::Excluded(right)) => {
            left.cmp(right).then(Ordering::Less)
        }
        (Bound::Excluded(left), Bound::Included(right)) => {
            left.cmp(right).then(Ordering::Greater)
        }
    }
}

/// Order two upper bounds: the bound admitting smaller versions sorts first.
fn cmp_end<V: Ord>(left: &Bound<V>, right: &Bound<V>) -> Ordering {
    match (left, right) {
        (Bound::Unbounded, Bound::Unbounded) => Ordering::Equal,
        (Bound::Unbounded, _) => Ordering::Greater,
        (_, Bound::Unbounded) => Ordering::Less,
        (Bound::Included(left), Bound::Included(right))
        | (Bound::Excluded(left), Bound::Excluded(right)) => left.cmp(right),
        (Bound::Included(left), Bound::Excluded(right)) => {
            left.cmp(right).then(Ordering::Greater)
        }
        (Bound::Excluded(left), Bound::Included(right)) => {
            left.cmp(right).then(Ordering::Less)
        }
    }
}

/// Whether a segment from `start` to `end` contains at least one version.
fn valid_segment<V: Ord>(start: Bound<&V>, end: Bound<&V>) -> bool {
    match (start, end) {
        (Bound::Included(start), Bound::Included(end)) => start <= end,
        (Bound::Included(start), Bound::Excluded(end))
        | (Bound::Excluded(start), Bound::Included(end))
        | (Bound::Excluded(start), Bound::Excluded(end)) => start < end,
        (Bound::Unbounded, _) | (_, Bound::Unbounded) => true,
    }
}

impl<V: Display + Eq> Display for Ranges<V> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.segments.is_empty() {
            return write!(f, "∅");
        }
        for (idx, segment) in self.segments.iter().enumerate() {
            if idx > 0 {
                write!(f, " | ")?;
            }
            match segment {
                (Bound::Unbounded, Bound::Unbounded) => write!(f, "*")?,
                (Bound::Unbounded, Bound::Included(end)) => write!(f, "<={end}")?,
                (Bound::Unbounded, Bound::Excluded(end)) => write!(f, "<{end}")?,
                (Bound::Included(start), Bound::Unbounded) => write!(f, ">={start}")?,
                (Bound::Included(start), Bound::Included(end)) => {
                    if start == end {
                        write!(f, "{start}")?;
                    } else {
                        write!(f, ">={start}, <={end}")?;
                    }
                }
                (Bound::Included(start), Bound::Excluded(end)) => {
                    write!(f, ">={start}, <{end}")?;
                }
                (Bound::Excluded(start), Bound::Unbounded) => write!(f, ">{start}")?,
                (Bound::Excluded(start), Bound::Included(end)) => {
                    write!(f, ">{start}, <={end}")?;
                }
                (Bound::Excluded(start), Bound::Excluded(end)) => {
                    write!(f, ">{start}, <{end}")?;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RangesParseError {
    #[error("Empty version constraint")]
    EmptyClause,
    #[error("Failed to parse version in `{clause}`: {message}")]
    InvalidVersion { clause: String, message: String },
}

impl<V> FromStr for Ranges<V>
where
    V: FromStr + Ord + Clone,
    V::Err: Display,
{
    type Err = RangesParseError;

    /// Parse the format produced by [`Display`]: comma-separated clauses are intersected and
    /// ` | `-separated alternatives are unioned.
    ///
    /// Ex) `>=1.0.0, <2.0.0 | 3.0.0`
    fn from_str(ranges: &str) -> Result<Self, Self::Err> {
        let mut union = Self::empty();
        for alternative in ranges.split('|') {
            let mut intersection = Self::full();
            for clause in alternative.split(',') {
                intersection = intersection.intersection(&parse_clause(clause.trim())?);
            }
            union = union.union(&intersection);
        }
        Ok(union)
    }
}

fn parse_clause<V>(clause: &str) -> Result<Ranges<V>, RangesParseError>
where
    V: FromStr + Ord + Clone,
    V::Err: Display,
{
    let version = |rest: &str| {
        V::from_str(rest.trim()).map_err(|err| RangesParseError::InvalidVersion {
            clause: clause.to_string(),
            message: err.to_string(),
        })
    };

    if clause.is_empty() {
        Err(RangesParseError::EmptyClause)
    } else if clause == "*" {
        Ok(Ranges::full())
    } else if clause == "∅" {
        Ok(Ranges::empty())
    } else if let Some(rest) = clause.strip_prefix(">=") {
        Ok(Ranges::higher_than_or_equal(version(rest)?))
    } else if let Some(rest) = clause.strip_prefix("<=") {
        Ok(Ranges::lower_than_or_equal(version(rest)?))
    } else if let Some(rest) = clause.strip_prefix("==") {
        Ok(Ranges::singleton(version(rest)?))
    } else if let Some(rest) = clause.strip_prefix("!=") {
        Ok(Ranges::singleton(version(rest)?).complement())
    } else if let Some(rest) = clause.strip_prefix('>') {
        Ok(Ranges::higher_than(version(rest)?))
    } else if let Some(rest) = clause.strip_prefix('<') {
        Ok(Ranges::strictly_lower_than(version(rest)?))
    } else {
        Ok(Ranges::singleton(version(clause)?))
    }
}
