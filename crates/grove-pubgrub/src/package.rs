use std::fmt::{Debug, Display};
use std::hash::Hash;

/// Anything that can identify a package.
///
/// Automatically implemented for every type with the required bounds, e.g. `String` or `&str`.
pub trait Package: Clone + Eq + Hash + Debug + Display {}

impl<T: Clone + Eq + Hash + Debug + Display> Package for T {}
