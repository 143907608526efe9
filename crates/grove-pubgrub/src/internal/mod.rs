//! Non exposed modules.

pub(crate) mod arena;
pub(crate) mod core;
pub(crate) mod incompatibility;
pub(crate) mod partial_solution;
