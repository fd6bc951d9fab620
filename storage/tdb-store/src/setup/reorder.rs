//! Choice of basic graph pattern reordering for a location
//!
//! The store only records which strategy applies; applying it belongs to
//! the query layer.

use super::names;
use crate::base::location::Location;
use std::path::PathBuf;
use tracing::debug;

/// Pattern reordering strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReorderChoice {
    /// Keep patterns as written
    Identity,
    /// Fixed heuristic ordering
    Fixed,
    /// Weighted by the statistics file at this path
    Stats(PathBuf),
}

impl ReorderChoice {
    /// `stats.opt`, then `fixed.opt`; `none.opt` turns reordering off
    pub fn choose(location: &Location) -> Self {
        if location.exists(names::OPT_NONE) {
            debug!(%location, "pattern reordering turned off");
            return ReorderChoice::Identity;
        }
        if let Some(path) = location.path(names::OPT_STATS).filter(|p| p.exists()) {
            debug!(%location, "statistics-based pattern reordering");
            return ReorderChoice::Stats(path);
        }
        if location.exists(names::OPT_FIXED) {
            debug!(%location, "fixed pattern reordering");
            return ReorderChoice::Fixed;
        }
        ReorderChoice::Identity
    }
}
