//! Route lookup.
//!
//! # Responsibilities
//! - Store routes keyed by normalized path
//! - Look up the route for a request path
//! - Return matched route or explicit no-match
//!
//! # Design Decisions
//! - Longest matching prefix wins, so more specific routes shadow broader ones
//! - Re-registering a path replaces its target
//! - O(n) path prefix scan (acceptable for typical route counts)

use std::collections::BTreeMap;

use crate::routing::path::RoutePath;

/// Maps route paths to their targets.
#[derive(Debug, Clone)]
pub struct RouteTable<T> {
    routes: BTreeMap<RoutePath, T>,
}

impl<T> RouteTable<T> {
    pub fn new() -> Self {
        Self {
            routes: BTreeMap::new(),
        }
    }

    /// Route requests under `path` to `target`. Returns the replaced target, if any.
    pub fn proxy(&mut self, path: &str, target: T) -> Option<T> {
        self.routes.insert(RoutePath::new(path), target)
    }

    /// Find the target whose path is the longest segment-wise prefix of `request_path`.
    pub fn match_path(&self, request_path: &str) -> Option<(&RoutePath, &T)> {
        let request_path = RoutePath::new(request_path);
        self.routes
            .iter()
            .filter(|(path, _)| path.is_prefix_of(&request_path))
            .max_by_key(|(path, _)| path.parts().len())
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl<T> Default for RouteTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(String, T)> for RouteTable<T> {
    fn from_iter<I: IntoIterator<Item = (String, T)>>(iter: I) -> Self {
        let mut table = Self::new();
        for (path, target) in iter {
            table.proxy(&path, target);
        }
        table
    }
}
