//! Route path normalization.
//!
//! # Design Decisions
//! - One leading `/` is trimmed, so `/things` and `things` are the same route
//! - Paths compare segment-wise; `/api` does not match `/apis`
//! - The empty path has no segments and matches every request

use std::fmt;

/// A normalized route path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RoutePath(String);

impl RoutePath {
    pub fn new(path: &str) -> Self {
        Self(path.strip_prefix('/').unwrap_or(path).to_string())
    }

    /// The `/`-separated segments of this path.
    pub fn parts(&self) -> Vec<&str> {
        if self.0.is_empty() {
            return Vec::new();
        }
        self.0.split('/').collect()
    }

    /// Whether every segment of `self` leads the segments of `request_path`.
    pub fn is_prefix_of(&self, request_path: &RoutePath) -> bool {
        let ours = self.parts();
        let theirs = request_path.parts();
        ours.len() <= theirs.len() && ours.iter().zip(&theirs).all(|(a, b)| a == b)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoutePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.0)
    }
}

impl From<&str> for RoutePath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
