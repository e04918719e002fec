//! Canonical (workspace, path) key codec.
//!
//! The backend is a flat store: every document lives under one composite key.
//! Hierarchy is an emulation derived from path shape, so all segment-boundary
//! logic lives here. A scan for "/a" must match "/a" and "/a/..." but never
//! "/ab".

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Separator between workspace and path in the encoded store key.
///
/// ASCII unit separator: forbidden in workspace ids and paths, so two
/// distinct (workspace, path) pairs can never encode to the same key.
pub const KEY_SEPARATOR: char = '\u{1f}';

/// Opaque tenant identifier. Every operation is scoped to exactly one.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkspaceId(String);

impl WorkspaceId {
    /// Creates a new WorkspaceId from a string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the workspace ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the workspace id is usable as a key component:
    /// non-empty and free of control characters.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty() && !self.0.chars().any(|c| c.is_control())
    }
}

impl fmt::Display for WorkspaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A "/"-delimited path identifying a location in the virtual hierarchy.
///
/// Always starts with "/". The root path is "/" itself; every other path has
/// non-empty segments and no trailing slash. The store does not distinguish
/// containers from value-holders — kind is inferred from what exists at and
/// below the path.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocPath(String);

impl DocPath {
    /// The root path.
    pub fn root() -> Self {
        DocPath("/".to_string())
    }

    /// Parses and validates a path string.
    ///
    /// Rules: must start with "/", no empty segments, no trailing slash
    /// (except the root "/"), no control characters.
    pub fn parse(path: impl Into<String>) -> Result<Self> {
        let path = path.into();
        if !path.starts_with('/') {
            return Err(StoreError::Validation {
                reason: format!("path must start with '/': {:?}", path),
            });
        }
        if path == "/" {
            return Ok(DocPath(path));
        }
        if path.ends_with('/') {
            return Err(StoreError::Validation {
                reason: format!("path must not end with '/': {:?}", path),
            });
        }
        if path.chars().any(|c| c.is_control()) {
            return Err(StoreError::Validation {
                reason: "path contains control characters".to_string(),
            });
        }
        if path[1..].split('/').any(|seg| seg.is_empty()) {
            return Err(StoreError::Validation {
                reason: format!("path contains empty segment: {:?}", path),
            });
        }
        Ok(DocPath(path))
    }

    /// Returns the path as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for the root path "/".
    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Returns the parent path, or None for the root.
    pub fn parent(&self) -> Option<DocPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(DocPath::root()),
            Some(idx) => Some(DocPath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Returns the final segment, or None for the root.
    pub fn file_name(&self) -> Option<&str> {
        if self.is_root() {
            return None;
        }
        self.0.rfind('/').map(|idx| &self.0[idx + 1..])
    }

    /// Appends a single segment, producing a child path.
    pub fn join(&self, segment: &str) -> Result<DocPath> {
        if segment.is_empty() || segment.contains('/') {
            return Err(StoreError::Validation {
                reason: format!("invalid path segment: {:?}", segment),
            });
        }
        let joined = if self.is_root() {
            format!("/{}", segment)
        } else {
            format!("{}/{}", self.0, segment)
        };
        DocPath::parse(joined)
    }

    /// Iterates the path segments. The root path has no segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.0.split('/').filter(|s| !s.is_empty())
    }

    /// Number of segments.
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// Returns true iff this path is the prefix itself or lies below it at a
    /// segment boundary. "/ab" is not within "/a".
    pub fn is_within(&self, prefix: &DocPath) -> bool {
        if prefix.is_root() {
            return true;
        }
        self.0 == prefix.0
            || (self.0.len() > prefix.0.len()
                && self.0.starts_with(&prefix.0)
                && self.0.as_bytes()[prefix.0.len()] == b'/')
    }

    /// Returns true iff this path lies strictly below the prefix.
    pub fn is_descendant_of(&self, prefix: &DocPath) -> bool {
        self != prefix && self.is_within(prefix)
    }

    /// The first segment of this path below the given prefix, or None if the
    /// path is not strictly below the prefix. Used to derive immediate
    /// children for listings.
    pub fn first_segment_below<'a>(&'a self, prefix: &DocPath) -> Option<&'a str> {
        if !self.is_descendant_of(prefix) {
            return None;
        }
        let base = if prefix.is_root() { 0 } else { prefix.0.len() };
        let rest = &self.0[base + 1..];
        rest.split('/').next()
    }

    /// Re-roots this path from `from` onto `to`. Returns None if the path is
    /// not within `from`.
    pub fn rebase(&self, from: &DocPath, to: &DocPath) -> Option<DocPath> {
        if !self.is_within(from) {
            return None;
        }
        if self == from {
            return Some(to.clone());
        }
        let base = if from.is_root() { 0 } else { from.0.len() };
        let rest = &self.0[base..];
        let rebased = if to.is_root() {
            rest.to_string()
        } else {
            format!("{}{}", to.0, rest)
        };
        Some(DocPath(rebased))
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Composite key addressing one document: (workspace, path).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StoreKey {
    /// Tenant scope. No operation crosses workspaces.
    pub workspace: WorkspaceId,
    /// Location within the workspace hierarchy.
    pub path: DocPath,
}

impl StoreKey {
    /// Creates a new store key.
    pub fn new(workspace: WorkspaceId, path: DocPath) -> Self {
        Self { workspace, path }
    }

    /// Canonical flat-store encoding: `<workspace><US><path>`.
    pub fn encode(&self) -> String {
        format!("{}{}{}", self.workspace.0, KEY_SEPARATOR, self.path.0)
    }

    /// Encoded key prefix covering every document in a workspace. Keys within
    /// one workspace sort by path, so a range scan from this prefix walks the
    /// workspace in path order.
    pub fn workspace_prefix(workspace: &WorkspaceId) -> String {
        format!("{}{}", workspace.0, KEY_SEPARATOR)
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.workspace, self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        let p = DocPath::parse("/").unwrap();
        assert!(p.is_root());
        assert_eq!(p.depth(), 0);
        assert!(p.parent().is_none());
        assert!(p.file_name().is_none());
    }

    #[test]
    fn test_parse_rejects_relative() {
        assert!(DocPath::parse("sessions/42").is_err());
        assert!(DocPath::parse("").is_err());
    }

    #[test]
    fn test_parse_rejects_trailing_slash() {
        assert!(DocPath::parse("/a/").is_err());
    }

    #[test]
    fn test_parse_rejects_empty_segment() {
        assert!(DocPath::parse("/a//b").is_err());
        assert!(DocPath::parse("//").is_err());
    }

    #[test]
    fn test_parent_and_file_name() {
        let p = DocPath::parse("/sessions/42/name").unwrap();
        assert_eq!(p.file_name(), Some("name"));
        assert_eq!(p.parent().unwrap().as_str(), "/sessions/42");
        assert_eq!(
            DocPath::parse("/a").unwrap().parent().unwrap(),
            DocPath::root()
        );
    }

    #[test]
    fn test_join() {
        let p = DocPath::root().join("sessions").unwrap();
        assert_eq!(p.as_str(), "/sessions");
        let c = p.join("42").unwrap();
        assert_eq!(c.as_str(), "/sessions/42");
        assert!(p.join("a/b").is_err());
        assert!(p.join("").is_err());
    }

    #[test]
    fn test_is_within_segment_boundary() {
        let a = DocPath::parse("/a").unwrap();
        let ab = DocPath::parse("/ab").unwrap();
        let a_b = DocPath::parse("/a/b").unwrap();
        assert!(a_b.is_within(&a));
        assert!(a.is_within(&a));
        assert!(!ab.is_within(&a));
        assert!(a.is_within(&DocPath::root()));
    }

    #[test]
    fn test_first_segment_below() {
        let prefix = DocPath::parse("/sessions/42").unwrap();
        let name = DocPath::parse("/sessions/42/name").unwrap();
        let deep = DocPath::parse("/sessions/42/pages/p1/type").unwrap();
        assert_eq!(name.first_segment_below(&prefix), Some("name"));
        assert_eq!(deep.first_segment_below(&prefix), Some("pages"));
        assert_eq!(prefix.first_segment_below(&prefix), None);

        let top = DocPath::parse("/sessions").unwrap();
        assert_eq!(top.first_segment_below(&DocPath::root()), Some("sessions"));
    }

    #[test]
    fn test_rebase() {
        let src = DocPath::parse("/a").unwrap();
        let dst = DocPath::parse("/b/c").unwrap();
        let leaf = DocPath::parse("/a/x/y").unwrap();
        assert_eq!(leaf.rebase(&src, &dst).unwrap().as_str(), "/b/c/x/y");
        assert_eq!(src.rebase(&src, &dst).unwrap(), dst);
        assert!(DocPath::parse("/ab").unwrap().rebase(&src, &dst).is_none());
    }

    #[test]
    fn test_workspace_validity() {
        assert!(WorkspaceId::new("ws1").is_valid());
        assert!(!WorkspaceId::new("").is_valid());
        assert!(!WorkspaceId::new("ws\u{1f}evil").is_valid());
    }

    #[test]
    fn test_store_key_encode_distinct() {
        let k1 = StoreKey::new(WorkspaceId::new("ws1"), DocPath::parse("/a/b").unwrap());
        let k2 = StoreKey::new(WorkspaceId::new("ws1/a"), DocPath::parse("/b").unwrap());
        assert_ne!(k1.encode(), k2.encode());
    }

    #[test]
    fn test_workspace_prefix_scopes_scan() {
        let prefix = StoreKey::workspace_prefix(&WorkspaceId::new("ws1"));
        let own = StoreKey::new(WorkspaceId::new("ws1"), DocPath::parse("/x").unwrap());
        let other = StoreKey::new(WorkspaceId::new("ws10"), DocPath::parse("/x").unwrap());
        assert!(own.encode().starts_with(&prefix));
        assert!(!other.encode().starts_with(&prefix));
    }
}
