//! Normalized key paths shared by the store and the sink

use std::path::{Path, PathBuf};

/// An absolute, slash-separated key path.
///
/// Store keys and sink paths are both expressed as `KeyPath`s so that
/// `"a/b"`, `"/a/b"` and `"//a/./b/"` all address the same entry.
/// Normalization drops empty and `.` segments, converts backslashes to
/// forward slashes and resolves `..` by popping the previous segment.
/// A `..` at the root is clamped, so a `KeyPath` can never climb above `/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct KeyPath {
    /// Always starts with `/`, never ends with one unless it is the root
    inner: String,
}

impl KeyPath {
    /// The root path `/`.
    pub fn root() -> Self {
        Self {
            inner: "/".to_string(),
        }
    }

    /// Create a new KeyPath from any string-like input.
    pub fn new(path: impl AsRef<str>) -> Self {
        let raw = path.as_ref().replace('\\', "/");
        let mut segments: Vec<&str> = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                other => segments.push(other),
            }
        }
        Self::from_segments(segments)
    }

    fn from_segments<'a>(segments: impl IntoIterator<Item = &'a str>) -> Self {
        let mut inner = String::new();
        for segment in segments {
            inner.push('/');
            inner.push_str(segment);
        }
        if inner.is_empty() {
            inner.push('/');
        }
        Self { inner }
    }

    /// Get the normalized string representation.
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Whether this is the root path `/`.
    pub fn is_root(&self) -> bool {
        self.inner == "/"
    }

    /// Iterate over the non-empty segments.
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.inner.split('/').filter(|s| !s.is_empty())
    }

    /// Join this path with a (possibly multi-segment) suffix.
    pub fn join(&self, suffix: &str) -> Self {
        Self::new(format!("{}/{}", self.inner, suffix))
    }

    /// Get the parent path, or `None` for the root.
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        let segments: Vec<&str> = self.segments().collect();
        Some(Self::from_segments(
            segments[..segments.len() - 1].iter().copied(),
        ))
    }

    /// Get the last segment, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.segments().last()
    }

    /// Segment-wise prefix test: `/a/bc` does not start with `/a/b`.
    pub fn starts_with(&self, prefix: &KeyPath) -> bool {
        let mut own = self.segments();
        prefix.segments().all(|p| own.next() == Some(p))
    }

    /// Express this path relative to `root`.
    ///
    /// Returns `None` when the path lies outside `root`. The result is itself
    /// absolute: `/a/b/c` relative to `/a` is `/b/c`, and `root` relative to
    /// itself is `/`.
    pub fn relative_to(&self, root: &KeyPath) -> Option<KeyPath> {
        if !self.starts_with(root) {
            return None;
        }
        let depth = root.segments().count();
        Some(Self::from_segments(self.segments().skip(depth)))
    }

    /// Resolve this path beneath a native directory.
    pub fn to_native_under(&self, base: &Path) -> PathBuf {
        let mut native = base.to_path_buf();
        for segment in self.segments() {
            native.push(segment);
        }
        native
    }
}

impl Default for KeyPath {
    fn default() -> Self {
        Self::root()
    }
}

impl std::fmt::Display for KeyPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl AsRef<str> for KeyPath {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<&str> for KeyPath {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for KeyPath {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}
