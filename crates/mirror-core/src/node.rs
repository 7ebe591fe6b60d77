//! Hierarchical snapshot nodes returned by the store

/// A node of a store snapshot or change batch.
///
/// A present `value` marks a leaf. Directories carry their children when the
/// read was recursive; `children` is `None` when the store did not return any.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RemoteNode {
    /// Absolute key path
    pub key: String,
    /// Opaque payload, mirrored verbatim
    pub value: Option<Vec<u8>>,
    /// Whether the store reports this node as a directory
    pub dir: bool,
    pub children: Option<Vec<RemoteNode>>,
    pub created_version: u64,
    pub modified_version: u64,
}

impl RemoteNode {
    /// A leaf created and last modified at `version`.
    pub fn leaf(key: impl Into<String>, value: impl Into<Vec<u8>>, version: u64) -> Self {
        Self {
            key: key.into(),
            value: Some(value.into()),
            dir: false,
            children: None,
            created_version: version,
            modified_version: version,
        }
    }

    /// A directory holding `children`.
    pub fn directory(key: impl Into<String>, children: Vec<RemoteNode>) -> Self {
        Self {
            key: key.into(),
            value: None,
            dir: true,
            children: Some(children),
            created_version: 0,
            modified_version: 0,
        }
    }

    /// Set both versions of this node.
    pub fn with_versions(mut self, created: u64, modified: u64) -> Self {
        self.created_version = created;
        self.modified_version = modified;
        self
    }

    pub fn is_leaf(&self) -> bool {
        self.value.is_some()
    }
}

/// What a change batch did to its node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The node (or something below it) was created or updated
    Put,
    /// The node and everything below it is gone (delete, expiry, ...)
    Remove,
}

/// One notification from a watch: the changed subtree and what happened to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeBatch {
    pub kind: ChangeKind,
    pub node: RemoteNode,
}

impl ChangeBatch {
    pub fn put(node: RemoteNode) -> Self {
        Self {
            kind: ChangeKind::Put,
            node,
        }
    }

    pub fn remove(node: RemoteNode) -> Self {
        Self {
            kind: ChangeKind::Remove,
            node,
        }
    }
}
