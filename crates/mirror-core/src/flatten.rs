//! Flattening of hierarchical snapshots into sink entries

use mirror_fs::KeyPath;

use crate::node::RemoteNode;

/// One leaf of a snapshot, addressed relative to the subtree root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatEntry {
    pub relative_path: KeyPath,
    pub value: Vec<u8>,
}

/// Flatten `node` into the leaves that fall strictly below `root`.
///
/// Leaves outside `root` are dropped, which scopes the result even when the
/// store answered with a wider tree than was asked for. A leaf sitting exactly
/// at `root` is dropped too: its relative path is the sink root itself.
///
/// The walk uses an explicit stack; snapshot depth is decided by the store.
pub fn flatten(node: Option<&RemoteNode>, root: &KeyPath) -> Vec<FlatEntry> {
    let mut entries = Vec::new();
    let Some(node) = node else {
        return entries;
    };

    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        if let Some(children) = &current.children {
            stack.extend(children.iter().rev());
        }

        let Some(value) = &current.value else {
            continue;
        };
        match KeyPath::new(&current.key).relative_to(root) {
            Some(relative) if !relative.is_root() => entries.push(FlatEntry {
                relative_path: relative,
                value: value.clone(),
            }),
            _ => {
                tracing::trace!(key = %current.key, %root, "Skipping leaf outside subtree root");
            }
        }
    }
    entries
}

/// What a removal means for the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Removal {
    /// Delete a single file
    File(KeyPath),
    /// Delete a directory and everything below it (`/` clears the mirror)
    Tree(KeyPath),
}

/// Map a removed store node onto the sink path it affects.
///
/// Returns `None` when the removed key is unrelated to `root`. Removing `root`
/// itself, or any of its ancestors, empties the whole mirror.
pub fn removal_target(node: &RemoteNode, root: &KeyPath) -> Option<Removal> {
    let key = KeyPath::new(&node.key);
    match key.relative_to(root) {
        Some(relative) if relative.is_root() => Some(Removal::Tree(relative)),
        Some(relative) if node.dir => Some(Removal::Tree(relative)),
        Some(relative) => Some(Removal::File(relative)),
        None if root.starts_with(&key) => Some(Removal::Tree(KeyPath::root())),
        None => None,
    }
}
