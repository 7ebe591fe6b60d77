//! Version cursor used to resume watching

use crate::node::RemoteNode;

/// Highest created/modified version anywhere in `node`'s subtree.
pub fn max_version(node: &RemoteNode) -> u64 {
    let mut max = 0;
    let mut stack = vec![node];
    while let Some(current) = stack.pop() {
        max = max
            .max(current.created_version)
            .max(current.modified_version);
        if let Some(children) = &current.children {
            stack.extend(children.iter());
        }
    }
    max
}

/// The last version the mirror has fully applied.
///
/// Starts unset ("no baseline yet") and only ever moves forward.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cursor(Option<u64>);

impl Cursor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> Option<u64> {
        self.0
    }

    /// Fold the versions of `node` into the cursor.
    ///
    /// A node carrying no versions at all leaves an unset cursor unset.
    pub fn observe(&mut self, node: &RemoteNode) -> Option<u64> {
        let seen = max_version(node);
        if seen > 0 {
            self.0 = Some(self.0.map_or(seen, |current| current.max(seen)));
        }
        self.0
    }

    /// Version the next watch should start from; `None` means "now".
    pub fn watch_from(&self) -> Option<u64> {
        self.0.map(|v| v + 1)
    }
}
