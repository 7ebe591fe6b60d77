//! Wire models of the etcd v2 keys API

use mirror_core::{ChangeBatch, ChangeKind, RemoteNode, StoreError};
use serde::Deserialize;

/// etcd error code for a missing key
pub const KEY_NOT_FOUND: u64 = 100;
/// etcd error code for a `waitIndex` that fell out of the event history
pub const EVENT_INDEX_CLEARED: u64 = 401;

/// Successful response to a read or a watch.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action: String,
    pub node: Node,
    #[serde(default)]
    pub prev_node: Option<Node>,
}

/// A node as etcd serializes it. The root omits its `key`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub dir: bool,
    #[serde(default)]
    pub nodes: Option<Vec<Node>>,
    #[serde(default)]
    pub created_index: u64,
    #[serde(default)]
    pub modified_index: u64,
    #[serde(default)]
    pub ttl: Option<i64>,
    #[serde(default)]
    pub expiration: Option<String>,
}

/// Error body returned alongside a non-2xx status.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error_code: u64,
    pub message: String,
    #[serde(default)]
    pub cause: Option<String>,
    #[serde(default)]
    pub index: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reply {
    Error(ErrorResponse),
    Action(ActionResponse),
}

impl Node {
    /// Convert into the engine's node model; values pass through as bytes.
    pub fn into_remote(self) -> RemoteNode {
        RemoteNode {
            key: self.key.unwrap_or_else(|| "/".to_string()),
            value: self.value.map(String::into_bytes),
            dir: self.dir,
            children: self
                .nodes
                .map(|nodes| nodes.into_iter().map(Node::into_remote).collect()),
            created_version: self.created_index,
            modified_version: self.modified_index,
        }
    }
}

impl ActionResponse {
    /// Map the etcd action onto a change kind.
    pub fn kind(&self) -> ChangeKind {
        match self.action.as_str() {
            "delete" | "expire" | "compareAndDelete" => ChangeKind::Remove,
            _ => ChangeKind::Put,
        }
    }

    pub fn into_batch(self) -> ChangeBatch {
        ChangeBatch {
            kind: self.kind(),
            node: self.node.into_remote(),
        }
    }
}

impl ErrorResponse {
    /// Map the etcd error onto a store error for `key`.
    pub fn into_store_error(self, key: &str) -> StoreError {
        if self.error_code == KEY_NOT_FOUND {
            return StoreError::not_found(key);
        }
        let mut message = format!("etcd error {}: {}", self.error_code, self.message);
        if let Some(cause) = self.cause.filter(|c| !c.is_empty()) {
            message.push_str(&format!(" ({})", cause));
        }
        StoreError::transport(message)
    }
}

/// Decode a response body for `key`.
///
/// Returns `Ok(None)` for an empty body, which etcd and intermediate proxies
/// send when a long poll times out.
pub fn decode(body: &[u8], key: &str) -> Result<Option<ActionResponse>, StoreError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Reply>(body) {
        Ok(Reply::Action(response)) => Ok(Some(response)),
        Ok(Reply::Error(error)) => Err(error.into_store_error(key)),
        Err(e) => Err(StoreError::transport_with(
            format!("Malformed etcd response for {}", key),
            e,
        )),
    }
}
