//! HTTP client for `/v2/keys`

use std::time::Duration;

use async_trait::async_trait;
use mirror_core::{ChangeBatch, RemoteNode, StoreClient, StoreError};
use mirror_fs::KeyPath;
use reqwest::Url;

use crate::model::{self, ActionResponse};
use crate::{Error, Result};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const ETCD_INDEX_HEADER: &str = "x-etcd-index";

/// [`StoreClient`] backed by the etcd v2 keys API.
///
/// Reads are plain `GET`s; watches are long polls with `wait=true`, so no
/// overall request timeout is set.
#[derive(Debug, Clone)]
pub struct EtcdClient {
    http: reqwest::Client,
    base: Url,
}

impl EtcdClient {
    /// Create a client for `endpoint`, e.g. `http://127.0.0.1:2379`.
    pub fn new(endpoint: &str) -> Result<Self> {
        let base = Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint {
            endpoint: endpoint.to_string(),
            message: e.to_string(),
        })?;
        if !matches!(base.scheme(), "http" | "https") || base.cannot_be_a_base() {
            return Err(Error::InvalidEndpoint {
                endpoint: endpoint.to_string(),
                message: "expected an http:// or https:// URL".to_string(),
            });
        }

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        Ok(Self { http, base })
    }

    pub fn from_host_port(host: &str, port: u16) -> Result<Self> {
        Self::new(&format!("http://{}:{}", host, port))
    }

    pub fn endpoint(&self) -> &Url {
        &self.base
    }

    /// URL of `key` under `/v2/keys`, keeping any path prefix of the endpoint.
    pub fn keys_url(&self, key: &str) -> Url {
        let key = KeyPath::new(key);
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["v2", "keys"]);
            if key.is_root() {
                path.push("");
            } else {
                path.extend(key.segments());
            }
        }
        url
    }

    async fn request(&self, url: Url, key: &str) -> std::result::Result<Reply, StoreError> {
        tracing::trace!(%url, "etcd request");
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| StoreError::transport_with(format!("GET {} failed", url), e))?;
        let status = response.status();
        let index = response
            .headers()
            .get(ETCD_INDEX_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok());
        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::transport_with(format!("Reading response from {} failed", url), e))?;

        if !status.is_success() && body.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(StoreError::transport(format!("GET {} returned {}", url, status)));
        }

        let action = match model::decode(&body, key) {
            Err(e) if !status.is_success() && !e.is_not_found() && !looks_like_json(&body) => {
                Err(StoreError::transport(format!("GET {} returned {}", url, status)))
            }
            other => other,
        }?;
        Ok(Reply { action, index })
    }
}

/// A decoded response plus the store-wide index it was served at.
struct Reply {
    action: Option<ActionResponse>,
    index: Option<u64>,
}

fn looks_like_json(body: &[u8]) -> bool {
    body.iter()
        .find(|b| !b.is_ascii_whitespace())
        .is_some_and(|b| *b == b'{')
}

#[async_trait]
impl StoreClient for EtcdClient {
    async fn get(&self, key: &str, recursive: bool) -> std::result::Result<RemoteNode, StoreError> {
        let mut url = self.keys_url(key);
        url.query_pairs_mut()
            .append_pair("recursive", if recursive { "true" } else { "false" });

        let reply = self.request(url, key).await?;
        let Some(response) = reply.action else {
            return Err(StoreError::transport(format!("Empty response reading {}", key)));
        };

        // The snapshot is current as of the store index, not just its newest node
        let mut node = response.node.into_remote();
        if let Some(index) = reply.index {
            node.modified_version = node.modified_version.max(index);
        }
        Ok(node)
    }

    async fn watch(
        &self,
        key: &str,
        from: Option<u64>,
        recursive: bool,
    ) -> std::result::Result<ChangeBatch, StoreError> {
        let mut url = self.keys_url(key);
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("wait", "true")
                .append_pair("recursive", if recursive { "true" } else { "false" });
            if let Some(index) = from {
                query.append_pair("waitIndex", &index.to_string());
            }
        }

        loop {
            match self.request(url.clone(), key).await?.action {
                Some(response) => {
                    tracing::trace!(action = %response.action, "etcd watch fired");
                    return Ok(response.into_batch());
                }
                None => {
                    tracing::debug!(key, "Empty watch response; re-issuing");
                }
            }
        }
    }
}
