//! Typed node-directory records and the directory seam.
//!
//! The central directory service is the authority on which storage nodes
//! exist. The core consumes it through the [`NodeDirectory`] trait;
//! [`HttpDirectory`] is the client for the real service, and tests provide
//! stub implementations.

use std::fmt;
use std::hash::{Hash, Hasher};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::client::FleetClient;
use crate::error::{Error, Result};

/// Service kind a directory entry declares for a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// A storage node holding blocks on local disk.
    Disk,
    /// A proxy in front of other nodes; never indexed.
    Proxy,
    /// Anything else; the scanner rejects these.
    #[serde(untagged)]
    Other(String),
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceKind::Disk => f.write_str("disk"),
            ServiceKind::Proxy => f.write_str("proxy"),
            ServiceKind::Other(kind) => f.write_str(kind),
        }
    }
}

/// Identity of a storage node as discovered from the directory.
///
/// Equality and hashing cover only the transport endpoint (secure flag,
/// host, port) so addresses can key per-node maps regardless of the
/// directory metadata attached to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeAddress {
    #[serde(rename = "service_ssl_flag")]
    pub secure: bool,
    #[serde(rename = "service_host")]
    pub host: String,
    #[serde(rename = "service_port")]
    pub port: u16,
    pub uuid: String,
    #[serde(rename = "service_type")]
    pub service_kind: ServiceKind,
}

impl NodeAddress {
    /// Base URL of the node.
    pub fn url(&self) -> String {
        if self.secure {
            format!("https://{}:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url())
    }
}

impl PartialEq for NodeAddress {
    fn eq(&self, other: &Self) -> bool {
        self.secure == other.secure && self.host == other.host && self.port == other.port
    }
}

impl Eq for NodeAddress {}

impl Hash for NodeAddress {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.secure.hash(state);
        self.host.hash(state);
        self.port.hash(state);
    }
}

/// Directory response: the nodes returned plus the total available count.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeList {
    pub items_available: usize,
    pub items: Vec<NodeAddress>,
}

/// Source of the authoritative storage-node list.
#[async_trait]
pub trait NodeDirectory: Send + Sync {
    /// List non-proxy storage nodes, up to `limit` if given, along with
    /// the total number available.
    async fn storage_nodes(&self, limit: Option<usize>) -> Result<NodeList>;
}

/// Directory client backed by the central API service.
#[derive(Debug, Clone)]
pub struct HttpDirectory {
    base_url: String,
    client: FleetClient,
}

impl HttpDirectory {
    pub fn new(base_url: impl Into<String>, client: FleetClient) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

#[async_trait]
impl NodeDirectory for HttpDirectory {
    async fn storage_nodes(&self, limit: Option<usize>) -> Result<NodeList> {
        let url = format!("{}/keep_services", self.base_url);
        let mut request = self
            .client
            .authed_get(&url)
            .query(&[("filters", r#"[["service_type","!=","proxy"]]"#)]);
        if let Some(limit) = limit {
            request = request.query(&[("limit", limit.to_string())]);
        }

        let response = request
            .send()
            .await
            .map_err(Error::Directory)?
            .error_for_status()
            .map_err(Error::Directory)?;
        response.json().await.map_err(Error::Directory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn node(host: &str, uuid: &str, kind: ServiceKind) -> NodeAddress {
        NodeAddress {
            secure: false,
            host: host.to_string(),
            port: 25107,
            uuid: uuid.to_string(),
            service_kind: kind,
        }
    }

    #[test]
    fn decodes_directory_response() {
        let payload = serde_json::json!({
            "items_available": 2,
            "items": [
                {
                    "service_ssl_flag": false,
                    "service_host": "keep0.example",
                    "service_port": 25107,
                    "uuid": "zzzzz-bi6l4-0000000000000a0",
                    "service_type": "disk"
                },
                {
                    "service_ssl_flag": true,
                    "service_host": "keep1.example",
                    "service_port": 25107,
                    "uuid": "zzzzz-bi6l4-0000000000000a1",
                    "service_type": "blob"
                }
            ]
        });

        let list: NodeList = serde_json::from_value(payload).unwrap();
        assert_eq!(list.items_available, 2);
        assert_eq!(list.items[0].service_kind, ServiceKind::Disk);
        assert_eq!(list.items[0].url(), "http://keep0.example:25107");
        assert_eq!(
            list.items[1].service_kind,
            ServiceKind::Other("blob".to_string())
        );
        assert_eq!(list.items[1].url(), "https://keep1.example:25107");
    }

    #[test]
    fn address_identity_ignores_metadata() {
        let a = node("keep0.example", "zzzzz-bi6l4-0000000000000a0", ServiceKind::Disk);
        let b = node(
            "keep0.example",
            "zzzzz-bi6l4-0000000000000ff",
            ServiceKind::Proxy,
        );
        assert_eq!(a, b);

        let mut by_node: HashMap<NodeAddress, usize> = HashMap::new();
        by_node.insert(a, 0);
        by_node.insert(b, 1);
        assert_eq!(by_node.len(), 1);
    }

    #[test]
    fn address_identity_covers_endpoint() {
        let a = node("keep0.example", "u", ServiceKind::Disk);
        let mut b = a.clone();
        b.port = 25108;
        assert_ne!(a, b);

        let mut c = a.clone();
        c.secure = true;
        assert_ne!(a, c);
    }
}
