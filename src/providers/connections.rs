//! Connection registry: which external accounts are linked.
//!
//! Status only changes through explicit connect, disconnect, and test
//! actions, or through the OAuth callback.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::feed::model::Provider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Connected,
    Disconnected,
    Error,
}

/// Action requested on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionAction {
    Connect,
    Disconnect,
    Test,
}

impl std::str::FromStr for ConnectionAction {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "connect" => Ok(Self::Connect),
            "disconnect" => Ok(Self::Disconnect),
            "test" => Ok(Self::Test),
            _ => Err(format!("Unknown connection action: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub provider: Provider,
    pub name: String,
    pub status: ConnectionStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Backed by local fixtures rather than a live account.
    pub is_mock: bool,
    /// Linked account, or the last error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl Connection {
    fn initial(provider: Provider) -> Self {
        let is_mock = provider != Provider::Gmail;
        Self {
            provider,
            name: provider.display_name().to_string(),
            status: if is_mock {
                ConnectionStatus::Connected
            } else {
                ConnectionStatus::Disconnected
            },
            last_sync_at: is_mock.then(Utc::now),
            is_mock,
            details: None,
        }
    }
}

pub struct ConnectionRegistry {
    connections: RwLock<BTreeMap<Provider, Connection>>,
}

impl ConnectionRegistry {
    /// Gmail starts disconnected; fixture-backed providers start connected.
    pub fn new() -> Self {
        let connections = Provider::ALL
            .into_iter()
            .map(|p| (p, Connection::initial(p)))
            .collect();
        Self {
            connections: RwLock::new(connections),
        }
    }

    pub async fn list(&self) -> Vec<Connection> {
        self.connections.read().await.values().cloned().collect()
    }

    pub async fn get(&self, provider: Provider) -> Option<Connection> {
        self.connections.read().await.get(&provider).cloned()
    }

    async fn update<F>(&self, provider: Provider, f: F) -> Connection
    where
        F: FnOnce(&mut Connection),
    {
        let mut connections = self.connections.write().await;
        let conn = connections
            .entry(provider)
            .or_insert_with(|| Connection::initial(provider));
        f(conn);
        info!(provider = %provider, status = ?conn.status, "Connection updated");
        conn.clone()
    }

    /// Connect a fixture-backed provider. Live providers connect through
    /// [`ConnectionRegistry::mark_authenticated`] instead.
    pub async fn connect_fixture(&self, provider: Provider) -> Option<Connection> {
        if provider == Provider::Gmail {
            return None;
        }
        Some(
            self.update(provider, |c| {
                c.status = ConnectionStatus::Connected;
                c.last_sync_at = Some(Utc::now());
                c.details = None;
            })
            .await,
        )
    }

    /// OAuth callback succeeded.
    pub async fn mark_authenticated(&self, provider: Provider, account: Option<String>) -> Connection {
        self.update(provider, |c| {
            c.status = ConnectionStatus::Connected;
            c.last_sync_at = Some(Utc::now());
            c.details = account;
        })
        .await
    }

    pub async fn disconnect(&self, provider: Provider) -> Connection {
        self.update(provider, |c| {
            c.status = ConnectionStatus::Disconnected;
            c.details = None;
        })
        .await
    }

    /// Record the outcome of a connection test.
    pub async fn record_test(&self, provider: Provider, outcome: Result<Option<String>, String>) -> Connection {
        self.update(provider, |c| match outcome {
            Ok(details) => {
                c.status = ConnectionStatus::Connected;
                c.last_sync_at = Some(Utc::now());
                if details.is_some() {
                    c.details = details;
                }
            }
            Err(reason) => {
                c.status = ConnectionStatus::Error;
                c.details = Some(reason);
            }
        })
        .await
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn initial_state() {
        let registry = ConnectionRegistry::new();
        let all = registry.list().await;
        assert_eq!(all.len(), 4);

        let gmail = registry.get(Provider::Gmail).await.unwrap();
        assert_eq!(gmail.status, ConnectionStatus::Disconnected);
        assert!(!gmail.is_mock);
        assert!(gmail.last_sync_at.is_none());

        let slack = registry.get(Provider::Slack).await.unwrap();
        assert_eq!(slack.status, ConnectionStatus::Connected);
        assert!(slack.is_mock);
    }

    #[tokio::test]
    async fn gmail_cannot_connect_as_fixture() {
        let registry = ConnectionRegistry::new();
        assert!(registry.connect_fixture(Provider::Gmail).await.is_none());
        assert_eq!(
            registry.get(Provider::Gmail).await.unwrap().status,
            ConnectionStatus::Disconnected
        );
    }

    #[tokio::test]
    async fn callback_then_disconnect() {
        let registry = ConnectionRegistry::new();
        let conn = registry
            .mark_authenticated(Provider::Gmail, Some("me@x.com".into()))
            .await;
        assert_eq!(conn.status, ConnectionStatus::Connected);
        assert_eq!(conn.details.as_deref(), Some("me@x.com"));
        assert!(conn.last_sync_at.is_some());

        let conn = registry.disconnect(Provider::Gmail).await;
        assert_eq!(conn.status, ConnectionStatus::Disconnected);
        assert!(conn.details.is_none());
    }

    #[tokio::test]
    async fn failed_test_sets_error() {
        let registry = ConnectionRegistry::new();
        let conn = registry
            .record_test(Provider::Gmail, Err("Not authenticated with gmail".into()))
            .await;
        assert_eq!(conn.status, ConnectionStatus::Error);

        let conn = registry.record_test(Provider::Gmail, Ok(None)).await;
        assert_eq!(conn.status, ConnectionStatus::Connected);
    }

    #[test]
    fn action_parse() {
        assert_eq!("test".parse::<ConnectionAction>().unwrap(), ConnectionAction::Test);
        assert!("sync".parse::<ConnectionAction>().is_err());
    }
}
