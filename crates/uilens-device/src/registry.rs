//! Device session registry.
//!
//! Maps a [`SessionId`] to a live [`DeviceAdapter`]. Connecting is
//! idempotent: at most one adapter exists per identifier and concurrent
//! connects to the same identifier open a single underlying connection.
//! Sessions are never evicted.

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use uilens_core::{DeviceIdentity, LensError, Platform, Result, SessionId};

use crate::adapter::DeviceAdapter;

/// Opens the underlying connection for a new session.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, platform: Platform, address: &str) -> Result<Arc<dyn DeviceAdapter>>;
}

/// One entry of [`DeviceRegistry::list`].
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    #[serde(rename = "devicesName")]
    pub id: SessionId,
    #[serde(rename = "devicesInfo", skip_serializing_if = "Option::is_none")]
    pub info: Option<DeviceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct DeviceRegistry {
    connector: Arc<dyn Connector>,
    sessions: RwLock<BTreeMap<SessionId, Arc<dyn DeviceAdapter>>>,
    connect_locks: DashMap<SessionId, Arc<tokio::sync::Mutex<()>>>,
}

impl DeviceRegistry {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            sessions: RwLock::new(BTreeMap::new()),
            connect_locks: DashMap::new(),
        }
    }

    /// Connect to `platform` at `address` (empty = default device) or reuse
    /// the existing session, returning its identifier.
    pub async fn connect(&self, platform: &str, address: &str) -> Result<SessionId> {
        let platform = platform.parse::<Platform>()?;
        self.connect_platform(platform, address).await
    }

    pub async fn connect_platform(&self, platform: Platform, address: &str) -> Result<SessionId> {
        let id = SessionId::new(platform, address);
        if self.lookup(id.as_str()).is_some() {
            debug!(session = %id, "reusing device session");
            return Ok(id);
        }

        let lock = Arc::clone(self.connect_locks.entry(id.clone()).or_default().value());
        let result = {
            let _guard = lock.lock().await;
            self.connect_locked(platform, address, &id).await
        };
        drop(lock);
        // the map holds the last reference once no other caller is waiting
        self.connect_locks.remove_if(&id, |_, l| Arc::strong_count(l) == 1);
        result.map(|()| id)
    }

    async fn connect_locked(&self, platform: Platform, address: &str, id: &SessionId) -> Result<()> {
        // another caller may have finished connecting while we waited
        if self.lookup(id.as_str()).is_some() {
            debug!(session = %id, "reusing device session");
            return Ok(());
        }

        info!(session = %id, "connecting device");
        let adapter = self
            .connector
            .connect(platform, address)
            .await
            .inspect_err(|e| warn!(session = %id, error = %e, "device connection failed"))?;
        self.sessions.write().insert(id.clone(), adapter);
        info!(session = %id, "device connected");
        Ok(())
    }

    /// Return the session for `id`, connecting on demand.
    ///
    /// An unknown id is split on its first `:` into `platform:address`.
    pub async fn get(&self, id: &str) -> Result<Arc<dyn DeviceAdapter>> {
        if let Some(device) = self.lookup(id) {
            return Ok(device);
        }
        let (platform, address) = SessionId::split(id);
        let session = self.connect(platform, address).await?;
        self.lookup(session.as_str())
            .ok_or_else(|| LensError::connection(id, "session vanished after connect"))
    }

    fn lookup(&self, id: &str) -> Option<Arc<dyn DeviceAdapter>> {
        self.sessions.read().get(id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.read().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Summaries of every session with freshly fetched identity metadata.
    /// A session whose identity lookup fails is reported with `error` set.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let sessions: Vec<(SessionId, Arc<dyn DeviceAdapter>)> = self
            .sessions
            .read()
            .iter()
            .map(|(id, d)| (id.clone(), Arc::clone(d)))
            .collect();

        let lookups = sessions.into_iter().map(|(id, device)| async move {
            match device.identity().await {
                Ok(info) => SessionSummary {
                    id,
                    info: Some(info),
                    error: None,
                },
                Err(e) => {
                    warn!(session = %id, error = %e, "device identity unavailable");
                    SessionSummary {
                        id,
                        info: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        });
        futures::future::join_all(lookups).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockConnector;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connect_guards_are_released() {
        let reg = DeviceRegistry::new(Arc::new(MockConnector::new()));
        reg.connect("android", "127.0.0.1:5555").await.unwrap();
        assert!(reg.connect_locks.is_empty());

        let failing = DeviceRegistry::new(Arc::new(MockConnector::failing()));
        for n in 0..5 {
            assert!(failing.get(&format!("android:host-{n}")).await.is_err());
        }
        assert!(failing.connect_locks.is_empty());
        assert!(failing.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_connects_release_guard() {
        let connector = Arc::new(MockConnector::new().with_delay(Duration::from_millis(20)));
        let reg = Arc::new(DeviceRegistry::new(connector.clone()));
        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let reg = Arc::clone(&reg);
                tokio::spawn(async move { reg.connect("android", "").await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }
        assert_eq!(connector.connects(), 1);
        assert!(reg.connect_locks.is_empty());
    }
}
