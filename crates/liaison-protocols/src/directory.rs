//! Directory service: which endpoints advertise which role.
//!
//! The [`Directory`] trait is the contract of the external registry;
//! [`MemoryDirectory`] is an in-process implementation and
//! [`crate::remote::RemoteDirectory`] talks to a [`crate::remote::DirectoryServer`].
//!
//! [`DirectoryClient`] is the thin wrapper the rest of the mesh uses. It
//! returns snapshots with no ordering guarantee and treats an unknown role as
//! an empty result, not an error.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::envelope::EndpointRef;
use crate::error::Result;

/// One registration: an endpoint advertising a role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub endpoint: EndpointRef,
    pub role: String,
}

impl ServiceRecord {
    pub fn new(endpoint: EndpointRef, role: impl Into<String>) -> Self {
        Self {
            endpoint,
            role: role.into(),
        }
    }
}

/// Registry of endpoints by role.
#[async_trait]
pub trait Directory: Send + Sync {
    /// Register `endpoint` under `role`, replacing an earlier registration.
    async fn register(&self, endpoint: &EndpointRef, role: &str) -> Result<()>;

    /// Remove every registration of `endpoint`. Idempotent.
    async fn deregister(&self, endpoint: &EndpointRef) -> Result<()>;

    /// All registrations, optionally restricted to one role.
    async fn search(&self, role: Option<&str>) -> Result<Vec<ServiceRecord>>;
}

/// In-memory directory keyed by endpoint name.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    records: DashMap<String, ServiceRecord>,
}

impl MemoryDirectory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Number of registered endpoints.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Directory for MemoryDirectory {
    async fn register(&self, endpoint: &EndpointRef, role: &str) -> Result<()> {
        debug!(endpoint = %endpoint, role, "Directory register");
        self.records.insert(
            endpoint.name().to_string(),
            ServiceRecord::new(endpoint.clone(), role),
        );
        Ok(())
    }

    async fn deregister(&self, endpoint: &EndpointRef) -> Result<()> {
        if self.records.remove(endpoint.name()).is_some() {
            debug!(endpoint = %endpoint, "Directory deregister");
        }
        Ok(())
    }

    async fn search(&self, role: Option<&str>) -> Result<Vec<ServiceRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| role.is_none_or(|wanted| r.role == wanted))
            .map(|r| r.value().clone())
            .collect())
    }
}

/// Read-side wrapper around a [`Directory`].
#[derive(Clone)]
pub struct DirectoryClient {
    inner: Arc<dyn Directory>,
}

impl DirectoryClient {
    pub fn new(inner: Arc<dyn Directory>) -> Self {
        Self { inner }
    }

    /// Endpoints currently advertising `role`.
    ///
    /// Callers must not treat the first entry as preferred.
    pub async fn lookup(&self, role: &str) -> Result<Vec<EndpointRef>> {
        let records = self.inner.search(Some(role)).await?;
        trace!(role, found = records.len(), "Directory lookup");
        Ok(dedup(records.into_iter().map(|r| r.endpoint)))
    }

    /// Every registration across all roles, one per endpoint.
    pub async fn scan(&self) -> Result<Vec<ServiceRecord>> {
        let records = self.inner.search(None).await?;
        let mut seen = HashSet::new();
        Ok(records
            .into_iter()
            .filter(|r| seen.insert(r.endpoint.name().to_string()))
            .collect())
    }

    /// Access the underlying directory (for self-registration).
    pub fn directory(&self) -> &Arc<dyn Directory> {
        &self.inner
    }
}

impl std::fmt::Debug for DirectoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryClient").finish_non_exhaustive()
    }
}

fn dedup(endpoints: impl Iterator<Item = EndpointRef>) -> Vec<EndpointRef> {
    let mut seen = HashSet::new();
    endpoints
        .filter(|e| seen.insert(e.name().to_string()))
        .collect()
}
