//! Host store collaborator
//!
//! Persisted host records and their encryption live outside this crate; the
//! engine only needs to resolve a host id to a descriptor and to record a
//! successful connection.

use async_trait::async_trait;

use crate::ssh::HostDescriptor;

/// External host-record store consumed by the engine
#[async_trait]
pub trait HostStore: Send + Sync {
    /// Resolve a host id to its connection descriptor
    async fn get_host(&self, id: &str) -> Option<HostDescriptor>;

    /// Record a successful connection for the host
    async fn update_last_connected(&self, id: &str);
}

/// No-op store for tests and store-less embeddings
pub struct NullHostStore;

#[async_trait]
impl HostStore for NullHostStore {
    async fn get_host(&self, _id: &str) -> Option<HostDescriptor> {
        None
    }

    async fn update_last_connected(&self, _id: &str) {}
}
