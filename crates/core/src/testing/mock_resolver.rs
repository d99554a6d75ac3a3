//! Mock metadata resolver for testing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::resolver::{MetadataResolver, ResolverError};

/// Mock implementation of the MetadataResolver trait. Serves canned
/// names keyed by magnet URI.
#[derive(Debug)]
pub struct MockResolver {
    names: Arc<RwLock<HashMap<String, String>>>,
    resolved: Arc<RwLock<Vec<String>>>,
    next_error: Arc<RwLock<Option<ResolverError>>>,
    available: bool,
}

impl Default for MockResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResolver {
    /// An available resolver with no canned names.
    pub fn new() -> Self {
        Self {
            names: Arc::new(RwLock::new(HashMap::new())),
            resolved: Arc::new(RwLock::new(Vec::new())),
            next_error: Arc::new(RwLock::new(None)),
            available: true,
        }
    }

    /// A resolver that reports itself unavailable.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    /// Serve `name` for `magnet`.
    pub async fn set_name(&self, magnet: impl Into<String>, name: impl Into<String>) {
        self.names.write().await.insert(magnet.into(), name.into());
    }

    /// Magnet URIs resolved so far, in order.
    pub async fn resolved_uris(&self) -> Vec<String> {
        self.resolved.read().await.clone()
    }

    /// Configure the next resolution to fail with the given error.
    pub async fn set_next_error(&self, error: ResolverError) {
        *self.next_error.write().await = Some(error);
    }
}

#[async_trait]
impl MetadataResolver for MockResolver {
    fn available(&self) -> bool {
        self.available
    }

    async fn resolve_name(&self, magnet: &str) -> Result<Option<String>, ResolverError> {
        if !self.available {
            return Err(ResolverError::Disabled);
        }

        self.resolved.write().await.push(magnet.to_string());

        if let Some(err) = self.next_error.write().await.take() {
            return Err(err);
        }

        Ok(self.names.read().await.get(magnet).cloned())
    }
}
