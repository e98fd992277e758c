//! Prefix-isolated view over a shared key-value store.
//!
//! The engine keeps all of its records under [`ENGINE_NAMESPACE`] so it can
//! share one database with the rest of the node.

use crate::error::KVStoreError;
use crate::ports::outbound::{BatchOperation, KeyValueStore};

/// Namespace of the finality engine's records.
pub const ENGINE_NAMESPACE: &[u8] = b"bft.engine/";

/// Key/value store that transparently prefixes every key.
#[derive(Debug)]
pub struct NamespacedStore<S> {
    inner: S,
    prefix: Vec<u8>,
}

impl<S: KeyValueStore> NamespacedStore<S> {
    pub fn new(inner: S, prefix: impl Into<Vec<u8>>) -> Self {
        Self {
            inner,
            prefix: prefix.into(),
        }
    }

    /// Wrap `inner` in the engine namespace.
    pub fn engine(inner: S) -> Self {
        Self::new(inner, ENGINE_NAMESPACE)
    }

    fn full_key(&self, key: &[u8]) -> Vec<u8> {
        let mut full = Vec::with_capacity(self.prefix.len() + key.len());
        full.extend_from_slice(&self.prefix);
        full.extend_from_slice(key);
        full
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<S: KeyValueStore> KeyValueStore for NamespacedStore<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        self.inner.get(&self.full_key(key))
    }

    fn put(&mut self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        let full = self.full_key(key);
        self.inner.put(&full, value)
    }

    fn delete(&mut self, key: &[u8]) -> Result<(), KVStoreError> {
        let full = self.full_key(key);
        self.inner.delete(&full)
    }

    fn atomic_batch_write(&mut self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let operations = operations
            .into_iter()
            .map(|op| match op {
                BatchOperation::Put { key, value } => BatchOperation::Put {
                    key: self.full_key(&key),
                    value,
                },
                BatchOperation::Delete { key } => BatchOperation::Delete {
                    key: self.full_key(&key),
                },
            })
            .collect();
        self.inner.atomic_batch_write(operations)
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        self.inner.exists(&self.full_key(key))
    }
}
