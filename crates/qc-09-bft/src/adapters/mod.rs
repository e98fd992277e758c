//! Storage adapters implementing [`crate::ports::KeyValueStore`].

pub mod memory;
pub mod namespaced;
#[cfg(feature = "rocksdb")]
pub mod rocksdb;

pub use memory::InMemoryKVStore;
pub use namespaced::{NamespacedStore, ENGINE_NAMESPACE};
#[cfg(feature = "rocksdb")]
pub use self::rocksdb::{RocksDbConfig, RocksDbStore};
