//! Storage layer: named key-value entries on disk or in memory, and the
//! persisted read-state set built on top of them.

mod error;
pub use error::StoreError;

mod kv;
pub use kv::{FileKv, KvStorage, MemoryKv};

mod read_state;
pub use read_state::{LocalReadState, READ_STATE_KEY, ReadStateStore};
