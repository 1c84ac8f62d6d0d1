mod error;
pub use error::StoreError;

mod client;
pub use client::CoordinationStore;

mod redis_store;
pub use redis_store::RedisStore;

mod memory;
pub use memory::MemoryStore;

pub mod keys;
