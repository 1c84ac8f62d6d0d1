mod error;
pub use error::LockError;

mod manager;
pub use manager::{LockGuard, LockManager};
