//! Token persistence

mod file_lock;
mod token_file;

pub use file_lock::{FileLock, LockOptions};
pub use token_file::FileTokenStore;
