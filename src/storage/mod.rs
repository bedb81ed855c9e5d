//! On-disk framing and locking shared by index and vectorizer artifacts.

pub mod codec;
mod file_lock;

pub use file_lock::BuildLock;
