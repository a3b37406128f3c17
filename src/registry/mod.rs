//! The registered-email set: which emails have already signed up within the
//! current time-to-live window.

mod expiry;
mod memory_store;
mod redis_store;

use async_trait::async_trait;
pub use expiry::init_expiry_worker;
pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
use serde::Deserialize;

/// How the time-to-live is applied.
#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryMode {
    /// Every email expires a fixed time after its own registration.
    #[default]
    PerEntry,
    /// One expiry for the whole set, pushed back on every registration. When it
    /// lapses, every email becomes eligible again at once.
    Collection,
}

/// Outcome of `RegistrationStore::register`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Registration {
    Added,
    AlreadyRegistered,
}

/// Backing store for registered emails.
///
/// `register` must be an atomic add-if-absent: two concurrent calls for the
/// same email yield exactly one `Registration::Added`.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    async fn register(
        &self,
        email: &str,
    ) -> Result<Registration, anyhow::Error>;

    async fn is_registered(
        &self,
        email: &str,
    ) -> Result<bool, anyhow::Error>;

    /// Drop expired entries, returning how many were dropped. Stores that
    /// expire entries on their own return `Ok(0)`.
    async fn purge_expired(&self) -> Result<usize, anyhow::Error>;
}
