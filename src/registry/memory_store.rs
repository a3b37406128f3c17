use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;

use super::ExpiryMode;
use super::Registration;
use super::RegistrationStore;
use crate::clock::Clock;

/// In-process registered-email set. Each email maps to the instant it stops
/// counting as registered; in `Collection` mode all of them share one instant.
///
/// Not shared across instances, and emptied on restart.
pub struct MemoryStore {
    // never held across an `.await`, so a std mutex is fine
    emails: Mutex<HashMap<String, DateTime<Utc>>>,
    ttl: Duration,
    mode: ExpiryMode,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(
        ttl: Duration,
        mode: ExpiryMode,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            emails: Mutex::new(HashMap::new()),
            ttl,
            mode,
            clock,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // the map is never left half-updated, so a poisoned lock is still usable
        self.emails.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Number of emails currently registered (expired ones excluded)
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.lock().values().filter(|exp| **exp > now).count()
    }

    pub fn is_empty(&self) -> bool { self.len() == 0 }
}

#[async_trait]
impl RegistrationStore for MemoryStore {
    #[tracing::instrument(name = "Registering email (memory)", skip(self))]
    async fn register(
        &self,
        email: &str,
    ) -> Result<Registration, anyhow::Error> {
        let now = self.clock.now();
        let expires_at = now + self.ttl;
        let mut emails = self.lock();

        if emails.get(email).is_some_and(|exp| *exp > now) {
            return Ok(Registration::AlreadyRegistered);
        }

        match self.mode {
            ExpiryMode::PerEntry => {
                emails.insert(email.to_string(), expires_at);
            }
            ExpiryMode::Collection => {
                // the set is gone as a whole once its expiry lapses
                emails.retain(|_, exp| *exp > now);
                emails.insert(email.to_string(), expires_at);
                emails.values_mut().for_each(|exp| *exp = expires_at);
            }
        }
        Ok(Registration::Added)
    }

    async fn is_registered(
        &self,
        email: &str,
    ) -> Result<bool, anyhow::Error> {
        let now = self.clock.now();
        Ok(self.lock().get(email).is_some_and(|exp| *exp > now))
    }

    async fn purge_expired(&self) -> Result<usize, anyhow::Error> {
        let now = self.clock.now();
        let mut emails = self.lock();
        let before = emails.len();
        emails.retain(|_, exp| *exp > now);
        Ok(before - emails.len())
    }
}
