// periodically drops expired registrations. lookups already ignore expired
// entries, so this only keeps the memory backend from growing forever

use std::sync::Arc;
use std::time::Duration;

use super::RegistrationStore;

async fn expire_loop(
    store: &dyn RegistrationStore,
    interval: Duration,
) -> Result<(), anyhow::Error> {
    loop {
        match store.purge_expired().await {
            Ok(0) => {}
            Ok(n) => tracing::info!(purged = n, "dropped expired registrations"),
            Err(e) => tracing::warn!(
                error.cause_chain = ?e,
                "could not purge expired registrations"
            ),
        }
        tokio::time::sleep(interval).await;
    }
}

/// To be run as a separate worker, outside the main API
pub async fn init_expiry_worker(
    store: Arc<dyn RegistrationStore>,
    interval: Duration,
) -> Result<(), anyhow::Error> {
    expire_loop(store.as_ref(), interval).await
}
