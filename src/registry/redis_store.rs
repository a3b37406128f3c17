use anyhow::Context;
use async_trait::async_trait;
use chrono::Duration;

use super::ExpiryMode;
use super::Registration;
use super::RegistrationStore;

/// Registered-email set kept in Redis, shared by every instance of the
/// service. Redis enforces the TTL itself.
///
/// - `Collection`: one set at `key`; `SADD`, then `EXPIRE` on the whole set,
///   in one script so a new set never exists without a TTL
/// - `PerEntry`: one key per email at `{key}:{email}`, written with
///   `SET .. NX EX`
///
/// Both `SADD` and `SET NX` report whether the write happened, so the
/// duplicate check and the insert are a single atomic round trip.
#[derive(Clone)]
pub struct RedisStore {
    client: redis::Client,
    key: String,
    ttl: Duration,
    mode: ExpiryMode,
    add_to_collection: redis::Script,
}

impl RedisStore {
    pub fn new(
        client: redis::Client,
        key: String,
        ttl: Duration,
        mode: ExpiryMode,
    ) -> Self {
        Self {
            client,
            key,
            ttl,
            mode,
            add_to_collection: add_to_collection(),
        }
    }

    fn entry_key(
        &self,
        email: &str,
    ) -> String {
        format!("{}:{email}", self.key)
    }
}

// 1 if the email was added (and the set's TTL reset), 0 if already present
fn add_to_collection() -> redis::Script {
    redis::Script::new(
        r"
        if redis.call('SADD', KEYS[1], ARGV[1]) == 1 then
            redis.call('EXPIRE', KEYS[1], ARGV[2])
            return 1
        end
        return 0
        ",
    )
}

#[async_trait]
impl RegistrationStore for RedisStore {
    #[tracing::instrument(name = "Registering email (redis)", skip(self))]
    async fn register(
        &self,
        email: &str,
    ) -> Result<Registration, anyhow::Error> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("could not connect to redis")?;
        let ttl_secs = self.ttl.num_seconds();

        let added = match self.mode {
            ExpiryMode::Collection => {
                let added: i64 = self
                    .add_to_collection
                    .key(&self.key)
                    .arg(email)
                    .arg(ttl_secs)
                    .invoke_async(&mut conn)
                    .await
                    .context("SADD/EXPIRE failed")?;
                added == 1
            }
            ExpiryMode::PerEntry => {
                // nil when the key already exists
                let reply: Option<String> = redis::cmd("SET")
                    .arg(self.entry_key(email))
                    .arg(1)
                    .arg("NX")
                    .arg("EX")
                    .arg(ttl_secs)
                    .query_async(&mut conn)
                    .await
                    .context("SET NX failed")?;
                reply.is_some()
            }
        };

        Ok(match added {
            true => Registration::Added,
            false => Registration::AlreadyRegistered,
        })
    }

    async fn is_registered(
        &self,
        email: &str,
    ) -> Result<bool, anyhow::Error> {
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .context("could not connect to redis")?;
        let found: bool = match self.mode {
            ExpiryMode::Collection => {
                redis::cmd("SISMEMBER")
                    .arg(&self.key)
                    .arg(email)
                    .query_async(&mut conn)
                    .await
                    .context("SISMEMBER failed")?
            }
            ExpiryMode::PerEntry => {
                redis::cmd("EXISTS")
                    .arg(self.entry_key(email))
                    .query_async(&mut conn)
                    .await
                    .context("EXISTS failed")?
            }
        };
        Ok(found)
    }

    async fn purge_expired(&self) -> Result<usize, anyhow::Error> { Ok(0) }
}
