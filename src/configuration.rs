use std::env;
use std::env::current_dir;
use std::fmt::Display;
use std::time::Duration;

use config::Config;
use config::ConfigError;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Deserialize;
use serde_aux::field_attributes::deserialize_number_from_string;

use crate::geolocation::GeoClient;
use crate::registry::ExpiryMode;
use crate::telegram_client::TelegramClient;

/// Global configuration, loaded from `configuration/*.yaml` and the
/// environment. See `get_configuration`.
#[derive(Deserialize, Clone)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub registry: RegistrySettings,
    pub geolocation: GeolocationSettings,
    pub telegram: TelegramSettings,
}

/// Server configuration
#[derive(Deserialize, Clone)]
pub struct ApplicationSettings {
    /// Should be localhost on dev machine, 0.0.0.0 on prod
    pub host: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub port: u16,

    /// Largest `POST /api/send-notify` body read; anything bigger is refused
    /// like any other malformed body
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub max_body_bytes: usize,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RegistryBackend {
    /// Process-local; registrations are lost on restart and not shared between
    /// instances
    Memory,
    Redis,
}

/// Where registered emails live, and for how long
#[derive(Deserialize, Clone)]
pub struct RegistrySettings {
    pub backend: RegistryBackend,
    pub redis_uri: Secret<String>,

    /// Name of the Redis set (or key prefix, in `per_entry` mode)
    pub key: String,

    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub ttl_days: u32,

    pub expiry_mode: ExpiryMode,

    /// How often the memory backend drops expired entries. Ignored by Redis,
    /// which expires keys on its own.
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub sweep_interval_seconds: u64,
}

impl RegistrySettings {
    pub fn ttl(&self) -> chrono::Duration { chrono::Duration::days(self.ttl_days.into()) }

    pub fn sweep_interval(&self) -> Duration { Duration::from_secs(self.sweep_interval_seconds) }
}

#[derive(Deserialize, Clone)]
pub struct GeolocationSettings {
    pub base_url: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl GeolocationSettings {
    pub fn client(&self) -> GeoClient {
        GeoClient::new(
            self.base_url.clone(),
            Duration::from_millis(self.timeout_milliseconds),
        )
    }
}

/// Both `bot_token` and `chat_id` may be absent from the config files; the
/// notify endpoint refuses to do anything until they are set.
#[derive(Deserialize, Clone)]
pub struct TelegramSettings {
    pub base_url: String,
    pub bot_token: Option<Secret<String>>,
    pub chat_id: Option<String>,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    pub timeout_milliseconds: u64,
}

impl TelegramSettings {
    /// `None` if either credential is missing or empty
    pub fn client(&self) -> Option<TelegramClient> {
        let token = self
            .bot_token
            .as_ref()
            .filter(|t| !t.expose_secret().trim().is_empty())?;
        let chat_id = self.chat_id.as_ref().filter(|c| !c.trim().is_empty())?;
        Some(TelegramClient::new(
            self.base_url.clone(),
            token.clone(),
            chat_id.clone(),
            Duration::from_millis(self.timeout_milliseconds),
        ))
    }
}

pub enum Environment {
    Local,
    Production,
}

impl Display for Environment {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Environment::Local => "local",
                Environment::Production => "production",
            }
        )?;
        Ok(())
    }
}

impl TryFrom<String> for Environment {
    type Error = String;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "production" => Ok(Self::Production),
            e => Err(format!("Invalid environment: {e}")),
        }
    }
}

/// Load yaml configuration files at `<project_root>/configuration`, then
/// apply environment overrides.
///
/// `APP_TELEGRAM__BOT_TOKEN` and the bare `TELEGRAM_BOT_TOKEN` (likewise
/// `TELEGRAM_CHAT_ID`) are both accepted; the bare names win.
pub fn get_configuration() -> Result<Settings, ConfigError> {
    let cfg_dir = current_dir()
        .map_err(|e| ConfigError::Message(format!("could not get current dir: {e}")))?
        .join("configuration");

    let env = Environment::try_from(
        env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "local".to_string()),
    )
    .map_err(ConfigError::Message)?;

    Config::builder()
        .add_source(config::File::from(cfg_dir.join("base.yaml")))
        .add_source(config::File::from(cfg_dir.join(format!("{env}.yaml"))))
        // env vars are -always- parsed as String, hence `serde-aux` on numeric
        // fields
        //
        // `APP_APPLICATION__PORT=5001` -> `Settings.application.port`
        .add_source(
            config::Environment::with_prefix("APP")
                .prefix_separator("_")
                .separator("__"),
        )
        .set_override_option("telegram.bot_token", env::var("TELEGRAM_BOT_TOKEN").ok())?
        .set_override_option("telegram.chat_id", env::var("TELEGRAM_CHAT_ID").ok())?
        .build()?
        .try_deserialize::<Settings>()
}
