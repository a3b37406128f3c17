use std::net::TcpListener;
use std::sync::Arc;

use actix_web::dev::Server;
use actix_web::web;
use actix_web::web::Data;
use actix_web::App;
use actix_web::HttpServer;
use anyhow::Context;
use secrecy::ExposeSecret;
use tracing_actix_web::TracingLogger;

use crate::clock::Clock;
use crate::clock::SystemClock;
use crate::configuration::RegistryBackend;
use crate::configuration::RegistrySettings;
use crate::configuration::Settings;
use crate::geolocation::GeoClient;
use crate::registry::MemoryStore;
use crate::registry::RedisStore;
use crate::registry::RegistrationStore;
use crate::routes::health_check;
use crate::routes::send_notify;
use crate::telegram_client::TelegramClient;

/// Wrapper for the (optional) Telegram client, so that "not configured" is a
/// state the handler can see and report, rather than a startup failure.
pub struct TelegramBot(pub Option<TelegramClient>);

/// Upper bound on the bytes read from a signup request body
pub struct BodyLimit(pub usize);

/// Wrapper for actix's `Server` with access to the bound port. Not to be
/// confused with actix's `App`!
pub struct Application {
    /// Left private; use `get_port` to access
    port: u16,
    server: Server,
    store: Arc<dyn RegistrationStore>,
}

impl Application {
    /// Build the registry from `cfg` and bind the server
    pub async fn build(cfg: Settings) -> Result<Self, anyhow::Error> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = get_registration_store(&cfg.registry, clock.clone())?;
        Self::build_with(cfg, store, clock).await
    }

    /// Like `build`, but with the registry and clock supplied by the caller.
    /// Tests use this to share one store between apps, and to move time
    /// forward.
    pub async fn build_with(
        cfg: Settings,
        store: Arc<dyn RegistrationStore>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, anyhow::Error> {
        let addr = format!("{}:{}", cfg.application.host, cfg.application.port);
        let listener = TcpListener::bind(&addr).with_context(|| format!("could not bind {addr}"))?;

        // get the randomised port assigned by OS (when configured with port 0)
        let port = listener.local_addr()?.port();

        let telegram = cfg.telegram.client();
        if telegram.is_none() {
            tracing::warn!("Telegram bot token or chat id not set; signups will be refused");
        }

        let server = run(
            listener,
            store.clone(),
            cfg.geolocation.client(),
            TelegramBot(telegram),
            clock,
            BodyLimit(cfg.application.max_body_bytes),
        )?;

        Ok(Self {
            port,
            server,
            store,
        })
    }

    pub fn get_port(&self) -> u16 { self.port }

    /// Handle on the registry, e.g. for `init_expiry_worker`
    pub fn store(&self) -> Arc<dyn RegistrationStore> { self.store.clone() }

    /// Because this consumes `self`, this should be the final function call (or
    /// passed to `tokio::spawn`)
    pub async fn run_until_stopped(self) -> Result<(), std::io::Error> { self.server.await }
}

pub fn get_registration_store(
    cfg: &RegistrySettings,
    clock: Arc<dyn Clock>,
) -> Result<Arc<dyn RegistrationStore>, anyhow::Error> {
    let store: Arc<dyn RegistrationStore> = match cfg.backend {
        RegistryBackend::Memory => Arc::new(MemoryStore::new(cfg.ttl(), cfg.expiry_mode, clock)),
        // `Client::open` only parses the uri; the first connection is made on the
        // first request, so the app starts even if redis is down
        RegistryBackend::Redis => Arc::new(RedisStore::new(
            redis::Client::open(cfg.redis_uri.expose_secret().as_str())
                .context("invalid redis uri")?,
            cfg.key.clone(),
            cfg.ttl(),
            cfg.expiry_mode,
        )),
    };
    Ok(store)
}

/// The server is not responsible for binding to an address, it only listens to
/// an already bound address.
///
/// Declares all API endpoints.
pub fn run(
    listener: TcpListener,
    store: Arc<dyn RegistrationStore>,
    geo: GeoClient,
    telegram: TelegramBot,
    clock: Arc<dyn Clock>,
    body_limit: BodyLimit,
) -> Result<Server, anyhow::Error> {
    // `Data` is an `Arc` on the outside; each worker gets a clone of the same
    // store and clients
    let store: Data<dyn RegistrationStore> = Data::from(store);
    let clock: Data<dyn Clock> = Data::from(clock);
    let geo = Data::new(geo);
    let telegram = Data::new(telegram);
    let body_limit = Data::new(body_limit);

    let server = HttpServer::new(move || {
        App::new()
            .wrap(TracingLogger::default())
            .route("/health_check", web::get().to(health_check))
            .route("/api/send-notify", web::post().to(send_notify))
            .app_data(store.clone())
            .app_data(geo.clone())
            .app_data(telegram.clone())
            .app_data(clock.clone())
            .app_data(body_limit.clone())
    })
    .listen(listener)?
    .run();

    Ok(server)
}
