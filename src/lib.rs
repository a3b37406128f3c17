//! Backend for a "coming soon" landing page: records email signups and
//! announces each new one in a Telegram chat.
//!
//! `POST /api/send-notify` with `{"email": "..."}`; see
//! `routes::send_notify`.

pub mod clock;
pub mod configuration;
pub mod domain;
pub mod geolocation;
pub mod registry;
pub mod routes;
pub mod startup;
pub mod telegram_client;
pub mod telemetry;
