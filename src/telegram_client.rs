use std::time::Duration;

use reqwest::Client;
use secrecy::ExposeSecret;
use secrecy::Secret;
use serde::Serialize;

/// Telegram Bot API client, bound to a single destination chat.
///
/// Like `GeoClient`, a single instance (and thus a single connection pool) is
/// shared by the whole app.
#[derive(Debug)]
pub struct TelegramClient {
    http_client: Client,
    base_url: String,
    bot_token: Secret<String>,
    chat_id: String,
    timeout: Duration,
}

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'a str,
}

impl TelegramClient {
    pub fn new(
        base_url: String,
        bot_token: Secret<String>,
        chat_id: String,
        timeout: Duration,
    ) -> Self {
        Self {
            http_client: Client::new(),
            base_url,
            bot_token,
            chat_id,
            timeout,
        }
    }

    /// `POST {base_url}/bot{token}/sendMessage`, with `text` interpreted as
    /// Telegram-flavoured HTML. Non-2xx replies are errors.
    #[tracing::instrument(name = "Sending Telegram message", skip_all, fields(chat_id = %self.chat_id))]
    pub async fn send_message(
        &self,
        text: &str,
    ) -> Result<(), reqwest::Error> {
        // the token is part of the path, so the url must never be logged
        let url = format!(
            "{}/bot{}/sendMessage",
            self.base_url,
            self.bot_token.expose_secret()
        );
        let body = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
        };
        self.http_client
            .post(&url)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(reqwest::Error::without_url)?
            .error_for_status()
            .map_err(reqwest::Error::without_url)?;
        Ok(())
    }
}
