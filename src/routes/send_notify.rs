use std::fmt::Debug;

use actix_web::http::StatusCode;
use actix_web::web;
use actix_web::HttpRequest;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use anyhow::Context;
use serde::Serialize;

use super::error_chain_fmt;
use crate::clock::Clock;
use crate::domain::Location;
use crate::domain::Notification;
use crate::domain::SignupForm;
use crate::domain::SignupRequest;
use crate::geolocation::GeoClient;
use crate::registry::Registration;
use crate::registry::RegistrationStore;
use crate::startup::BodyLimit;
use crate::startup::TelegramBot;

/// The only outcomes a caller ever sees besides success. The `Display` text
/// of each variant is exactly what goes into the response body; the cause of
/// an `UnexpectedError` is only logged.
#[derive(thiserror::Error)]
pub enum NotifyError {
    #[error("Missing Telegram configuration")]
    MissingConfiguration,
    #[error("This email is already registered.")]
    AlreadyRegistered,
    #[error("Failed to process request")]
    UnexpectedError(#[from] anyhow::Error),
}

impl Debug for NotifyError {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for NotifyError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::AlreadyRegistered => StatusCode::BAD_REQUEST,
            Self::MissingConfiguration | Self::UnexpectedError(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        HttpResponse::build(self.status_code()).json(ErrorBody {
            error: self.to_string(),
        })
    }
}

#[derive(Serialize)]
struct SuccessBody {
    success: bool,
}

/// Best effort: an address we can't resolve is reported as `Location::unknown`
/// rather than failing the signup.
async fn locate(
    geo: &GeoClient,
    signup: &SignupRequest,
) -> Location {
    if !signup.has_client_addr() {
        return Location::unknown();
    }
    match geo.lookup(&signup.client_addr).await {
        Ok(location) => location,
        Err(e) => {
            tracing::warn!(
                error.cause_chain = ?e,
                error.message = %e,
                "geolocation unavailable, using defaults"
            );
            Location::unknown()
        }
    }
}

/// `POST /api/send-notify`
///
/// Registers `email` (once per time-to-live window) and announces the signup
/// in the configured Telegram chat.
///
/// ```sh
///     curl -i -H 'Content-Type: application/json' \
///         --data '{"email":"john@foo.com"}' http://127.0.0.1:8000/api/send-notify
/// ```
///
/// - 500 `Missing Telegram configuration` before anything else, if the bot
///   token or chat id is unset
/// - 400 if the email is already registered
/// - 500 `Failed to process request` if the body isn't `{"email": string}`
///   (including a body over `application.max_body_bytes`), or the registry
///   can't be reached
/// - 200 otherwise, whether or not the location lookup and the Telegram
///   message succeed
// the body is taken as a raw stream (not `web::Json` or `web::Bytes`, whose
// extractors answer before the handler runs) so that the configuration check
// comes first, and a bad or oversized body is a 500 like any other unexpected
// error
#[tracing::instrument(
    name = "Notifying of new signup",
    skip_all,
    fields(
        email = tracing::field::Empty,
        client_addr = tracing::field::Empty,
    )
)]
pub async fn send_notify(
    req: HttpRequest,
    body: web::Payload,
    body_limit: web::Data<BodyLimit>,
    store: web::Data<dyn RegistrationStore>,
    geo: web::Data<GeoClient>,
    telegram: web::Data<TelegramBot>,
    clock: web::Data<dyn Clock>,
) -> Result<HttpResponse, NotifyError> {
    let telegram = telegram
        .0
        .as_ref()
        .ok_or(NotifyError::MissingConfiguration)?;

    // actix's `Error` is not `Send`, so only its message can go into `anyhow`
    let body = body
        .to_bytes_limited(body_limit.0)
        .await
        .map_err(|_| anyhow::anyhow!("request body exceeds {} bytes", body_limit.0))?
        .map_err(|e| anyhow::anyhow!("could not read request body: {e}"))?;
    let form: SignupForm =
        serde_json::from_slice(&body).context("could not parse signup request body")?;
    tracing::Span::current().record("email", tracing::field::display(&form.email));

    match store
        .register(&form.email)
        .await
        .context("could not register email")?
    {
        Registration::AlreadyRegistered => return Err(NotifyError::AlreadyRegistered),
        Registration::Added => tracing::info!("registered new email"),
    }

    let signup = SignupRequest::new(form.email, req.headers());
    tracing::Span::current().record("client_addr", tracing::field::display(&signup.client_addr));

    let location = locate(&geo, &signup).await;
    let notification = Notification::new(&signup, &location, clock.now());

    // the signup is recorded either way; a lost message is only worth a log line
    if let Err(e) = telegram.send_message(notification.as_ref()).await {
        tracing::warn!(
            error.cause_chain = ?e,
            error.message = %e,
            "could not deliver signup notification"
        );
    }

    Ok(HttpResponse::Ok().json(SuccessBody { success: true }))
}
