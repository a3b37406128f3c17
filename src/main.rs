use std::fmt::Debug;
use std::fmt::Display;

use signup_notifier::configuration::get_configuration;
use signup_notifier::registry::init_expiry_worker;
use signup_notifier::startup::Application;
use signup_notifier::telemetry::get_subscriber;
use signup_notifier::telemetry::init_subscriber;
use tokio::task::JoinError;

fn report_exit(
    name: &str,
    outcome: Result<Result<(), impl Debug + Display>, JoinError>,
) {
    match outcome {
        Ok(Ok(())) => {
            tracing::info!("{name} exited gracefully")
        }

        Ok(Err(e)) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (inner)"
            )
        }

        Err(e) => {
            tracing::error!(
                error.cause_chain=?e,
                error.message=%e,
                "{name} failed (outer)"
            )
        }
    }
}

/// Initialise telemetry, load config, and start the server alongside the
/// registry expiry worker
#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let subscriber = get_subscriber("signup-notifier", "info", std::io::stdout);
    init_subscriber(subscriber)?;

    let cfg = get_configuration()?;
    let sweep_interval = cfg.registry.sweep_interval();

    let app = Application::build(cfg).await?;
    tracing::info!(port = app.get_port(), "listening");
    let expiry_worker = init_expiry_worker(app.store(), sweep_interval);

    // both run on the multi-threaded runtime; whichever stops first takes the
    // other down with it
    let server_thread = tokio::spawn(app.run_until_stopped());
    let expiry_worker_thread = tokio::spawn(expiry_worker);

    tokio::select! {
        o = server_thread => { report_exit("API", o) },
        o = expiry_worker_thread => { report_exit("Background expiry worker", o) },
    }

    Ok(())
}
