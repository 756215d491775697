use std::sync::{Arc, Mutex};

use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use dentbook::config::AppConfig;
use dentbook::db::{self, SqliteAppointmentStore};
use dentbook::routes;
use dentbook::services::clock::SystemClock;
use dentbook::services::notifications::log::LogNotifier;
use dentbook::services::notifications::mail_relay::MailRelayNotifier;
use dentbook::services::notifications::{spawn_dispatcher, NotificationPort, Notifier};
use dentbook::services::scheduling::AppointmentLifecycle;
use dentbook::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();

    let conn = db::init_db(&config.database_url)?;
    let store = SqliteAppointmentStore::new(Arc::new(Mutex::new(conn)));

    let mail: Arc<dyn NotificationPort> = if config.mail_relay_url.is_empty() {
        tracing::warn!("MAIL_RELAY_URL not set, notifications will only be logged");
        Arc::new(LogNotifier)
    } else {
        tracing::info!("sending notifications through {}", config.mail_relay_url);
        Arc::new(MailRelayNotifier::new(
            config.mail_relay_url.clone(),
            config.mail_relay_key.clone(),
            config.mail_sender.clone(),
        ))
    };
    let (notifier, rx) = Notifier::channel();
    let _dispatcher = spawn_dispatcher(rx, mail);

    let state = Arc::new(AppState {
        config: config.clone(),
        appointments: AppointmentLifecycle::new(Arc::new(store), Arc::new(SystemClock), notifier),
    });

    let app = routes::router(state).layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
